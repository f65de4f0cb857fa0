//! Test helper module for invoicing-service integration tests.
//!
//! Boots the real HTTP application on a random port against a mocked
//! billing API, the in-memory store and a temporary artifact directory.

#![allow(dead_code)]

use invoicing_service::config::{
    BillingApiConfig, FormDefaults, InvoicingConfig, StorageBackend, StorageConfig,
};
use invoicing_service::models::Member;
use invoicing_service::services::{init_metrics, LocalStorage, MemoryStore, Stores};
use invoicing_service::startup::Application;
use secrecy::Secret;
use serde_json::{json, Value};
use service_core::config::Config as CoreConfig;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const BUCKET: &str = "comprobante-de-pago";
pub const MEMBER_DNI: &str = "12345678";
pub const MEMBER_ID: i64 = 42;

/// Test application wrapper for integration tests.
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub billing_api: MockServer,
    pub store: Arc<MemoryStore>,
    pub storage: Arc<LocalStorage>,
    pub client: reqwest::Client,
    _storage_dir: TempDir,
}

impl TestApp {
    /// Spawn a new test application on a random port.
    pub async fn spawn() -> Self {
        init_metrics();

        let billing_api = MockServer::start().await;
        let storage_dir = TempDir::new().expect("Failed to create storage dir");
        let storage = Arc::new(
            LocalStorage::new(storage_dir.path(), BUCKET)
                .await
                .expect("Failed to create local storage"),
        );
        let store = Arc::new(MemoryStore::with_default_account("Caja Principal"));

        let config = InvoicingConfig {
            common: CoreConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                log_level: "warn".to_string(),
                otlp_endpoint: None,
            },
            service_name: "invoicing-service-test".to_string(),
            billing_api: BillingApiConfig {
                base_url: billing_api.uri(),
                token: Secret::new("test-token".to_string()),
                timeout_secs: 5,
                company_id: "1".to_string(),
                branch_id: "1".to_string(),
            },
            database: None,
            storage: StorageConfig {
                backend: StorageBackend::Local,
                bucket: BUCKET.to_string(),
                local_path: storage_dir.path().display().to_string(),
                http_url: None,
                http_token: None,
            },
            form_defaults: FormDefaults::default(),
            session_ttl_secs: 3600,
        };

        let app = Application::build_with(config, Stores::from_shared(store.clone()), storage.clone())
            .await
            .expect("Failed to build test application");
        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let client = reqwest::Client::new();
        for _ in 0..50 {
            if client
                .get(format!("{}/health", address))
                .send()
                .await
                .map(|r| r.status().is_success())
                .unwrap_or(false)
            {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }

        Self {
            address,
            port,
            billing_api,
            store,
            storage,
            client,
            _storage_dir: storage_dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn add_member(&self) {
        self.store
            .add_member(Member {
                id: MEMBER_ID,
                dni: MEMBER_DNI.to_string(),
                nombres: Some("Ana".to_string()),
                apellido_paterno: Some("Quispe".to_string()),
                apellido_materno: Some("Mamani".to_string()),
                direccion_dni: Some("Av. Sol 123".to_string()),
                distrito_dni: Some("Cusco".to_string()),
                provincia_dni: Some("Cusco".to_string()),
                region_dni: Some("Cusco".to_string()),
                celular: Some("984000111".to_string()),
                ..Default::default()
            })
            .await;
    }

    /// Open a boleta form and return its id and initial values.
    pub async fn open_boleta_form(&self) -> (String, Value) {
        let body: Value = self
            .client
            .post(self.url("/boleta-forms"))
            .send()
            .await
            .expect("Failed to open form")
            .json()
            .await
            .expect("Failed to parse form");
        let id = body["id"].as_str().expect("form id").to_string();
        (id, body["values"].clone())
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn open_summary_form(&self) -> String {
        let body: Value = self
            .client
            .post(self.url("/summary-forms"))
            .send()
            .await
            .expect("Failed to open summary form")
            .json()
            .await
            .expect("Failed to parse summary form");
        body["id"].as_str().expect("form id").to_string()
    }

    pub async fn mock_issue_ok(&self) {
        Mock::given(method("POST"))
            .and(path("/boletas"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "success": true,
                "message": "Boleta creada",
                "data": { "id": 500, "numero_completo": "B001-77" }
            })))
            .mount(&self.billing_api)
            .await;
    }

    pub async fn mock_generate_pdf(&self, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path("/boletas/500/generate-pdf"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.billing_api)
            .await;
    }

    pub async fn mock_download_pdf(&self) {
        Mock::given(method("GET"))
            .and(path("/boletas/500/download-pdf"))
            .and(query_param("format", "A4"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_bytes(b"%PDF-1.4 boleta".to_vec()),
            )
            .mount(&self.billing_api)
            .await;
    }

    pub async fn mock_create_summary(&self) {
        Mock::given(method("POST"))
            .and(path("/boletas/create-daily-summary"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "Resumen creado",
                "data": {
                    "id": 31,
                    "numero_completo": "RC-20250728-1",
                    "fecha_resumen": "2025-07-28",
                    "estado_proceso": "GENERADO",
                    "estado_sunat": "PENDIENTE",
                    "boletas": [
                        {
                            "id": 500,
                            "numero_completo": "B001-77",
                            "fecha_emision": "2025-07-28",
                            "moneda": "PEN",
                            "mto_imp_venta": "119.80"
                        }
                    ]
                }
            })))
            .mount(&self.billing_api)
            .await;
    }

    pub async fn mock_send_summary(&self) {
        Mock::given(method("POST"))
            .and(path("/daily-summaries/31/send-sunat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "Enviado",
                "data": {
                    "id": 31,
                    "fecha_resumen": "2025-07-28T00:00:00.000000Z",
                    "numero_completo": "RC-20250728-1",
                    "correlativo": "1",
                    "ticket": "T-123",
                    "estado_sunat": "PROCESANDO",
                    "detalles": [ { "serie_numero": "B001-77" } ]
                }
            })))
            .mount(&self.billing_api)
            .await;
    }
}

/// Fill a form's initial values so they pass validation.
pub fn complete_values(mut values: Value) -> Value {
    values["client"]["numero_documento"] = json!(MEMBER_DNI);
    values["client"]["razon_social"] = json!("Ana Quispe Mamani");
    values["detalles"][0]["descripcion"] = json!("Cuota mensual");
    values["detalles"][0]["cantidad"] = json!("2");
    values["detalles"][0]["mto_valor_unitario"] = json!("59.90");
    values["income_numero_operacion"] = json!("OP-991");
    values
}

use crate::models::{BoletaFormValues, Client, LineItem, DNI_DOCUMENT_TYPE};
use crate::tax::DEFAULT_IGV_PERCENTAGE;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use secrecy::Secret;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct InvoicingConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub service_name: String,
    pub billing_api: BillingApiConfig,
    /// Absent in development: the service then runs against an in-memory store.
    pub database: Option<DatabaseConfig>,
    pub storage: StorageConfig,
    pub form_defaults: FormDefaults,
    /// Idle form sessions older than this are swept.
    pub session_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingApiConfig {
    pub base_url: String,
    pub token: Secret<String>,
    pub timeout_secs: u64,
    pub company_id: String,
    pub branch_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub bucket: String,
    pub local_path: String,
    pub http_url: Option<String>,
    pub http_token: Option<Secret<String>>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    Http,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "http" => Ok(StorageBackend::Http),
            _ => Err(format!("Invalid storage backend: {}", s)),
        }
    }
}

/// Values a new boleta form starts from.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FormDefaults {
    pub serie: String,
    pub currency: String,
    pub operation_type: String,
    pub send_method: String,
    pub payment_form: String,
    pub created_by: String,
    pub income_account: String,
    pub item: ItemDefaults,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ItemDefaults {
    pub code: String,
    pub description: String,
    pub unit: String,
    pub unit_price: Decimal,
    pub tax_affectation: String,
    pub sunat_product_code: String,
}

impl Default for FormDefaults {
    fn default() -> Self {
        Self {
            serie: "B001".to_string(),
            currency: "PEN".to_string(),
            operation_type: "0101".to_string(),
            send_method: "individual".to_string(),
            payment_form: "Contado".to_string(),
            created_by: "admin_user".to_string(),
            income_account: "Caja Principal".to_string(),
            item: ItemDefaults {
                code: String::new(),
                description: String::new(),
                unit: "NIU".to_string(),
                unit_price: Decimal::ZERO,
                tax_affectation: "10".to_string(),
                sunat_product_code: String::new(),
            },
        }
    }
}

fn optional(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

impl FormDefaults {
    /// Fresh form values for `today`, with one default item and income
    /// linkage switched on.
    pub fn initial_values(&self, today: NaiveDate) -> BoletaFormValues {
        BoletaFormValues {
            serie: self.serie.clone(),
            issue_date: today,
            currency: self.currency.clone(),
            operation_type: self.operation_type.clone(),
            send_method: self.send_method.clone(),
            payment_form: self.payment_form.clone(),
            created_by: self.created_by.clone(),
            client: Client {
                document_type: DNI_DOCUMENT_TYPE.to_string(),
                ..Client::default()
            },
            items: vec![LineItem {
                code: optional(&self.item.code),
                description: self.item.description.clone(),
                unit: self.item.unit.clone(),
                quantity: Decimal::ONE,
                unit_price: self.item.unit_price,
                tax_percentage: DEFAULT_IGV_PERCENTAGE,
                tax_affectation: self.item.tax_affectation.clone(),
                sunat_product_code: optional(&self.item.sunat_product_code),
            }],
            create_income_record: true,
            income_date: Some(today),
            income_operation_number: Some(String::new()),
            income_account: optional(&self.income_account),
        }
    }
}

impl InvoicingConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let mut common_config = core_config::Config::load()?;
        // Plain LOG_LEVEL / OTLP_ENDPOINT work alongside the APP__ forms
        if let Ok(level) = env::var("LOG_LEVEL") {
            common_config.log_level = level;
        }
        if common_config.otlp_endpoint.is_none() {
            common_config.otlp_endpoint = env::var("OTLP_ENDPOINT").ok();
        }

        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";
        let fallback = FormDefaults::default();

        let database_url = if is_prod {
            Some(get_env("DATABASE_URL", None, is_prod)?)
        } else {
            env::var("DATABASE_URL").ok()
        };
        let database = match database_url {
            Some(url) => Some(DatabaseConfig {
                url: Secret::new(url),
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
                run_migrations: parse_env("DATABASE_RUN_MIGRATIONS", "true", is_prod)?,
            }),
            None => None,
        };

        let backend: StorageBackend = get_env("STORAGE_BACKEND", Some("local"), is_prod)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;
        let storage = StorageConfig {
            backend,
            bucket: get_env("STORAGE_BUCKET", Some("comprobante-de-pago"), is_prod)?,
            local_path: get_env("STORAGE_LOCAL_PATH", Some("storage"), false)?,
            http_url: env::var("STORAGE_HTTP_URL").ok(),
            http_token: env::var("STORAGE_HTTP_TOKEN").ok().map(Secret::new),
        };
        if storage.backend == StorageBackend::Http && storage.http_url.is_none() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "STORAGE_HTTP_URL is required when STORAGE_BACKEND=http"
            )));
        }

        Ok(InvoicingConfig {
            common: common_config,
            service_name: get_env("SERVICE_NAME", Some("invoicing-service"), false)?,
            billing_api: BillingApiConfig {
                base_url: get_env("BILLING_API_BASE_URL", Some("http://localhost:8000/api"), is_prod)?,
                token: Secret::new(get_env("BILLING_API_TOKEN", Some(""), is_prod)?),
                timeout_secs: parse_env("BILLING_API_TIMEOUT_SECS", "30", false)?,
                company_id: get_env("COMPANY_ID", Some("1"), is_prod)?,
                branch_id: get_env("BRANCH_ID", Some("1"), is_prod)?,
            },
            database,
            storage,
            form_defaults: FormDefaults {
                serie: env_or("DEFAULT_SERIE_BOLETA", &fallback.serie),
                currency: env_or("DEFAULT_MONEDA", &fallback.currency),
                operation_type: env_or("DEFAULT_TIPO_OPERACION", &fallback.operation_type),
                send_method: env_or("DEFAULT_METODO_ENVIO", &fallback.send_method),
                payment_form: env_or("DEFAULT_FORMA_PAGO", &fallback.payment_form),
                created_by: env_or("DEFAULT_USUARIO", &fallback.created_by),
                income_account: env_or("DEFAULT_INCOME_ACCOUNT", &fallback.income_account),
                item: ItemDefaults {
                    code: env_or("DEFAULT_ITEM_CODE", &fallback.item.code),
                    description: env_or("DEFAULT_ITEM_DESCRIPTION", &fallback.item.description),
                    unit: env_or("DEFAULT_ITEM_UNIT", &fallback.item.unit),
                    unit_price: parse_env("DEFAULT_ITEM_UNIT_VALUE", "0", false)?,
                    tax_affectation: env_or("DEFAULT_TIP_AFE_IGV", &fallback.item.tax_affectation),
                    sunat_product_code: env_or(
                        "DEFAULT_SUNAT_PRODUCT_CODE",
                        &fallback.item.sunat_product_code,
                    ),
                },
            },
            session_ttl_secs: parse_env("SESSION_TTL_SECS", "3600", false)?,
        })
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

/// Form defaults are cosmetic and never required, even in production.
fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: FromStr>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError> {
    let raw = match env::var(key) {
        Ok(val) => val,
        Err(_) if !is_prod => default.to_string(),
        Err(_) => get_env(key, None, is_prod)?,
    };
    raw.trim()
        .parse()
        .map_err(|_| AppError::ConfigError(anyhow::anyhow!("{} has an invalid value: {}", key, raw)))
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

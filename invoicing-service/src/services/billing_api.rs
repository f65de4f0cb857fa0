//! Client for the third-party electronic billing API.
//!
//! Every JSON endpoint answers with a `{success, message, data}` envelope.
//! `success: false` is a business error whose message is shown to the user
//! as-is; transport failures are reported with a generic message.

use crate::config::BillingApiConfig;
use crate::error::InvoicingError;
use crate::models::{BoletaPayload, IssuedBoleta, PdfFormat, SentSummary, SummaryData};
use crate::services::metrics::{BILLING_API_DURATION, BILLING_API_REQUESTS_TOTAL};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Operations the workflows need from the billing API.
#[async_trait]
pub trait BillingApi: Send + Sync {
    async fn issue_boleta(&self, payload: &BoletaPayload) -> Result<IssuedBoleta, InvoicingError>;

    /// Ask the API to render the PDF for an issued boleta.
    async fn generate_pdf(&self, boleta_id: i64, format: PdfFormat) -> Result<(), InvoicingError>;

    /// Fetch a rendered PDF.
    async fn download_pdf(
        &self,
        boleta_id: i64,
        format: PdfFormat,
    ) -> Result<Vec<u8>, InvoicingError>;

    async fn create_daily_summary(&self, date: NaiveDate) -> Result<SummaryData, InvoicingError>;

    /// Submit a created summary to the tax authority.
    async fn send_summary(&self, summary_id: i64) -> Result<SentSummary, InvoicingError>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Serialize)]
struct GeneratePdfRequest {
    format: PdfFormat,
}

#[derive(Debug, Serialize)]
struct CreateSummaryRequest<'a> {
    company_id: &'a str,
    branch_id: &'a str,
    fecha_resumen: String,
}

/// reqwest-backed billing API client.
#[derive(Clone)]
pub struct HttpBillingApi {
    client: Client,
    config: BillingApiConfig,
}

impl HttpBillingApi {
    pub fn new(config: BillingApiConfig) -> Result<Self, InvoicingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(InvoicingError::Transport)?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self.config.token.expose_secret();
        if token.is_empty() {
            request
        } else {
            request.bearer_auth(token)
        }
    }

    /// Send a request and unwrap the JSON envelope into `T`.
    async fn call<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, InvoicingError> {
        let timer = BILLING_API_DURATION
            .with_label_values(&[operation])
            .start_timer();
        let result = self.exchange(request).await.and_then(|body| {
            let data = body.ok_or_else(|| {
                InvoicingError::Decode(format!("{operation} response has no data"))
            })?;
            serde_json::from_value(data).map_err(|e| InvoicingError::Decode(e.to_string()))
        });
        timer.observe_duration();
        record(operation, &result);
        result
    }

    /// Perform the HTTP exchange, returning the envelope's `data`.
    async fn exchange(&self, request: RequestBuilder) -> Result<Option<Value>, InvoicingError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(InvoicingError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(InvoicingError::Transport)?;

        debug!(status = %status, body_len = body.len(), "Billing API response");

        if !status.is_success() {
            return Err(InvoicingError::Api(error_message(status, &body)));
        }

        if body.trim().is_empty() {
            return Ok(None);
        }

        let envelope: Envelope =
            serde_json::from_str(&body).map_err(|e| InvoicingError::Decode(e.to_string()))?;
        if !envelope.success {
            warn!(message = %envelope.message, "Billing API reported failure");
            return Err(InvoicingError::Api(envelope.message));
        }
        Ok(envelope.data)
    }
}

/// Prefer the API's own `message`, else the raw body.
fn error_message(status: StatusCode, body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        v.get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
    });
    match from_json {
        Some(message) => message,
        None if body.trim().is_empty() => format!("Billing API returned status {}", status),
        None => body.to_string(),
    }
}

fn record<T>(operation: &str, result: &Result<T, InvoicingError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    BILLING_API_REQUESTS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
}

#[async_trait]
impl BillingApi for HttpBillingApi {
    #[instrument(skip(self, payload))]
    async fn issue_boleta(&self, payload: &BoletaPayload) -> Result<IssuedBoleta, InvoicingError> {
        let request = self.client.post(self.url("/boletas")).json(payload);
        let boleta: IssuedBoleta = self.call("issue_boleta", request).await?;
        info!(boleta_id = boleta.id, numero = %boleta.numero_completo, "Boleta issued");
        Ok(boleta)
    }

    #[instrument(skip(self))]
    async fn generate_pdf(&self, boleta_id: i64, format: PdfFormat) -> Result<(), InvoicingError> {
        let timer = BILLING_API_DURATION
            .with_label_values(&["generate_pdf"])
            .start_timer();
        let request = self
            .client
            .post(self.url(&format!("/boletas/{boleta_id}/generate-pdf")))
            .json(&GeneratePdfRequest { format });
        let result = self.exchange(request).await.map(|_| ());
        timer.observe_duration();
        record("generate_pdf", &result);
        result
    }

    #[instrument(skip(self))]
    async fn download_pdf(
        &self,
        boleta_id: i64,
        format: PdfFormat,
    ) -> Result<Vec<u8>, InvoicingError> {
        let timer = BILLING_API_DURATION
            .with_label_values(&["download_pdf"])
            .start_timer();
        let request = self
            .client
            .get(self.url(&format!(
                "/boletas/{boleta_id}/download-pdf?format={}",
                format.as_str()
            )));

        let result = async {
            let response = self
                .authorized(request)
                .send()
                .await
                .map_err(InvoicingError::Transport)?;
            let status = response.status();
            if !status.is_success() {
                return Err(InvoicingError::Api(format!(
                    "Error de la API al obtener PDF. Código: {}",
                    status.as_u16()
                )));
            }
            let bytes = response.bytes().await.map_err(InvoicingError::Transport)?;
            Ok(bytes.to_vec())
        }
        .await;

        timer.observe_duration();
        record("download_pdf", &result);
        result
    }

    #[instrument(skip(self))]
    async fn create_daily_summary(&self, date: NaiveDate) -> Result<SummaryData, InvoicingError> {
        let body = CreateSummaryRequest {
            company_id: &self.config.company_id,
            branch_id: &self.config.branch_id,
            fecha_resumen: date.format("%Y-%m-%d").to_string(),
        };
        let request = self
            .client
            .post(self.url("/boletas/create-daily-summary"))
            .json(&body);
        let summary: SummaryData = self.call("create_daily_summary", request).await?;
        info!(summary_id = summary.id, boletas = summary.boletas.len(), "Daily summary created");
        Ok(summary)
    }

    #[instrument(skip(self))]
    async fn send_summary(&self, summary_id: i64) -> Result<SentSummary, InvoicingError> {
        let request = self
            .client
            .post(self.url(&format!("/daily-summaries/{summary_id}/send-sunat")));
        let sent: SentSummary = self.call("send_summary", request).await?;
        info!(summary_id = sent.id, ticket = %sent.ticket, "Daily summary sent to SUNAT");
        Ok(sent)
    }
}

use crate::models::{BoletaFormValues, FieldIssue, Notice, PdfFormat};
use crate::workflows::{BoletaFormSnapshot, IssuanceReport, LookupOutcome};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct BoletaFormResponse {
    pub id: Uuid,
    #[serde(flatten)]
    pub form: BoletaFormSnapshot,
}

/// Document typed by the user. `values` carries the rest of the form
/// when the caller wants it saved first.
#[derive(Debug, Deserialize)]
pub struct ClientLookupRequest {
    #[serde(rename = "tipo_documento")]
    pub document_type: String,
    #[serde(rename = "numero_documento")]
    pub document_number: String,
    #[serde(default)]
    pub values: Option<BoletaFormValues>,
}

#[derive(Debug, Serialize)]
pub struct ClientLookupResponse {
    pub id: Uuid,
    /// skipped, found, not_found or failed
    pub lookup: &'static str,
    pub notice: Option<Notice>,
    #[serde(flatten)]
    pub form: BoletaFormSnapshot,
}

impl ClientLookupResponse {
    pub fn new(id: Uuid, outcome: &LookupOutcome, form: BoletaFormSnapshot) -> Self {
        let lookup = match outcome {
            LookupOutcome::Skipped => "skipped",
            LookupOutcome::Found { .. } => "found",
            LookupOutcome::NotFound => "not_found",
            LookupOutcome::Failed { .. } => "failed",
        };
        Self {
            id,
            lookup,
            notice: outcome.notice(),
            form,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub values: Option<BoletaFormValues>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub id: Uuid,
    pub report: IssuanceReport,
    #[serde(flatten)]
    pub form: BoletaFormSnapshot,
}

/// Field-scoped validation failures, one entry per message.
#[derive(Debug, Serialize)]
pub struct ValidationResponse {
    pub error: String,
    pub issues: Vec<FieldIssue>,
}

#[derive(Debug, Deserialize)]
pub struct PdfParams {
    #[serde(default)]
    pub format: PdfFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_format_defaults_to_a4() {
        let params: PdfParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.format, PdfFormat::A4);
        let params: PdfParams = serde_json::from_str(r#"{"format":"TICKET"}"#).unwrap();
        assert_eq!(params.format, PdfFormat::Ticket);
    }

    #[test]
    fn lookup_request_uses_form_field_names() {
        let request: ClientLookupRequest =
            serde_json::from_str(r#"{"tipo_documento":"1","numero_documento":"12345678"}"#)
                .unwrap();
        assert_eq!(request.document_number, "12345678");
        assert!(request.values.is_none());
    }
}

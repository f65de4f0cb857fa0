//! Daily summary (resumen diario) models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

/// Request to create a daily summary for one date.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSummaryRequest {
    #[validate(
        length(min = 1, message = "Por favor, seleccione una fecha válida."),
        custom(function = "validate_summary_date")
    )]
    pub fecha_resumen: String,
}

impl CreateSummaryRequest {
    /// Parsed summary date. Only meaningful after validation.
    pub fn date(&self) -> Option<NaiveDate> {
        self.fecha_resumen.trim().parse().ok()
    }
}

fn validate_summary_date(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || value.trim().parse::<NaiveDate>().is_ok() {
        return Ok(());
    }
    let mut error = ValidationError::new("date");
    error.message = Some("Por favor, seleccione una fecha válida.".into());
    Err(error)
}

/// A receipt grouped under a summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryBoleta {
    pub id: i64,
    pub numero_completo: String,
    pub fecha_emision: String,
    pub moneda: String,
    /// Sale total as the API formats it.
    pub mto_imp_venta: String,
}

/// A generated summary awaiting submission to the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryData {
    pub id: i64,
    pub numero_completo: String,
    pub fecha_resumen: String,
    pub estado_proceso: String,
    pub estado_sunat: String,
    #[serde(default)]
    pub boletas: Vec<SummaryBoleta>,
}

/// Identifying number of a receipt included in a sent summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryDetail {
    pub serie_numero: String,
}

/// Outcome of submitting a summary to the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentSummary {
    pub id: i64,
    pub fecha_resumen: String,
    pub numero_completo: String,
    pub correlativo: String,
    pub ticket: String,
    pub estado_sunat: Option<String>,
    #[serde(default)]
    pub detalles: Vec<SummaryDetail>,
}

impl SentSummary {
    /// Summary date without any time component the API may append.
    pub fn summary_date(&self) -> &str {
        self.fecha_resumen
            .split('T')
            .next()
            .unwrap_or(&self.fecha_resumen)
    }

    /// Header row to persist for this summary.
    pub fn header(&self) -> NewDailySummary {
        NewDailySummary {
            fecha_resumen: self.summary_date().to_string(),
            numero_completo: self.numero_completo.clone(),
            correlativo: self.correlativo.clone(),
            ticket: self.ticket.clone(),
            estado_sunat: self.estado_sunat.clone(),
            summary_api_id: self.id,
        }
    }

    pub fn serie_numeros(&self) -> Vec<String> {
        self.detalles.iter().map(|d| d.serie_numero.clone()).collect()
    }
}

/// Header row for `resumenes_diarios`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewDailySummary {
    pub fecha_resumen: String,
    pub numero_completo: String,
    pub correlativo: String,
    pub ticket: String,
    pub estado_sunat: Option<String>,
    pub summary_api_id: i64,
}

/// Persisted summary as listed in the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DailySummary {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub fecha_resumen: NaiveDate,
    pub numero_completo: String,
    pub correlativo: String,
    pub ticket: String,
    pub estado_sunat: Option<String>,
    pub summary_api_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summary_data_defaults_missing_boletas() {
        let data: SummaryData = serde_json::from_value(json!({
            "id": 9,
            "numero_completo": "RC-20250728-1",
            "fecha_resumen": "2025-07-28",
            "estado_proceso": "GENERADO",
            "estado_sunat": "PENDIENTE"
        }))
        .unwrap();
        assert!(data.boletas.is_empty());
    }

    #[test]
    fn header_drops_time_component() {
        let sent = SentSummary {
            id: 9,
            fecha_resumen: "2025-07-28T00:00:00.000000Z".to_string(),
            numero_completo: "RC-20250728-1".to_string(),
            correlativo: "1".to_string(),
            ticket: "T-123".to_string(),
            estado_sunat: None,
            detalles: vec![SummaryDetail {
                serie_numero: "B001-77".to_string(),
            }],
        };
        let header = sent.header();
        assert_eq!(header.fecha_resumen, "2025-07-28");
        assert_eq!(header.summary_api_id, 9);
        assert_eq!(sent.serie_numeros(), vec!["B001-77".to_string()]);
    }

    #[test]
    fn summary_request_requires_a_real_date() {
        let ok = CreateSummaryRequest {
            fecha_resumen: "2025-07-28".to_string(),
        };
        assert!(ok.validate().is_ok());
        assert_eq!(ok.date(), NaiveDate::from_ymd_opt(2025, 7, 28));

        for bad in ["", "28/07/2025"] {
            let req = CreateSummaryRequest {
                fecha_resumen: bad.to_string(),
            };
            assert!(req.validate().is_err(), "{bad:?} should be rejected");
        }
    }
}

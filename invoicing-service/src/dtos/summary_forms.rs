use crate::models::{DailySummary, Notice, SummaryData};
use crate::workflows::{ProcessStep, SendReport, SummaryState, SummaryWorkflow};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct SummaryFormResponse {
    pub id: Uuid,
    pub state: SummaryState,
    pub steps: [ProcessStep; 2],
}

impl SummaryFormResponse {
    pub fn new(id: Uuid, workflow: &SummaryWorkflow) -> Self {
        Self {
            id,
            state: workflow.state().clone(),
            steps: workflow.process_steps(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateSummaryResponse {
    pub summary: SummaryData,
    pub notice: Notice,
    #[serde(flatten)]
    pub form: SummaryFormResponse,
}

#[derive(Debug, Serialize)]
pub struct SendSummaryResponse {
    pub report: SendReport,
    #[serde(flatten)]
    pub form: SummaryFormResponse,
}

/// Archived summary as listed in the history.
#[derive(Debug, Serialize)]
pub struct SummaryRecordResponse {
    pub id: i64,
    pub fecha_resumen: String,
    pub numero_completo: String,
    pub correlativo: String,
    pub ticket: String,
    pub estado_sunat: Option<String>,
    pub summary_api_id: i64,
    pub created_at: String,
}

impl From<DailySummary> for SummaryRecordResponse {
    fn from(row: DailySummary) -> Self {
        Self {
            id: row.id,
            fecha_resumen: row.fecha_resumen.format("%Y-%m-%d").to_string(),
            numero_completo: row.numero_completo,
            correlativo: row.correlativo,
            ticket: row.ticket,
            estado_sunat: row.estado_sunat,
            summary_api_id: row.summary_api_id,
            created_at: row.created_at.to_rfc3339(),
        }
    }
}

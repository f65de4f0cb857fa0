//! Two-phase daily summary workflow: create, then send to the authority.
//!
//! ```text
//! Idle -> Creating -> Created -> Sending -> Sent
//!           |                       \----> SendFailed
//!           \-> Idle (create failed)
//! ```
//!
//! A created summary must be sent before another can be created. Once the
//! send concludes either way the pending summary is gone.

use crate::error::InvoicingError;
use crate::models::{Notice, SentSummary, SummaryData};
use crate::services::metrics::{COMPENSATIONS_TOTAL, SUMMARIES_TOTAL};
use crate::services::{BillingApi, SummaryArchive};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SummaryState {
    Idle,
    Creating,
    Created { summary: SummaryData },
    Sending { summary: SummaryData },
    Sent { report: SendReport },
    SendFailed { message: String },
}

/// What happened to the local copy of a sent summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArchiveOutcome {
    Saved { header_id: i64 },
    /// The authority has the summary but the local record is missing.
    /// `header_removed` is false when even the compensating delete failed.
    Failed { message: String, header_removed: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendReport {
    pub summary: SentSummary,
    pub archive: ArchiveOutcome,
    pub notice: Notice,
    /// Line kept on screen after the toast fades.
    pub final_message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// One row of the progress indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessStep {
    pub title: &'static str,
    pub status: StepStatus,
}

#[derive(Debug)]
pub struct SummaryWorkflow {
    state: SummaryState,
}

impl Default for SummaryWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

impl SummaryWorkflow {
    pub fn new() -> Self {
        Self {
            state: SummaryState::Idle,
        }
    }

    pub fn state(&self) -> &SummaryState {
        &self.state
    }

    /// Summary created but not yet sent.
    pub fn pending(&self) -> Option<&SummaryData> {
        match &self.state {
            SummaryState::Created { summary } | SummaryState::Sending { summary } => Some(summary),
            _ => None,
        }
    }

    /// Phase 1. Rejected while a created summary is waiting to be sent.
    #[instrument(skip(self, api))]
    pub async fn create(
        &mut self,
        api: &dyn BillingApi,
        date: NaiveDate,
    ) -> Result<SummaryData, InvoicingError> {
        if let Some(pending) = self.pending() {
            return Err(InvoicingError::InvalidState(format!(
                "Ya existe un resumen pendiente de envío ({}).",
                pending.numero_completo
            )));
        }

        self.state = SummaryState::Creating;
        match api.create_daily_summary(date).await {
            Ok(summary) => {
                SUMMARIES_TOTAL.with_label_values(&["create", "ok"]).inc();
                info!(summary_id = summary.id, numero = %summary.numero_completo, "Summary awaiting send");
                self.state = SummaryState::Created {
                    summary: summary.clone(),
                };
                Ok(summary)
            }
            Err(e) => {
                SUMMARIES_TOTAL.with_label_values(&["create", "error"]).inc();
                self.state = SummaryState::Idle;
                Err(e)
            }
        }
    }

    /// Phase 2. Submits the pending summary and archives the result.
    ///
    /// An `Err` means the authority did not accept the summary. Archive
    /// failures after a successful send are reported inside the
    /// [`SendReport`].
    #[instrument(skip(self, api, archive))]
    pub async fn send(
        &mut self,
        api: &dyn BillingApi,
        archive: &dyn SummaryArchive,
    ) -> Result<SendReport, InvoicingError> {
        let summary = match std::mem::replace(&mut self.state, SummaryState::Idle) {
            SummaryState::Created { summary } => summary,
            other => {
                self.state = other;
                return Err(InvoicingError::InvalidState(
                    "No hay un resumen pendiente para enviar.".to_string(),
                ));
            }
        };
        let summary_id = summary.id;
        self.state = SummaryState::Sending { summary };

        let sent = match api.send_summary(summary_id).await {
            Ok(sent) => sent,
            Err(e) => {
                SUMMARIES_TOTAL.with_label_values(&["send", "error"]).inc();
                self.state = SummaryState::SendFailed {
                    message: e.to_string(),
                };
                return Err(e);
            }
        };
        SUMMARIES_TOTAL.with_label_values(&["send", "ok"]).inc();

        let archive_outcome = archive_sent(archive, &sent).await;
        let (notice, final_message) = match &archive_outcome {
            ArchiveOutcome::Saved { .. } => (
                Notice::success(
                    "Éxito",
                    "Resumen enviado a SUNAT y registrado en la base de datos.",
                ),
                format!("Resumen enviado con éxito. Ticket: {}", sent.ticket),
            ),
            ArchiveOutcome::Failed { .. } => (
                Notice::error(
                    "Envío Exitoso, Error al Guardar",
                    format!(
                        "El resumen se envió a SUNAT (Ticket: {}) pero falló al guardarlo localmente. Contacte a soporte.",
                        sent.ticket
                    ),
                ),
                format!(
                    "Envío a SUNAT correcto, pero no se pudo registrar. Ticket: {}. Por favor, guarde este ticket.",
                    sent.ticket
                ),
            ),
        };

        let report = SendReport {
            summary: sent,
            archive: archive_outcome,
            notice,
            final_message,
        };
        self.state = SummaryState::Sent {
            report: report.clone(),
        };
        Ok(report)
    }

    /// Drop whatever the workflow holds, returning an unsent summary if
    /// there was one. The billing API keeps that summary.
    pub fn discard(&mut self) -> Option<SummaryData> {
        match std::mem::replace(&mut self.state, SummaryState::Idle) {
            SummaryState::Created { summary } | SummaryState::Sending { summary } => {
                warn!(summary_id = summary.id, "Discarding a summary that was never sent");
                Some(summary)
            }
            _ => None,
        }
    }

    /// Two-step progress indicator.
    pub fn process_steps(&self) -> [ProcessStep; 2] {
        use StepStatus::*;
        let (create, send) = match &self.state {
            SummaryState::Idle => (Pending, Pending),
            SummaryState::Creating => (InProgress, Pending),
            SummaryState::Created { .. } => (Completed, Pending),
            SummaryState::Sending { .. } => (Completed, InProgress),
            SummaryState::Sent { .. } => (Completed, Completed),
            SummaryState::SendFailed { .. } => (Completed, Failed),
        };
        [
            ProcessStep {
                title: "Paso 1: Crear Resumen Diario",
                status: create,
            },
            ProcessStep {
                title: "Paso 2: Enviar a SUNAT",
                status: send,
            },
        ]
    }
}

/// Notice shown once phase 1 succeeds.
pub fn created_notice() -> Notice {
    Notice::success(
        "Resumen Generado",
        "El resumen diario ha sido creado. Revise y proceda a enviarlo.",
    )
}

/// Header first, then details; a detail failure deletes the header again.
async fn archive_sent(archive: &dyn SummaryArchive, sent: &SentSummary) -> ArchiveOutcome {
    let header_id = match archive.insert_header(&sent.header()).await {
        Ok(id) => id,
        Err(e) => {
            error!(error = %e, ticket = %sent.ticket, "Summary header not saved");
            return ArchiveOutcome::Failed {
                message: e.to_string(),
                header_removed: true,
            };
        }
    };

    let detail_error = match archive.insert_details(header_id, &sent.serie_numeros()).await {
        Ok(()) => {
            info!(header_id, ticket = %sent.ticket, "Summary archived");
            return ArchiveOutcome::Saved { header_id };
        }
        Err(e) => e,
    };

    error!(error = %detail_error, header_id, ticket = %sent.ticket, "Summary details not saved, removing header");
    let header_removed = match archive.delete_header(header_id).await {
        Ok(()) => {
            COMPENSATIONS_TOTAL.with_label_values(&["ok"]).inc();
            true
        }
        Err(e) => {
            COMPENSATIONS_TOTAL.with_label_values(&["error"]).inc();
            error!(error = %e, header_id, ticket = %sent.ticket, "Compensating delete failed; orphaned summary header");
            false
        }
    };
    ArchiveOutcome::Failed {
        message: detail_error.to_string(),
        header_removed,
    }
}

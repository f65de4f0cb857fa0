//! Boleta issuance pipeline.
//!
//! Issue the document, then store its PDF for the member, then book the
//! income. Only the first step can fail the pipeline: once the boleta is
//! issued, later failures are reported in the [`IssuanceReport`] and never
//! undo the issuance.

use crate::error::InvoicingError;
use crate::models::{
    BoletaFormValues, BoletaPayload, IssuedBoleta, NewIncome, Notice, PdfFormat,
    SALE_TRANSACTION_TYPE,
};
use crate::services::metrics::{BOLETAS_ISSUED_TOTAL, PIPELINE_STEPS_TOTAL};
use crate::services::{BillingApi, IncomeLedger, Storage};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Result of one post-issuance step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Completed,
    Skipped { reason: String },
    Failed { message: String },
}

impl StepOutcome {
    fn label(&self) -> &'static str {
        match self {
            StepOutcome::Completed => "completed",
            StepOutcome::Skipped { .. } => "skipped",
            StepOutcome::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuanceReport {
    pub boleta: IssuedBoleta,
    pub pdf: StepOutcome,
    pub income: StepOutcome,
    pub income_amount: Option<Decimal>,
    pub notices: Vec<Notice>,
}

/// Storage key for a member's receipt.
pub fn pdf_key(member_id: i64, numero_completo: &str) -> String {
    format!("{}/{}.pdf", member_id, numero_completo)
}

pub struct IssuancePipeline {
    api: Arc<dyn BillingApi>,
    storage: Arc<dyn Storage>,
    incomes: Arc<dyn IncomeLedger>,
    company_id: String,
    branch_id: String,
}

impl IssuancePipeline {
    pub fn new(
        api: Arc<dyn BillingApi>,
        storage: Arc<dyn Storage>,
        incomes: Arc<dyn IncomeLedger>,
        company_id: impl Into<String>,
        branch_id: impl Into<String>,
    ) -> Self {
        Self {
            api,
            storage,
            incomes,
            company_id: company_id.into(),
            branch_id: branch_id.into(),
        }
    }

    pub fn api(&self) -> &dyn BillingApi {
        self.api.as_ref()
    }

    /// Validate and issue. `Err` only when nothing was issued.
    #[instrument(skip(self, values), fields(serie = %values.serie, items = values.items.len()))]
    pub async fn run(
        &self,
        values: &BoletaFormValues,
        member_id: Option<i64>,
    ) -> Result<IssuanceReport, InvoicingError> {
        values.validate()?;

        let payload = BoletaPayload::build(values, &self.company_id, &self.branch_id);
        let boleta = self.api.issue_boleta(&payload).await?;
        BOLETAS_ISSUED_TOTAL
            .with_label_values(&[values.currency.as_str()])
            .inc();

        let mut notices = vec![Notice::success(
            "Boleta Emitida con Éxito",
            format!("Documento {} procesado.", boleta.numero_completo),
        )];

        let pdf = match member_id {
            Some(member_id) => match self.store_pdf(&boleta, member_id).await {
                Ok(key) => {
                    info!(key = %key, "Receipt PDF stored for member");
                    notices.push(Notice::success(
                        "PDF Guardado Automáticamente",
                        format!(
                            "El comprobante {}.pdf se guardó en el repositorio del socio.",
                            boleta.numero_completo
                        ),
                    ));
                    StepOutcome::Completed
                }
                Err(e) => {
                    warn!(error = %e, boleta_id = boleta.id, "Receipt PDF could not be stored");
                    notices.push(Notice::error(
                        "Error al Guardar PDF",
                        format!("La boleta se emitió, pero no se pudo guardar el PDF: {}", e),
                    ));
                    StepOutcome::Failed {
                        message: e.to_string(),
                    }
                }
            },
            None => {
                notices.push(Notice::warning(
                    "Advertencia: PDF no guardado",
                    "No se ha identificado un socio para asociar y guardar el comprobante.",
                ));
                StepOutcome::Skipped {
                    reason: "no member resolved".to_string(),
                }
            }
        };
        PIPELINE_STEPS_TOTAL
            .with_label_values(&["pdf", pdf.label()])
            .inc();

        let mut income_amount = None;
        let income = match values.income_linkage() {
            Some(linkage) => {
                let amount = values.sale_total();
                income_amount = Some(amount);
                let record = NewIncome {
                    account: linkage.account.to_string(),
                    amount,
                    transaction_type: SALE_TRANSACTION_TYPE.to_string(),
                    receipt_number: boleta.numero_completo.clone(),
                    dni: values.client.document_number.clone(),
                    full_name: values.client.legal_name.clone(),
                    operation_number: linkage.operation_number.to_string(),
                    date: linkage.date,
                };
                match self.incomes.create_income(&record).await {
                    Ok(()) => {
                        notices.push(Notice::success(
                            "Ingreso Registrado",
                            format!("Se creó un nuevo ingreso por S/ {:.2}.", amount),
                        ));
                        StepOutcome::Completed
                    }
                    Err(e) => {
                        warn!(error = %e, boleta_id = boleta.id, "Income could not be recorded");
                        notices.push(Notice::error(
                            "Error al Registrar Ingreso",
                            format!("La boleta se emitió, pero no se pudo crear el ingreso: {}", e),
                        ));
                        StepOutcome::Failed {
                            message: e.to_string(),
                        }
                    }
                }
            }
            None => StepOutcome::Skipped {
                reason: "income linkage not requested".to_string(),
            },
        };
        PIPELINE_STEPS_TOTAL
            .with_label_values(&["income", income.label()])
            .inc();

        Ok(IssuanceReport {
            boleta,
            pdf,
            income,
            income_amount,
            notices,
        })
    }

    /// Render, fetch and store the A4 PDF under the member's folder.
    async fn store_pdf(&self, boleta: &IssuedBoleta, member_id: i64) -> Result<String, InvoicingError> {
        self.api.generate_pdf(boleta.id, PdfFormat::A4).await?;
        let bytes = self.api.download_pdf(boleta.id, PdfFormat::A4).await?;
        let key = pdf_key(member_id, &boleta.numero_completo);
        self.storage.upload(&key, bytes, PDF_CONTENT_TYPE).await?;
        Ok(key)
    }
}

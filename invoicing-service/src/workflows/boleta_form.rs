//! Server-side state of one boleta form.

use crate::config::FormDefaults;
use crate::error::InvoicingError;
use crate::models::{Account, BoletaFormValues, IssuedBoleta, PdfFormat};
use crate::services::{BillingApi, MemberRegistry};
use crate::workflows::issuance::{IssuancePipeline, IssuanceReport};
use crate::workflows::lookup::{lookup_client, LookupOutcome};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, instrument};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IssuanceState {
    Editing,
    Issued { boleta: IssuedBoleta },
    Failed { message: String },
}

/// Member confirmed by the last lookup, tied to the document it matched.
#[derive(Debug, Clone, PartialEq)]
struct ResolvedMember {
    id: i64,
    document_type: String,
    document_number: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoletaFormSnapshot {
    pub values: BoletaFormValues,
    pub member_id: Option<i64>,
    pub state: IssuanceState,
}

pub struct BoletaForm {
    defaults: FormDefaults,
    default_account: Option<String>,
    values: BoletaFormValues,
    member: Option<ResolvedMember>,
    state: IssuanceState,
}

impl BoletaForm {
    /// New form for `today`. When no default income account is configured
    /// the first known account is used.
    pub fn new(defaults: FormDefaults, today: NaiveDate, accounts: &[Account]) -> Self {
        let default_account = if defaults.income_account.is_empty() {
            accounts.first().map(|a| a.name.clone())
        } else {
            Some(defaults.income_account.clone())
        };
        let mut values = defaults.initial_values(today);
        values.income_account = default_account.clone();
        Self {
            defaults,
            default_account,
            values,
            member: None,
            state: IssuanceState::Editing,
        }
    }

    pub fn values(&self) -> &BoletaFormValues {
        &self.values
    }

    pub fn state(&self) -> &IssuanceState {
        &self.state
    }

    /// Member id, only while the client document still matches the one the
    /// member was found with.
    pub fn member_id(&self) -> Option<i64> {
        let member = self.member.as_ref()?;
        let client = &self.values.client;
        (member.document_type == client.document_type
            && member.document_number == client.document_number.trim())
        .then_some(member.id)
    }

    /// Replace the typed values wholesale.
    pub fn replace_values(&mut self, values: BoletaFormValues) {
        self.values = values;
        if self.member_id().is_none() {
            self.member = None;
        }
    }

    /// Update the client document; any change forgets the resolved member.
    pub fn set_document(&mut self, document_type: &str, document_number: &str) {
        let client = &mut self.values.client;
        client.document_type = document_type.to_string();
        client.document_number = document_number.to_string();
        if self.member_id().is_none() {
            self.member = None;
        }
    }

    /// Look the current document up in the member registry.
    #[instrument(skip(self, registry))]
    pub async fn lookup_client(&mut self, registry: &dyn MemberRegistry) -> LookupOutcome {
        self.member = None;
        let document_type = self.values.client.document_type.clone();
        let document_number = self.values.client.document_number.trim().to_string();

        let outcome = lookup_client(registry, &document_type, &document_number).await;
        match &outcome {
            LookupOutcome::Found { member_id, client } => {
                let email = std::mem::take(&mut self.values.client.email);
                self.values.client = client.clone();
                self.values.client.email = email;
                self.member = Some(ResolvedMember {
                    id: *member_id,
                    document_type: client.document_type.clone(),
                    document_number: client.document_number.clone(),
                });
            }
            LookupOutcome::NotFound => self.values.client.clear_lookup_fields(),
            LookupOutcome::Skipped | LookupOutcome::Failed { .. } => {}
        }
        outcome
    }

    /// Run the issuance pipeline on the current values.
    ///
    /// Validation errors leave the form untouched. An issuance failure
    /// clears any previously issued boleta.
    pub async fn submit(
        &mut self,
        pipeline: &IssuancePipeline,
    ) -> Result<IssuanceReport, InvoicingError> {
        self.values.validate()?;
        self.state = IssuanceState::Editing;

        match pipeline.run(&self.values, self.member_id()).await {
            Ok(report) => {
                self.state = IssuanceState::Issued {
                    boleta: report.boleta.clone(),
                };
                Ok(report)
            }
            Err(e) => {
                self.state = IssuanceState::Failed {
                    message: e.to_string(),
                };
                Err(e)
            }
        }
    }

    /// Fetch the last issued boleta's PDF again, without re-issuing.
    #[instrument(skip(self, api))]
    pub async fn download_pdf(
        &self,
        api: &dyn BillingApi,
        format: PdfFormat,
    ) -> Result<(String, Vec<u8>), InvoicingError> {
        let IssuanceState::Issued { boleta } = &self.state else {
            return Err(InvoicingError::InvalidState(
                "No hay una boleta emitida para descargar.".to_string(),
            ));
        };
        let bytes = api.download_pdf(boleta.id, format).await?;
        info!(boleta_id = boleta.id, bytes = bytes.len(), "PDF downloaded");
        Ok((format!("{}.pdf", boleta.numero_completo), bytes))
    }

    /// Start a new boleta: defaults, no member, nothing issued.
    pub fn reset(&mut self, today: NaiveDate) {
        let mut values = self.defaults.initial_values(today);
        values.income_account = self.default_account.clone();
        self.values = values;
        self.member = None;
        self.state = IssuanceState::Editing;
    }

    pub fn snapshot(&self) -> BoletaFormSnapshot {
        BoletaFormSnapshot {
            values: self.values.clone(),
            member_id: self.member_id(),
            state: self.state.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Member;
    use crate::services::MemoryStore;
    use crate::workflows::issuance::tests::{valid_values, FakeApi, MapStorage};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 28).unwrap()
    }

    fn form() -> BoletaForm {
        BoletaForm::new(FormDefaults::default(), today(), &[])
    }

    async fn registry_with_member() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .add_member(Member {
                id: 42,
                dni: "12345678".to_string(),
                nombres: Some("Ana".to_string()),
                apellido_paterno: Some("Quispe".to_string()),
                apellido_materno: Some("Mamani".to_string()),
                direccion_dni: Some("Av. Sol 123".to_string()),
                ..Default::default()
            })
            .await;
        store
    }

    #[tokio::test]
    async fn not_found_clears_dependent_fields_and_member() {
        let store = MemoryStore::new();
        let mut form = form();
        form.values.client.legal_name = "Stale Name".to_string();
        form.values.client.address = Some("Old street".to_string());
        form.values.client.phone = Some("999".to_string());
        form.set_document("1", "12345678");

        let outcome = form.lookup_client(&store).await;
        assert_eq!(outcome, LookupOutcome::NotFound);
        let client = &form.values().client;
        assert!(client.legal_name.is_empty());
        assert_eq!(client.address, None);
        assert_eq!(client.phone, None);
        assert_eq!(form.member_id(), None);
    }

    #[tokio::test]
    async fn editing_the_document_forgets_the_member() {
        let store = registry_with_member().await;
        let mut form = form();
        form.set_document("1", "12345678");
        form.lookup_client(&store).await;
        assert_eq!(form.member_id(), Some(42));
        assert_eq!(form.values().client.legal_name, "Ana Quispe Mamani");

        form.set_document("1", "12345679");
        assert_eq!(form.member_id(), None);
        form.set_document("1", "12345678");
        assert_eq!(form.member_id(), None, "member must be confirmed again");

        form.lookup_client(&store).await;
        form.set_document("6", "12345678");
        assert_eq!(form.member_id(), None);
    }

    #[tokio::test]
    async fn replacing_values_with_another_document_forgets_the_member() {
        let store = registry_with_member().await;
        let mut form = form();
        form.set_document("1", "12345678");
        form.lookup_client(&store).await;

        let mut values = form.values().clone();
        values.client.document_number = "87654321".to_string();
        form.replace_values(values);
        assert_eq!(form.member_id(), None);
    }

    #[tokio::test]
    async fn download_requires_an_issued_boleta_and_never_reissues() {
        let api = Arc::new(FakeApi::default());
        let pipeline = IssuancePipeline::new(
            api.clone(),
            Arc::new(MapStorage::default()),
            Arc::new(MemoryStore::new()),
            "1",
            "1",
        );
        let mut form = form();
        assert!(matches!(
            form.download_pdf(api.as_ref(), PdfFormat::A4).await,
            Err(InvoicingError::InvalidState(_))
        ));

        form.replace_values(valid_values());
        form.submit(&pipeline).await.unwrap();
        let (name, bytes) = form.download_pdf(api.as_ref(), PdfFormat::A4).await.unwrap();
        assert_eq!(name, "B001-77.pdf");
        assert_eq!(bytes, b"%PDF-1.4");
        assert_eq!(api.issue_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_issuance_hides_the_previous_boleta() {
        let api = Arc::new(FakeApi::default());
        let pipeline = IssuancePipeline::new(
            api.clone(),
            Arc::new(MapStorage::default()),
            Arc::new(MemoryStore::new()),
            "1",
            "1",
        );
        let mut form = form();
        form.replace_values(valid_values());
        form.submit(&pipeline).await.unwrap();

        *api.issue_error.lock().unwrap() = Some("SUNAT no disponible".to_string());
        assert!(form.submit(&pipeline).await.is_err());
        assert_eq!(
            form.state(),
            &IssuanceState::Failed {
                message: "SUNAT no disponible".to_string()
            }
        );
    }

    #[test]
    fn reset_restores_defaults_and_first_account() {
        let defaults = FormDefaults {
            income_account: String::new(),
            ..FormDefaults::default()
        };
        let accounts = vec![
            Account {
                name: "BCP Soles".to_string(),
            },
            Account {
                name: "Caja Chica".to_string(),
            },
        ];
        let mut form = BoletaForm::new(defaults, today(), &accounts);
        assert_eq!(form.values().income_account.as_deref(), Some("BCP Soles"));

        form.values.serie = "B999".to_string();
        form.reset(today());
        assert_eq!(form.values().serie, "B001");
        assert_eq!(form.values().income_account.as_deref(), Some("BCP Soles"));
    }
}

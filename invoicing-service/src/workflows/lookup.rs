//! Member lookup by DNI.

use crate::models::{Client, Notice, DNI_DOCUMENT_TYPE, DNI_MIN_LENGTH};
use crate::services::MemberRegistry;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// Document type or number does not qualify for a lookup.
    Skipped,
    Found { member_id: i64, client: Client },
    NotFound,
    Failed { message: String },
}

impl LookupOutcome {
    pub fn notice(&self) -> Option<Notice> {
        match self {
            LookupOutcome::Skipped => None,
            LookupOutcome::Found { client, .. } => Some(Notice::success(
                "Cliente Encontrado",
                format!("Datos de {} cargados.", client.legal_name),
            )),
            LookupOutcome::NotFound => Some(Notice::warning(
                "Cliente No Encontrado",
                "No se encontraron datos para el documento ingresado. Por favor, complete manualmente.",
            )),
            LookupOutcome::Failed { message } => {
                Some(Notice::error("Error de Búsqueda", message.clone()))
            }
        }
    }
}

/// Whether a document qualifies for a registry lookup.
pub fn should_lookup(document_type: &str, document_number: &str) -> bool {
    document_type == DNI_DOCUMENT_TYPE && document_number.trim().chars().count() >= DNI_MIN_LENGTH
}

#[instrument(skip(registry))]
pub async fn lookup_client(
    registry: &dyn MemberRegistry,
    document_type: &str,
    document_number: &str,
) -> LookupOutcome {
    if !should_lookup(document_type, document_number) {
        return LookupOutcome::Skipped;
    }

    match registry.find_member(document_number.trim()).await {
        Ok(Some(member)) => {
            info!(member_id = member.id, "Member found");
            LookupOutcome::Found {
                member_id: member.id,
                client: member.to_client(),
            }
        }
        Ok(None) => LookupOutcome::NotFound,
        Err(e) => {
            warn!(error = %e, "Member lookup failed");
            LookupOutcome::Failed {
                message: e.to_string(),
            }
        }
    }
}

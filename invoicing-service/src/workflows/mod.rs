//! Form workflows driven by the HTTP handlers.

pub mod boleta_form;
pub mod issuance;
pub mod lookup;
pub mod summary;

pub use boleta_form::{BoletaForm, BoletaFormSnapshot, IssuanceState};
pub use issuance::{IssuancePipeline, IssuanceReport, StepOutcome};
pub use lookup::{lookup_client, should_lookup, LookupOutcome};
pub use summary::{created_notice, ArchiveOutcome, ProcessStep, SendReport, StepStatus, SummaryState, SummaryWorkflow};

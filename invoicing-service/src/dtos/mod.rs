pub mod boleta_forms;
pub mod summary_forms;

pub use boleta_forms::{
    BoletaFormResponse, ClientLookupRequest, ClientLookupResponse, PdfParams, SubmitRequest,
    SubmitResponse, ValidationResponse,
};
pub use summary_forms::{
    CreateSummaryResponse, SendSummaryResponse, SummaryFormResponse, SummaryRecordResponse,
};

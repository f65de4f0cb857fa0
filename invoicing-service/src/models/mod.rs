//! Domain models for invoicing-service.

mod boleta;
mod income;
mod member;
mod notice;
mod summary;

pub use boleta::{
    flatten_issues, BoletaFormValues, BoletaPayload, Client, ClientPayload, FieldIssue,
    IncomeLinkage, IssuedBoleta, LineItem, LineItemPayload, PdfFormat, DNI_DOCUMENT_TYPE,
    DNI_MIN_LENGTH, INCOME_LINKAGE_MESSAGE,
};
pub use income::{Account, NewIncome, SALE_TRANSACTION_TYPE};
pub use member::Member;
pub use notice::{Notice, NoticeLevel};
pub use summary::{
    CreateSummaryRequest, DailySummary, NewDailySummary, SentSummary, SummaryBoleta,
    SummaryData, SummaryDetail,
};

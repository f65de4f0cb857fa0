//! Error taxonomy for the invoicing workflows.

use service_core::error::AppError;
use thiserror::Error;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum InvoicingError {
    /// Form input rejected before any network call.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Business error reported by the billing API, shown verbatim.
    #[error("{0}")]
    Api(String),

    /// The billing API could not be reached.
    #[error("Network error while contacting the billing API")]
    Transport(#[source] reqwest::Error),

    /// The billing API answered with something we could not read.
    #[error("Unexpected billing API response: {0}")]
    Decode(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    /// The requested action is not allowed in the session's current state.
    #[error("{0}")]
    InvalidState(String),
}

impl InvoicingError {
    /// Short machine-readable kind used in metrics labels and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            InvoicingError::Validation(_) => "validation",
            InvoicingError::Api(_) => "api",
            InvoicingError::Transport(_) => "transport",
            InvoicingError::Decode(_) => "decode",
            InvoicingError::Database(_) => "database",
            InvoicingError::Storage(_) => "storage",
            InvoicingError::InvalidState(_) => "invalid_state",
        }
    }
}

impl From<sqlx::Error> for InvoicingError {
    fn from(err: sqlx::Error) -> Self {
        InvoicingError::Database(err.to_string())
    }
}

impl From<std::io::Error> for InvoicingError {
    fn from(err: std::io::Error) -> Self {
        InvoicingError::Storage(err.to_string())
    }
}

impl From<InvoicingError> for AppError {
    fn from(err: InvoicingError) -> Self {
        match err {
            InvoicingError::Validation(e) => AppError::ValidationError(e),
            InvoicingError::Api(message) => AppError::BadGateway(message),
            e @ (InvoicingError::Transport(_) | InvoicingError::Decode(_)) => {
                tracing::warn!(error = ?e, "Billing API transport failure");
                AppError::BadGateway(e.to_string())
            }
            InvoicingError::Database(message) => AppError::DatabaseError(anyhow::anyhow!(message)),
            InvoicingError::Storage(message) => AppError::StorageError(anyhow::anyhow!(message)),
            InvoicingError::InvalidState(message) => AppError::Conflict(anyhow::anyhow!(message)),
        }
    }
}

pub mod accounts;
pub mod boleta_forms;
pub mod daily_summaries;
pub mod health;
pub mod summary_forms;

pub use accounts::list_accounts;
pub use boleta_forms::{
    client_lookup, delete_boleta_form, download_pdf, get_boleta_form, open_boleta_form,
    reset_boleta_form, submit_boleta,
};
pub use daily_summaries::list_daily_summaries;
pub use health::{health_check, metrics_handler, readiness_check};
pub use summary_forms::{
    create_summary, delete_summary_form, get_summary_form, open_summary_form, send_summary,
};

use crate::services::SessionRegistry;
use service_core::error::AppError;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

/// Exclusive access to a form session: 404 when unknown, 409 when busy.
fn acquire_session<T: Send + 'static>(
    registry: &SessionRegistry<T>,
    id: Uuid,
) -> Result<OwnedMutexGuard<T>, AppError> {
    registry
        .acquire(id)
        .ok_or_else(|| session_not_found(id))?
        .map_err(AppError::from)
}

/// Waits for the session; for read-only access.
async fn lock_session<T: Send + 'static>(
    registry: &SessionRegistry<T>,
    id: Uuid,
) -> Result<OwnedMutexGuard<T>, AppError> {
    registry.lock(id).await.ok_or_else(|| session_not_found(id))
}

fn session_not_found(id: Uuid) -> AppError {
    AppError::NotFound(anyhow::anyhow!("Formulario {} no encontrado", id))
}

use crate::models::Account;
use crate::startup::AppState;
use axum::{extract::State, Json};
use service_core::error::AppError;

/// Accounts an income can be booked against.
pub async fn list_accounts(State(state): State<AppState>) -> Result<Json<Vec<Account>>, AppError> {
    let accounts = state.stores.accounts.list_accounts().await?;
    Ok(Json(accounts))
}

use crate::dtos::SummaryRecordResponse;
use crate::startup::AppState;
use axum::{extract::State, Json};
use service_core::error::AppError;

/// Archived summaries, newest summary date first.
pub async fn list_daily_summaries(
    State(state): State<AppState>,
) -> Result<Json<Vec<SummaryRecordResponse>>, AppError> {
    let rows = state.stores.summaries.list_summaries().await?;
    Ok(Json(rows.into_iter().map(SummaryRecordResponse::from).collect()))
}

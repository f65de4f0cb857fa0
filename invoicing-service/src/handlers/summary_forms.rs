use super::{acquire_session, lock_session};
use crate::dtos::{CreateSummaryResponse, SendSummaryResponse, SummaryFormResponse};
use crate::models::CreateSummaryRequest;
use crate::startup::AppState;
use crate::workflows::{created_notice, SummaryWorkflow};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

pub async fn open_summary_form(State(state): State<AppState>) -> impl IntoResponse {
    let workflow = SummaryWorkflow::new();
    let (initial, steps) = (workflow.state().clone(), workflow.process_steps());
    let id = state.summary_forms.open(workflow);
    tracing::info!(form_id = %id, "Summary form opened");
    (
        StatusCode::CREATED,
        Json(SummaryFormResponse {
            id,
            state: initial,
            steps,
        }),
    )
}

pub async fn get_summary_form(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SummaryFormResponse>, AppError> {
    let workflow = lock_session(&state.summary_forms, id).await?;
    Ok(Json(SummaryFormResponse::new(id, &workflow)))
}

/// Discard the session. A created but unsent summary stays with the
/// billing API.
pub async fn delete_summary_form(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let mut workflow = acquire_session(&state.summary_forms, id)?;
    if let Some(summary) = workflow.discard() {
        tracing::warn!(
            form_id = %id,
            summary_id = summary.id,
            numero = %summary.numero_completo,
            "Summary form closed with an unsent summary"
        );
    }
    state.summary_forms.remove(id);
    Ok(StatusCode::NO_CONTENT)
}

/// Phase 1: ask the billing API to build the summary for a date.
pub async fn create_summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CreateSummaryRequest>,
) -> Result<Json<CreateSummaryResponse>, AppError> {
    request.validate()?;
    let date = request.date().ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!("Por favor, seleccione una fecha válida."))
    })?;

    let mut workflow = acquire_session(&state.summary_forms, id)?;
    let summary = workflow
        .create(state.pipeline.api(), date)
        .await
        .map_err(|e| {
            tracing::warn!(form_id = %id, error = %e, "Daily summary creation failed");
            AppError::from(e)
        })?;

    Ok(Json(CreateSummaryResponse {
        summary,
        notice: created_notice(),
        form: SummaryFormResponse::new(id, &workflow),
    }))
}

/// Phase 2: submit the pending summary and archive the result.
pub async fn send_summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SendSummaryResponse>, AppError> {
    let mut workflow = acquire_session(&state.summary_forms, id)?;
    let report = workflow
        .send(state.pipeline.api(), state.stores.summaries.as_ref())
        .await
        .map_err(|e| {
            tracing::warn!(form_id = %id, error = %e, "Daily summary submission failed");
            AppError::from(e)
        })?;

    Ok(Json(SendSummaryResponse {
        report,
        form: SummaryFormResponse::new(id, &workflow),
    }))
}

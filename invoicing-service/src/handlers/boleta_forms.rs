use super::{acquire_session, lock_session};
use crate::dtos::{
    BoletaFormResponse, ClientLookupRequest, ClientLookupResponse, PdfParams, SubmitRequest,
    SubmitResponse, ValidationResponse,
};
use crate::error::InvoicingError;
use crate::models::flatten_issues;
use crate::startup::AppState;
use crate::workflows::BoletaForm;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Local;
use service_core::error::AppError;
use uuid::Uuid;

/// Open a boleta form filled with today's defaults.
pub async fn open_boleta_form(State(state): State<AppState>) -> impl IntoResponse {
    // A missing account list only costs the default account.
    let accounts = state
        .stores
        .accounts
        .list_accounts()
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not load accounts for form defaults");
            Vec::new()
        });

    let form = BoletaForm::new(
        state.config.form_defaults.clone(),
        Local::now().date_naive(),
        &accounts,
    );
    let snapshot = form.snapshot();
    let id = state.boleta_forms.open(form);
    tracing::info!(form_id = %id, "Boleta form opened");

    (
        StatusCode::CREATED,
        Json(BoletaFormResponse { id, form: snapshot }),
    )
}

pub async fn get_boleta_form(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BoletaFormResponse>, AppError> {
    let form = lock_session(&state.boleta_forms, id).await?;
    Ok(Json(BoletaFormResponse {
        id,
        form: form.snapshot(),
    }))
}

pub async fn delete_boleta_form(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    // Refuse to drop a form mid-operation.
    let _form = acquire_session(&state.boleta_forms, id)?;
    state.boleta_forms.remove(id);
    tracing::info!(form_id = %id, "Boleta form discarded");
    Ok(StatusCode::NO_CONTENT)
}

/// Set the client document and look it up in the member registry.
pub async fn client_lookup(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ClientLookupRequest>,
) -> Result<Json<ClientLookupResponse>, AppError> {
    let mut form = acquire_session(&state.boleta_forms, id)?;
    if let Some(values) = request.values {
        form.replace_values(values);
    }
    form.set_document(&request.document_type, &request.document_number);

    let outcome = form.lookup_client(state.stores.members.as_ref()).await;
    Ok(Json(ClientLookupResponse::new(id, &outcome, form.snapshot())))
}

/// Validate and issue the boleta, then run the follow-up steps.
pub async fn submit_boleta(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmitRequest>,
) -> Result<Response, AppError> {
    let mut form = acquire_session(&state.boleta_forms, id)?;
    if let Some(values) = request.values {
        form.replace_values(values);
    }

    match form.submit(&state.pipeline).await {
        Ok(report) => Ok(Json(SubmitResponse {
            id,
            report,
            form: form.snapshot(),
        })
        .into_response()),
        Err(InvoicingError::Validation(errors)) => Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ValidationResponse {
                error: "Validation error".to_string(),
                issues: flatten_issues(&errors),
            }),
        )
            .into_response()),
        Err(e) => {
            tracing::warn!(form_id = %id, error = %e, kind = e.kind(), "Boleta issuance failed");
            Err(e.into())
        }
    }
}

/// Download the last issued boleta's PDF as an attachment.
pub async fn download_pdf(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<PdfParams>,
) -> Result<Response, AppError> {
    let form = acquire_session(&state.boleta_forms, id)?;
    let (filename, bytes) = form
        .download_pdf(state.pipeline.api(), params.format)
        .await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Clear the form for a new boleta.
pub async fn reset_boleta_form(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BoletaFormResponse>, AppError> {
    let mut form = acquire_session(&state.boleta_forms, id)?;
    form.reset(Local::now().date_naive());
    Ok(Json(BoletaFormResponse {
        id,
        form: form.snapshot(),
    }))
}

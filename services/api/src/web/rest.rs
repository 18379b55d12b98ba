//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.
//!
//! The two form actions map onto `POST /drafts` (preview) and
//! `POST /submissions` (submit case, gated on consent).

use crate::web::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use feedback_core::{Attempt, Draft, FlowError, SubmissionRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        environment_handler,
        create_draft_handler,
        create_submission_handler,
    ),
    components(
        schemas(
            DraftRequest,
            DraftResponse,
            SubmissionRequest,
            DraftPayload,
            SubmissionResponse,
            EnvironmentResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Feedback Collector API", description = "Draft previews and consented case submissions.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Request and Response Structs
//=========================================================================================

/// The payload for a draft preview.
#[derive(Deserialize, ToSchema)]
pub struct DraftRequest {
    /// The student's situation, as typed by the user.
    prompt: String,
}

/// A generated draft. `draft` is empty when every model route failed.
#[derive(Serialize, ToSchema)]
pub struct DraftResponse {
    draft: String,
    used_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
    /// Per-route diagnostics, only present alongside an empty draft.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<Object>>)]
    trace: Option<Vec<Attempt>>,
}

/// The draft the caller is currently holding, if any.
#[derive(Deserialize, ToSchema)]
pub struct DraftPayload {
    text: String,
    #[serde(default)]
    model: Option<String>,
}

/// The payload for a case submission.
#[derive(Deserialize, ToSchema)]
pub struct SubmissionRequest {
    prompt: String,
    /// Must be `true`; the user agrees to anonymous storage of the case.
    #[serde(default)]
    consent: bool,
    #[serde(default)]
    draft: Option<DraftPayload>,
}

/// The response sent after a submission was stored.
#[derive(Serialize, ToSchema)]
pub struct SubmissionResponse {
    storage_key: String,
    #[schema(value_type = Object)]
    record: SubmissionRecord,
    /// The draft the caller should hold from now on. Always null.
    draft: Option<String>,
}

/// Where this deployment generates from and writes to.
#[derive(Serialize, ToSchema)]
pub struct EnvironmentResponse {
    project_id: String,
    location: String,
    tuned_model: String,
    raw_location: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn flow_error_response(err: FlowError) -> HandlerError {
    match err {
        FlowError::ConsentRequired | FlowError::Prompt(_) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: err.to_string(),
                detail: None,
            }),
        ),
        FlowError::Storage(source) => {
            error!("Failed to store submission: {:?}", source);
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: "Submission failed. Please try again.".to_string(),
                    detail: Some(source.to_string()),
                }),
            )
        }
    }
}

/// Malformed, mistyped or wrongly labelled bodies get the same JSON error shape
/// as every other failure, keeping axum's status code.
fn body_rejection_response(rejection: JsonRejection) -> HandlerError {
    info!(status = %rejection.status(), "Rejected request body: {}", rejection.body_text());
    (
        rejection.status(),
        Json(ErrorResponse {
            error: "Invalid request body.".to_string(),
            detail: Some(rejection.body_text()),
        }),
    )
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "The service is up", body = String))
)]
pub async fn health_handler() -> &'static str {
    "ok"
}

/// Describe the model and storage targets of this deployment.
#[utoipa::path(
    get,
    path = "/environment",
    responses((status = 200, description = "Deployment targets", body = EnvironmentResponse))
)]
pub async fn environment_handler(State(app_state): State<Arc<AppState>>) -> Json<EnvironmentResponse> {
    let config = &app_state.config;
    Json(EnvironmentResponse {
        project_id: config.project_id.clone(),
        location: config.location.clone(),
        tuned_model: config.tuned_model_name.clone(),
        raw_location: config.raw_location(),
    })
}

/// Generate a draft response for preview.
///
/// An empty draft is not an error: the response carries a warning and the
/// diagnostic trace instead.
#[utoipa::path(
    post,
    path = "/drafts",
    request_body = DraftRequest,
    responses(
        (status = 200, description = "Draft generated (possibly empty)", body = DraftResponse),
        (status = 400, description = "The prompt is blank or the body is not valid JSON", body = ErrorResponse),
        (status = 415, description = "The body is not labelled application/json", body = ErrorResponse),
        (status = 422, description = "The body does not match DraftRequest", body = ErrorResponse)
    )
)]
pub async fn create_draft_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<DraftRequest>, JsonRejection>,
) -> Result<Json<DraftResponse>, HandlerError> {
    let Json(payload) = payload.map_err(body_rejection_response)?;
    let generation = app_state
        .flow
        .preview(&payload.prompt)
        .await
        .map_err(flow_error_response)?;

    if generation.is_empty() {
        return Ok(Json(DraftResponse {
            draft: String::new(),
            used_model: None,
            warning: Some("The model returned an empty response.".to_string()),
            trace: Some(generation.trace),
        }));
    }

    Ok(Json(DraftResponse {
        draft: generation.text,
        used_model: generation.model,
        warning: None,
        trace: None,
    }))
}

/// Submit a case for storage.
///
/// Reuses the supplied draft when it has text, otherwise generates one first.
#[utoipa::path(
    post,
    path = "/submissions",
    request_body = SubmissionRequest,
    responses(
        (status = 201, description = "Submission stored", body = SubmissionResponse),
        (status = 400, description = "Consent missing, blank prompt or invalid JSON", body = ErrorResponse),
        (status = 415, description = "The body is not labelled application/json", body = ErrorResponse),
        (status = 422, description = "The body does not match SubmissionRequest", body = ErrorResponse),
        (status = 502, description = "The storage upload failed", body = ErrorResponse)
    )
)]
pub async fn create_submission_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<SubmissionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HandlerError> {
    let Json(payload) = payload.map_err(body_rejection_response)?;
    let draft = payload.draft.map(|d| Draft {
        text: d.text,
        model: d.model,
    });

    let submitted = app_state
        .flow
        .submit(&payload.prompt, payload.consent, draft)
        .await
        .map_err(flow_error_response)?;

    info!(key = %submitted.storage_key, "Case submitted");
    Ok((
        StatusCode::CREATED,
        Json(SubmissionResponse {
            storage_key: submitted.storage_key,
            record: submitted.record,
            draft: None,
        }),
    ))
}

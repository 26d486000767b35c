use super::state::AppState;
use crate::error::PipelineError;
use crate::ledger::COIN_CAP;
use crate::session::{GradeResult, Linkage, Session, TargetItem};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    /// The card or story mission this attempt applies to
    pub linkage: Option<Linkage>,

    /// Ground-truth context for the grader
    pub target_item: Option<TargetItem>,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: String,
    pub upload_key: String,
    pub content_type: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitTextRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub combined_result: GradeResult,
    pub score: u8,
}

#[derive(Debug, Serialize)]
pub struct LedgerResponse {
    pub balance: u32,
    pub cap: u32,
    pub unlimited: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(err: &PipelineError) -> axum::response::Response {
    let status = match err {
        PipelineError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        PipelineError::GateDenied { .. } => StatusCode::TOO_MANY_REQUESTS,
        PipelineError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        PipelineError::SessionCompleted(_) | PipelineError::SessionEvaluated(_) => {
            StatusCode::CONFLICT
        }
        PipelineError::UploadFailed(_) => StatusCode::BAD_GATEWAY,
        PipelineError::TranscriptionFailed(_) => StatusCode::BAD_GATEWAY,
        PipelineError::GradingUnavailable => StatusCode::BAD_GATEWAY,
        PipelineError::CompletionFailed(_) => StatusCode::BAD_GATEWAY,
    };

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /practice/start
/// Gate a new practice session and issue its upload target
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> impl IntoResponse {
    match state
        .pipeline
        .start_session(req.linkage, req.target_item)
        .await
    {
        Ok(started) => {
            info!("Session started via API: {}", started.session_id);
            (
                StatusCode::OK,
                Json(StartSessionResponse {
                    session_id: started.session_id,
                    upload_key: started.upload.key,
                    content_type: started.upload.content_type.to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to start session: {}", e);
            error_response(&e)
        }
    }
}

/// POST /practice/:session_id/audio
/// Submit a recorded answer: upload, transcribe, grade
pub async fn submit_audio(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    match state
        .pipeline
        .submit_recording(&session_id, &content_type, body.to_vec())
        .await
    {
        Ok(evaluation) => (StatusCode::OK, Json(evaluation)).into_response(),
        Err(e) => {
            error!("Recorded answer failed for {}: {}", session_id, e);
            error_response(&e)
        }
    }
}

/// POST /practice/:session_id/text
/// Submit a typed answer, skipping transcription
pub async fn submit_text(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<SubmitTextRequest>,
) -> impl IntoResponse {
    match state.pipeline.submit_text(&session_id, req.text).await {
        Ok(evaluation) => (StatusCode::OK, Json(evaluation)).into_response(),
        Err(e) => {
            error!("Typed answer failed for {}: {}", session_id, e);
            error_response(&e)
        }
    }
}

/// POST /practice/:session_id/complete
/// Commit the combined result to progress tracking
pub async fn complete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<CompleteRequest>,
) -> impl IntoResponse {
    match state
        .pipeline
        .complete_linked_action(&session_id, req.combined_result, req.score)
        .await
    {
        Ok(update) => (StatusCode::OK, Json(update)).into_response(),
        Err(e) => {
            error!("Completion failed for {}: {}", session_id, e);
            error_response(&e)
        }
    }
}

/// GET /practice/:session_id
/// Inspect a session (audit)
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.pipeline.session(&session_id).await {
        Some(session) => (StatusCode::OK, Json::<Session>(session)).into_response(),
        None => error_response(&PipelineError::SessionNotFound(session_id)),
    }
}

/// GET /ledger
/// Current coin balance
pub async fn get_ledger(State(state): State<AppState>) -> impl IntoResponse {
    let ledger = state.pipeline.ledger();

    (
        StatusCode::OK,
        Json(LedgerResponse {
            balance: ledger.balance().await,
            cap: COIN_CAP,
            unlimited: ledger.unlimited(),
        }),
    )
        .into_response()
}

/// POST /ledger/reset
/// Refill the balance to the cap (support/test recovery)
pub async fn reset_ledger(State(state): State<AppState>) -> impl IntoResponse {
    match state.pipeline.ledger().reset().await {
        Ok(()) => (
            StatusCode::OK,
            Json(LedgerResponse {
                balance: COIN_CAP,
                cap: COIN_CAP,
                unlimited: state.pipeline.ledger().unlimited(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Ledger reset failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Ledger reset failed: {}", e),
                }),
            )
                .into_response()
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

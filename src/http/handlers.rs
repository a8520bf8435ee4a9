use super::state::AppState;
use crate::capture::{CaptureState, RecordingSession, SessionSummary};
use crate::error::CaptureError;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StartCaptureResponse {
    pub status: CaptureState,
    pub session: RecordingSession,
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub status: CaptureState,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: CaptureState,
    pub session: Option<RecordingSession>,
    pub summary: Option<SessionSummary>,
    pub waveform_capacity: usize,
}

#[derive(Debug, Deserialize)]
pub struct ResizeWaveformRequest {
    pub capacity: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(err: CaptureError) -> Response {
    let status = match err {
        CaptureError::PermissionDenied => StatusCode::FORBIDDEN,
        CaptureError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
        CaptureError::EncoderBusy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Capture request failed: {}", err);
    } else {
        info!("Capture request rejected: {}", err);
    }

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

/// POST /capture/start
/// Request the microphone and start a new session
pub async fn start_capture(State(state): State<AppState>) -> impl IntoResponse {
    match state.pipeline.start().await {
        Ok(session) => (
            StatusCode::OK,
            Json(StartCaptureResponse {
                status: session.state,
                session,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /capture/pause
pub async fn pause_capture(State(state): State<AppState>) -> impl IntoResponse {
    match state.pipeline.pause().await {
        Ok(()) => (
            StatusCode::OK,
            Json(StateResponse {
                status: CaptureState::Paused,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /capture/resume
pub async fn resume_capture(State(state): State<AppState>) -> impl IntoResponse {
    match state.pipeline.resume().await {
        Ok(()) => (
            StatusCode::OK,
            Json(StateResponse {
                status: CaptureState::Recording,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /capture/stop
/// Stop the session and return its summary
pub async fn stop_capture(State(state): State<AppState>) -> impl IntoResponse {
    match state.pipeline.stop().await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /capture/status
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let pipeline = &state.pipeline;
    let response = StatusResponse {
        status: pipeline.state().await,
        session: pipeline.session().await,
        summary: pipeline.summary().await,
        waveform_capacity: pipeline.waveform_capacity().await,
    };
    (StatusCode::OK, Json(response))
}

/// GET /waveform
/// Latest waveform snapshot for a rendering client
pub async fn get_waveform(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.waveform.lock().await.snapshot();
    (StatusCode::OK, Json(snapshot))
}

/// PUT /waveform/capacity
pub async fn resize_waveform(
    State(state): State<AppState>,
    Json(req): Json<ResizeWaveformRequest>,
) -> impl IntoResponse {
    if req.capacity == 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "capacity must be at least 1".to_string(),
            }),
        )
            .into_response();
    }

    state.pipeline.resize_waveform(req.capacity).await;
    info!("Waveform capacity set to {}", req.capacity);
    (StatusCode::NO_CONTENT, ()).into_response()
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

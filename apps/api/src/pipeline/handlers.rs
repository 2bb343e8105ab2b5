use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::pipeline::engine::TurnOutcome;
use crate::pipeline::state::{PipelineState, SessionRecord};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct StartSessionRequest {
    pub resume_text: String,
    /// Optional first chat message, e.g. the goal typed next to the upload.
    #[serde(default)]
    pub user_input: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct AdvanceRequest {
    #[serde(default)]
    pub user_input: Option<String>,
    #[serde(default)]
    pub snapshot: Option<PipelineState>,
}

/// POST /api/v1/sessions
pub async fn handle_start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> Result<Json<TurnOutcome>, AppError> {
    if req.resume_text.trim().is_empty() {
        return Err(AppError::Validation("resume_text must not be empty".to_string()));
    }
    let session_id = Uuid::new_v4().to_string();
    let turn = state
        .linear
        .advance(
            &session_id,
            Some(PipelineState::with_resume(req.resume_text)),
            req.user_input,
        )
        .await?;
    Ok(Json(turn))
}

/// POST /api/v1/sessions/:id/advance
pub async fn handle_advance_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AdvanceRequest>,
) -> Result<Json<TurnOutcome>, AppError> {
    let turn = state.linear.advance(&id, req.snapshot, req.user_input).await?;
    Ok(Json(turn))
}

/// POST /api/v1/chat/:id
pub async fn handle_chat_turn(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AdvanceRequest>,
) -> Result<Json<TurnOutcome>, AppError> {
    // A chat opens on its first message; later turns reuse the stored state.
    let snapshot = match req.snapshot {
        Some(snapshot) => Some(snapshot),
        None if !id.trim().is_empty() && !state.chat.exists(&id).await? => {
            Some(PipelineState::default())
        }
        None => None,
    };
    let turn = state.chat.advance(&id, snapshot, req.user_input).await?;
    Ok(Json(turn))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionRecord>, AppError> {
    // Both flows share one store; the record carries its own shape.
    let record = state.linear.load(&id).await?;
    Ok(Json(record))
}

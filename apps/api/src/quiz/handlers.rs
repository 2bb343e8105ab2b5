use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::quiz::progress::Progress;
use crate::quiz::{QuizQuestion, StudyContext, SubmissionResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct QuizRequest {
    pub user_id: String,
    pub current_skill: String,
    pub module_title: String,
}

#[derive(Serialize)]
pub struct QuizResponse {
    pub quiz: Vec<QuizQuestion>,
}

#[derive(Deserialize)]
pub struct QuizSubmitRequest {
    pub user_id: String,
    pub quiz: Vec<QuizQuestion>,
    pub answers: Vec<String>,
    /// Optional `module_title`, `material` and `scale` for the explanation.
    #[serde(flatten)]
    pub context: StudyContext,
}

fn require_user(user_id: &str) -> Result<&str, AppError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(AppError::Validation("user_id must not be empty".to_string()));
    }
    Ok(user_id)
}

/// POST /api/v1/quiz
pub async fn handle_get_quiz(
    State(state): State<AppState>,
    Json(req): Json<QuizRequest>,
) -> Result<Json<QuizResponse>, AppError> {
    require_user(&req.user_id)?;
    if req.current_skill.trim().is_empty() || req.module_title.trim().is_empty() {
        return Err(AppError::Validation(
            "current_skill and module_title are required".to_string(),
        ));
    }
    let quiz = state
        .quiz
        .quiz_for(&req.current_skill, &req.module_title)
        .await?;
    Ok(Json(QuizResponse { quiz }))
}

/// POST /api/v1/quiz/submit
pub async fn handle_submit_quiz(
    State(state): State<AppState>,
    Json(req): Json<QuizSubmitRequest>,
) -> Result<Json<SubmissionResult>, AppError> {
    let user_id = require_user(&req.user_id)?;
    let result = state
        .quiz
        .submit(user_id, &req.quiz, &req.answers, &req.context)
        .await?;
    Ok(Json(result))
}

/// GET /api/v1/xp/:user_id
pub async fn handle_get_progress(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Progress>, AppError> {
    let user_id = require_user(&user_id)?;
    Ok(Json(state.quiz.progress(user_id).await?))
}

use std::sync::Arc;

use crate::pipeline::engine::Orchestrator;
use crate::quiz::QuizService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Resume-first flow with suspension points.
    pub linear: Arc<Orchestrator>,
    /// Chat flow, one classified turn per message.
    pub chat: Arc<Orchestrator>,
    pub quiz: Arc<QuizService>,
}

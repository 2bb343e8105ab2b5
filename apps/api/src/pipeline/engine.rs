//! The `advance` driver.
//!
//! One call loads the session, runs nodes until one suspends, clarifies, fails
//! or the graph ends, then persists the record. Node outcomes are the only
//! control flow: nothing unwinds across a node boundary.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::pipeline::error::PipelineError;
use crate::pipeline::graph::{after_clarification, next_node, GraphShape, NodeId};
use crate::pipeline::nodes::{NodeOutcome, Nodes};
use crate::pipeline::router::INTENT_ERROR;
use crate::pipeline::session::SessionStore;
use crate::pipeline::state::{ChatMessage, PipelineState, SessionRecord};

const PLAN_COMPLETE: &str =
    "Your learning plan is complete. Start a new session to explore another goal.";

/// What one `advance` call hands back to its caller.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub session_id: String,
    pub state: PipelineState,
    pub response: String,
    /// True while the session waits for more input.
    pub suspended: bool,
    /// Node the next call starts at (`end` once the plan is finished).
    pub at: NodeId,
}

pub struct Orchestrator {
    shape: GraphShape,
    nodes: Nodes,
    sessions: Arc<dyn SessionStore>,
}

impl Orchestrator {
    pub fn new(shape: GraphShape, nodes: Nodes, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            shape,
            nodes,
            sessions,
        }
    }

    /// Returns the stored record, or `InvalidSession` when there is none.
    pub async fn load(&self, session_id: &str) -> Result<SessionRecord, PipelineError> {
        self.sessions
            .load(session_id)
            .await?
            .ok_or_else(|| PipelineError::InvalidSession(format!("unknown session '{session_id}'")))
    }

    pub async fn exists(&self, session_id: &str) -> Result<bool, PipelineError> {
        Ok(self.sessions.load(session_id).await?.is_some())
    }

    /// Runs one turn for `session_id`.
    ///
    /// A `snapshot` replaces the stored state (the cursor is kept) or, for an
    /// unknown session, opens it at the graph entry. Without either the call is
    /// rejected before any node runs.
    pub async fn advance(
        &self,
        session_id: &str,
        snapshot: Option<PipelineState>,
        user_input: Option<String>,
    ) -> Result<TurnOutcome, PipelineError> {
        if session_id.trim().is_empty() {
            return Err(PipelineError::InvalidSession(
                "session id must not be empty".to_string(),
            ));
        }

        let mut record = self.open(session_id, snapshot).await?;
        let input = user_input
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        self.begin_turn(&mut record, input.as_deref());

        let SessionRecord {
            mut cursor,
            mut state,
            ..
        } = record;

        let mut pending = input.clone();
        while cursor != NodeId::End {
            let node_input = match self.shape {
                GraphShape::Linear if cursor.is_suspension_point() => pending.take(),
                GraphShape::Linear => None,
                GraphShape::IntentRouted => input.clone(),
            };

            match self
                .nodes
                .run(cursor, self.shape, &state, node_input.as_deref())
                .await
            {
                NodeOutcome::Continue(update) => {
                    update.apply(&mut state);
                    cursor = next_node(self.shape, cursor, &state);
                }
                NodeOutcome::Suspend {
                    update,
                    prompt,
                    expected_field,
                } => {
                    update.apply(&mut state);
                    info!("Session {session_id} suspended at {cursor} awaiting {expected_field}");
                    state.current_prompt = Some(prompt.clone());
                    state.expected_input_field = Some(expected_field.to_string());
                    state.response = Some(prompt);
                    break;
                }
                NodeOutcome::Clarify { update, response } => {
                    update.apply(&mut state);
                    let target = after_clarification(self.shape, cursor);
                    info!("Session {session_id} needs clarification at {cursor}, resuming at {target}");
                    if let Some(field) = target.expected_field() {
                        state.current_prompt = Some(response.clone());
                        state.expected_input_field = Some(field.to_string());
                    }
                    state.response = Some(response);
                    cursor = target;
                    break;
                }
                NodeOutcome::Fail {
                    error: message,
                    response,
                } => {
                    error!("Session {session_id}: {message}");
                    if cursor == NodeId::IntentClassifier {
                        state.intent = Some(INTENT_ERROR.to_string());
                    }
                    state.error = Some(message);
                    state.response = Some(response);
                    if self.shape == GraphShape::IntentRouted {
                        cursor = NodeId::End;
                    }
                    break;
                }
            }
        }

        if self.shape == GraphShape::IntentRouted {
            cursor = NodeId::IntentClassifier;
        }
        let suspended = cursor != NodeId::End;
        let response = state
            .response
            .clone()
            .unwrap_or_else(|| PLAN_COMPLETE.to_string());

        let record = SessionRecord {
            shape: self.shape,
            cursor,
            state,
            updated_at: Utc::now(),
        };
        self.sessions.save(session_id, &record).await?;

        Ok(TurnOutcome {
            session_id: session_id.to_string(),
            state: record.state,
            response,
            suspended,
            at: cursor,
        })
    }

    async fn open(
        &self,
        session_id: &str,
        snapshot: Option<PipelineState>,
    ) -> Result<SessionRecord, PipelineError> {
        match (self.sessions.load(session_id).await?, snapshot) {
            (Some(record), _) if record.shape != self.shape => {
                Err(PipelineError::InvalidSession(format!(
                    "session '{session_id}' belongs to the {:?} flow",
                    record.shape
                )))
            }
            (Some(mut record), snapshot) => {
                if let Some(snapshot) = snapshot {
                    record.state = snapshot;
                }
                Ok(record)
            }
            (None, Some(snapshot)) => {
                info!("Opening session {session_id} ({:?})", self.shape);
                Ok(SessionRecord {
                    shape: self.shape,
                    cursor: self.shape.entry(),
                    state: snapshot,
                    updated_at: Utc::now(),
                })
            }
            (None, None) => {
                warn!("Rejected advance for unknown session {session_id}");
                Err(PipelineError::InvalidSession(format!(
                    "unknown session '{session_id}'"
                )))
            }
        }
    }

    fn begin_turn(&self, record: &mut SessionRecord, input: Option<&str>) {
        let state = &mut record.state;
        match self.shape {
            GraphShape::Linear => {
                state.response = None;
                if let Some(previous) = state.error.take() {
                    info!("Retrying {} after failure: {previous}", record.cursor);
                }
            }
            GraphShape::IntentRouted => {
                state.reset_turn();
                record.cursor = NodeId::IntentClassifier;
                if let Some(text) = input {
                    state.chat_transcript.push(ChatMessage::user(text));
                }
            }
        }
    }
}

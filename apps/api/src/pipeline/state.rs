//! Shared state record threaded through every stage of one user session.
//!
//! Each stage reads the fields written by earlier stages and returns a
//! `StateUpdate` naming only the fields it owns. `StateUpdate::apply` is the
//! single place where the record is mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::graph::{GraphShape, NodeId};

// ────────────────────────────────────────────────────────────────────────────
// Records
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// One course module as returned by the candidate source. Immutable once retrieved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub course_title: String,
    pub module_title: String,
    pub module_description: String,
    pub subtopics: Vec<String>,
    pub skills: Vec<String>,
    /// List price in EUR. Missing prices fall back to the configured default.
    #[serde(default)]
    pub price: Option<u32>,
}

/// A curated module picked from the candidates for the user's gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleRecommendation {
    pub course_title: String,
    pub module_title: String,
    pub module_description: String,
    /// Always a subset of the source module's subtopics.
    pub selected_subtopics: Vec<String>,
    pub why_selected: String,
    #[serde(default)]
    pub price: Option<u32>,
}

/// Input to the budget fitter: a recommendation with a resolved list price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedModuleInput {
    pub module: ModuleRecommendation,
    pub price: u32,
}

/// A module in the final bundle. `final_price <= price` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedModule {
    pub course_title: String,
    pub module_title: String,
    pub module_description: String,
    pub selected_subtopics: Vec<String>,
    pub why_selected: String,
    pub price: u32,
    pub final_price: u32,
}

impl PricedModule {
    pub fn from_input(input: PricedModuleInput, final_price: u32) -> Self {
        let PricedModuleInput { module, price } = input;
        Self {
            course_title: module.course_title,
            module_title: module.module_title,
            module_description: module.module_description,
            selected_subtopics: module.selected_subtopics,
            why_selected: module.why_selected,
            price,
            final_price,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PipelineState
// ────────────────────────────────────────────────────────────────────────────

/// Mutable record for one session. All fields are optional until the owning
/// stage has run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineState {
    // Inputs
    pub resume_text: String,
    pub chat_transcript: Vec<ChatMessage>,

    // Resume stage
    pub skills: Vec<String>,
    pub summary: String,
    pub encouragement_message: String,
    pub ask_goal_message: String,
    pub experience_highlights: Vec<String>,
    pub learning_preferences: Option<String>,

    // Conversation-parsing stage
    pub target_role: Option<String>,
    pub goal_skills: Vec<String>,
    pub budget_eur: Option<f64>,
    pub preferences: Option<String>,
    pub context: Option<String>,

    // Gap analysis
    pub skills_gap: Vec<String>,
    pub gap_message: String,
    pub offer_custom_course_message: String,
    pub consent: Option<bool>,

    // Retrieval and pricing
    pub candidate_courses: Vec<CourseRecord>,
    pub recommended_modules: Vec<ModuleRecommendation>,
    pub final_bundle: Vec<PricedModule>,

    // Suspension context
    pub current_prompt: Option<String>,
    pub expected_input_field: Option<String>,

    // Intent routing
    pub intent: Option<String>,
    pub raw_intent: Option<String>,

    pub response: Option<String>,
    pub error: Option<String>,
}

impl PipelineState {
    pub fn with_resume(resume_text: impl Into<String>) -> Self {
        Self {
            resume_text: resume_text.into(),
            ..Self::default()
        }
    }

    /// True when the transcript holds at least one non-empty user message.
    pub fn has_user_message(&self) -> bool {
        self.chat_transcript
            .iter()
            .any(|m| m.role == "user" && !m.content.trim().is_empty())
    }

    /// Clears the fields that only describe a single intent-routed turn.
    pub fn reset_turn(&mut self) {
        self.intent = None;
        self.raw_intent = None;
        self.response = None;
        self.error = None;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Partial updates
// ────────────────────────────────────────────────────────────────────────────

/// Partial update produced by a node. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub append_messages: Vec<ChatMessage>,

    pub skills: Option<Vec<String>>,
    pub summary: Option<String>,
    pub encouragement_message: Option<String>,
    pub ask_goal_message: Option<String>,
    pub experience_highlights: Option<Vec<String>>,
    pub learning_preferences: Option<Option<String>>,

    pub target_role: Option<Option<String>>,
    pub goal_skills: Option<Vec<String>>,
    pub budget_eur: Option<Option<f64>>,
    pub preferences: Option<Option<String>>,
    pub context: Option<Option<String>>,

    pub skills_gap: Option<Vec<String>>,
    pub gap_message: Option<String>,
    pub offer_custom_course_message: Option<String>,
    pub consent: Option<Option<bool>>,

    pub candidate_courses: Option<Vec<CourseRecord>>,
    pub recommended_modules: Option<Vec<ModuleRecommendation>>,
    pub final_bundle: Option<Vec<PricedModule>>,

    pub intent: Option<Option<String>>,
    pub raw_intent: Option<Option<String>>,

    /// Clears `current_prompt` and `expected_input_field` once the awaited input arrived.
    pub clear_prompt: bool,
    pub response: Option<String>,
}

impl StateUpdate {
    pub fn with_response(response: impl Into<String>) -> Self {
        Self {
            response: Some(response.into()),
            ..Self::default()
        }
    }

    pub fn apply(self, state: &mut PipelineState) {
        state.chat_transcript.extend(self.append_messages);

        if let Some(v) = self.skills {
            state.skills = v;
        }
        if let Some(v) = self.summary {
            state.summary = v;
        }
        if let Some(v) = self.encouragement_message {
            state.encouragement_message = v;
        }
        if let Some(v) = self.ask_goal_message {
            state.ask_goal_message = v;
        }
        if let Some(v) = self.experience_highlights {
            state.experience_highlights = v;
        }
        if let Some(v) = self.learning_preferences {
            state.learning_preferences = v;
        }
        if let Some(v) = self.target_role {
            state.target_role = v;
        }
        if let Some(v) = self.goal_skills {
            state.goal_skills = v;
        }
        if let Some(v) = self.budget_eur {
            state.budget_eur = v;
        }
        if let Some(v) = self.preferences {
            state.preferences = v;
        }
        if let Some(v) = self.context {
            state.context = v;
        }
        if let Some(v) = self.skills_gap {
            state.skills_gap = v;
        }
        if let Some(v) = self.gap_message {
            state.gap_message = v;
        }
        if let Some(v) = self.offer_custom_course_message {
            state.offer_custom_course_message = v;
        }
        if let Some(v) = self.consent {
            state.consent = v;
        }
        if let Some(v) = self.candidate_courses {
            state.candidate_courses = v;
        }
        if let Some(v) = self.recommended_modules {
            state.recommended_modules = v;
        }
        if let Some(v) = self.final_bundle {
            state.final_bundle = v;
        }
        if let Some(v) = self.intent {
            state.intent = v;
        }
        if let Some(v) = self.raw_intent {
            state.raw_intent = v;
        }
        if self.clear_prompt {
            state.current_prompt = None;
            state.expected_input_field = None;
        }
        if let Some(v) = self.response {
            state.response = Some(v);
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Session record
// ────────────────────────────────────────────────────────────────────────────

/// What the session store keeps per session identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub shape: GraphShape,
    /// Node the next invocation starts at.
    pub cursor: NodeId,
    pub state: PipelineState,
    pub updated_at: DateTime<Utc>,
}

/// Removes duplicates while keeping first-seen order.
pub fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

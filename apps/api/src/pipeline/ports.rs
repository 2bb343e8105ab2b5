//! Collaborator ports used by the orchestration core.
//!
//! The core never talks to a model or a search index directly. It sees a
//! `GenerativeStepPort` (step name + JSON in, JSON out) and a
//! `CourseCandidateSource`. Both are carried as `Arc<dyn ...>` so tests can
//! inject scripted doubles.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::pipeline::error::PipelineError;
use crate::pipeline::state::{ChatMessage, CourseRecord, ModuleRecommendation};
use crate::quiz::grader::MissedQuestion;
use crate::quiz::QuizQuestion;

/// Named generative steps. Each has its own input and output shape below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    ResumeExtraction,
    ConversationParsing,
    GapNarrative,
    IntentClassification,
    ModuleSelection,
    QuizGeneration,
    Explanation,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::ResumeExtraction => "resume_extraction",
            Step::ConversationParsing => "conversation_parsing",
            Step::GapNarrative => "gap_narrative",
            Step::IntentClassification => "intent_classification",
            Step::ModuleSelection => "module_selection",
            Step::QuizGeneration => "quiz_generation",
            Step::Explanation => "explanation",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait GenerativeStepPort: Send + Sync {
    /// Runs one generative step. Fails with `GenerationFailure` or `SchemaViolation`.
    async fn invoke(&self, step: Step, input: Value) -> Result<Value, PipelineError>;
}

#[async_trait]
pub trait CourseCandidateSource: Send + Sync {
    /// Returns at most `top_k` records, most relevant first.
    async fn retrieve(
        &self,
        query_skills: &[String],
        top_k: usize,
    ) -> Result<Vec<CourseRecord>, PipelineError>;
}

/// Serializes `input`, runs `step` under `timeout`, and decodes the typed output.
///
/// A decode failure is a `SchemaViolation`; an expired timeout is a `GenerationFailure`.
pub async fn invoke_step<I, O>(
    port: &dyn GenerativeStepPort,
    step: Step,
    input: &I,
    timeout: Duration,
) -> Result<O, PipelineError>
where
    I: Serialize,
    O: DeserializeOwned,
{
    let input = serde_json::to_value(input)
        .map_err(|e| PipelineError::GenerationFailure(format!("cannot encode {step} input: {e}")))?;

    let output = tokio::time::timeout(timeout, port.invoke(step, input))
        .await
        .map_err(|_| {
            PipelineError::GenerationFailure(format!(
                "{step} timed out after {}s",
                timeout.as_secs()
            ))
        })??;

    serde_json::from_value(output)
        .map_err(|e| PipelineError::SchemaViolation(format!("{step} output: {e}")))
}

/// Retrieval under a timeout. Expiry is reported like a generation failure.
pub async fn retrieve_candidates(
    source: &dyn CourseCandidateSource,
    query_skills: &[String],
    top_k: usize,
    timeout: Duration,
) -> Result<Vec<CourseRecord>, PipelineError> {
    let mut records = tokio::time::timeout(timeout, source.retrieve(query_skills, top_k))
        .await
        .map_err(|_| {
            PipelineError::GenerationFailure(format!(
                "course retrieval timed out after {}s",
                timeout.as_secs()
            ))
        })??;
    records.truncate(top_k);
    Ok(records)
}

// ────────────────────────────────────────────────────────────────────────────
// Step payloads
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ResumeInput<'a> {
    pub resume_text: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResumeFacts {
    pub skills: Vec<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub encouragement_message: String,
    #[serde(default)]
    pub ask_goal_message: String,
    #[serde(default)]
    pub experience_highlights: Vec<String>,
    #[serde(default)]
    pub learning_preferences: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationInput<'a> {
    pub chat_transcript: &'a [ChatMessage],
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoalProfile {
    #[serde(default)]
    pub target_role: Option<String>,
    pub goal_skills: Vec<String>,
    #[serde(default)]
    pub budget_eur: Option<f64>,
    #[serde(default)]
    pub preferences: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GapNarrativeInput<'a> {
    pub skills: &'a [String],
    pub goal_skills: &'a [String],
    pub skills_gap: &'a [String],
}

#[derive(Debug, Clone, Deserialize)]
pub struct GapNarrative {
    pub gap_message: String,
    pub offer_custom_course_message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntentInput<'a> {
    pub text: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleSelectionInput<'a> {
    pub skills_gap: &'a [String],
    pub candidate_courses: &'a [CourseRecord],
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModuleSelection {
    pub recommended_modules: Vec<ModuleRecommendation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizInput<'a> {
    pub current_skill: &'a str,
    pub module_title: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuizDraft {
    pub quiz: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExplanationInput<'a> {
    pub module_title: &'a str,
    pub material: &'a str,
    /// Self-reported understanding, 1 (lost) to 5 (confident).
    pub scale: Option<u8>,
    pub missed: &'a [MissedQuestion],
}

/// Remedial explanation after a quiz with wrong answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub simplified_text: String,
    #[serde(default)]
    pub focus_topics: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{ScriptedPort, StaticSource};
    use serde_json::json;

    #[tokio::test]
    async fn test_invoke_step_decodes_typed_output() {
        let port = ScriptedPort::new().respond(
            Step::GapNarrative,
            json!({"gap_message": "Learn cloud.", "offer_custom_course_message": "Want a bundle?"}),
        );
        let out: GapNarrative = invoke_step(
            &port,
            Step::GapNarrative,
            &json!({}),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(out.gap_message, "Learn cloud.");
    }

    #[tokio::test]
    async fn test_invoke_step_shape_mismatch_is_schema_violation() {
        let port = ScriptedPort::new().respond(Step::GapNarrative, json!({"unexpected": true}));
        let err = invoke_step::<_, GapNarrative>(
            &port,
            Step::GapNarrative,
            &json!({}),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::SchemaViolation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoke_step_timeout_is_generation_failure() {
        let port = ScriptedPort::new()
            .respond(Step::GapNarrative, json!({}))
            .with_delay(Duration::from_secs(120));
        let err = invoke_step::<_, GapNarrative>(
            &port,
            Step::GapNarrative,
            &json!({}),
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::GenerationFailure(ref m) if m.contains("timed out")));
    }

    #[tokio::test]
    async fn test_retrieve_candidates_truncates_to_top_k() {
        let source = StaticSource::with_records(vec![
            StaticSource::record("A", "a1", &["cloud"]),
            StaticSource::record("B", "b1", &["cloud"]),
            StaticSource::record("C", "c1", &["cloud"]),
        ])
        .ignoring_top_k();
        let records = retrieve_candidates(&source, &["cloud".to_string()], 2, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].course_title, "A");
    }

    #[test]
    fn test_step_names_are_snake_case() {
        assert_eq!(Step::ModuleSelection.to_string(), "module_selection");
        assert_eq!(
            serde_json::to_value(Step::IntentClassification).unwrap(),
            json!("intent_classification")
        );
    }
}

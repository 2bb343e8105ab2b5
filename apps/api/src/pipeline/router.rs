//! Intent router: turns a free-text turn into a routing label.
//!
//! The classifier sometimes answers with a compound object instead of a plain
//! label. That is normalized here, at the collaborator boundary, so the state
//! machine only ever sees `Classification { intent, raw_intent }`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::pipeline::error::PipelineError;
use crate::pipeline::ports::{invoke_step, GenerativeStepPort, IntentInput, Step};
use crate::pipeline::state::ChatMessage;

/// Marker `raw_intent` used when there was nothing to classify.
pub const NO_INPUT: &str = "no_input";

/// Value written into `PipelineState::intent` when classification failed.
pub const INTENT_ERROR: &str = "error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteLabel {
    AnalystNode,
    CourseNode,
    PricingNode,
    FallbackNode,
}

impl RouteLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteLabel::AnalystNode => "analyst_node",
            RouteLabel::CourseNode => "course_node",
            RouteLabel::PricingNode => "pricing_node",
            RouteLabel::FallbackNode => "fallback_node",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label.trim() {
            "analyst_node" => Some(RouteLabel::AnalystNode),
            "course_node" => Some(RouteLabel::CourseNode),
            "pricing_node" => Some(RouteLabel::PricingNode),
            "fallback_node" => Some(RouteLabel::FallbackNode),
            _ => None,
        }
    }
}

/// Canonical router output. `intent` is `None` when the classifier's label was
/// malformed; routing then relies on `raw_intent`.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub intent: Option<RouteLabel>,
    pub raw_intent: String,
}

impl Classification {
    fn no_input() -> Self {
        Self {
            intent: Some(RouteLabel::FallbackNode),
            raw_intent: NO_INPUT.to_string(),
        }
    }
}

/// Shape of the classifier's answer as it arrives on the wire. `intent` is
/// either a label string or a compound object carrying one.
#[derive(Debug, Clone, Deserialize)]
struct WireClassification {
    #[serde(default)]
    intent: Value,
    #[serde(default)]
    raw_intent: Option<String>,
}

fn intent_label(intent: &Value) -> Option<RouteLabel> {
    match intent {
        Value::String(s) => RouteLabel::parse(s),
        Value::Object(map) => map
            .get("intent")
            .and_then(Value::as_str)
            .and_then(RouteLabel::parse),
        _ => None,
    }
}

fn nested_raw_intent(intent: &Value) -> Option<String> {
    intent
        .get("raw_intent")
        .and_then(Value::as_str)
        .map(String::from)
}

/// Normalizes a classifier payload into a `Classification`.
pub fn normalize_classification(output: Value) -> Result<Classification, PipelineError> {
    let wire: WireClassification = serde_json::from_value(output)
        .map_err(|e| PipelineError::SchemaViolation(format!("intent classification: {e}")))?;

    let raw_intent = wire
        .raw_intent
        .or_else(|| nested_raw_intent(&wire.intent))
        .unwrap_or_else(|| "unrecognized".to_string());

    Ok(Classification {
        intent: intent_label(&wire.intent),
        raw_intent,
    })
}

/// Renders the transcript as `role: content` lines, skipping incomplete entries.
pub fn linearize_transcript(transcript: &[ChatMessage]) -> String {
    transcript
        .iter()
        .filter(|m| !m.role.trim().is_empty() && !m.content.trim().is_empty())
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Classifies a turn. With no usable input the generative step is not called.
pub async fn classify(
    port: &dyn GenerativeStepPort,
    user_input: Option<&str>,
    chat_transcript: Option<&[ChatMessage]>,
    timeout: Duration,
) -> Result<Classification, PipelineError> {
    let transcript_text = chat_transcript.map(linearize_transcript).unwrap_or_default();

    let text = if !transcript_text.is_empty() {
        format!(
            "Conversation so far:\n{transcript_text}\n\nGiven the above, classify the user's current intent."
        )
    } else {
        user_input.unwrap_or_default().trim().to_string()
    };

    if text.trim().is_empty() {
        debug!("No input to classify; routing to fallback");
        return Ok(Classification::no_input());
    }

    let output: Value =
        invoke_step(port, Step::IntentClassification, &IntentInput { text: &text }, timeout).await?;
    let classification = normalize_classification(output)?;
    info!(
        "Classified intent: {:?} (raw: {})",
        classification.intent, classification.raw_intent
    );
    Ok(classification)
}

/// Where an intent-routed turn goes after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    Analyst,
    Course,
    Pricing,
    Fallback,
    Terminal,
}

/// Routing precedence: analyst, course, pricing, error → terminal, else fallback.
/// Each label also matches through its fine-grained `raw_intent`.
pub fn route_by_intent(intent: Option<&str>, raw_intent: Option<&str>) -> RouteTarget {
    let label = intent.and_then(RouteLabel::parse);
    let raw = raw_intent.unwrap_or_default();

    if label == Some(RouteLabel::AnalystNode) || raw == "skill_gap_analysis" {
        RouteTarget::Analyst
    } else if label == Some(RouteLabel::CourseNode) || raw == "course_recommendation" {
        RouteTarget::Course
    } else if label == Some(RouteLabel::PricingNode) || raw == "pricing_query" {
        RouteTarget::Pricing
    } else if intent == Some(INTENT_ERROR) {
        RouteTarget::Terminal
    } else {
        RouteTarget::Fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::ScriptedPort;
    use serde_json::json;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_routing_precedence_by_label() {
        assert_eq!(route_by_intent(Some("analyst_node"), None), RouteTarget::Analyst);
        assert_eq!(route_by_intent(Some("course_node"), None), RouteTarget::Course);
        assert_eq!(route_by_intent(Some("pricing_node"), None), RouteTarget::Pricing);
        assert_eq!(route_by_intent(Some("fallback_node"), None), RouteTarget::Fallback);
        assert_eq!(route_by_intent(Some("error"), None), RouteTarget::Terminal);
        assert_eq!(route_by_intent(None, None), RouteTarget::Fallback);
    }

    #[test]
    fn test_raw_intent_rescues_unknown_label() {
        assert_eq!(
            route_by_intent(Some("something_else"), Some("course_recommendation")),
            RouteTarget::Course
        );
        assert_eq!(route_by_intent(None, Some("skill_gap_analysis")), RouteTarget::Analyst);
    }

    #[test]
    fn test_analyst_wins_over_later_rules() {
        // label says course but raw intent says gap analysis: analyst is checked first
        assert_eq!(
            route_by_intent(Some("course_node"), Some("skill_gap_analysis")),
            RouteTarget::Analyst
        );
    }

    #[test]
    fn test_raw_intent_beats_error_label() {
        assert_eq!(route_by_intent(Some("error"), Some("pricing_query")), RouteTarget::Pricing);
    }

    #[test]
    fn test_compound_intent_is_unwrapped() {
        let c = normalize_classification(json!({
            "intent": {"intent": "analyst_node", "confidence": 0.9},
            "raw_intent": "skill_gap_analysis"
        }))
        .unwrap();
        assert_eq!(c.intent, Some(RouteLabel::AnalystNode));
        assert_eq!(c.raw_intent, "skill_gap_analysis");
    }

    #[test]
    fn test_malformed_compound_falls_back_to_raw_intent() {
        let c = normalize_classification(json!({
            "intent": {"label": ["pricing"]},
            "raw_intent": "pricing_query"
        }))
        .unwrap();
        assert_eq!(c.intent, None);
        assert_eq!(
            route_by_intent(c.intent.map(|l| l.as_str()), Some(c.raw_intent.as_str())),
            RouteTarget::Pricing
        );
    }

    #[test]
    fn test_raw_intent_may_be_nested_in_compound() {
        let c = normalize_classification(json!({
            "intent": {"intent": "course_node", "raw_intent": "course_recommendation"}
        }))
        .unwrap();
        assert_eq!(c.intent, Some(RouteLabel::CourseNode));
        assert_eq!(c.raw_intent, "course_recommendation");
    }

    #[test]
    fn test_missing_or_odd_intent_leaves_label_empty() {
        let c = normalize_classification(json!({"raw_intent": "greet"})).unwrap();
        assert_eq!(c.intent, None);
        assert_eq!(c.raw_intent, "greet");

        let c = normalize_classification(json!({"intent": 7})).unwrap();
        assert_eq!(c.intent, None);
        assert_eq!(c.raw_intent, "unrecognized");
    }

    #[test]
    fn test_non_object_payload_is_schema_violation() {
        let err = normalize_classification(json!("analyst_node")).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaViolation(_)));
    }

    #[test]
    fn test_linearize_skips_incomplete_entries() {
        let transcript = vec![
            ChatMessage::user("I want cloud skills"),
            ChatMessage {
                role: String::new(),
                content: "orphan".to_string(),
            },
            ChatMessage {
                role: "assistant".to_string(),
                content: String::new(),
            },
            ChatMessage {
                role: "assistant".to_string(),
                content: "Great choice".to_string(),
            },
        ];
        assert_eq!(
            linearize_transcript(&transcript),
            "user: I want cloud skills\nassistant: Great choice"
        );
    }

    #[tokio::test]
    async fn test_empty_input_skips_generative_call() {
        let port = ScriptedPort::new();
        let c = classify(&port, Some("   "), Some(&[]), TIMEOUT).await.unwrap();
        assert_eq!(c.intent, Some(RouteLabel::FallbackNode));
        assert_eq!(c.raw_intent, NO_INPUT);
        assert!(port.calls().is_empty());

        let c = classify(&port, None, None, TIMEOUT).await.unwrap();
        assert_eq!(c.raw_intent, NO_INPUT);
        assert!(port.calls().is_empty());
    }

    #[tokio::test]
    async fn test_transcript_preferred_over_bare_input() {
        let port = ScriptedPort::new().respond(
            Step::IntentClassification,
            json!({"intent": "pricing_node", "raw_intent": "pricing_query"}),
        );
        let transcript = vec![ChatMessage::user("How much is the cloud bundle?")];
        let c = classify(&port, Some("ignored"), Some(&transcript), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(c.intent, Some(RouteLabel::PricingNode));

        let calls = port.calls();
        let text = calls[0].1["text"].as_str().unwrap();
        assert!(text.contains("user: How much is the cloud bundle?"));
        assert!(!text.contains("ignored"));
    }

    #[tokio::test]
    async fn test_bare_input_used_without_transcript() {
        let port = ScriptedPort::new().respond(
            Step::IntentClassification,
            json!({"intent": "fallback_node", "raw_intent": "greet"}),
        );
        let c = classify(&port, Some("Hi there"), None, TIMEOUT).await.unwrap();
        assert_eq!(c.raw_intent, "greet");
        assert_eq!(port.calls()[0].1["text"], "Hi there");
    }

    #[tokio::test]
    async fn test_classifier_failure_propagates() {
        let port = ScriptedPort::new().fail(
            Step::IntentClassification,
            PipelineError::GenerationFailure("upstream 500".to_string()),
        );
        let err = classify(&port, Some("Hi"), None, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, PipelineError::GenerationFailure(_)));
    }
}

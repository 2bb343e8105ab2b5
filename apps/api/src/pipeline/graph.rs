//! Stage graph for both orchestration shapes.
//!
//! Linear:
//!   resume → wait_goal → conversation → analyze_gap → wait_consent → course_rec → pricing → END
//!   (analyze_gap → END when there is no gap; wait_consent → END when declined)
//!
//! Intent-routed (one pass per user message):
//!   intent_classifier → analyst_node | course_node | pricing_node | fallback_node | END
//!   course_node → pricing_node → END; every other node → END

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pipeline::router::{route_by_intent, RouteTarget};
use crate::pipeline::state::PipelineState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphShape {
    Linear,
    IntentRouted,
}

impl GraphShape {
    pub fn entry(&self) -> NodeId {
        match self {
            GraphShape::Linear => NodeId::Resume,
            GraphShape::IntentRouted => NodeId::IntentClassifier,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeId {
    // Linear shape
    Resume,
    WaitGoal,
    Conversation,
    AnalyzeGap,
    WaitConsent,
    CourseRec,
    Pricing,
    // Intent-routed shape
    IntentClassifier,
    AnalystNode,
    CourseNode,
    PricingNode,
    FallbackNode,
    End,
}

impl NodeId {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeId::Resume => "resume",
            NodeId::WaitGoal => "wait_goal",
            NodeId::Conversation => "conversation",
            NodeId::AnalyzeGap => "analyze_gap",
            NodeId::WaitConsent => "wait_consent",
            NodeId::CourseRec => "course_rec",
            NodeId::Pricing => "pricing",
            NodeId::IntentClassifier => "intent_classifier",
            NodeId::AnalystNode => "analyst_node",
            NodeId::CourseNode => "course_node",
            NodeId::PricingNode => "pricing_node",
            NodeId::FallbackNode => "fallback_node",
            NodeId::End => "end",
        }
    }

    /// Nodes of the linear shape that may pause for external input.
    pub fn is_suspension_point(&self) -> bool {
        self.expected_field().is_some()
    }

    /// The state field the next input supplies when paused here.
    pub fn expected_field(&self) -> Option<&'static str> {
        match self {
            NodeId::WaitGoal => Some("goal_skills"),
            NodeId::WaitConsent => Some("consent"),
            NodeId::Pricing => Some("budget_eur"),
            _ => None,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successor of `node` after it completed with a `Continue` outcome.
pub fn next_node(shape: GraphShape, node: NodeId, state: &PipelineState) -> NodeId {
    match shape {
        GraphShape::Linear => match node {
            NodeId::Resume => NodeId::WaitGoal,
            NodeId::WaitGoal => NodeId::Conversation,
            NodeId::Conversation => NodeId::AnalyzeGap,
            NodeId::AnalyzeGap if state.skills_gap.is_empty() => NodeId::End,
            NodeId::AnalyzeGap => NodeId::WaitConsent,
            NodeId::WaitConsent if state.consent == Some(false) => NodeId::End,
            NodeId::WaitConsent => NodeId::CourseRec,
            NodeId::CourseRec => NodeId::Pricing,
            _ => NodeId::End,
        },
        GraphShape::IntentRouted => match node {
            NodeId::IntentClassifier => {
                match route_by_intent(state.intent.as_deref(), state.raw_intent.as_deref()) {
                    RouteTarget::Analyst => NodeId::AnalystNode,
                    RouteTarget::Course => NodeId::CourseNode,
                    RouteTarget::Pricing => NodeId::PricingNode,
                    RouteTarget::Fallback => NodeId::FallbackNode,
                    RouteTarget::Terminal => NodeId::End,
                }
            }
            NodeId::CourseNode => NodeId::PricingNode,
            _ => NodeId::End,
        },
    }
}

/// Where the session waits after `node` short-circuited on a missing precondition.
pub fn after_clarification(shape: GraphShape, node: NodeId) -> NodeId {
    match (shape, node) {
        (GraphShape::Linear, NodeId::Resume) => NodeId::Resume,
        (GraphShape::Linear, NodeId::Conversation | NodeId::AnalyzeGap) => NodeId::WaitGoal,
        _ => NodeId::End,
    }
}

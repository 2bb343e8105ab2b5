//! Stage implementations.
//!
//! Every node reads the state and returns a `NodeOutcome`; the engine is the
//! only code that mutates the state. Collaborator failures are caught here, at
//! the node boundary, and turned into `NodeOutcome::Fail` with a fixed apology.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::pipeline::budget::{bundle_total, fit_to_budget};
use crate::pipeline::error::PipelineError;
use crate::pipeline::gap::compute_skills_gap;
use crate::pipeline::graph::{GraphShape, NodeId};
use crate::pipeline::ports::{
    invoke_step, retrieve_candidates, ConversationInput, CourseCandidateSource, GapNarrative,
    GapNarrativeInput, GenerativeStepPort, GoalProfile, ModuleSelection, ModuleSelectionInput,
    ResumeFacts, ResumeInput, Step,
};
use crate::pipeline::router::{classify, route_by_intent, RouteTarget};
use crate::pipeline::state::{
    dedup_preserving_order, ChatMessage, CourseRecord, ModuleRecommendation, PipelineState,
    PricedModuleInput, StateUpdate,
};

// ────────────────────────────────────────────────────────────────────────────
// User-facing text
// ────────────────────────────────────────────────────────────────────────────

const ASK_GOAL_DEFAULT: &str =
    "What role or skills would you like to work towards? Feel free to mention a budget too.";
const OFFER_DEFAULT: &str =
    "Would you like me to put together a custom course bundle for these skills?";
const ASK_BUDGET: &str =
    "I need your budget to finalize the course bundle price. How much are you looking to spend (in EUR)?";
const NEED_RESUME: &str = "Please upload your resume so I can look at your current skills.";
const NEED_GOAL: &str = "I couldn't pick out the skills you want to learn. Which skills or role are you aiming for?";
const NEED_SKILLS_AND_GOAL: &str = "I need both your current skills (from your resume) and your goal skills to analyze the gap. Could you tell me your goal?";
const NEED_GAP: &str = "I need to know your skill gap first. Would you like me to analyze it based on your goals?";
const NO_MODULES: &str = "It seems no suitable course modules were found. Would you like to refine your goals or budget?";
const CONSENT_DECLINED: &str =
    "No problem! Your skill gap analysis is saved. Come back any time you want a course bundle.";
const NO_GAP: &str = "You already have every skill on your goal list. Nice work!";
const EMPTY_BUNDLE: &str =
    "Unfortunately, I couldn't create a bundle within your budget with the recommended modules.";

const SORRY_RESUME: &str = "Sorry, I couldn't read your resume right now. Please try again in a moment.";
const SORRY_CONVERSATION: &str = "Sorry, I couldn't understand your goals right now. Please try again.";
const SORRY_GAP: &str = "Sorry, I couldn't analyze the skill gap right now.";
const SORRY_COURSES: &str = "Sorry, I couldn't find courses right now.";
const SORRY_INTENT: &str = "Sorry, I couldn't understand your request right now. Please try again.";

// ────────────────────────────────────────────────────────────────────────────
// Outcomes and settings
// ────────────────────────────────────────────────────────────────────────────

/// Result of running one node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutcome {
    /// Merge the update and follow the graph edge.
    Continue(StateUpdate),
    /// Pause at this node until the caller supplies `expected_field`.
    Suspend {
        update: StateUpdate,
        prompt: String,
        expected_field: &'static str,
    },
    /// A guard failed: answer with a clarifying question, no error recorded.
    Clarify { update: StateUpdate, response: String },
    /// A collaborator failed: record `error` and answer with a fixed apology.
    Fail { error: String, response: String },
}

#[derive(Debug, Clone)]
pub struct NodeSettings {
    pub step_timeout: Duration,
    pub retrieval_top_k: usize,
    pub default_module_price: u32,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(60),
            retrieval_top_k: 5,
            default_module_price: 50,
        }
    }
}

/// Holds the collaborators every node may call.
#[derive(Clone)]
pub struct Nodes {
    port: Arc<dyn GenerativeStepPort>,
    source: Arc<dyn CourseCandidateSource>,
    settings: NodeSettings,
}

impl Nodes {
    pub fn new(
        port: Arc<dyn GenerativeStepPort>,
        source: Arc<dyn CourseCandidateSource>,
        settings: NodeSettings,
    ) -> Self {
        Self {
            port,
            source,
            settings,
        }
    }

    /// Runs `node`. `input` is the user's message when this node may consume it.
    pub async fn run(
        &self,
        node: NodeId,
        shape: GraphShape,
        state: &PipelineState,
        input: Option<&str>,
    ) -> NodeOutcome {
        info!("Running node {node}");
        let result = match node {
            NodeId::Resume => self.resume(state).await,
            NodeId::WaitGoal => Ok(wait_for_goal(state, input)),
            NodeId::Conversation => self.conversation(state).await,
            NodeId::AnalyzeGap | NodeId::AnalystNode => self.analyze_gap(node, state, input).await,
            NodeId::WaitConsent => Ok(wait_for_consent(state, input)),
            NodeId::CourseRec | NodeId::CourseNode => self.recommend_courses(state).await,
            NodeId::Pricing | NodeId::PricingNode => Ok(self.price_bundle(shape, state, input)),
            NodeId::IntentClassifier => self.classify_intent(state, input).await,
            NodeId::FallbackNode => Ok(fallback(state)),
            NodeId::End => Ok(NodeOutcome::Continue(StateUpdate::default())),
        };

        match result {
            Ok(outcome) => outcome,
            Err(PipelineError::MissingPrecondition(response)) => {
                warn!("Node {node} precondition failed");
                NodeOutcome::Clarify {
                    update: StateUpdate::default(),
                    response,
                }
            }
            Err(e) => {
                warn!("Node {node} failed: {e}");
                NodeOutcome::Fail {
                    error: format!("{node} failed: {e}"),
                    response: apology(node).to_string(),
                }
            }
        }
    }

    async fn resume(&self, state: &PipelineState) -> Result<NodeOutcome, PipelineError> {
        if !state.skills.is_empty() {
            // Skills are written once; a seeded or earlier extraction stands.
            return Ok(NodeOutcome::Continue(StateUpdate::default()));
        }
        if state.resume_text.trim().is_empty() {
            return Err(PipelineError::MissingPrecondition(NEED_RESUME.to_string()));
        }

        let facts: ResumeFacts = invoke_step(
            self.port.as_ref(),
            Step::ResumeExtraction,
            &ResumeInput {
                resume_text: &state.resume_text,
            },
            self.settings.step_timeout,
        )
        .await?;

        let skills = clean_list(facts.skills);
        info!("Resume extraction found {} skills", skills.len());

        Ok(NodeOutcome::Continue(StateUpdate {
            skills: Some(skills),
            summary: Some(facts.summary),
            encouragement_message: Some(facts.encouragement_message),
            ask_goal_message: Some(facts.ask_goal_message),
            experience_highlights: Some(facts.experience_highlights),
            learning_preferences: Some(facts.learning_preferences),
            ..StateUpdate::default()
        }))
    }

    async fn conversation(&self, state: &PipelineState) -> Result<NodeOutcome, PipelineError> {
        if !state.has_user_message() {
            if state.goal_skills.is_empty() {
                return Err(PipelineError::MissingPrecondition(NEED_GOAL.to_string()));
            }
            return Ok(NodeOutcome::Continue(StateUpdate::default()));
        }

        let profile: GoalProfile = invoke_step(
            self.port.as_ref(),
            Step::ConversationParsing,
            &ConversationInput {
                chat_transcript: &state.chat_transcript,
            },
            self.settings.step_timeout,
        )
        .await?;

        info!(
            "Conversation parsed: target_role={:?}, {} goal skills, budget={:?}",
            profile.target_role,
            profile.goal_skills.len(),
            profile.budget_eur
        );

        Ok(NodeOutcome::Continue(StateUpdate {
            target_role: Some(profile.target_role),
            goal_skills: Some(clean_list(profile.goal_skills)),
            // A budget the caller already set survives a transcript without one.
            budget_eur: profile.budget_eur.map(Some),
            preferences: Some(profile.preferences),
            context: Some(profile.context),
            ..StateUpdate::default()
        }))
    }

    async fn analyze_gap(
        &self,
        node: NodeId,
        state: &PipelineState,
        input: Option<&str>,
    ) -> Result<NodeOutcome, PipelineError> {
        // In chat, the message itself stands in for a goal nobody has stated yet.
        let stated_goal = match node {
            NodeId::AnalystNode if state.goal_skills.is_empty() => input
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(|text| vec![text.to_string()]),
            _ => None,
        };
        let goal_skills = stated_goal.as_deref().unwrap_or(&state.goal_skills);

        match node {
            NodeId::AnalystNode if state.skills.is_empty() || goal_skills.is_empty() => {
                return Err(PipelineError::MissingPrecondition(
                    NEED_SKILLS_AND_GOAL.to_string(),
                ));
            }
            _ if goal_skills.is_empty() => {
                return Err(PipelineError::MissingPrecondition(NEED_GOAL.to_string()));
            }
            _ => {}
        }

        let skills_gap = compute_skills_gap(&state.skills, goal_skills);
        info!("Skill gap: {:?}", skills_gap);

        let narrative: GapNarrative = invoke_step(
            self.port.as_ref(),
            Step::GapNarrative,
            &GapNarrativeInput {
                skills: &state.skills,
                goal_skills,
                skills_gap: &skills_gap,
            },
            self.settings.step_timeout,
        )
        .await?;

        let offer = if narrative.offer_custom_course_message.trim().is_empty() {
            OFFER_DEFAULT.to_string()
        } else {
            narrative.offer_custom_course_message
        };

        let response = match node {
            NodeId::AnalystNode => Some(format!("{}\n{}", narrative.gap_message, offer)),
            _ if skills_gap.is_empty() => Some(if narrative.gap_message.trim().is_empty() {
                NO_GAP.to_string()
            } else {
                narrative.gap_message.clone()
            }),
            _ => None,
        };

        Ok(NodeOutcome::Continue(StateUpdate {
            goal_skills: stated_goal,
            skills_gap: Some(skills_gap),
            gap_message: Some(narrative.gap_message),
            offer_custom_course_message: Some(offer),
            response,
            ..StateUpdate::default()
        }))
    }

    async fn recommend_courses(&self, state: &PipelineState) -> Result<NodeOutcome, PipelineError> {
        if state.skills_gap.is_empty() {
            return Err(PipelineError::MissingPrecondition(NEED_GAP.to_string()));
        }

        let candidates = retrieve_candidates(
            self.source.as_ref(),
            &state.skills_gap,
            self.settings.retrieval_top_k,
            self.settings.step_timeout,
        )
        .await?;
        info!("Retrieved {} candidate modules", candidates.len());

        if candidates.is_empty() {
            return Ok(NodeOutcome::Continue(StateUpdate {
                candidate_courses: Some(vec![]),
                recommended_modules: Some(vec![]),
                ..StateUpdate::default()
            }));
        }

        let selection: ModuleSelection = invoke_step(
            self.port.as_ref(),
            Step::ModuleSelection,
            &ModuleSelectionInput {
                skills_gap: &state.skills_gap,
                candidate_courses: &candidates,
            },
            self.settings.step_timeout,
        )
        .await?;

        let recommended = reconcile_selection(selection.recommended_modules, &candidates);
        info!("Packaged {} recommended modules", recommended.len());

        Ok(NodeOutcome::Continue(StateUpdate {
            candidate_courses: Some(candidates),
            recommended_modules: Some(recommended),
            ..StateUpdate::default()
        }))
    }

    fn price_bundle(
        &self,
        shape: GraphShape,
        state: &PipelineState,
        input: Option<&str>,
    ) -> NodeOutcome {
        if state.recommended_modules.is_empty() {
            return NodeOutcome::Clarify {
                update: StateUpdate::default(),
                response: NO_MODULES.to_string(),
            };
        }

        // A number in a chat message is a budget only when the user asked about
        // pricing; after course_node it may be anything ("top 3 modules").
        let stated_budget = match shape {
            GraphShape::Linear => input.and_then(parse_budget),
            GraphShape::IntentRouted if routed_to_pricing(state) => {
                input.and_then(parse_budget)
            }
            GraphShape::IntentRouted => None,
        };
        let budget = match state.budget_eur.or(stated_budget) {
            Some(budget) => budget,
            None => {
                let update = StateUpdate::default();
                return match shape {
                    GraphShape::Linear => NodeOutcome::Suspend {
                        update,
                        prompt: ASK_BUDGET.to_string(),
                        expected_field: "budget_eur",
                    },
                    GraphShape::IntentRouted => NodeOutcome::Clarify {
                        update,
                        response: ASK_BUDGET.to_string(),
                    },
                };
            }
        };

        let inputs: Vec<PricedModuleInput> = state
            .recommended_modules
            .iter()
            .cloned()
            .map(|module| {
                let price = module
                    .price
                    .unwrap_or(self.settings.default_module_price)
                    .max(1);
                PricedModuleInput { module, price }
            })
            .collect();

        let bundle = fit_to_budget(inputs, budget);
        info!(
            "Priced bundle: {} of {} modules kept, total €{} for budget €{}",
            bundle.len(),
            state.recommended_modules.len(),
            bundle_total(&bundle),
            budget
        );

        let response = if bundle.is_empty() {
            EMPTY_BUNDLE.to_string()
        } else {
            let details = bundle
                .iter()
                .map(|m| format!("- {} ({}): €{}", m.module_title, m.course_title, m.final_price))
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "Here's your personalized learning bundle fitting your budget (€{budget}):\n{details}\n\nTotal: €{}",
                bundle_total(&bundle)
            )
        };

        let mut update = StateUpdate::with_response(response);
        update.final_bundle = Some(bundle);
        update.clear_prompt = true;
        // Only the answer to the linear budget question is remembered.
        if shape == GraphShape::Linear && state.budget_eur.is_none() {
            update.budget_eur = Some(Some(budget));
        }
        NodeOutcome::Continue(update)
    }

    async fn classify_intent(
        &self,
        state: &PipelineState,
        input: Option<&str>,
    ) -> Result<NodeOutcome, PipelineError> {
        let classification = classify(
            self.port.as_ref(),
            input,
            Some(state.chat_transcript.as_slice()),
            self.settings.step_timeout,
        )
        .await?;

        Ok(NodeOutcome::Continue(StateUpdate {
            intent: Some(classification.intent.map(|l| l.as_str().to_string())),
            raw_intent: Some(Some(classification.raw_intent)),
            ..StateUpdate::default()
        }))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Suspension nodes
// ────────────────────────────────────────────────────────────────────────────

fn wait_for_goal(state: &PipelineState, input: Option<&str>) -> NodeOutcome {
    if let Some(text) = input {
        return NodeOutcome::Continue(StateUpdate {
            append_messages: vec![ChatMessage::user(text)],
            clear_prompt: true,
            ..StateUpdate::default()
        });
    }

    let already_waiting = state.expected_input_field.as_deref() == Some("goal_skills");
    if !already_waiting && (state.has_user_message() || !state.goal_skills.is_empty()) {
        return NodeOutcome::Continue(StateUpdate {
            clear_prompt: true,
            ..StateUpdate::default()
        });
    }

    let prompt = match &state.current_prompt {
        Some(prompt) if already_waiting => prompt.clone(),
        _ => goal_prompt(state),
    };
    NodeOutcome::Suspend {
        update: StateUpdate::default(),
        prompt,
        expected_field: "goal_skills",
    }
}

fn goal_prompt(state: &PipelineState) -> String {
    let prompt = format!(
        "{}\n\n{}",
        state.encouragement_message, state.ask_goal_message
    );
    let prompt = prompt.trim();
    if prompt.is_empty() {
        ASK_GOAL_DEFAULT.to_string()
    } else {
        prompt.to_string()
    }
}

fn wait_for_consent(state: &PipelineState, input: Option<&str>) -> NodeOutcome {
    let prompt = if state.offer_custom_course_message.trim().is_empty() {
        OFFER_DEFAULT.to_string()
    } else {
        state.offer_custom_course_message.clone()
    };

    // Answers set `consent` only, so a resumed run matches one with consent preset.
    if let Some(text) = input {
        return match parse_consent(text) {
            Some(true) => NodeOutcome::Continue(StateUpdate {
                consent: Some(Some(true)),
                clear_prompt: true,
                ..StateUpdate::default()
            }),
            Some(false) => NodeOutcome::Continue(StateUpdate {
                consent: Some(Some(false)),
                clear_prompt: true,
                response: Some(CONSENT_DECLINED.to_string()),
                ..StateUpdate::default()
            }),
            None => NodeOutcome::Suspend {
                update: StateUpdate::default(),
                prompt,
                expected_field: "consent",
            },
        };
    }

    let already_waiting = state.expected_input_field.as_deref() == Some("consent");
    match state.consent {
        Some(consent) if !already_waiting => NodeOutcome::Continue(StateUpdate {
            clear_prompt: true,
            response: (!consent).then(|| CONSENT_DECLINED.to_string()),
            ..StateUpdate::default()
        }),
        _ => NodeOutcome::Suspend {
            update: StateUpdate::default(),
            prompt,
            expected_field: "consent",
        },
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fallback
// ────────────────────────────────────────────────────────────────────────────

fn fallback(state: &PipelineState) -> NodeOutcome {
    let response = match state.raw_intent.as_deref() {
        Some("no_input") => "Please provide some input.",
        Some("greet") => {
            "Hi! Tell me about the role or skills you're aiming for and I'll map out what to learn."
        }
        Some("thank_you") => "You're welcome! Let me know whenever you want to keep learning.",
        Some("goodbye") => "Goodbye, and good luck with your learning journey!",
        _ => "I'm not sure how to help with that. Could you please rephrase or tell me about your learning goals?",
    };
    NodeOutcome::Continue(StateUpdate::with_response(response))
}

fn routed_to_pricing(state: &PipelineState) -> bool {
    route_by_intent(state.intent.as_deref(), state.raw_intent.as_deref()) == RouteTarget::Pricing
}

fn apology(node: NodeId) -> &'static str {
    match node {
        NodeId::Resume => SORRY_RESUME,
        NodeId::Conversation => SORRY_CONVERSATION,
        NodeId::AnalyzeGap | NodeId::AnalystNode => SORRY_GAP,
        NodeId::CourseRec | NodeId::CourseNode => SORRY_COURSES,
        NodeId::IntentClassifier => SORRY_INTENT,
        _ => "Sorry, something went wrong on my side. Please try again.",
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn clean_list(items: Vec<String>) -> Vec<String> {
    dedup_preserving_order(
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

/// Keeps only recommendations that name a retrieved module, restricted to that
/// module's subtopics, with the catalog price attached.
pub fn reconcile_selection(
    selected: Vec<ModuleRecommendation>,
    candidates: &[CourseRecord],
) -> Vec<ModuleRecommendation> {
    let mut seen = std::collections::HashSet::new();
    selected
        .into_iter()
        .filter_map(|rec| {
            let Some(source) = candidates.iter().find(|c| {
                same_title(&c.course_title, &rec.course_title)
                    && same_title(&c.module_title, &rec.module_title)
            }) else {
                warn!(
                    "Dropping recommendation for unknown module '{}' / '{}'",
                    rec.course_title, rec.module_title
                );
                return None;
            };
            if !seen.insert((source.course_title.clone(), source.module_title.clone())) {
                return None;
            }

            let selected_subtopics = rec
                .selected_subtopics
                .iter()
                .filter_map(|topic| {
                    source
                        .subtopics
                        .iter()
                        .find(|s| same_title(s, topic))
                        .cloned()
                })
                .collect::<Vec<_>>();

            let module_description = if rec.module_description.trim().is_empty() {
                source.module_description.clone()
            } else {
                rec.module_description
            };

            Some(ModuleRecommendation {
                course_title: source.course_title.clone(),
                module_title: source.module_title.clone(),
                module_description,
                selected_subtopics: dedup_preserving_order(selected_subtopics),
                why_selected: rec.why_selected,
                price: source.price,
            })
        })
        .collect()
}

fn same_title(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Reads a yes/no answer. `None` when the answer is neither.
pub fn parse_consent(text: &str) -> Option<bool> {
    const YES: &[&str] = &[
        "yes", "y", "yeah", "yep", "sure", "ok", "okay", "please", "go ahead", "absolutely",
        "of course", "definitely", "let's do it", "sounds good",
    ];
    const NO: &[&str] = &[
        "no", "n", "nope", "nah", "not now", "no thanks", "not really", "maybe later", "later",
    ];

    let normalized = text
        .trim()
        .to_lowercase()
        .trim_end_matches(['.', '!', '?'])
        .to_string();
    if normalized.is_empty() {
        return None;
    }

    let matches = |words: &[&str]| {
        words.iter().any(|w| {
            normalized == *w
                || normalized
                    .strip_prefix(w)
                    .is_some_and(|rest| rest.starts_with([' ', ',', '!', '.']))
        })
    };

    // Negatives win when both lists match.
    if matches(NO) {
        Some(false)
    } else if matches(YES) {
        Some(true)
    } else {
        None
    }
}

/// Extracts the first number from free text, e.g. "around 1,200 EUR" → 1200.
pub fn parse_budget(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let raw: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let raw = raw.trim_end_matches(['.', ',']);

    let normalized = match raw.rsplit_once(',') {
        // "1,200" groups thousands; "99,5" is a decimal comma.
        Some((_, tail)) if tail.len() == 3 && !raw.contains('.') => raw.replace(',', ""),
        Some(_) if !raw.contains('.') && raw.matches(',').count() == 1 => raw.replace(',', "."),
        _ => raw.replace(',', ""),
    };
    normalized.parse::<f64>().ok()
}

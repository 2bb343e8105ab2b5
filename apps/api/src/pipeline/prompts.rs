// Prompt templates for the generative pipeline steps.
// Every template takes the step input as pretty-printed JSON in `{input}`.

use crate::pipeline::ports::Step;

pub const RESUME_ROLE: &str = "You are an expert career coach. \
    You read resumes of any format and ignore irrelevant or noisy text.";

pub const RESUME_PROMPT_TEMPLATE: &str = r#"Extract the candidate's profile from the resume below.

Return a JSON object with this EXACT schema:
{
  "skills": ["Python", "SQL"],
  "summary": "1-2 sentence professional summary",
  "experience_highlights": ["2-5 key achievements or roles"],
  "learning_preferences": "how the candidate prefers to learn, or null",
  "encouragement_message": "one friendly sentence about their strengths",
  "ask_goal_message": "one question asking which role or skills they want to work towards"
}

Rules:
- skills: technical and soft skills, each a short noun phrase, no duplicates.
- Only list skills the resume supports.

INPUT:
{input}"#;

pub const CONVERSATION_ROLE: &str = "You are an expert learning advisor. \
    You read informal, multi-turn chat and extract the learner's goals.";

pub const CONVERSATION_PROMPT_TEMPLATE: &str = r#"Read the chat transcript below and extract the learner's goals.

Return a JSON object with this EXACT schema:
{
  "target_role": "desired job or learning outcome, or null",
  "goal_skills": ["skills the user wants to acquire"],
  "budget_eur": 150,
  "preferences": "learning preferences (hands-on, video, project-based), or null",
  "context": "other relevant constraints or prior knowledge, or null"
}

Rules:
- budget_eur is a number in euros, or null when no budget was mentioned.
- goal_skills uses short lowercase skill names.

INPUT:
{input}"#;

pub const GAP_ROLE: &str = "You are a friendly, growth-minded career analyst.";

pub const GAP_PROMPT_TEMPLATE: &str = r#"The learner's current skills, goal skills and the computed skill gap are below.
The skill gap is final; do not add or remove skills.

Return a JSON object with this EXACT schema:
{
  "gap_message": "short supportive summary of which skills to learn next",
  "offer_custom_course_message": "one question offering a personalized course bundle for these skills"
}

If the skill gap is empty, congratulate the learner in gap_message.

Example:
skills: ["python", "sql"], goal_skills: ["cloud", "data engineering"]
{"gap_message": "To reach your goal you only need to focus on cloud and data engineering. You're well on your way!",
 "offer_custom_course_message": "Would you like me to create a custom learning bundle to help you master these skills?"}

INPUT:
{input}"#;

pub const INTENT_ROLE: &str = "You are the intent classifier of a personalized learning assistant.";

pub const INTENT_PROMPT_TEMPLATE: &str = r#"Classify the user's current intent into exactly one routing label:
- "analyst_node": wants to upskill, asks about missing skills or a skill gap ("I want to upskill in cloud", "What am I missing for a data role?")
- "course_node": asks about courses or learning resources ("Recommend a course for Python")
- "pricing_node": asks about price, cost, budget or cheaper options ("My budget is 100 EUR", "Show me cheaper options")
- "fallback_node": greetings, thanks, goodbyes, or anything unsupported ("Hi", "Thanks", "Tell me a joke")

Also give a fine-grained raw_intent, one of:
greet, goodbye, thank_you, small_talk, unrecognized, skill_gap_analysis, course_recommendation, pricing_query

Return a JSON object with this EXACT schema:
{"intent": "analyst_node", "raw_intent": "skill_gap_analysis"}

INPUT:
{input}"#;

pub const MODULE_SELECTION_ROLE: &str =
    "You are an expert learning path designer for a personalized education platform.";

pub const MODULE_SELECTION_PROMPT_TEMPLATE: &str = r#"Select the course modules that best close the learner's skill gap.

Rules:
- Only pick modules from candidate_courses; copy course_title and module_title exactly.
- For each skill in the gap pick the most relevant module; avoid modules covering the same content.
- selected_subtopics must come from that module's subtopics.
- Skip modules that do not directly help close the gap.

Return a JSON object with this EXACT schema:
{
  "recommended_modules": [
    {
      "course_title": "...",
      "module_title": "...",
      "module_description": "...",
      "selected_subtopics": ["..."],
      "why_selected": "one sentence rationale"
    }
  ]
}

INPUT:
{input}"#;

pub const QUIZ_ROLE: &str = "You write short multiple-choice quizzes that check understanding of one module.";

pub const QUIZ_PROMPT_TEMPLATE: &str = r#"Write 3 multiple-choice questions for the skill and module below.
Each question has exactly 4 options and correct_answer is one of them, copied verbatim.

Return a JSON object with this EXACT schema:
{"quiz": [{"question": "...", "options": ["...", "...", "...", "..."], "correct_answer": "..."}]}

INPUT:
{input}"#;

pub const EXPLANATION_ROLE: &str = "You are a patient tutor who re-explains material around the learner's mistakes.";

pub const EXPLANATION_PROMPT_TEMPLATE: &str = r#"The learner just took a quiz on the module below and missed some questions.
Re-explain the material so it addresses exactly those weak points. Revisit the concept behind
each missed question, contrast the given answer with the correct one, and match the depth to
the self-reported understanding scale (1 = lost, 5 = confident; null = unknown).
Keep it under 200 words. If "material" is empty, explain from the module title alone.

Return a JSON object with this EXACT schema:
{"simplified_text": "...", "focus_topics": ["short topic", "..."]}

INPUT:
{input}"#;

/// Role description and prompt template for `step`.
pub fn for_step(step: Step) -> (&'static str, &'static str) {
    match step {
        Step::ResumeExtraction => (RESUME_ROLE, RESUME_PROMPT_TEMPLATE),
        Step::ConversationParsing => (CONVERSATION_ROLE, CONVERSATION_PROMPT_TEMPLATE),
        Step::GapNarrative => (GAP_ROLE, GAP_PROMPT_TEMPLATE),
        Step::IntentClassification => (INTENT_ROLE, INTENT_PROMPT_TEMPLATE),
        Step::ModuleSelection => (MODULE_SELECTION_ROLE, MODULE_SELECTION_PROMPT_TEMPLATE),
        Step::QuizGeneration => (QUIZ_ROLE, QUIZ_PROMPT_TEMPLATE),
        Step::Explanation => (EXPLANATION_ROLE, EXPLANATION_PROMPT_TEMPLATE),
    }
}

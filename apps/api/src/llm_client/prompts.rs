//! Prompt fragments shared by every generative step.
//! Step-specific templates live in `pipeline::prompts`.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Tone shared by every user-facing message the model writes.
pub const COACH_TONE: &str = "Write user-facing messages in a warm, encouraging, \
    growth-minded tone. Keep them short and actionable. Address the learner directly.";

/// Builds a step's system prompt from its role description and the shared fragments.
pub fn system_prompt(role: &str) -> String {
    format!("{role} {COACH_TONE} {JSON_ONLY_SYSTEM}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_carries_json_rule() {
        let prompt = system_prompt("You are a career coach.");
        assert!(prompt.starts_with("You are a career coach."));
        assert!(prompt.contains("valid JSON only"));
    }
}

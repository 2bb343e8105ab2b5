use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::pipeline::error::PipelineError;
use crate::quiz::grader::normalize_answer;
use crate::quiz::QuizQuestion;

#[derive(Debug, Clone, Deserialize)]
struct BankEntry {
    skill: String,
    module_title: String,
    quiz: Vec<QuizQuestion>,
}

/// Static quiz pool consulted before any quiz is generated.
#[derive(Debug, Clone, Default)]
pub struct QuizBank {
    entries: Vec<BankEntry>,
}

impl QuizBank {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read quiz bank at {}", path.display()))?;
        let bank = Self::from_json(&raw)
            .with_context(|| format!("Invalid quiz bank at {}", path.display()))?;
        info!("Loaded {} quizzes from {}", bank.entries.len(), path.display());
        Ok(bank)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let entries: Vec<BankEntry> = serde_json::from_str(raw)?;
        for entry in &entries {
            validate_quiz(&entry.quiz).map_err(|e| {
                anyhow::anyhow!("quiz for {} / {}: {e}", entry.skill, entry.module_title)
            })?;
        }
        Ok(Self { entries })
    }

    /// Case-insensitive match on both skill and module title.
    pub fn lookup(&self, skill: &str, module_title: &str) -> Option<Vec<QuizQuestion>> {
        let skill = skill.trim();
        let module_title = module_title.trim();
        self.entries
            .iter()
            .find(|e| {
                e.skill.trim().eq_ignore_ascii_case(skill)
                    && e.module_title.trim().eq_ignore_ascii_case(module_title)
            })
            .map(|e| e.quiz.clone())
    }
}

/// A usable quiz has questions, each with text, at least two options, and an
/// answer that is one of them.
pub fn validate_quiz(quiz: &[QuizQuestion]) -> Result<(), PipelineError> {
    if quiz.is_empty() {
        return Err(PipelineError::SchemaViolation("quiz has no questions".to_string()));
    }
    for (i, q) in quiz.iter().enumerate() {
        if q.question.trim().is_empty() {
            return Err(PipelineError::SchemaViolation(format!(
                "question {} has no text",
                i + 1
            )));
        }
        if q.options.len() < 2 {
            return Err(PipelineError::SchemaViolation(format!(
                "question {} needs at least two options",
                i + 1
            )));
        }
        let answer = normalize_answer(&q.correct_answer);
        if !q.options.iter().any(|o| normalize_answer(o) == answer) {
            return Err(PipelineError::SchemaViolation(format!(
                "question {} answer is not one of its options",
                i + 1
            )));
        }
    }
    Ok(())
}

pub mod bank;
pub mod grader;
pub mod handlers;
pub mod progress;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::pipeline::error::PipelineError;
use crate::pipeline::ports::{
    invoke_step, Explanation, ExplanationInput, GenerativeStepPort, QuizDraft, QuizInput, Step,
};
use crate::quiz::bank::{validate_quiz, QuizBank};
use crate::quiz::grader::{grade, missed_questions};
use crate::quiz::progress::{Progress, ProgressStore};

pub const XP_PER_CORRECT: i64 = 10;
pub const PERFECT_SCORE_BADGE: &str = "Quiz Master";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionResult {
    pub score: f64,
    pub correct: usize,
    pub total: usize,
    pub xp: i64,
    pub badges: Vec<String>,
    /// Present when something was missed and the explanation step succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Explanation>,
}

/// What the quiz was about, used to explain missed questions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudyContext {
    #[serde(default)]
    pub module_title: String,
    #[serde(default)]
    pub material: String,
    #[serde(default)]
    pub scale: Option<u8>,
}

/// Quiz lookup or generation, grading, and XP bookkeeping.
pub struct QuizService {
    bank: QuizBank,
    port: Arc<dyn GenerativeStepPort>,
    progress: Arc<dyn ProgressStore>,
    step_timeout: Duration,
}

impl QuizService {
    pub fn new(
        bank: QuizBank,
        port: Arc<dyn GenerativeStepPort>,
        progress: Arc<dyn ProgressStore>,
        step_timeout: Duration,
    ) -> Self {
        Self {
            bank,
            port,
            progress,
            step_timeout,
        }
    }

    /// Returns the banked quiz for the skill and module, or generates one.
    pub async fn quiz_for(
        &self,
        current_skill: &str,
        module_title: &str,
    ) -> Result<Vec<QuizQuestion>, PipelineError> {
        if let Some(quiz) = self.bank.lookup(current_skill, module_title) {
            info!("Serving banked quiz for {current_skill} / {module_title}");
            return Ok(quiz);
        }

        let draft: QuizDraft = invoke_step(
            self.port.as_ref(),
            Step::QuizGeneration,
            &QuizInput {
                current_skill,
                module_title,
            },
            self.step_timeout,
        )
        .await?;
        validate_quiz(&draft.quiz)?;

        info!(
            "Generated {} quiz questions for {current_skill} / {module_title}",
            draft.quiz.len()
        );
        Ok(draft.quiz)
    }

    /// Grades a submission, then awards XP per correct answer and a badge for a
    /// perfect score. Missed questions get a remedial explanation.
    pub async fn submit(
        &self,
        user_id: &str,
        quiz: &[QuizQuestion],
        answers: &[String],
        context: &StudyContext,
    ) -> anyhow::Result<SubmissionResult> {
        let report = grade(quiz, answers);

        let xp = self
            .progress
            .increment_xp(user_id, report.correct as i64 * XP_PER_CORRECT)
            .await?;
        if report.score == 1.0 {
            self.progress.award_badge(user_id, PERFECT_SCORE_BADGE).await?;
        }
        let Progress { badges, .. } = self.progress.get(user_id).await?;
        let explanation = self.explain(quiz, answers, context).await;

        Ok(SubmissionResult {
            score: report.score,
            correct: report.correct,
            total: report.total,
            xp,
            badges,
            explanation,
        })
    }

    /// XP is already booked when this runs, so a failed explanation is logged
    /// and left out rather than failing the submission.
    async fn explain(
        &self,
        quiz: &[QuizQuestion],
        answers: &[String],
        context: &StudyContext,
    ) -> Option<Explanation> {
        let missed = missed_questions(quiz, answers);
        if missed.is_empty() {
            return None;
        }

        let input = ExplanationInput {
            module_title: context.module_title.trim(),
            material: context.material.trim(),
            scale: context.scale.map(|s| s.clamp(1, 5)),
            missed: &missed,
        };
        match invoke_step::<_, Explanation>(
            self.port.as_ref(),
            Step::Explanation,
            &input,
            self.step_timeout,
        )
        .await
        {
            Ok(explanation) if !explanation.simplified_text.trim().is_empty() => Some(explanation),
            Ok(_) => {
                warn!("Explanation step returned empty text");
                None
            }
            Err(e) => {
                warn!("Explanation for {} missed questions failed: {e}", missed.len());
                None
            }
        }
    }

    pub async fn progress(&self, user_id: &str) -> anyhow::Result<Progress> {
        self.progress.get(user_id).await
    }
}

use serde::Serialize;

use crate::quiz::QuizQuestion;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GradeReport {
    pub score: f64,
    pub correct: usize,
    pub total: usize,
}

/// Trim and lowercase: the single comparison policy for quiz answers.
pub fn normalize_answer(answer: &str) -> String {
    answer.trim().to_lowercase()
}

/// Grades `answers` against `quiz` position by position.
///
/// Only the first `min(quiz.len(), answers.len())` pairs are compared. `total`
/// is the number of questions, so unanswered questions count as wrong.
pub fn grade(quiz: &[QuizQuestion], answers: &[String]) -> GradeReport {
    let correct = quiz
        .iter()
        .zip(answers)
        .filter(|(question, answer)| {
            normalize_answer(answer) == normalize_answer(&question.correct_answer)
        })
        .count();
    let total = quiz.len();

    GradeReport {
        score: correct as f64 / total.max(1) as f64,
        correct,
        total,
    }
}

/// A question the learner got wrong, with what they answered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissedQuestion {
    pub question: String,
    /// Empty when the question was left unanswered.
    pub given_answer: String,
    pub correct_answer: String,
}

/// Every question `grade` counts as wrong, in quiz order.
pub fn missed_questions(quiz: &[QuizQuestion], answers: &[String]) -> Vec<MissedQuestion> {
    quiz.iter()
        .enumerate()
        .filter_map(|(i, question)| {
            let given = answers.get(i).map(String::as_str).unwrap_or("");
            (normalize_answer(given) != normalize_answer(&question.correct_answer)).then(|| {
                MissedQuestion {
                    question: question.question.clone(),
                    given_answer: given.trim().to_string(),
                    correct_answer: question.correct_answer.clone(),
                }
            })
        })
        .collect()
}

//! crates/quiz_core/src/scoring.rs
//!
//! Pure scoring functions. Unanswered questions count as incorrect, there is
//! no partial credit and no negative marking.

use crate::domain::{AnswerMap, QuestionOutcome, QuestionReview, Quiz, ScoreResult};

/// Scores `answers` against the correct options of `quiz`.
pub fn score(quiz: &Quiz, answers: &AnswerMap) -> ScoreResult {
    let total_questions = quiz.total_questions();
    let correct_count = quiz
        .questions
        .iter()
        .filter(|q| answers.get(&q.id) == Some(&q.correct_option_id))
        .count();
    let score_percent = percent_half_up(correct_count, total_questions);

    ScoreResult {
        correct_count,
        total_questions,
        score_percent,
        passed: score_percent >= quiz.passing_score_percent,
    }
}

/// Builds the per-question breakdown in quiz order.
pub fn review(quiz: &Quiz, answers: &AnswerMap) -> Vec<QuestionReview> {
    quiz.questions
        .iter()
        .map(|q| {
            let selected = answers.get(&q.id).cloned();
            let outcome = match &selected {
                None => QuestionOutcome::Unanswered,
                Some(option_id) if *option_id == q.correct_option_id => QuestionOutcome::Correct,
                Some(_) => QuestionOutcome::Incorrect,
            };
            QuestionReview {
                question_id: q.id.clone(),
                selected_option_id: selected,
                correct_option_id: q.correct_option_id.clone(),
                outcome,
            }
        })
        .collect()
}

/// `round(100 * part / whole)` with halves rounded up, in integer arithmetic.
fn percent_half_up(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    let part = part.min(whole) as u64;
    let whole = whole as u64;
    ((200 * part + whole) / (2 * whole)) as u8
}

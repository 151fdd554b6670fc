//! crates/quiz_core/src/domain.rs
//!
//! Defines the pure, core data structures for quizzes and quiz attempts.
//! These structs are independent of any database or serialization format.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::QuizValidationError;

/// Chosen option per question. A missing key means the question is unanswered.
pub type AnswerMap = BTreeMap<String, String>;

/// Questions the user marked for later review.
pub type FlagSet = BTreeSet<String>;

/// A single selectable answer of a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizOption {
    pub id: String,
    pub text: String,
}

/// A single-choice question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub options: Vec<QuizOption>,
    pub correct_option_id: String,
}

impl Question {
    pub fn has_option(&self, option_id: &str) -> bool {
        self.options.iter().any(|o| o.id == option_id)
    }
}

/// A quiz definition as supplied by the course service.
///
/// The order of `questions` is both the navigation order and the order
/// used when reviewing results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub time_limit_minutes: u32,
    pub passing_score_percent: u8,
    pub questions: Vec<Question>,
}

impl Quiz {
    /// Largest time limit whose length in seconds still fits a signed 32-bit column.
    pub const MAX_TIME_LIMIT_MINUTES: u32 = i32::MAX as u32 / 60;

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    pub fn time_limit_seconds(&self) -> u32 {
        self.time_limit_minutes.saturating_mul(60)
    }

    /// Checks the data-integrity rules a quiz must satisfy before a session
    /// can be built on top of it.
    pub fn validate(&self) -> Result<(), QuizValidationError> {
        if self.questions.is_empty() {
            return Err(QuizValidationError::NoQuestions);
        }
        if self.time_limit_minutes > Self::MAX_TIME_LIMIT_MINUTES {
            return Err(QuizValidationError::TimeLimitTooLarge(self.time_limit_minutes));
        }
        if self.passing_score_percent > 100 {
            return Err(QuizValidationError::PassingScoreOutOfRange(
                self.passing_score_percent,
            ));
        }

        let mut seen_questions = HashSet::new();
        for question in &self.questions {
            if !seen_questions.insert(question.id.as_str()) {
                return Err(QuizValidationError::DuplicateQuestion(question.id.clone()));
            }

            let mut seen_options = HashSet::new();
            for option in &question.options {
                if !seen_options.insert(option.id.as_str()) {
                    return Err(QuizValidationError::DuplicateOption {
                        question_id: question.id.clone(),
                        option_id: option.id.clone(),
                    });
                }
            }

            if !question.has_option(&question.correct_option_id) {
                return Err(QuizValidationError::CorrectOptionMissing {
                    question_id: question.id.clone(),
                    option_id: question.correct_option_id.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> QuizSummary {
        QuizSummary {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            time_limit_minutes: self.time_limit_minutes,
            passing_score_percent: self.passing_score_percent,
            question_count: self.questions.len(),
        }
    }
}

/// Catalog listing entry for a quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSummary {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub time_limit_minutes: u32,
    pub passing_score_percent: u8,
    pub question_count: usize,
}

/// Outcome of scoring an answer map against a quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreResult {
    pub correct_count: usize,
    pub total_questions: usize,
    pub score_percent: u8,
    pub passed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionOutcome {
    Correct,
    Incorrect,
    Unanswered,
}

/// Per-question breakdown shown when reviewing a finished attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionReview {
    pub question_id: String,
    pub selected_option_id: Option<String>,
    pub correct_option_id: String,
    pub outcome: QuestionOutcome,
}

/// Why an attempt moved into the result phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionTrigger {
    Manual,
    TimeExpired,
}

impl SubmissionTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionTrigger::Manual => "manual",
            SubmissionTrigger::TimeExpired => "time_expired",
        }
    }
}

impl std::str::FromStr for SubmissionTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(SubmissionTrigger::Manual),
            "time_expired" => Ok(SubmissionTrigger::TimeExpired),
            other => Err(format!("unknown submission trigger '{}'", other)),
        }
    }
}

/// A finished attempt as handed to the course service for progress tracking.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub quiz_id: Uuid,
    pub score: ScoreResult,
    pub answers: AnswerMap,
    pub flags: FlagSet,
    pub trigger: SubmissionTrigger,
    pub time_remaining_seconds: u32,
    pub completed_at: DateTime<Utc>,
}

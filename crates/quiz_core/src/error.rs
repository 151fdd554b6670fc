//! crates/quiz_core/src/error.rs
//!
//! Error types raised by quiz validation and the session engine.

/// Reasons a quiz definition cannot be used to run a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuizValidationError {
    #[error("quiz has no questions")]
    NoQuestions,
    #[error("question id '{0}' appears more than once")]
    DuplicateQuestion(String),
    #[error("option id '{option_id}' appears more than once in question '{question_id}'")]
    DuplicateOption {
        question_id: String,
        option_id: String,
    },
    #[error("correct option '{option_id}' is not an option of question '{question_id}'")]
    CorrectOptionMissing {
        question_id: String,
        option_id: String,
    },
    #[error("passing score {0}% is outside 0..=100")]
    PassingScoreOutOfRange(u8),
    #[error("time limit of {0} minutes is too large")]
    TimeLimitTooLarge(u32),
}

/// Errors returned by [`crate::engine::QuizEngine`] operations.
///
/// A rejected operation never changes the session state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("'{operation}' is not allowed during the {phase} phase")]
    InvalidTransition {
        operation: &'static str,
        phase: &'static str,
    },
    #[error("malformed quiz: {0}")]
    MalformedQuiz(#[from] QuizValidationError),
    #[error("question '{0}' is not part of this quiz")]
    UnknownQuestion(String),
    #[error("option '{option_id}' does not belong to question '{question_id}'")]
    UnknownOption {
        question_id: String,
        option_id: String,
    },
    #[error("question index {index} is out of range (quiz has {total} questions)")]
    IndexOutOfRange { index: usize, total: usize },
}

pub type EngineResult<T> = Result<T, EngineError>;

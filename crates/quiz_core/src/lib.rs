pub mod domain;
pub mod engine;
pub mod error;
pub mod ports;
pub mod scoring;

pub use domain::{
    AnswerMap, AttemptRecord, FlagSet, Question, QuestionOutcome, QuestionReview, Quiz,
    QuizOption, QuizSummary, ScoreResult, SubmissionTrigger,
};
pub use engine::{Phase, PhaseKind, QuizEngine, TickOutcome};
pub use error::{EngineError, EngineResult, QuizValidationError};
pub use ports::{DatabaseService, PortError, PortResult};

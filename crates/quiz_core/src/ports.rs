//! crates/quiz_core/src/ports.rs
//!
//! Defines the service contracts (traits) between the quiz engine and the
//! course service that owns quiz definitions and attempt history.
//! Concrete implementations live in the `api` service.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{AttemptRecord, Quiz, QuizSummary};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Stored data is invalid: {0}")]
    InvalidData(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Quiz Catalog ---
    async fn create_quiz(&self, quiz: Quiz) -> PortResult<Quiz>;

    async fn get_quiz_by_id(&self, quiz_id: Uuid) -> PortResult<Quiz>;

    async fn list_quizzes(&self) -> PortResult<Vec<QuizSummary>>;

    // --- Attempt History ---
    /// Stores a finished attempt so course progress can be derived from it.
    async fn save_attempt(&self, attempt: AttemptRecord) -> PortResult<()>;

    /// Attempts of one user, newest first, optionally restricted to one quiz.
    async fn get_attempts_for_user(
        &self,
        user_id: Uuid,
        quiz_id: Option<Uuid>,
    ) -> PortResult<Vec<AttemptRecord>>;
}

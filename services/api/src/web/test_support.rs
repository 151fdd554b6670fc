//! services/api/src/web/test_support.rs
//!
//! Test doubles shared by the web module tests.

use crate::adapters::InMemoryDb;
use async_trait::async_trait;
use quiz_core::domain::{AttemptRecord, Quiz, QuizSummary};
use quiz_core::ports::{DatabaseService, PortError, PortResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

/// An in-memory store whose first `failures` calls to `save_attempt` fail.
#[derive(Default)]
pub struct FlakyDb {
    inner: InMemoryDb,
    failures_left: AtomicUsize,
}

impl FlakyDb {
    pub fn failing(failures: usize) -> Self {
        Self {
            inner: InMemoryDb::new(),
            failures_left: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl DatabaseService for FlakyDb {
    async fn create_quiz(&self, quiz: Quiz) -> PortResult<Quiz> {
        self.inner.create_quiz(quiz).await
    }

    async fn get_quiz_by_id(&self, quiz_id: Uuid) -> PortResult<Quiz> {
        self.inner.get_quiz_by_id(quiz_id).await
    }

    async fn list_quizzes(&self) -> PortResult<Vec<QuizSummary>> {
        self.inner.list_quizzes().await
    }

    async fn save_attempt(&self, attempt: AttemptRecord) -> PortResult<()> {
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(PortError::Unexpected("connection reset".to_string()));
        }
        self.inner.save_attempt(attempt).await
    }

    async fn get_attempts_for_user(
        &self,
        user_id: Uuid,
        quiz_id: Option<Uuid>,
    ) -> PortResult<Vec<AttemptRecord>> {
        self.inner.get_attempts_for_user(user_id, quiz_id).await
    }
}

//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the `DatabaseService` port. Used when no
//! `DATABASE_URL` is configured and by the test suite.

use async_trait::async_trait;
use quiz_core::domain::{AttemptRecord, Quiz, QuizSummary};
use quiz_core::ports::{DatabaseService, PortError, PortResult};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryDb {
    /// Quizzes in insertion order, mirroring `ORDER BY created_at`.
    quizzes: RwLock<Vec<Quiz>>,
    attempts: RwLock<HashMap<Uuid, Vec<AttemptRecord>>>,
}

impl InMemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn create_quiz(&self, quiz: Quiz) -> PortResult<Quiz> {
        let mut quizzes = self.quizzes.write().await;
        if quizzes.iter().any(|q| q.id == quiz.id) {
            return Err(PortError::InvalidData(format!(
                "Quiz {} already exists",
                quiz.id
            )));
        }
        quizzes.push(quiz.clone());
        Ok(quiz)
    }

    async fn get_quiz_by_id(&self, quiz_id: Uuid) -> PortResult<Quiz> {
        self.quizzes
            .read()
            .await
            .iter()
            .find(|q| q.id == quiz_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Quiz {} not found", quiz_id)))
    }

    async fn list_quizzes(&self) -> PortResult<Vec<QuizSummary>> {
        Ok(self.quizzes.read().await.iter().map(Quiz::summary).collect())
    }

    async fn save_attempt(&self, attempt: AttemptRecord) -> PortResult<()> {
        self.attempts
            .write()
            .await
            .entry(attempt.user_id)
            .or_default()
            .push(attempt);
        Ok(())
    }

    async fn get_attempts_for_user(
        &self,
        user_id: Uuid,
        quiz_id: Option<Uuid>,
    ) -> PortResult<Vec<AttemptRecord>> {
        let attempts = self.attempts.read().await;
        let mut found: Vec<AttemptRecord> = attempts
            .get(&user_id)
            .into_iter()
            .flatten()
            .filter(|a| quiz_id.map_or(true, |id| a.quiz_id == id))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(found)
    }
}

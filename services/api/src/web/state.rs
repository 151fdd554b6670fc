//! services/api/src/web/state.rs
//!
//! Defines the application's shared and session-specific states.

use crate::config::Config;
use crate::web::protocol::ServerMessage;
use axum::extract::ws::Message;
use chrono::Utc;
use futures::{Sink, SinkExt};
use quiz_core::domain::{AttemptRecord, Quiz};
use quiz_core::engine::QuizEngine;
use quiz_core::error::EngineResult;
use quiz_core::ports::{DatabaseService, PortError, PortResult};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
}

/// The outbound half of a client connection, shared between the message loop
/// and the countdown task.
pub type SharedSender<S> = Arc<Mutex<S>>;

/// Serializes a `ServerMessage` and sends it as a text frame.
pub async fn send_server_message<S>(ws_sender: &Mutex<S>, message: &ServerMessage) -> PortResult<()>
where
    S: Sink<Message> + Unpin,
{
    let json = serde_json::to_string(message).map_err(|e| PortError::Unexpected(e.to_string()))?;
    ws_sender
        .lock()
        .await
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| PortError::Unexpected("Failed to send message to client.".to_string()))
}

//=========================================================================================
// SessionState (Specific to One WebSocket Connection)
//=========================================================================================

/// The state for a single, active quiz session.
pub struct SessionState {
    pub user_id: Uuid,
    pub engine: QuizEngine,
    /// Set once the current result has been handed to the database.
    pub attempt_recorded: bool,
    /// A token to stop the countdown task of the current attempt.
    pub cancellation_token: CancellationToken,
}

impl SessionState {
    /// Creates a session in the intro phase for an already loaded quiz.
    pub fn new(user_id: Uuid, quiz: Quiz) -> EngineResult<Self> {
        Ok(Self {
            user_id,
            engine: QuizEngine::new(quiz)?,
            attempt_recorded: false,
            cancellation_token: CancellationToken::new(),
        })
    }

    pub fn quiz_id(&self) -> Uuid {
        self.engine.quiz().id
    }

    /// Stops the countdown and hands out a fresh token for the next attempt.
    pub fn reset_countdown(&mut self) -> CancellationToken {
        self.cancellation_token.cancel();
        self.cancellation_token = CancellationToken::new();
        self.cancellation_token.clone()
    }

    /// Persists the finished attempt, once per result.
    ///
    /// Returns `None` when there is no result yet or it was already saved.
    pub async fn record_completion(
        &mut self,
        db: &dyn DatabaseService,
    ) -> PortResult<Option<AttemptRecord>> {
        if self.attempt_recorded {
            return Ok(None);
        }
        let (Some(score), Some(trigger)) = (self.engine.score(), self.engine.trigger()) else {
            return Ok(None);
        };

        let record = AttemptRecord {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            quiz_id: self.quiz_id(),
            score,
            answers: self.engine.answers().cloned().unwrap_or_default(),
            flags: self.engine.flags().cloned().unwrap_or_default(),
            trigger,
            time_remaining_seconds: self.engine.time_remaining_seconds(),
            completed_at: Utc::now(),
        };
        db.save_attempt(record.clone()).await?;
        self.attempt_recorded = true;

        info!(
            "Recorded attempt {} for user {} on quiz {}: {}% ({})",
            record.id,
            record.user_id,
            record.quiz_id,
            record.score.score_percent,
            if record.score.passed { "passed" } else { "failed" }
        );
        Ok(Some(record))
    }
}

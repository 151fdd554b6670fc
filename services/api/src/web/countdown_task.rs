//! services/api/src/web/countdown_task.rs
//!
//! This module contains the asynchronous "worker" function that drives the quiz
//! countdown. It lives exactly as long as the Taking phase of one attempt.

use crate::web::{
    protocol::{CompletedView, ServerMessage},
    state::{send_server_message, AppState, SessionState, SharedSender},
};
use axum::extract::ws::Message;
use futures::Sink;
use quiz_core::engine::TickOutcome;
use quiz_core::ports::PortResult;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Calls `tick()` on the session once per configured interval until the
/// countdown expires, the session leaves the Taking phase, or the token is
/// cancelled.
///
/// On expiry the attempt is recorded and the result is pushed to the client.
pub async fn countdown_process<S>(
    app_state: Arc<AppState>,
    session_state_lock: Arc<Mutex<SessionState>>,
    ws_sender: SharedSender<S>,
    cancellation_token: CancellationToken,
) -> PortResult<()>
where
    S: Sink<Message> + Unpin + Send,
{
    let period = app_state.config.tick_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("Countdown started.");

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!("Countdown cancelled.");
                return Ok(());
            }
            _ = ticker.tick() => {}
        }

        let mut session = session_state_lock.lock().await;
        // A submit or retry may have won the race for the lock.
        if cancellation_token.is_cancelled() {
            info!("Countdown cancelled.");
            return Ok(());
        }

        let mut messages = Vec::with_capacity(2);
        let finished = match session.engine.tick() {
            TickOutcome::Running {
                time_remaining_seconds,
            } => {
                messages.push(ServerMessage::Tick {
                    time_remaining_seconds,
                });
                false
            }
            TickOutcome::Expired(score) => {
                info!(
                    "Time expired for quiz {}: {} of {} correct.",
                    session.quiz_id(),
                    score.correct_count,
                    score.total_questions
                );
                let saved = session.record_completion(app_state.db.as_ref()).await;
                let Some(view) = CompletedView::from_engine(&session.engine) else {
                    return Ok(());
                };
                messages.push(ServerMessage::Completed(view));
                if let Err(e) = saved {
                    error!("Failed to record timed-out attempt: {:?}", e);
                    messages.push(ServerMessage::attempt_not_saved());
                }
                true
            }
            TickOutcome::Inactive => {
                info!("Session left the taking phase. Ending countdown.");
                return Ok(());
            }
        };

        // Sent under the session lock so no reply to a later intent can overtake it.
        for message in &messages {
            if let Err(e) = send_server_message(&ws_sender, message).await {
                error!("Failed to send countdown update to client. Ending countdown task.");
                return Err(e);
            }
        }
        drop(session);

        if finished {
            info!("Countdown finished.");
            return Ok(());
        }
    }
}

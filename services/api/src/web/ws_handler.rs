//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! It owns one quiz session, forwards client intents to the engine and starts
//! or stops the countdown task.

use crate::web::{
    countdown_task::countdown_process,
    protocol::{ClientMessage, CompletedView, PublicQuiz, ServerMessage},
    state::{send_server_message, AppState, SessionState, SharedSender},
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{Sink, StreamExt};
use quiz_core::engine::QuizEngine;
use quiz_core::error::EngineResult;
use std::sync::Arc;
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{error, info, warn};
use uuid::Uuid;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user_id))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user_id: Uuid) {
    info!("New WebSocket connection established for user: {}", user_id);

    // The sender is wrapped in an Arc<Mutex<>> to allow for shared mutable access across tasks.
    let (sender, mut receiver) = socket.split();
    let ws_sender = Arc::new(Mutex::new(sender));

    // --- 1. Initialization Phase ---
    let session_state_lock = match receiver.next().await {
        Some(Ok(Message::Text(init_json))) => {
            match serde_json::from_str::<ClientMessage>(init_json.as_str()) {
                Ok(ClientMessage::Init { quiz_id }) => {
                    match init_session(&app_state, &ws_sender, user_id, quiz_id).await {
                        Some(lock) => lock,
                        None => return,
                    }
                }
                _ => {
                    error!("First message was not a valid Init message.");
                    return;
                }
            }
        }
        _ => {
            error!("Client disconnected before sending Init message.");
            return;
        }
    };

    // --- 2. Main Message Loop ---
    let mut countdown_handle: Option<JoinHandle<()>> = None;

    loop {
        if let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
                    Ok(client_msg) => {
                        handle_client_message(
                            client_msg,
                            &app_state,
                            &session_state_lock,
                            &ws_sender,
                            &mut countdown_handle,
                        )
                        .await;
                    }
                    Err(e) => {
                        warn!("Failed to deserialize client message: {}", e);
                        reply_error(&ws_sender, format!("Invalid message: {}", e)).await;
                    }
                },
                Message::Close(_) => {
                    info!("Client sent close message.");
                    break;
                }
                _ => {}
            }
        } else {
            info!("Client disconnected.");
            break;
        }
    }

    // --- 3. Cleanup ---
    session_state_lock.lock().await.cancellation_token.cancel();
    if let Some(handle) = countdown_handle {
        handle.abort();
    }
    info!("WebSocket connection closed.");
}

/// Loads the quiz, builds the session and confirms it to the client.
async fn init_session<S>(
    app_state: &Arc<AppState>,
    ws_sender: &SharedSender<S>,
    user_id: Uuid,
    quiz_id: Uuid,
) -> Option<Arc<Mutex<SessionState>>>
where
    S: Sink<Message> + Unpin,
{
    info!("Initializing quiz session for quiz: {}", quiz_id);

    let quiz = match app_state.db.get_quiz_by_id(quiz_id).await {
        Ok(quiz) => quiz,
        Err(e) => {
            error!("Failed to load quiz {}: {:?}", quiz_id, e);
            reply_error(ws_sender, "Failed to load quiz data.".to_string()).await;
            return None;
        }
    };
    let public_quiz = PublicQuiz::from(&quiz);

    let session = match SessionState::new(user_id, quiz) {
        Ok(session) => session,
        Err(e) => {
            error!("Quiz {} cannot be taken: {}", quiz_id, e);
            reply_error(ws_sender, format!("Quiz cannot be taken: {}", e)).await;
            return None;
        }
    };

    let init_msg = ServerMessage::SessionInitialized {
        quiz: public_quiz,
        snapshot: (&session.engine).into(),
    };
    if send_server_message(ws_sender, &init_msg).await.is_err() {
        error!("Failed to send session initialized message.");
        return None;
    }
    Some(Arc::new(Mutex::new(session)))
}

/// Applies one client intent to the session and answers with the new state.
///
/// Intents the engine rejects leave the session untouched and are answered
/// with an `Error` message. Replies are sent while the session lock is held,
/// so they reach the client in the same order as the state changes.
pub async fn handle_client_message<S>(
    client_msg: ClientMessage,
    app_state: &Arc<AppState>,
    session_state_lock: &Arc<Mutex<SessionState>>,
    ws_sender: &SharedSender<S>,
    countdown_handle: &mut Option<JoinHandle<()>>,
) where
    S: Sink<Message> + Unpin + Send + 'static,
{
    let mut session = session_state_lock.lock().await;
    let mut save_failed = false;

    let reply = match client_msg {
        ClientMessage::Init { .. } => {
            warn!("Received subsequent Init message, which is ignored.");
            return;
        }
        ClientMessage::Start => match session.engine.start() {
            Ok(()) => {
                info!("Quiz {} started by user {}.", session.quiz_id(), session.user_id);
                let token = session.reset_countdown();
                let task = {
                    let app_state = app_state.clone();
                    let session_state_lock = session_state_lock.clone();
                    let ws_sender = ws_sender.clone();
                    tokio::spawn(async move {
                        if let Err(e) =
                            countdown_process(app_state, session_state_lock, ws_sender, token).await
                        {
                            error!("Countdown process failed: {:?}", e);
                        }
                    })
                };
                if let Some(previous) = countdown_handle.replace(task) {
                    previous.abort();
                }
                Ok(snapshot(&session.engine))
            }
            Err(e) => Err(e),
        },
        ClientMessage::SelectAnswer {
            question_id,
            option_id,
        } => session
            .engine
            .select_answer(&question_id, &option_id)
            .map(|_| snapshot(&session.engine)),
        ClientMessage::ToggleFlag { question_id } => session
            .engine
            .toggle_flag(&question_id)
            .map(|_| snapshot(&session.engine)),
        ClientMessage::GoTo { index } => apply(&mut session.engine, |e| e.go_to(index)),
        ClientMessage::Next => apply(&mut session.engine, QuizEngine::next),
        ClientMessage::Previous => apply(&mut session.engine, QuizEngine::previous),
        ClientMessage::Submit => match session.engine.submit() {
            Ok(_) => {
                session.cancellation_token.cancel();
                if let Err(e) = session.record_completion(app_state.db.as_ref()).await {
                    error!("Failed to record submitted attempt: {:?}", e);
                    save_failed = true;
                }
                Ok(CompletedView::from_engine(&session.engine)
                    .map(ServerMessage::Completed)
                    .unwrap_or_else(|| snapshot(&session.engine)))
            }
            Err(e) => Err(e),
        },
        // A finished attempt that is still unsaved must be stored before it is discarded.
        ClientMessage::Retry => match session.record_completion(app_state.db.as_ref()).await {
            Err(e) => {
                error!("Failed to record attempt before retry: {:?}", e);
                Ok(ServerMessage::attempt_not_saved())
            }
            Ok(_) => match session.engine.retry() {
                Ok(()) => {
                    info!("Quiz {} reset for retry by user {}.", session.quiz_id(), session.user_id);
                    session.reset_countdown();
                    session.attempt_recorded = false;
                    if let Some(previous) = countdown_handle.take() {
                        previous.abort();
                    }
                    Ok(snapshot(&session.engine))
                }
                Err(e) => Err(e),
            },
        },
    };

    let message = match reply {
        Ok(message) => message,
        Err(e) => {
            warn!("Rejected client intent: {}", e);
            ServerMessage::Error {
                message: e.to_string(),
            }
        }
    };
    if send_server_message(ws_sender, &message).await.is_err() {
        error!("Failed to send reply to client.");
        return;
    }
    if save_failed
        && send_server_message(ws_sender, &ServerMessage::attempt_not_saved())
            .await
            .is_err()
    {
        error!("Failed to send save failure to client.");
    }
}

fn apply<F>(engine: &mut QuizEngine, op: F) -> EngineResult<ServerMessage>
where
    F: FnOnce(&mut QuizEngine) -> EngineResult<()>,
{
    op(engine)?;
    Ok(snapshot(engine))
}

fn snapshot(engine: &QuizEngine) -> ServerMessage {
    ServerMessage::Snapshot(engine.into())
}

async fn reply_error<S>(ws_sender: &SharedSender<S>, message: String)
where
    S: Sink<Message> + Unpin,
{
    let err_msg = ServerMessage::Error { message };
    if send_server_message(ws_sender, &err_msg).await.is_err() {
        error!("Failed to send error message to client.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryDb;
    use crate::config::Config;
    use crate::web::test_support::FlakyDb;
    use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
    use quiz_core::domain::{Question, Quiz, QuizOption};
    use quiz_core::engine::PhaseKind;
    use quiz_core::ports::DatabaseService;
    use serde_json::Value;

    struct Harness {
        app_state: Arc<AppState>,
        db: Arc<dyn DatabaseService>,
        user_id: Uuid,
        session: Arc<Mutex<SessionState>>,
        sender: SharedSender<UnboundedSender<Message>>,
        receiver: UnboundedReceiver<Message>,
        countdown: Option<JoinHandle<()>>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_db(Arc::new(InMemoryDb::new()))
        }

        fn with_db(db: Arc<dyn DatabaseService>) -> Self {
            let quiz = Quiz {
                id: Uuid::new_v4(),
                title: "Error handling".to_string(),
                description: String::new(),
                time_limit_minutes: 5,
                passing_score_percent: 50,
                questions: (1..=2)
                    .map(|i| Question {
                        id: format!("q{}", i),
                        text: format!("Question {}", i),
                        options: vec![
                            QuizOption {
                                id: "ok".to_string(),
                                text: "Result".to_string(),
                            },
                            QuizOption {
                                id: "panic".to_string(),
                                text: "panic!".to_string(),
                            },
                        ],
                        correct_option_id: "ok".to_string(),
                    })
                    .collect(),
            };
            let app_state = Arc::new(AppState {
                db: db.clone(),
                config: Arc::new(Config::default()),
            });
            let user_id = Uuid::new_v4();
            let session = Arc::new(Mutex::new(SessionState::new(user_id, quiz).unwrap()));
            let (tx, rx) = mpsc::unbounded::<Message>();
            Self {
                app_state,
                db,
                user_id,
                session,
                sender: Arc::new(Mutex::new(tx)),
                receiver: rx,
                countdown: None,
            }
        }

        async fn send(&mut self, msg: ClientMessage) -> Value {
            handle_client_message(
                msg,
                &self.app_state,
                &self.session,
                &self.sender,
                &mut self.countdown,
            )
            .await;
            self.next_reply()
        }

        fn next_reply(&mut self) -> Value {
            match self.receiver.try_next() {
                Ok(Some(Message::Text(text))) => serde_json::from_str(text.as_str()).unwrap(),
                other => panic!("expected a text reply, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_full_attempt_over_the_protocol() {
        let mut h = Harness::new();

        let reply = h.send(ClientMessage::Start).await;
        assert_eq!(reply["type"], "snapshot");
        assert_eq!(reply["phase"], "taking");
        assert!(h.countdown.is_some());

        let reply = h
            .send(ClientMessage::SelectAnswer {
                question_id: "q1".to_string(),
                option_id: "ok".to_string(),
            })
            .await;
        assert_eq!(reply["answers"]["q1"], "ok");

        let reply = h.send(ClientMessage::Next).await;
        assert_eq!(reply["current_question_index"], 1);
        let reply = h
            .send(ClientMessage::ToggleFlag {
                question_id: "q2".to_string(),
            })
            .await;
        assert_eq!(reply["flags"][0], "q2");

        let reply = h.send(ClientMessage::Submit).await;
        assert_eq!(reply["type"], "completed");
        assert_eq!(reply["score"]["score_percent"], 50);
        assert_eq!(reply["score"]["passed"], true);
        assert_eq!(reply["review"][1]["outcome"], "unanswered");
        assert!(h.session.lock().await.cancellation_token.is_cancelled());

        // A second submit repeats the result but records nothing new.
        let again = h.send(ClientMessage::Submit).await;
        assert_eq!(again["score"], reply["score"]);
        let attempts = h.db.get_attempts_for_user(h.user_id, None).await.unwrap();
        assert_eq!(attempts.len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_intents_report_errors() {
        let mut h = Harness::new();

        let reply = h
            .send(ClientMessage::SelectAnswer {
                question_id: "q1".to_string(),
                option_id: "ok".to_string(),
            })
            .await;
        assert_eq!(reply["type"], "error");

        h.send(ClientMessage::Start).await;
        let reply = h.send(ClientMessage::GoTo { index: 7 }).await;
        assert_eq!(reply["type"], "error");
        let reply = h
            .send(ClientMessage::SelectAnswer {
                question_id: "q1".to_string(),
                option_id: "unwrap".to_string(),
            })
            .await;
        assert_eq!(reply["type"], "error");
        assert_eq!(h.session.lock().await.engine.answered_count(), 0);

        let reply = h.send(ClientMessage::Retry).await;
        assert_eq!(reply["type"], "error");
        assert_eq!(h.session.lock().await.engine.phase_kind(), PhaseKind::Taking);
    }

    #[tokio::test]
    async fn test_retry_allows_a_second_recorded_attempt() {
        let mut h = Harness::new();
        h.send(ClientMessage::Start).await;
        h.send(ClientMessage::Submit).await;

        let reply = h.send(ClientMessage::Retry).await;
        assert_eq!(reply["phase"], "intro");
        assert_eq!(reply["answers"], serde_json::json!({}));
        assert!(h.countdown.is_none());

        h.send(ClientMessage::Start).await;
        h.send(ClientMessage::SelectAnswer {
            question_id: "q2".to_string(),
            option_id: "ok".to_string(),
        })
        .await;
        let reply = h.send(ClientMessage::Submit).await;
        assert_eq!(reply["score"]["correct_count"], 1);

        let attempts = h.db.get_attempts_for_user(h.user_id, None).await.unwrap();
        assert_eq!(attempts.len(), 2);
    }

    #[tokio::test]
    async fn test_unsaved_attempt_is_reported_and_saved_before_retry() {
        let mut h = Harness::with_db(Arc::new(FlakyDb::failing(2)));
        h.send(ClientMessage::Start).await;
        h.send(ClientMessage::SelectAnswer {
            question_id: "q1".to_string(),
            option_id: "ok".to_string(),
        })
        .await;

        let reply = h.send(ClientMessage::Submit).await;
        assert_eq!(reply["type"], "completed");
        let notice = h.next_reply();
        assert_eq!(notice["type"], "error");
        assert!(!h.session.lock().await.attempt_recorded);

        // The save fails again, so the result is kept.
        let reply = h.send(ClientMessage::Retry).await;
        assert_eq!(reply["type"], "error");
        assert_eq!(h.session.lock().await.engine.phase_kind(), PhaseKind::Result);
        let attempts = h.db.get_attempts_for_user(h.user_id, None).await.unwrap();
        assert!(attempts.is_empty());

        let reply = h.send(ClientMessage::Retry).await;
        assert_eq!(reply["type"], "snapshot");
        assert_eq!(reply["phase"], "intro");
        assert!(h.receiver.try_next().is_err());

        let attempts = h.db.get_attempts_for_user(h.user_id, None).await.unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].answers.get("q1").map(String::as_str), Some("ok"));
        assert_eq!(attempts[0].score.correct_count, 1);
    }
}

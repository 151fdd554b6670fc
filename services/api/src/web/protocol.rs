//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API
//! server for a live quiz session, plus the view structs shared with the REST API.

use quiz_core::domain::{
    QuestionOutcome, QuestionReview, Quiz, QuizSummary, ScoreResult, SubmissionTrigger,
};
use quiz_core::engine::{PhaseKind, QuizEngine};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Opens a quiz session. This must be the first message sent on the connection.
    Init { quiz_id: Uuid },

    /// Leaves the intro screen and starts the countdown.
    Start,

    SelectAnswer {
        question_id: String,
        option_id: String,
    },

    ToggleFlag { question_id: String },

    /// Jumps to an arbitrary question from the navigator.
    GoTo { index: usize },

    Next,

    Previous,

    Submit,

    /// Discards the finished attempt and returns to the intro screen.
    Retry,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the session was created. Correct answers are never included.
    SessionInitialized {
        quiz: PublicQuiz,
        snapshot: SessionSnapshot,
    },

    /// Full session state after any accepted client intent.
    Snapshot(SessionSnapshot),

    /// One countdown step while the quiz is being taken.
    Tick { time_remaining_seconds: u32 },

    /// The attempt finished, either on submit or because time ran out.
    Completed(CompletedView),

    /// Reports an error to the client. Rejected intents do not end the session.
    Error { message: String },
}

impl ServerMessage {
    /// Follows a `Completed` message whose attempt could not be stored.
    pub fn attempt_not_saved() -> Self {
        ServerMessage::Error {
            message: "The attempt could not be saved. Submit again to retry saving it.".to_string(),
        }
    }
}

//=========================================================================================
// View Structs
//=========================================================================================

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PhaseView {
    Intro,
    Taking,
    Result,
}

impl From<PhaseKind> for PhaseView {
    fn from(kind: PhaseKind) -> Self {
        match kind {
            PhaseKind::Intro => PhaseView::Intro,
            PhaseKind::Taking => PhaseView::Taking,
            PhaseKind::Result => PhaseView::Result,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TriggerView {
    Manual,
    TimeExpired,
}

impl From<SubmissionTrigger> for TriggerView {
    fn from(trigger: SubmissionTrigger) -> Self {
        match trigger {
            SubmissionTrigger::Manual => TriggerView::Manual,
            SubmissionTrigger::TimeExpired => TriggerView::TimeExpired,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeView {
    Correct,
    Incorrect,
    Unanswered,
}

impl From<QuestionOutcome> for OutcomeView {
    fn from(outcome: QuestionOutcome) -> Self {
        match outcome {
            QuestionOutcome::Correct => OutcomeView::Correct,
            QuestionOutcome::Incorrect => OutcomeView::Incorrect,
            QuestionOutcome::Unanswered => OutcomeView::Unanswered,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct ScoreView {
    pub correct_count: usize,
    pub total_questions: usize,
    pub score_percent: u8,
    pub passed: bool,
}

impl From<ScoreResult> for ScoreView {
    fn from(score: ScoreResult) -> Self {
        Self {
            correct_count: score.correct_count,
            total_questions: score.total_questions,
            score_percent: score.score_percent,
            passed: score.passed,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct ReviewEntry {
    pub question_id: String,
    pub selected_option_id: Option<String>,
    pub correct_option_id: String,
    pub outcome: OutcomeView,
}

impl From<QuestionReview> for ReviewEntry {
    fn from(review: QuestionReview) -> Self {
        Self {
            question_id: review.question_id,
            selected_option_id: review.selected_option_id,
            correct_option_id: review.correct_option_id,
            outcome: review.outcome.into(),
        }
    }
}

/// What the presentation layer needs to render the current screen.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct SessionSnapshot {
    pub phase: PhaseView,
    pub current_question_index: usize,
    pub time_remaining_seconds: u32,
    pub total_questions: usize,
    pub answers: BTreeMap<String, String>,
    pub flags: Vec<String>,
    pub score: Option<ScoreView>,
}

impl From<&QuizEngine> for SessionSnapshot {
    fn from(engine: &QuizEngine) -> Self {
        Self {
            phase: engine.phase_kind().into(),
            current_question_index: engine.current_question_index(),
            time_remaining_seconds: engine.time_remaining_seconds(),
            total_questions: engine.quiz().total_questions(),
            answers: engine.answers().cloned().unwrap_or_default(),
            flags: engine
                .flags()
                .map(|f| f.iter().cloned().collect())
                .unwrap_or_default(),
            score: engine.score().map(ScoreView::from),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct CompletedView {
    pub score: ScoreView,
    pub trigger: TriggerView,
    pub answers: BTreeMap<String, String>,
    pub review: Vec<ReviewEntry>,
}

impl CompletedView {
    /// Builds the result view, or `None` when the engine has no result yet.
    pub fn from_engine(engine: &QuizEngine) -> Option<Self> {
        Some(Self {
            score: engine.score()?.into(),
            trigger: engine.trigger()?.into(),
            answers: engine.answers().cloned().unwrap_or_default(),
            review: engine
                .review()?
                .into_iter()
                .map(ReviewEntry::from)
                .collect(),
        })
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct OptionView {
    pub id: String,
    pub text: String,
}

/// A question as shown to a student: no correct option.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct PublicQuestion {
    pub id: String,
    pub text: String,
    pub options: Vec<OptionView>,
}

/// A quiz as shown to a student: no correct options.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct PublicQuiz {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub time_limit_minutes: u32,
    pub passing_score_percent: u8,
    pub questions: Vec<PublicQuestion>,
}

impl From<&Quiz> for PublicQuiz {
    fn from(quiz: &Quiz) -> Self {
        Self {
            id: quiz.id,
            title: quiz.title.clone(),
            description: quiz.description.clone(),
            time_limit_minutes: quiz.time_limit_minutes,
            passing_score_percent: quiz.passing_score_percent,
            questions: quiz
                .questions
                .iter()
                .map(|q| PublicQuestion {
                    id: q.id.clone(),
                    text: q.text.clone(),
                    options: q
                        .options
                        .iter()
                        .map(|o| OptionView {
                            id: o.id.clone(),
                            text: o.text.clone(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct QuizSummaryView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub time_limit_minutes: u32,
    pub passing_score_percent: u8,
    pub question_count: usize,
}

impl From<QuizSummary> for QuizSummaryView {
    fn from(summary: QuizSummary) -> Self {
        Self {
            id: summary.id,
            title: summary.title,
            description: summary.description,
            time_limit_minutes: summary.time_limit_minutes,
            passing_score_percent: summary.passing_score_percent,
            question_count: summary.question_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::domain::{Question, QuizOption};
    use serde_json::json;

    fn engine() -> QuizEngine {
        QuizEngine::new(Quiz {
            id: Uuid::nil(),
            title: "Traits".to_string(),
            description: String::new(),
            time_limit_minutes: 2,
            passing_score_percent: 50,
            questions: vec![Question {
                id: "q1".to_string(),
                text: "Which keyword declares a trait?".to_string(),
                options: vec![
                    QuizOption {
                        id: "a".to_string(),
                        text: "trait".to_string(),
                    },
                    QuizOption {
                        id: "b".to_string(),
                        text: "impl".to_string(),
                    },
                ],
                correct_option_id: "a".to_string(),
            }],
        })
        .unwrap()
    }

    #[test]
    fn test_client_messages_parse() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"select_answer","question_id":"q1","option_id":"b"}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::SelectAnswer {
                question_id: "q1".to_string(),
                option_id: "b".to_string()
            }
        );
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"go_to","index":3}"#).unwrap();
        assert_eq!(msg, ClientMessage::GoTo { index: 3 });
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"cheat"}"#).is_err());
    }

    #[test]
    fn test_public_quiz_hides_correct_answers() {
        let engine = engine();
        let value = serde_json::to_value(PublicQuiz::from(engine.quiz())).unwrap();
        assert!(!value.to_string().contains("correct_option_id"));
        assert_eq!(value["questions"][0]["options"][1]["text"], "impl");
    }

    #[test]
    fn test_snapshot_and_completed_shapes() {
        let mut engine = engine();
        engine.start().unwrap();
        engine.select_answer("q1", "b").unwrap();
        engine.toggle_flag("q1").unwrap();

        let snapshot = serde_json::to_value(ServerMessage::Snapshot((&engine).into())).unwrap();
        assert_eq!(snapshot["type"], "snapshot");
        assert_eq!(snapshot["phase"], "taking");
        assert_eq!(snapshot["time_remaining_seconds"], 120);
        assert_eq!(snapshot["answers"], json!({"q1": "b"}));
        assert_eq!(snapshot["flags"], json!(["q1"]));
        assert!(snapshot["score"].is_null());
        assert!(CompletedView::from_engine(&engine).is_none());

        engine.submit().unwrap();
        let completed = CompletedView::from_engine(&engine).unwrap();
        let value = serde_json::to_value(ServerMessage::Completed(completed)).unwrap();
        assert_eq!(value["type"], "completed");
        assert_eq!(value["trigger"], "manual");
        assert_eq!(value["score"]["score_percent"], 0);
        assert_eq!(value["review"][0]["outcome"], "incorrect");
        assert_eq!(value["review"][0]["correct_option_id"], "a");
    }
}

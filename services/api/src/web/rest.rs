//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::protocol::{PublicQuiz, QuizSummaryView, ScoreView, TriggerView};
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use quiz_core::domain::{AttemptRecord, Question, Quiz, QuizOption};
use quiz_core::ports::PortError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_quiz_handler,
        list_quizzes_handler,
        get_quiz_handler,
        list_attempts_handler,
    ),
    components(
        schemas(
            CreateQuizRequest,
            CreateQuestionRequest,
            CreateOptionRequest,
            QuizDetailView,
            PublicQuiz,
            QuizSummaryView,
            AttemptView,
            ScoreView,
            TriggerView,
        )
    ),
    tags(
        (name = "Quiz API", description = "Quiz catalog and attempt history for the quiz session engine.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, Serialize, ToSchema, Debug, Clone)]
pub struct CreateOptionRequest {
    pub id: String,
    pub text: String,
}

#[derive(Deserialize, Serialize, ToSchema, Debug, Clone)]
pub struct CreateQuestionRequest {
    pub id: String,
    pub text: String,
    pub options: Vec<CreateOptionRequest>,
    pub correct_option_id: String,
}

/// The payload for creating a quiz.
#[derive(Deserialize, Serialize, ToSchema, Debug, Clone)]
pub struct CreateQuizRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub time_limit_minutes: u32,
    pub passing_score_percent: u8,
    pub questions: Vec<CreateQuestionRequest>,
}

impl CreateQuizRequest {
    fn into_domain(self, id: Uuid) -> Quiz {
        Quiz {
            id,
            title: self.title,
            description: self.description,
            time_limit_minutes: self.time_limit_minutes,
            passing_score_percent: self.passing_score_percent,
            questions: self
                .questions
                .into_iter()
                .map(|q| Question {
                    id: q.id,
                    text: q.text,
                    options: q
                        .options
                        .into_iter()
                        .map(|o| QuizOption {
                            id: o.id,
                            text: o.text,
                        })
                        .collect(),
                    correct_option_id: q.correct_option_id,
                })
                .collect(),
        }
    }
}

/// The full quiz including correct options, returned to its author.
#[derive(Serialize, ToSchema, Debug)]
pub struct QuizDetailView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub time_limit_minutes: u32,
    pub passing_score_percent: u8,
    pub questions: Vec<CreateQuestionRequest>,
}

impl From<&Quiz> for QuizDetailView {
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
                .map(|q| CreateQuestionRequest {
                    id: q.id.clone(),
                    text: q.text.clone(),
                    options: q
                        .options
                        .iter()
                        .map(|o| CreateOptionRequest {
                            id: o.id.clone(),
                            text: o.text.clone(),
                        })
                        .collect(),
                    correct_option_id: q.correct_option_id.clone(),
                })
                .collect(),
        }
    }
}

/// One recorded attempt of the calling user.
#[derive(Serialize, ToSchema, Debug)]
pub struct AttemptView {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub score: ScoreView,
    pub trigger: TriggerView,
    pub answers: BTreeMap<String, String>,
    pub flags: Vec<String>,
    pub time_remaining_seconds: u32,
    pub completed_at: DateTime<Utc>,
}

impl From<AttemptRecord> for AttemptView {
    fn from(record: AttemptRecord) -> Self {
        Self {
            id: record.id,
            quiz_id: record.quiz_id,
            score: record.score.into(),
            trigger: record.trigger.into(),
            answers: record.answers,
            flags: record.flags.into_iter().collect(),
            time_remaining_seconds: record.time_remaining_seconds,
            completed_at: record.completed_at,
        }
    }
}

#[derive(Deserialize, IntoParams, Debug)]
#[into_params(parameter_in = Query)]
pub struct AttemptsQuery {
    /// Restrict the history to a single quiz.
    pub quiz_id: Option<Uuid>,
}

fn port_error_response(e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(message) => (StatusCode::NOT_FOUND, message),
        other => {
            error!("Port error while handling request: {:?}", other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Create a new quiz.
///
/// The quiz is validated before it is stored: it needs at least one question,
/// unique ids, and a correct option that belongs to each question.
#[utoipa::path(
    post,
    path = "/quizzes",
    request_body = CreateQuizRequest,
    responses(
        (status = 201, description = "Quiz created successfully", body = QuizDetailView),
        (status = 422, description = "Malformed quiz"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_quiz_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let quiz = payload.into_domain(Uuid::new_v4());
    quiz.validate()
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    let quiz = app_state
        .db
        .create_quiz(quiz)
        .await
        .map_err(port_error_response)?;
    info!("Created quiz {} ('{}')", quiz.id, quiz.title);

    Ok((StatusCode::CREATED, Json(QuizDetailView::from(&quiz))))
}

/// List all quizzes in the catalog.
#[utoipa::path(
    get,
    path = "/quizzes",
    responses(
        (status = 200, description = "Quiz catalog", body = [QuizSummaryView]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_quizzes_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<QuizSummaryView>>, (StatusCode, String)> {
    let quizzes = app_state
        .db
        .list_quizzes()
        .await
        .map_err(port_error_response)?;
    Ok(Json(quizzes.into_iter().map(QuizSummaryView::from).collect()))
}

/// Fetch a quiz as a student sees it, without the correct options.
#[utoipa::path(
    get,
    path = "/quizzes/{quiz_id}",
    responses(
        (status = 200, description = "Quiz found", body = PublicQuiz),
        (status = 404, description = "Quiz not found")
    ),
    params(
        ("quiz_id" = Uuid, Path, description = "The unique ID of the quiz.")
    )
)]
pub async fn get_quiz_handler(
    State(app_state): State<Arc<AppState>>,
    Path(quiz_id): Path<Uuid>,
) -> Result<Json<PublicQuiz>, (StatusCode, String)> {
    let quiz = app_state
        .db
        .get_quiz_by_id(quiz_id)
        .await
        .map_err(port_error_response)?;
    Ok(Json(PublicQuiz::from(&quiz)))
}

/// List the calling user's recorded attempts, newest first.
#[utoipa::path(
    get,
    path = "/attempts",
    responses(
        (status = 200, description = "Attempt history", body = [AttemptView]),
        (status = 401, description = "Missing or malformed x-user-id header"),
        (status = 500, description = "Internal server error")
    ),
    params(
        AttemptsQuery,
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn list_attempts_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(query): Query<AttemptsQuery>,
) -> Result<Json<Vec<AttemptView>>, (StatusCode, String)> {
    let attempts = app_state
        .db
        .get_attempts_for_user(user_id, query.quiz_id)
        .await
        .map_err(port_error_response)?;
    Ok(Json(attempts.into_iter().map(AttemptView::from).collect()))
}

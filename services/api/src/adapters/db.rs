//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::domain::{
    AnswerMap, AttemptRecord, FlagSet, Question, Quiz, QuizOption, QuizSummary, ScoreResult,
    SubmissionTrigger,
};
use quiz_core::ports::{DatabaseService, PortError, PortResult};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

/// JSONB shape of one question inside `quizzes.questions`.
#[derive(Serialize, Deserialize)]
struct StoredQuestion {
    id: String,
    text: String,
    options: Vec<StoredOption>,
    correct_option_id: String,
}

#[derive(Serialize, Deserialize)]
struct StoredOption {
    id: String,
    text: String,
}

impl From<&Question> for StoredQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id.clone(),
            text: q.text.clone(),
            options: q
                .options
                .iter()
                .map(|o| StoredOption {
                    id: o.id.clone(),
                    text: o.text.clone(),
                })
                .collect(),
            correct_option_id: q.correct_option_id.clone(),
        }
    }
}

impl StoredQuestion {
    fn to_domain(self) -> Question {
        Question {
            id: self.id,
            text: self.text,
            options: self
                .options
                .into_iter()
                .map(|o| QuizOption {
                    id: o.id,
                    text: o.text,
                })
                .collect(),
            correct_option_id: self.correct_option_id,
        }
    }
}

#[derive(FromRow)]
struct QuizRecord {
    id: Uuid,
    title: String,
    description: String,
    time_limit_minutes: i32,
    passing_score_percent: i16,
    questions: Json<Vec<StoredQuestion>>,
}
impl QuizRecord {
    fn to_domain(self) -> Quiz {
        Quiz {
            id: self.id,
            title: self.title,
            description: self.description,
            time_limit_minutes: self.time_limit_minutes.max(0) as u32,
            passing_score_percent: self.passing_score_percent.clamp(0, 100) as u8,
            questions: self
                .questions
                .0
                .into_iter()
                .map(StoredQuestion::to_domain)
                .collect(),
        }
    }
}

#[derive(FromRow)]
struct QuizSummaryRecord {
    id: Uuid,
    title: String,
    description: String,
    time_limit_minutes: i32,
    passing_score_percent: i16,
    question_count: i32,
}
impl QuizSummaryRecord {
    fn to_domain(self) -> QuizSummary {
        QuizSummary {
            id: self.id,
            title: self.title,
            description: self.description,
            time_limit_minutes: self.time_limit_minutes.max(0) as u32,
            passing_score_percent: self.passing_score_percent.clamp(0, 100) as u8,
            question_count: self.question_count.max(0) as usize,
        }
    }
}

#[derive(FromRow)]
struct AttemptRecordRow {
    id: Uuid,
    user_id: Uuid,
    quiz_id: Uuid,
    correct_count: i32,
    total_questions: i32,
    score_percent: i16,
    passed: bool,
    answers: Json<AnswerMap>,
    flags: Json<Vec<String>>,
    submission_trigger: String,
    time_remaining_seconds: i32,
    completed_at: DateTime<Utc>,
}
impl AttemptRecordRow {
    fn to_domain(self) -> PortResult<AttemptRecord> {
        let trigger = self
            .submission_trigger
            .parse::<SubmissionTrigger>()
            .map_err(PortError::InvalidData)?;
        Ok(AttemptRecord {
            id: self.id,
            user_id: self.user_id,
            quiz_id: self.quiz_id,
            score: ScoreResult {
                correct_count: self.correct_count.max(0) as usize,
                total_questions: self.total_questions.max(0) as usize,
                score_percent: self.score_percent.clamp(0, 100) as u8,
                passed: self.passed,
            },
            answers: self.answers.0,
            flags: self.flags.0.into_iter().collect::<FlagSet>(),
            trigger,
            time_remaining_seconds: self.time_remaining_seconds.max(0) as u32,
            completed_at: self.completed_at,
        })
    }
}

fn not_found_or_unexpected(e: sqlx::Error, what: String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_quiz(&self, quiz: Quiz) -> PortResult<Quiz> {
        let questions: Vec<StoredQuestion> = quiz.questions.iter().map(StoredQuestion::from).collect();
        let time_limit_minutes = i32::try_from(quiz.time_limit_minutes).map_err(|_| {
            PortError::InvalidData(format!(
                "Time limit of {} minutes cannot be stored",
                quiz.time_limit_minutes
            ))
        })?;
        sqlx::query(
            "INSERT INTO quizzes (id, title, description, time_limit_minutes, passing_score_percent, questions) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(quiz.id)
        .bind(&quiz.title)
        .bind(&quiz.description)
        .bind(time_limit_minutes)
        .bind(i16::from(quiz.passing_score_percent))
        .bind(Json(questions))
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(quiz)
    }

    async fn get_quiz_by_id(&self, quiz_id: Uuid) -> PortResult<Quiz> {
        let record = sqlx::query_as::<_, QuizRecord>(
            "SELECT id, title, description, time_limit_minutes, passing_score_percent, questions FROM quizzes WHERE id = $1",
        )
        .bind(quiz_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("Quiz {} not found", quiz_id)))?;
        Ok(record.to_domain())
    }

    async fn list_quizzes(&self) -> PortResult<Vec<QuizSummary>> {
        let records = sqlx::query_as::<_, QuizSummaryRecord>(
            "SELECT id, title, description, time_limit_minutes, passing_score_percent, jsonb_array_length(questions) AS question_count FROM quizzes ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn save_attempt(&self, attempt: AttemptRecord) -> PortResult<()> {
        let flags: Vec<String> = attempt.flags.into_iter().collect();
        let time_remaining_seconds = i32::try_from(attempt.time_remaining_seconds)
            .map_err(|_| PortError::InvalidData("Time remaining cannot be stored".to_string()))?;
        sqlx::query(
            "INSERT INTO quiz_attempts (id, user_id, quiz_id, correct_count, total_questions, score_percent, passed, answers, flags, submission_trigger, time_remaining_seconds, completed_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(attempt.id)
        .bind(attempt.user_id)
        .bind(attempt.quiz_id)
        .bind(attempt.score.correct_count as i32)
        .bind(attempt.score.total_questions as i32)
        .bind(i16::from(attempt.score.score_percent))
        .bind(attempt.score.passed)
        .bind(Json(attempt.answers))
        .bind(Json(flags))
        .bind(attempt.trigger.as_str())
        .bind(time_remaining_seconds)
        .bind(attempt.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn get_attempts_for_user(
        &self,
        user_id: Uuid,
        quiz_id: Option<Uuid>,
    ) -> PortResult<Vec<AttemptRecord>> {
        let records = sqlx::query_as::<_, AttemptRecordRow>(
            "SELECT id, user_id, quiz_id, correct_count, total_questions, score_percent, passed, answers, flags, submission_trigger, time_remaining_seconds, completed_at FROM quiz_attempts WHERE user_id = $1 AND ($2::uuid IS NULL OR quiz_id = $2) ORDER BY completed_at DESC",
        )
        .bind(user_id)
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }
}

//! crates/quiz_core/src/engine.rs
//!
//! The quiz session state machine: Intro -> Taking -> Result, and back to
//! Intro on retry. The engine has no clock of its own; the owner drives the
//! countdown by calling [`QuizEngine::tick`] once per second while the
//! session is in the Taking phase.

use tracing::debug;

use crate::domain::{AnswerMap, FlagSet, Question, QuestionReview, Quiz, ScoreResult, SubmissionTrigger};
use crate::error::{EngineError, EngineResult};
use crate::scoring;

/// Discriminant of [`Phase`], for callers that only need to know where the
/// session is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    Intro,
    Taking,
    Result,
}

impl PhaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseKind::Intro => "intro",
            PhaseKind::Taking => "taking",
            PhaseKind::Result => "result",
        }
    }
}

/// Mutable state of an attempt in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub current_question_index: usize,
    pub time_remaining_seconds: u32,
    pub answers: AnswerMap,
    pub flags: FlagSet,
}

/// A finished attempt together with its score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedAttempt {
    pub attempt: Attempt,
    pub score: ScoreResult,
    pub trigger: SubmissionTrigger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Intro,
    Taking(Attempt),
    Result(CompletedAttempt),
}

impl Phase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            Phase::Intro => PhaseKind::Intro,
            Phase::Taking(_) => PhaseKind::Taking,
            Phase::Result(_) => PhaseKind::Result,
        }
    }
}

/// What a single countdown tick did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The countdown moved on and the attempt is still running.
    Running { time_remaining_seconds: u32 },
    /// The countdown hit zero and the attempt was submitted automatically.
    Expired(ScoreResult),
    /// The session is not in the Taking phase; nothing changed.
    Inactive,
}

/// One quiz session bound to an immutable quiz definition.
#[derive(Debug, Clone)]
pub struct QuizEngine {
    quiz: Quiz,
    phase: Phase,
}

impl QuizEngine {
    /// Creates a session in the Intro phase after validating the quiz.
    pub fn new(quiz: Quiz) -> EngineResult<Self> {
        quiz.validate()?;
        Ok(Self {
            quiz,
            phase: Phase::Intro,
        })
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn phase_kind(&self) -> PhaseKind {
        self.phase.kind()
    }

    pub fn current_question_index(&self) -> usize {
        match &self.phase {
            Phase::Intro => 0,
            Phase::Taking(attempt) => attempt.current_question_index,
            Phase::Result(done) => done.attempt.current_question_index,
        }
    }

    pub fn current_question(&self) -> &Question {
        // `new` guarantees at least one question and navigation keeps the
        // index in bounds.
        &self.quiz.questions[self.current_question_index()]
    }

    /// Seconds left on the countdown. Before the start this is the full limit.
    pub fn time_remaining_seconds(&self) -> u32 {
        match &self.phase {
            Phase::Intro => self.quiz.time_limit_seconds(),
            Phase::Taking(attempt) => attempt.time_remaining_seconds,
            Phase::Result(done) => done.attempt.time_remaining_seconds,
        }
    }

    pub fn answers(&self) -> Option<&AnswerMap> {
        self.attempt().map(|a| &a.answers)
    }

    pub fn flags(&self) -> Option<&FlagSet> {
        self.attempt().map(|a| &a.flags)
    }

    pub fn answered_count(&self) -> usize {
        self.answers().map_or(0, |a| a.len())
    }

    pub fn score(&self) -> Option<ScoreResult> {
        match &self.phase {
            Phase::Result(done) => Some(done.score),
            _ => None,
        }
    }

    pub fn trigger(&self) -> Option<SubmissionTrigger> {
        match &self.phase {
            Phase::Result(done) => Some(done.trigger),
            _ => None,
        }
    }

    /// Per-question breakdown, available once the session has a result.
    pub fn review(&self) -> Option<Vec<QuestionReview>> {
        match &self.phase {
            Phase::Result(done) => Some(scoring::review(&self.quiz, &done.attempt.answers)),
            _ => None,
        }
    }

    pub fn start(&mut self) -> EngineResult<()> {
        if !matches!(self.phase, Phase::Intro) {
            return Err(self.invalid("start"));
        }
        self.phase = Phase::Taking(Attempt {
            current_question_index: 0,
            time_remaining_seconds: self.quiz.time_limit_seconds(),
            answers: AnswerMap::new(),
            flags: FlagSet::new(),
        });
        debug!(quiz_id = %self.quiz.id, "quiz session started");
        Ok(())
    }

    /// Records (or overwrites) the chosen option for a question.
    pub fn select_answer(&mut self, question_id: &str, option_id: &str) -> EngineResult<()> {
        self.ensure_taking("select_answer")?;
        let question = self
            .quiz
            .question(question_id)
            .ok_or_else(|| EngineError::UnknownQuestion(question_id.to_string()))?;
        if !question.has_option(option_id) {
            return Err(EngineError::UnknownOption {
                question_id: question_id.to_string(),
                option_id: option_id.to_string(),
            });
        }

        let attempt = self.taking_mut("select_answer")?;
        attempt
            .answers
            .insert(question_id.to_string(), option_id.to_string());
        Ok(())
    }

    /// Flags an unflagged question, or clears an existing flag.
    pub fn toggle_flag(&mut self, question_id: &str) -> EngineResult<()> {
        self.ensure_taking("toggle_flag")?;
        if self.quiz.question(question_id).is_none() {
            return Err(EngineError::UnknownQuestion(question_id.to_string()));
        }

        let attempt = self.taking_mut("toggle_flag")?;
        if !attempt.flags.remove(question_id) {
            attempt.flags.insert(question_id.to_string());
        }
        Ok(())
    }

    pub fn go_to(&mut self, index: usize) -> EngineResult<()> {
        let total = self.quiz.total_questions();
        let attempt = self.taking_mut("go_to")?;
        if index >= total {
            return Err(EngineError::IndexOutOfRange { index, total });
        }
        attempt.current_question_index = index;
        Ok(())
    }

    /// Moves to the next question; stays put on the last one.
    pub fn next(&mut self) -> EngineResult<()> {
        let last = self.quiz.total_questions() - 1;
        let attempt = self.taking_mut("next")?;
        attempt.current_question_index = (attempt.current_question_index + 1).min(last);
        Ok(())
    }

    /// Moves to the previous question; stays put on the first one.
    pub fn previous(&mut self) -> EngineResult<()> {
        let attempt = self.taking_mut("previous")?;
        attempt.current_question_index = attempt.current_question_index.saturating_sub(1);
        Ok(())
    }

    /// Advances the countdown by one second.
    pub fn tick(&mut self) -> TickOutcome {
        let Phase::Taking(attempt) = &mut self.phase else {
            return TickOutcome::Inactive;
        };

        attempt.time_remaining_seconds = attempt.time_remaining_seconds.saturating_sub(1);
        if attempt.time_remaining_seconds > 0 {
            return TickOutcome::Running {
                time_remaining_seconds: attempt.time_remaining_seconds,
            };
        }

        match self.complete(SubmissionTrigger::TimeExpired) {
            Some(score) => TickOutcome::Expired(score),
            None => TickOutcome::Inactive,
        }
    }

    /// Scores the current answers and moves to the Result phase.
    ///
    /// Submitting an already finished session returns the existing score.
    pub fn submit(&mut self) -> EngineResult<ScoreResult> {
        if let Phase::Result(done) = &self.phase {
            return Ok(done.score);
        }
        self.complete(SubmissionTrigger::Manual)
            .ok_or_else(|| self.invalid("submit"))
    }

    /// Discards the finished attempt and returns to the Intro phase.
    pub fn retry(&mut self) -> EngineResult<()> {
        if !matches!(self.phase, Phase::Result(_)) {
            return Err(self.invalid("retry"));
        }
        self.phase = Phase::Intro;
        debug!(quiz_id = %self.quiz.id, "quiz session reset for retry");
        Ok(())
    }

    fn complete(&mut self, trigger: SubmissionTrigger) -> Option<ScoreResult> {
        match std::mem::replace(&mut self.phase, Phase::Intro) {
            Phase::Taking(attempt) => {
                let score = scoring::score(&self.quiz, &attempt.answers);
                debug!(
                    quiz_id = %self.quiz.id,
                    trigger = trigger.as_str(),
                    correct = score.correct_count,
                    percent = score.score_percent,
                    "quiz session completed"
                );
                self.phase = Phase::Result(CompletedAttempt {
                    attempt,
                    score,
                    trigger,
                });
                Some(score)
            }
            other => {
                self.phase = other;
                None
            }
        }
    }

    fn attempt(&self) -> Option<&Attempt> {
        match &self.phase {
            Phase::Intro => None,
            Phase::Taking(attempt) => Some(attempt),
            Phase::Result(done) => Some(&done.attempt),
        }
    }

    fn ensure_taking(&self, operation: &'static str) -> EngineResult<()> {
        match self.phase {
            Phase::Taking(_) => Ok(()),
            _ => Err(self.invalid(operation)),
        }
    }

    fn taking_mut(&mut self, operation: &'static str) -> EngineResult<&mut Attempt> {
        let phase = self.phase.kind();
        match &mut self.phase {
            Phase::Taking(attempt) => Ok(attempt),
            _ => Err(EngineError::InvalidTransition {
                operation,
                phase: phase.as_str(),
            }),
        }
    }

    fn invalid(&self, operation: &'static str) -> EngineError {
        EngineError::InvalidTransition {
            operation,
            phase: self.phase.kind().as_str(),
        }
    }
}

// src/session/engine.rs

//! The exam session state machine.
//!
//! A session is created `Open` once its attempt row exists and moves to
//! `Closed` exactly once, by an explicit submit or by the timer running out.
//! Every mutating operation is rejected after that. The engine does no I/O:
//! persistence is driven by the registry from the values it returns.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    models::{attempt::Attempt, exam::Exam, question::Question},
    session::{
        error::SessionError,
        scoring::{self, GradedResult},
    },
};

/// Remaining time under which clients should warn the test-taker.
pub const LOW_TIME_THRESHOLD_SECS: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Open,
    Closed,
}

/// State of the optional webcam self-monitoring feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringStatus {
    /// Not requested, or stopped.
    Disabled,
    /// Requested at start, feed not confirmed yet.
    Requested,
    Active,
    /// Requested but the feed could not be acquired.
    Unavailable,
}

/// What the client reports about its monitoring feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringReport {
    Acquired,
    Unavailable,
    Stopped,
}

/// Outcome of a timer tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TimerEvent {
    Running { remaining_seconds: u32 },
    /// Time ran out on this tick and the session was submitted.
    Expired(GradedResult),
    /// The session was already closed; nothing happened.
    Idle,
}

/// Inputs that drive a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Select { question_id: Uuid, option: i32 },
    Navigate(i64),
    Tick(u32),
    Monitoring(MonitoringReport),
    Submit,
}

/// Read-only view of a session at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub attempt_id: Uuid,
    pub exam_id: Uuid,
    pub status: SessionStatus,
    pub current_index: usize,
    pub question_count: usize,
    pub answered_count: usize,
    /// Position of the current question as a percentage of the set.
    pub progress: f64,
    pub remaining_seconds: u32,
    pub remaining_display: String,
    pub low_time: bool,
    pub selections: BTreeMap<Uuid, i32>,
    pub monitoring: MonitoringStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<GradedResult>,
}

#[derive(Debug, Clone)]
pub struct ExamSession {
    attempt_id: Uuid,
    exam: Exam,
    questions: Vec<Question>,
    positions: HashMap<Uuid, usize>,
    selections: HashMap<Uuid, i32>,
    current_index: usize,
    remaining_seconds: u32,
    total_points: i64,
    monitoring: MonitoringStatus,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    result: Option<GradedResult>,
}

impl ExamSession {
    /// Opens a session for an attempt that has already been created.
    ///
    /// `questions` must be ordered by display order. The attempt's
    /// `total_points` is taken as the frozen total for grading.
    pub fn open(
        exam: Exam,
        questions: Vec<Question>,
        attempt: &Attempt,
    ) -> Result<Self, SessionError> {
        if attempt.exam_id != exam.id {
            return Err(SessionError::AttemptMismatch {
                attempt_id: attempt.id,
                expected: exam.id,
                found: attempt.exam_id,
            });
        }
        if let Some(q) = questions.iter().find(|q| q.exam_id != exam.id) {
            return Err(SessionError::ForeignQuestion {
                question_id: q.id,
                exam_id: exam.id,
            });
        }

        let positions = questions
            .iter()
            .enumerate()
            .map(|(i, q)| (q.id, i))
            .collect();

        let monitoring = if attempt.video_monitoring_enabled {
            MonitoringStatus::Requested
        } else {
            MonitoringStatus::Disabled
        };

        Ok(Self {
            attempt_id: attempt.id,
            remaining_seconds: exam.duration_seconds(),
            exam,
            questions,
            positions,
            selections: HashMap::new(),
            current_index: 0,
            total_points: attempt.total_points,
            monitoring,
            started_at: attempt.started_at,
            completed_at: None,
            result: None,
        })
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn exam(&self) -> &Exam {
        &self.exam
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn status(&self) -> SessionStatus {
        if self.completed_at.is_some() {
            SessionStatus::Closed
        } else {
            SessionStatus::Open
        }
    }

    pub fn is_open(&self) -> bool {
        self.status() == SessionStatus::Open
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn total_points(&self) -> i64 {
        self.total_points
    }

    pub fn monitoring(&self) -> MonitoringStatus {
        self.monitoring
    }

    pub fn selection(&self, question_id: Uuid) -> Option<i32> {
        self.selections.get(&question_id).copied()
    }

    pub fn answered_count(&self) -> usize {
        self.selections.len()
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// The grade computed at closure, if the session is closed.
    pub fn result(&self) -> Option<&GradedResult> {
        self.result.as_ref()
    }

    /// Records (or replaces) the selection for a question.
    pub fn select_answer(&mut self, question_id: Uuid, option: i32) -> Result<(), SessionError> {
        self.ensure_open()?;

        let position = *self
            .positions
            .get(&question_id)
            .ok_or(SessionError::UnknownQuestion(question_id))?;

        let options = self.questions[position].option_count();
        let in_range = usize::try_from(option).is_ok_and(|o| o < options);
        if !in_range {
            return Err(SessionError::OptionOutOfRange {
                question_id,
                option,
                options,
            });
        }

        self.selections.insert(question_id, option);
        Ok(())
    }

    /// Moves the current-question pointer, clamping to the valid range.
    /// Returns the index actually selected.
    pub fn navigate(&mut self, target: i64) -> Result<usize, SessionError> {
        self.ensure_open()?;

        let last = self.questions.len().saturating_sub(1);
        self.current_index = usize::try_from(target.max(0)).map_or(last, |t| t.min(last));
        Ok(self.current_index)
    }

    pub fn next(&mut self) -> Result<usize, SessionError> {
        self.navigate(self.current_index as i64 + 1)
    }

    pub fn previous(&mut self) -> Result<usize, SessionError> {
        self.navigate(self.current_index as i64 - 1)
    }

    /// Applies a monitoring-feed report. A feed that cannot be acquired only
    /// downgrades the status; it never fails the session.
    pub fn report_monitoring(
        &mut self,
        report: MonitoringReport,
    ) -> Result<MonitoringStatus, SessionError> {
        self.ensure_open()?;

        self.monitoring = match report {
            MonitoringReport::Acquired => MonitoringStatus::Active,
            MonitoringReport::Unavailable => {
                tracing::warn!(attempt_id = %self.attempt_id, "Monitoring feed unavailable, continuing without it");
                MonitoringStatus::Unavailable
            }
            MonitoringReport::Stopped => MonitoringStatus::Disabled,
        };
        Ok(self.monitoring)
    }

    /// Advances the countdown. The first tick that brings the remaining time
    /// to zero submits the session; ticks after closure do nothing.
    pub fn tick(&mut self, elapsed_seconds: u32, now: DateTime<Utc>) -> TimerEvent {
        if !self.is_open() {
            return TimerEvent::Idle;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(elapsed_seconds);
        if self.remaining_seconds > 0 {
            return TimerEvent::Running {
                remaining_seconds: self.remaining_seconds,
            };
        }

        tracing::info!(attempt_id = %self.attempt_id, "Time expired, submitting attempt");
        TimerEvent::Expired(self.close(now))
    }

    /// Grades and closes the session. Fails if it is already closed.
    pub fn submit(&mut self, now: DateTime<Utc>) -> Result<GradedResult, SessionError> {
        if !self.is_open() {
            return Err(SessionError::AlreadySubmitted);
        }
        Ok(self.close(now))
    }

    /// Applies one event and returns the resulting snapshot.
    pub fn apply(
        &mut self,
        event: SessionEvent,
        now: DateTime<Utc>,
    ) -> Result<SessionSnapshot, SessionError> {
        match event {
            SessionEvent::Select {
                question_id,
                option,
            } => self.select_answer(question_id, option)?,
            SessionEvent::Navigate(target) => {
                self.navigate(target)?;
            }
            SessionEvent::Tick(elapsed) => {
                self.tick(elapsed, now);
            }
            SessionEvent::Monitoring(report) => {
                self.report_monitoring(report)?;
            }
            SessionEvent::Submit => {
                self.submit(now)?;
            }
        }
        Ok(self.snapshot())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let question_count = self.questions.len();
        let progress = if question_count == 0 {
            0.0
        } else {
            (self.current_index + 1) as f64 / question_count as f64 * 100.0
        };

        SessionSnapshot {
            attempt_id: self.attempt_id,
            exam_id: self.exam.id,
            status: self.status(),
            current_index: self.current_index,
            question_count,
            answered_count: self.selections.len(),
            progress,
            remaining_seconds: self.remaining_seconds,
            remaining_display: format_remaining(self.remaining_seconds),
            low_time: self.remaining_seconds < LOW_TIME_THRESHOLD_SECS,
            selections: self.selections.iter().map(|(k, v)| (*k, *v)).collect(),
            monitoring: self.monitoring,
            started_at: self.started_at,
            completed_at: self.completed_at,
            result: self.result.clone(),
        }
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(SessionError::AlreadyClosed)
        }
    }

    fn close(&mut self, now: DateTime<Utc>) -> GradedResult {
        let result = scoring::grade(
            &self.questions,
            &self.selections,
            self.total_points,
            self.exam.passing_score,
        );
        self.completed_at = Some(now);
        self.monitoring = MonitoringStatus::Disabled;
        self.result = Some(result.clone());
        result
    }
}

/// Formats seconds as `m:ss`.
pub fn format_remaining(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

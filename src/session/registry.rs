// src/session/registry.rs

//! Live exam sessions held by the server.
//!
//! Each session is owned by the user who started it and lives behind its own
//! lock. A tokio task ticks its countdown once per second; the registry
//! persists the grade when the session closes, whether by submit or expiry.
//! A session is dropped once its grade is saved; closed sessions whose save
//! failed stay until a retry succeeds or they are discarded.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::Utc;
use serde::Serialize;
use tokio::{
    sync::{Mutex, OwnedMutexGuard, RwLock},
    task::AbortHandle,
    time::MissedTickBehavior,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptOutcome, NewAttempt},
        exam::Exam,
        question::PublicQuestion,
    },
    session::{
        engine::{ExamSession, SessionEvent, SessionSnapshot, TimerEvent},
        scoring::{self, GradedResult},
    },
    store::{ExamStore, StoreError},
};

/// Interval between countdown ticks.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// A snapshot plus whether the grade has reached the store.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub snapshot: SessionSnapshot,
    pub saved: bool,
}

/// Returned by `start`: what the client needs to render the exam.
#[derive(Debug, Serialize)]
pub struct StartedSession {
    pub exam: Exam,
    pub questions: Vec<PublicQuestion>,
    pub session: SessionView,
}

/// Result of a submission or of a persistence retry.
///
/// The grade is always present; `saved` is false and `error` explains why
/// when the store could not record it.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub attempt_id: Uuid,
    pub result: GradedResult,
    pub saved: bool,
    pub error: Option<String>,
}

#[derive(Debug)]
struct LiveSession {
    owner: Uuid,
    session: ExamSession,
    saved: bool,
    timer: Option<AbortHandle>,
}

impl LiveSession {
    fn view(&self) -> SessionView {
        SessionView {
            snapshot: self.session.snapshot(),
            saved: self.saved,
        }
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    /// Writes the graded answers and closes the attempt row.
    async fn persist(&mut self, store: &dyn ExamStore) -> Result<(), StoreError> {
        if self.saved {
            return Ok(());
        }
        let (Some(result), Some(completed_at)) =
            (self.session.result(), self.session.completed_at())
        else {
            return Ok(());
        };

        let attempt_id = self.session.attempt_id();
        store
            .insert_graded_answers(attempt_id, &result.answers)
            .await?;
        store
            .close_attempt(
                attempt_id,
                &AttemptOutcome {
                    score: result.score,
                    percentage: result.percentage,
                    passed: result.passed,
                    completed_at,
                },
            )
            .await?;

        self.saved = true;
        Ok(())
    }
}

#[derive(Clone)]
pub struct SessionRegistry {
    store: Arc<dyn ExamStore>,
    sessions: Arc<RwLock<HashMap<Uuid, Arc<Mutex<LiveSession>>>>>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn ExamStore>) -> Self {
        Self {
            store,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of sessions currently held.
    pub async fn live_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Starts a session: loads the questions, creates the attempt row, then
    /// opens the session and its countdown.
    ///
    /// If the store fails, no session exists afterwards.
    pub async fn start(
        &self,
        owner: Uuid,
        exam_id: Uuid,
        monitoring: bool,
    ) -> Result<StartedSession, AppError> {
        let exam = self
            .store
            .fetch_exam(exam_id)
            .await
            .map_err(start_failure)?
            .ok_or(AppError::NotFound("Exam not found".to_string()))?;

        if !exam.is_active {
            return Err(AppError::BadRequest("Exam is not active".to_string()));
        }

        let questions = self
            .store
            .fetch_questions(exam.id)
            .await
            .map_err(start_failure)?;

        let attempt = self
            .store
            .create_attempt(NewAttempt {
                user_id: owner,
                exam_id: exam.id,
                total_points: scoring::total_points(&questions),
                video_monitoring_enabled: monitoring,
            })
            .await
            .map_err(start_failure)?;

        let public_questions = questions.iter().map(PublicQuestion::from).collect();
        let session = ExamSession::open(exam.clone(), questions, &attempt)?;
        let attempt_id = session.attempt_id();

        let live = LiveSession {
            owner,
            session,
            saved: false,
            timer: None,
        };
        let view = live.view();
        let live = Arc::new(Mutex::new(live));

        self.sessions
            .write()
            .await
            .insert(attempt_id, Arc::clone(&live));

        let timer = self.spawn_timer(Arc::clone(&live));
        live.lock().await.timer = Some(timer);

        tracing::info!(%attempt_id, exam_id = %exam.id, user_id = %owner, "Exam session started");

        Ok(StartedSession {
            exam,
            questions: public_questions,
            session: view,
        })
    }

    pub async fn view(&self, owner: Uuid, attempt_id: Uuid) -> Result<SessionView, AppError> {
        let live = self.lock_owned(owner, attempt_id).await?;
        Ok(live.view())
    }

    /// Applies a user action (selection, navigation, monitoring report).
    /// Submission goes through `submit` so the grade gets persisted.
    pub async fn apply(
        &self,
        owner: Uuid,
        attempt_id: Uuid,
        event: SessionEvent,
    ) -> Result<SessionView, AppError> {
        if event == SessionEvent::Submit {
            return Err(AppError::BadRequest(
                "Use the submit endpoint to submit an attempt".to_string(),
            ));
        }

        let mut live = self.lock_owned(owner, attempt_id).await?;
        let snapshot = live.session.apply(event, Utc::now())?;
        Ok(SessionView {
            snapshot,
            saved: live.saved,
        })
    }

    /// Grades and closes the session, then persists the grade.
    ///
    /// The session is closed even when persisting fails; the caller can then
    /// retry with `persist`.
    pub async fn submit(&self, owner: Uuid, attempt_id: Uuid) -> Result<SubmitOutcome, AppError> {
        let mut live = self.lock_owned(owner, attempt_id).await?;
        let result = live.session.submit(Utc::now())?;
        live.stop_timer();

        tracing::info!(%attempt_id, score = result.score, passed = result.passed, "Attempt submitted");

        let outcome = self.persist_outcome(&mut live, result).await;
        if outcome.saved {
            self.evict(attempt_id).await;
        }
        Ok(outcome)
    }

    /// Retries persisting the grade of a closed session.
    pub async fn persist(&self, owner: Uuid, attempt_id: Uuid) -> Result<SubmitOutcome, AppError> {
        let mut live = self.lock_owned(owner, attempt_id).await?;
        let result = live
            .session
            .result()
            .cloned()
            .ok_or(AppError::Conflict("Attempt is still open".to_string()))?;

        let outcome = self.persist_outcome(&mut live, result).await;
        if outcome.saved {
            self.evict(attempt_id).await;
        }
        Ok(outcome)
    }

    /// Tears a session down and stops its countdown.
    pub async fn discard(&self, owner: Uuid, attempt_id: Uuid) -> Result<(), AppError> {
        let mut live = self.lock_owned(owner, attempt_id).await?;
        live.stop_timer();
        drop(live);

        self.evict(attempt_id).await;
        tracing::info!(%attempt_id, "Exam session discarded");
        Ok(())
    }

    async fn evict(&self, attempt_id: Uuid) {
        self.sessions.write().await.remove(&attempt_id);
    }

    async fn lock_owned(
        &self,
        owner: Uuid,
        attempt_id: Uuid,
    ) -> Result<OwnedMutexGuard<LiveSession>, AppError> {
        let live = self.sessions.read().await.get(&attempt_id).cloned();
        let Some(live) = live else {
            return Err(self.missing_session(owner, attempt_id).await);
        };

        let live = live.lock_owned().await;
        if live.owner != owner {
            return Err(AppError::NotFound("Session not found".to_string()));
        }
        Ok(live)
    }

    /// Error for a session that is not held: 409 if the caller's attempt was
    /// already graded and saved, 404 otherwise.
    async fn missing_session(&self, owner: Uuid, attempt_id: Uuid) -> AppError {
        match self.store.fetch_attempt(attempt_id).await {
            Ok(Some(attempt)) if attempt.user_id == owner && !attempt.is_open() => {
                AppError::Conflict("Attempt has already been submitted".to_string())
            }
            Ok(_) => AppError::NotFound("Session not found".to_string()),
            Err(e) => AppError::from(e),
        }
    }

    async fn persist_outcome(&self, live: &mut LiveSession, result: GradedResult) -> SubmitOutcome {
        let attempt_id = live.session.attempt_id();
        let error = match live.persist(self.store.as_ref()).await {
            Ok(()) => None,
            Err(e) => {
                tracing::error!(%attempt_id, "Failed to save graded attempt: {}", e);
                Some(e.to_string())
            }
        };

        SubmitOutcome {
            attempt_id,
            result,
            saved: live.saved,
            error,
        }
    }

    fn spawn_timer(&self, live: Arc<Mutex<LiveSession>>) -> AbortHandle {
        let registry = self.clone();
        let elapsed = u32::try_from(TICK_PERIOD.as_secs()).unwrap_or(u32::MAX);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_PERIOD);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                interval.tick().await;
                let mut guard = live.lock().await;
                match guard.session.tick(elapsed, Utc::now()) {
                    TimerEvent::Running { .. } => {}
                    TimerEvent::Expired(result) => {
                        guard.timer = None;
                        let outcome = registry.persist_outcome(&mut guard, result).await;
                        if outcome.saved {
                            registry.evict(outcome.attempt_id).await;
                        } else {
                            tracing::warn!(
                                attempt_id = %outcome.attempt_id,
                                "Expired attempt kept unsaved until retried"
                            );
                        }
                        break;
                    }
                    TimerEvent::Idle => break,
                }
            }
        })
        .abort_handle()
    }
}

fn start_failure(err: StoreError) -> AppError {
    tracing::error!("Failed to start exam session: {}", err);
    AppError::ServiceUnavailable(format!("Exam session could not be started: {}", err))
}

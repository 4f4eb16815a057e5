// src/store/mod.rs

//! Data access for exams, attempts, graded answers and users.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{
        attempt::{AnswerRecord, Attempt, AttemptOutcome, NewAttempt},
        exam::Exam,
        question::Question,
        user::{NewUser, User},
    },
    session::scoring::GradedAnswer,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Failures of the persistent store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("username '{0}' already exists")]
    DuplicateUsername(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// The persistent store the exam sessions read from and write to.
#[async_trait]
pub trait ExamStore: Send + Sync {
    /// Active exams, newest first.
    async fn fetch_active_exams(&self) -> Result<Vec<Exam>, StoreError>;

    async fn fetch_exam(&self, exam_id: Uuid) -> Result<Option<Exam>, StoreError>;

    /// Questions of an exam ordered by display order.
    async fn fetch_questions(&self, exam_id: Uuid) -> Result<Vec<Question>, StoreError>;

    /// Questions with the given ids ordered by display order. Unknown ids are skipped.
    async fn fetch_questions_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Question>, StoreError>;

    /// Creates an open attempt, assigning its id and start time.
    async fn create_attempt(&self, new: NewAttempt) -> Result<Attempt, StoreError>;

    /// Stores one graded answer per question. Answers already stored for the
    /// same attempt and question are left untouched.
    async fn insert_graded_answers(
        &self,
        attempt_id: Uuid,
        answers: &[GradedAnswer],
    ) -> Result<(), StoreError>;

    /// Writes the final score fields and completion time of an open attempt.
    /// An attempt that is already closed is left unchanged.
    async fn close_attempt(
        &self,
        attempt_id: Uuid,
        outcome: &AttemptOutcome,
    ) -> Result<(), StoreError>;

    async fn fetch_attempt(&self, attempt_id: Uuid) -> Result<Option<Attempt>, StoreError>;

    async fn fetch_graded_answers(&self, attempt_id: Uuid)
    -> Result<Vec<AnswerRecord>, StoreError>;

    /// A user's most recent attempts, newest first.
    async fn fetch_recent_attempts(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Attempt>, StoreError>;

    async fn create_user(&self, new: NewUser) -> Result<User, StoreError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
}

// src/session/error.rs

use thiserror::Error;
use uuid::Uuid;

/// Rejected session operations. No state is changed when one is returned.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("question {0} is not part of this exam")]
    UnknownQuestion(Uuid),

    #[error("option {option} is out of range for question {question_id} ({options} options)")]
    OptionOutOfRange {
        question_id: Uuid,
        option: i32,
        options: usize,
    },

    #[error("question {question_id} does not belong to exam {exam_id}")]
    ForeignQuestion { question_id: Uuid, exam_id: Uuid },

    #[error("attempt {attempt_id} is for exam {found}, expected {expected}")]
    AttemptMismatch {
        attempt_id: Uuid,
        expected: Uuid,
        found: Uuid,
    },

    #[error("attempt already closed")]
    AlreadyClosed,

    #[error("attempt already submitted")]
    AlreadySubmitted,
}

impl SessionError {
    /// Whether the error comes from calling an operation in the wrong state
    /// rather than from bad input.
    pub fn is_state_conflict(&self) -> bool {
        matches!(self, SessionError::AlreadyClosed | SessionError::AlreadySubmitted)
    }
}

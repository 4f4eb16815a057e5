// src/models/exam.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Represents the 'exams' table in the database.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Exam {
    pub id: Uuid,
    pub title: String,
    pub description: String,

    /// Time allowed for one attempt, in minutes.
    pub duration_minutes: i32,

    /// Percentage (0-100) an attempt must reach or exceed to pass.
    pub passing_score: i32,

    /// Only active exams are listed and can be started.
    pub is_active: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Exam {
    /// Session length in seconds. Negative durations count as zero.
    pub fn duration_seconds(&self) -> u32 {
        u32::try_from(self.duration_minutes).unwrap_or(0).saturating_mul(60)
    }
}

/// Request body for starting a session on an exam.
#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    /// Whether the test-taker asked for webcam self-monitoring. On unless
    /// the client turns it off.
    #[serde(default = "monitoring_on")]
    pub monitoring: bool,
}

fn monitoring_on() -> bool {
    true
}

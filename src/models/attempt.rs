// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::exam::Exam;

/// Represents the 'exam_attempts' table in the database.
///
/// An attempt is open while `completed_at` is `None`. The score fields are
/// filled in once, when the attempt is closed.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub exam_id: Uuid,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,

    /// Sum of question points, frozen when the attempt starts.
    pub total_points: i64,

    pub score: Option<i64>,
    pub percentage: Option<f64>,
    pub passed: Option<bool>,
    pub video_monitoring_enabled: bool,
}

impl Attempt {
    pub fn is_open(&self) -> bool {
        self.completed_at.is_none()
    }
}

/// Values needed to create an attempt row.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub user_id: Uuid,
    pub exam_id: Uuid,
    pub total_points: i64,
    pub video_monitoring_enabled: bool,
}

/// Final values written when an attempt is closed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptOutcome {
    pub score: i64,
    pub percentage: f64,
    pub passed: bool,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'exam_answers' table: one graded answer per question.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub question_id: Uuid,

    /// `None` when the question was left unanswered.
    pub selected_answer: Option<i32>,
    pub is_correct: bool,
    pub answered_at: chrono::DateTime<chrono::Utc>,
}

/// Aggregated numbers shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptStats {
    pub total_attempts: usize,
    /// Mean percentage over graded attempts; `None` when nothing is graded yet.
    pub average_percentage: Option<f64>,
    pub passed_count: usize,
}

impl AttemptStats {
    pub fn from_attempts(attempts: &[Attempt]) -> Self {
        let graded: Vec<f64> = attempts.iter().filter_map(|a| a.percentage).collect();
        let average_percentage = if graded.is_empty() {
            None
        } else {
            Some(graded.iter().sum::<f64>() / graded.len() as f64)
        };

        Self {
            total_attempts: attempts.len(),
            average_percentage,
            passed_count: attempts.iter().filter(|a| a.passed == Some(true)).count(),
        }
    }
}

/// DTO for the dashboard: recent attempts and their stats.
#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub attempts: Vec<Attempt>,
    pub stats: AttemptStats,
}

/// One reviewed question in the result view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionReview {
    pub question_id: Uuid,
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_answer: i32,
    pub selected_answer: Option<i32>,
    pub is_correct: bool,
    pub points: i32,
}

/// DTO for the result view of a closed attempt.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResultResponse {
    pub attempt: Attempt,
    pub exam: Exam,
    pub questions: Vec<QuestionReview>,
    pub correct_count: usize,
    pub total_questions: usize,
    /// Share of questions answered correctly, ignoring point weights.
    pub accuracy: f64,
    pub percentage: f64,
}

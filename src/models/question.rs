// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use uuid::Uuid;

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub exam_id: Uuid,

    /// The prompt shown to the test-taker.
    pub question_text: String,

    /// Answer options in display order (at least two).
    /// Stored as a JSON array in the database.
    pub options: Json<Vec<String>>,

    /// Index into `options` of the correct answer.
    pub correct_answer: i32,

    /// Points awarded for a correct answer.
    pub points: i32,

    /// Position of the question within its exam.
    pub order_index: i32,
}

impl Question {
    pub fn option_count(&self) -> usize {
        self.options.0.len()
    }
}

/// DTO for sending a question to the client during a session (no answer key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: Uuid,
    pub question_text: String,
    pub options: Vec<String>,
    pub points: i32,
    pub order_index: i32,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id,
            question_text: q.question_text.clone(),
            options: q.options.0.clone(),
            points: q.points,
            order_index: q.order_index,
        }
    }
}

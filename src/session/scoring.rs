// src/session/scoring.rs

//! Pure grading arithmetic for a closed attempt.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::question::Question;

/// The verdict for one question, produced at submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedAnswer {
    pub question_id: Uuid,
    /// `None` when the question was left unanswered.
    pub selected_answer: Option<i32>,
    pub is_correct: bool,
}

/// The computed grade of an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedResult {
    pub score: i64,
    pub total_points: i64,
    pub percentage: f64,
    pub passed: bool,
    pub answers: Vec<GradedAnswer>,
}

/// Sum of the points of every question in the set.
pub fn total_points(questions: &[Question]) -> i64 {
    questions.iter().map(|q| i64::from(q.points)).sum()
}

/// Score as a percentage of `total_points`. A zero (or negative) total yields 0.
pub fn percentage(score: i64, total_points: i64) -> f64 {
    if total_points <= 0 {
        return 0.0;
    }
    score as f64 / total_points as f64 * 100.0
}

/// Pass when the percentage meets or exceeds the threshold.
pub fn is_passing(percentage: f64, passing_score: i32) -> bool {
    percentage >= f64::from(passing_score)
}

/// Grades every question in order against the selections.
///
/// Unanswered questions are graded as incorrect. `total_points` is the value
/// frozen at attempt start, not a recomputation over `questions`.
pub fn grade(
    questions: &[Question],
    selections: &HashMap<Uuid, i32>,
    total_points: i64,
    passing_score: i32,
) -> GradedResult {
    let mut score = 0;
    let mut answers = Vec::with_capacity(questions.len());

    for q in questions {
        let selected = selections.get(&q.id).copied();
        let is_correct = selected == Some(q.correct_answer);
        if is_correct {
            score += i64::from(q.points);
        }
        answers.push(GradedAnswer {
            question_id: q.id,
            selected_answer: selected,
            is_correct,
        });
    }

    let percentage = percentage(score, total_points);

    GradedResult {
        score,
        total_points,
        percentage,
        passed: is_passing(percentage, passing_score),
        answers,
    }
}

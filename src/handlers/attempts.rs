// src/handlers/attempts.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::attempt::{AttemptStats, DashboardResponse, QuestionReview, ResultResponse},
    store::ExamStore,
    utils::jwt::Claims,
};

/// How many attempts the dashboard shows.
const RECENT_ATTEMPTS_LIMIT: i64 = 5;

/// Lists the current user's most recent attempts with summary stats.
pub async fn list_attempts(
    State(store): State<Arc<dyn ExamStore>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let attempts = store
        .fetch_recent_attempts(user_id, RECENT_ATTEMPTS_LIMIT)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch attempts: {:?}", e);
            AppError::from(e)
        })?;
    let stats = AttemptStats::from_attempts(&attempts);

    Ok(Json(DashboardResponse { attempts, stats }))
}

/// Returns the graded result of a submitted attempt, question by question.
pub async fn get_result(
    State(store): State<Arc<dyn ExamStore>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let attempt = store
        .fetch_attempt(id)
        .await?
        .filter(|a| a.user_id == user_id)
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    if attempt.is_open() {
        return Err(AppError::Conflict(
            "Attempt has not been submitted yet".to_string(),
        ));
    }

    let exam = store
        .fetch_exam(attempt.exam_id)
        .await?
        .ok_or(AppError::NotFound("Exam not found".to_string()))?;

    let answers = store.fetch_graded_answers(attempt.id).await?;
    let question_ids: Vec<Uuid> = answers.iter().map(|a| a.question_id).collect();
    let questions = store.fetch_questions_by_ids(&question_ids).await?;

    let reviews: Vec<QuestionReview> = questions
        .into_iter()
        .filter_map(|q| {
            let answer = answers.iter().find(|a| a.question_id == q.id)?;
            Some(QuestionReview {
                question_id: q.id,
                question_text: q.question_text,
                options: q.options.0,
                correct_answer: q.correct_answer,
                selected_answer: answer.selected_answer,
                is_correct: answer.is_correct,
                points: q.points,
            })
        })
        .collect();

    let correct_count = reviews.iter().filter(|r| r.is_correct).count();
    let total_questions = reviews.len();
    let accuracy = if total_questions == 0 {
        0.0
    } else {
        correct_count as f64 / total_questions as f64 * 100.0
    };
    let percentage = attempt.percentage.unwrap_or(0.0);

    Ok(Json(ResultResponse {
        attempt,
        exam,
        questions: reviews,
        correct_count,
        total_questions,
        accuracy,
        percentage,
    }))
}

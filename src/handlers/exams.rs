// src/handlers/exams.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::exam::StartSessionRequest,
    session::SessionRegistry,
    store::ExamStore,
    utils::jwt::Claims,
};

/// Lists the active exams, newest first.
pub async fn list_exams(
    State(store): State<Arc<dyn ExamStore>>,
) -> Result<impl IntoResponse, AppError> {
    let exams = store.fetch_active_exams().await.map_err(|e| {
        tracing::error!("Failed to fetch exams: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(exams))
}

pub async fn get_exam(
    State(store): State<Arc<dyn ExamStore>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let exam = store
        .fetch_exam(id)
        .await?
        .ok_or(AppError::NotFound("Exam not found".to_string()))?;

    Ok(Json(exam))
}

/// Starts a timed session on an exam.
///
/// The attempt is recorded before any question is returned; if that fails
/// nothing is started and the client should go back to the exam list.
pub async fn start_session(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
    Json(req): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let started = sessions.start(user_id, exam_id, req.monitoring).await?;

    Ok((StatusCode::CREATED, Json(started)))
}

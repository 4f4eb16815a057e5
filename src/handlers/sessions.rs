// src/handlers/sessions.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::AppError,
    session::{
        SessionEvent, SessionRegistry,
        engine::MonitoringReport,
        registry::{SessionView, SubmitOutcome},
    },
    utils::jwt::Claims,
};

/// DTO for choosing an answer.
#[derive(Debug, Deserialize)]
pub struct SelectAnswerRequest {
    pub question_id: Uuid,
    pub option: i32,
}

/// DTO for moving to another question.
#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    pub index: i64,
}

/// DTO for reporting the state of the monitoring feed.
#[derive(Debug, Deserialize)]
pub struct MonitoringRequest {
    pub report: MonitoringReport,
}

pub async fn get_session(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let view = sessions.view(claims.user_id()?, id).await?;
    Ok(Json(view))
}

pub async fn select_answer(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<SelectAnswerRequest>,
) -> Result<Json<SessionView>, AppError> {
    let event = SessionEvent::Select {
        question_id: req.question_id,
        option: req.option,
    };
    let view = sessions.apply(claims.user_id()?, id, event).await?;
    Ok(Json(view))
}

pub async fn navigate(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<NavigateRequest>,
) -> Result<Json<SessionView>, AppError> {
    let view = sessions
        .apply(claims.user_id()?, id, SessionEvent::Navigate(req.index))
        .await?;
    Ok(Json(view))
}

pub async fn report_monitoring(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<MonitoringRequest>,
) -> Result<Json<SessionView>, AppError> {
    let view = sessions
        .apply(claims.user_id()?, id, SessionEvent::Monitoring(req.report))
        .await?;
    Ok(Json(view))
}

/// Submits the attempt.
///
/// Responds 200 with the grade once it is saved. If saving fails the grade is
/// still returned, with `saved: false` and status 503, and can be saved later
/// through the persist endpoint.
pub async fn submit(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = sessions.submit(claims.user_id()?, id).await?;
    Ok(outcome_response(outcome))
}

/// Retries saving the grade of a submitted attempt.
pub async fn persist(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = sessions.persist(claims.user_id()?, id).await?;
    Ok(outcome_response(outcome))
}

pub async fn discard(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    sessions.discard(claims.user_id()?, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn outcome_response(outcome: SubmitOutcome) -> (StatusCode, Json<SubmitOutcome>) {
    let status = if outcome.saved {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(outcome))
}

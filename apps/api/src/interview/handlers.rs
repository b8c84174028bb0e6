use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::report::InterviewReport;
use crate::interview::service::{AnswerResponse, SessionView, StartedInterview};
use crate::models::session::{MessageRecord, SessionRecord};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub user_id: Uuid,
    pub resume_id: Uuid,
    pub job_role: String,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionsQuery {
    pub user_id: Uuid,
}

/// POST /api/v1/interviews/start
pub async fn handle_start(
    State(state): State<AppState>,
    Json(request): Json<StartRequest>,
) -> Result<(StatusCode, Json<StartedInterview>), AppError> {
    let started = state
        .interviews
        .start_interview(request.user_id, request.resume_id, &request.job_role)
        .await?;
    Ok((StatusCode::CREATED, Json(started)))
}

/// POST /api/v1/sessions/:id/answer
pub async fn handle_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    Ok(Json(
        state.interviews.submit_answer(id, &request.answer).await?,
    ))
}

/// GET /api/v1/sessions?user_id=
pub async fn handle_list_sessions(
    State(state): State<AppState>,
    Query(query): Query<SessionsQuery>,
) -> Result<Json<Vec<SessionRecord>>, AppError> {
    Ok(Json(state.interviews.list_sessions(query.user_id).await?))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.interviews.get_session(id).await?))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.interviews.delete_session(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/sessions/:id/messages
pub async fn handle_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MessageRecord>>, AppError> {
    Ok(Json(state.interviews.list_messages(id).await?))
}

/// GET /api/v1/sessions/:id/report
pub async fn handle_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<InterviewReport>, AppError> {
    Ok(Json(state.interviews.get_report(id).await?))
}

//! Axum route handlers for the Resume API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::{NewResume, Resume, ResumeVersion};
use crate::resumes::{create_resume, latest_for_user, list_versions};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ResumeResponse {
    pub resume: Resume,
    pub version: ResumeVersion,
}

#[derive(Debug, Serialize)]
pub struct VersionsResponse {
    pub resume_id: Uuid,
    pub versions: Vec<ResumeVersion>,
}

/// POST /api/v1/resumes
pub async fn handle_create_resume(
    State(state): State<AppState>,
    Json(request): Json<NewResume>,
) -> Result<(StatusCode, Json<ResumeResponse>), AppError> {
    let (resume, version) = create_resume(state.store.as_ref(), &request).await?;
    Ok((StatusCode::CREATED, Json(ResumeResponse { resume, version })))
}

/// GET /api/v1/resumes/:id/versions
pub async fn handle_list_versions(
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
) -> Result<Json<VersionsResponse>, AppError> {
    let versions = list_versions(state.store.as_ref(), resume_id).await?;
    Ok(Json(VersionsResponse {
        resume_id,
        versions,
    }))
}

/// GET /api/v1/users/:id/resume
///
/// The version a batch run would tailor for this user.
pub async fn handle_latest_resume(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ResumeResponse>, AppError> {
    let (resume, version) = latest_for_user(state.store.as_ref(), user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {user_id} has no resume")))?;
    Ok(Json(ResumeResponse { resume, version }))
}

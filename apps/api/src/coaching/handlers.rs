//! Axum route handlers for the coaching preview.

use axum::{extract::State, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::coaching::{CoachingMode, JdTarget, TailoringResult};
use crate::errors::AppError;
use crate::jd::extract_keywords;
use crate::models::resume::ResumeBlock;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TailorRequest {
    /// Tailor a stored version...
    pub resume_version_id: Option<Uuid>,
    /// ...or blocks supplied inline.
    pub blocks: Option<Vec<ResumeBlock>>,
    pub jd_text: String,
    /// Extracted from `jd_text` when omitted.
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub local_only: bool,
}

/// POST /api/v1/coach/tailor
///
/// Runs one tailoring pass without persisting anything.
pub async fn handle_tailor(
    State(state): State<AppState>,
    Json(request): Json<TailorRequest>,
) -> Result<Json<TailoringResult>, AppError> {
    if request.jd_text.trim().is_empty() {
        return Err(AppError::Validation("jd_text cannot be empty".to_string()));
    }

    let blocks = match (request.resume_version_id, request.blocks) {
        (Some(version_id), _) => state
            .store
            .get_resume_version(version_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Resume version {version_id} not found")))?
            .content
            .blocks()
            .to_vec(),
        (None, Some(blocks)) if !blocks.is_empty() => blocks,
        _ => {
            return Err(AppError::Validation(
                "either resume_version_id or a non-empty blocks list is required".to_string(),
            ))
        }
    };

    let jd = JdTarget {
        keywords: request
            .keywords
            .unwrap_or_else(|| extract_keywords(&request.jd_text)),
        text: request.jd_text,
    };
    let mode = if request.local_only {
        CoachingMode::LocalOnly
    } else {
        state.coach.mode()
    };

    Ok(Json(state.coach.tailor_with_mode(&blocks, &jd, mode).await))
}

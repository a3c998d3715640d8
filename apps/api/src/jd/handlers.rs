//! Axum route handler for the JD normalization preview.

use axum::{extract::State, Json};

use crate::errors::AppError;
use crate::jd::{normalize, JdInput, NormalizeError, NormalizedJd};
use crate::state::AppState;

impl From<NormalizeError> for AppError {
    fn from(err: NormalizeError) -> Self {
        match err {
            NormalizeError::NoText | NormalizeError::Empty => AppError::Validation(err.to_string()),
            NormalizeError::Fetch { .. } => AppError::UnprocessableEntity(err.to_string()),
        }
    }
}

/// POST /api/v1/jd/normalize
///
/// Returns what the batch pipeline would extract from a posting, without storing it.
pub async fn handle_normalize(
    State(state): State<AppState>,
    Json(input): Json<JdInput>,
) -> Result<Json<NormalizedJd>, AppError> {
    let jd = normalize(&input, state.fetcher.as_ref()).await?;
    Ok(Json(jd))
}

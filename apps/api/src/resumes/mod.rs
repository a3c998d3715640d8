//! Resumes: structured source content and its append-only version history.

pub mod handlers;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::resume::{NewResume, Resume, ResumeVersion};
use crate::store::{BatchStore, StoreError};

#[derive(Debug, Error)]
pub enum ResumeError {
    #[error("{0}")]
    Invalid(String),

    #[error("Resume {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn validate(resume: &NewResume) -> Result<(), ResumeError> {
    if resume.title.trim().is_empty() {
        return Err(ResumeError::Invalid("title cannot be empty".to_string()));
    }
    if resume.full_name.trim().is_empty() {
        return Err(ResumeError::Invalid("full_name cannot be empty".to_string()));
    }
    if resume.blocks.is_empty() {
        return Err(ResumeError::Invalid(
            "a resume needs at least one block".to_string(),
        ));
    }
    if let Some(index) = resume.blocks.iter().position(|b| b.title.trim().is_empty()) {
        return Err(ResumeError::Invalid(format!(
            "block {index} has an empty title"
        )));
    }
    Ok(())
}

/// Stores a new resume together with its first `Structured` version.
pub async fn create_resume(
    store: &dyn BatchStore,
    resume: &NewResume,
) -> Result<(Resume, ResumeVersion), ResumeError> {
    validate(resume)?;
    let (created, version) = store.create_resume(resume).await?;
    info!(
        "Created resume {} for user {} with {} blocks",
        created.id,
        created.user_id,
        resume.blocks.len()
    );
    Ok((created, version))
}

/// Newest version of the user's most recently updated resume.
pub async fn latest_for_user(
    store: &dyn BatchStore,
    user_id: Uuid,
) -> Result<Option<(Resume, ResumeVersion)>, StoreError> {
    store.latest_resume(user_id).await
}

/// All versions of a resume, oldest first.
pub async fn list_versions(
    store: &dyn BatchStore,
    resume_id: Uuid,
) -> Result<Vec<ResumeVersion>, ResumeError> {
    if store.get_resume(resume_id).await?.is_none() {
        return Err(ResumeError::NotFound(resume_id));
    }
    Ok(store.list_versions(resume_id).await?)
}

//! Persistence seam for batches, items, resumes and resume versions.
//!
//! `PgStore` is the production backend. Apart from `insert_items`, every write
//! is a single statement; nothing spans pipeline stages in a transaction.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::batch::{
    Batch, BatchItem, BatchStatus, ItemCompletion, ItemCounts, ItemJd, NewBatchItem, UnknownStatus,
};
use crate::models::resume::{NewResume, Resume, ResumeContent, ResumeVersion};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl From<UnknownStatus> for StoreError {
    fn from(err: UnknownStatus) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

#[async_trait]
pub trait BatchStore: Send + Sync {
    // Batches
    async fn create_batch(&self, user_id: Uuid, label: &str) -> Result<Batch, StoreError>;
    async fn get_batch(&self, batch_id: Uuid) -> Result<Option<Batch>, StoreError>;
    async fn set_batch_status(&self, batch_id: Uuid, status: BatchStatus)
        -> Result<(), StoreError>;
    /// Moves a `created` batch to `running`. With `stale_after`, also takes over a
    /// `running` batch whose runner has not checked in for that long.
    /// `None` when the batch is held by a live runner or is in any other state.
    async fn claim_batch(
        &self,
        batch_id: Uuid,
        stale_after: Option<Duration>,
    ) -> Result<Option<Batch>, StoreError>;
    /// Records that the runner is alive. `false` once the batch is no longer `running`.
    async fn heartbeat_batch(&self, batch_id: Uuid) -> Result<bool, StoreError>;
    /// Writes the aggregate counters and the final status in one statement.
    async fn finalize_batch(
        &self,
        batch_id: Uuid,
        counts: ItemCounts,
        status: BatchStatus,
    ) -> Result<Batch, StoreError>;

    // Items
    /// Inserts queued items and bumps `batch.total` by the number inserted.
    async fn insert_items(
        &self,
        batch_id: Uuid,
        items: &[NewBatchItem],
    ) -> Result<Vec<BatchItem>, StoreError>;
    async fn list_items(&self, batch_id: Uuid) -> Result<Vec<BatchItem>, StoreError>;
    /// Queued items of a batch, oldest first.
    async fn queued_items(&self, batch_id: Uuid) -> Result<Vec<BatchItem>, StoreError>;
    async fn get_item(&self, item_id: Uuid) -> Result<Option<BatchItem>, StoreError>;
    /// Moves a `queued` or `failed` item to `processing` and counts the attempt.
    /// `None` when the item is `done` or already being processed.
    async fn claim_item(&self, item_id: Uuid) -> Result<Option<BatchItem>, StoreError>;
    async fn update_item_jd(&self, item_id: Uuid, jd: ItemJd<'_>) -> Result<(), StoreError>;
    async fn complete_item(
        &self,
        item_id: Uuid,
        completion: &ItemCompletion,
    ) -> Result<BatchItem, StoreError>;
    async fn fail_item(&self, item_id: Uuid, error: &str) -> Result<(), StoreError>;
    async fn count_items(&self, batch_id: Uuid) -> Result<ItemCounts, StoreError>;
    /// Puts `processing` items not touched for `older_than` back to `queued`.
    async fn requeue_stale(&self, batch_id: Uuid, older_than: Duration)
        -> Result<u64, StoreError>;

    // Resumes
    async fn create_resume(
        &self,
        resume: &NewResume,
    ) -> Result<(Resume, ResumeVersion), StoreError>;
    async fn get_resume(&self, resume_id: Uuid) -> Result<Option<Resume>, StoreError>;
    /// The newest version of the user's most recently updated resume.
    async fn latest_resume(
        &self,
        user_id: Uuid,
    ) -> Result<Option<(Resume, ResumeVersion)>, StoreError>;
    /// Append-only: allocates `max(version) + 1`, never updates an existing row.
    async fn insert_resume_version(
        &self,
        resume_id: Uuid,
        content: &ResumeContent,
        ats_score: Option<i32>,
    ) -> Result<ResumeVersion, StoreError>;
    async fn get_resume_version(
        &self,
        version_id: Uuid,
    ) -> Result<Option<ResumeVersion>, StoreError>;
    async fn list_versions(&self, resume_id: Uuid) -> Result<Vec<ResumeVersion>, StoreError>;
}

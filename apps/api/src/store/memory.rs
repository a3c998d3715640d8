//! In-process store used by the pipeline and router tests.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{BatchStore, StoreError};
use crate::models::batch::{
    Batch, BatchItem, BatchStatus, ItemCompletion, ItemCounts, ItemJd, ItemStatus, NewBatchItem,
};
use crate::models::resume::{NewResume, Resume, ResumeContent, ResumeVersion};

#[derive(Default)]
struct Tables {
    batches: HashMap<Uuid, Batch>,
    // Insertion order doubles as creation order.
    items: Vec<BatchItem>,
    resumes: HashMap<Uuid, Resume>,
    versions: Vec<ResumeVersion>,
    fail_queued_lookup: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `queued_items` fail, to exercise orchestration-level failures.
    pub async fn break_queued_lookup(&self) {
        self.tables.lock().await.fail_queued_lookup = true;
    }

    pub async fn backdate_batch(&self, batch_id: Uuid, by: Duration) {
        let mut tables = self.tables.lock().await;
        if let Some(batch) = tables.batches.get_mut(&batch_id) {
            batch.updated_at -= chrono::Duration::from_std(by).unwrap_or_default();
        }
    }

    pub async fn backdate_item(&self, item_id: Uuid, by: Duration) {
        let mut tables = self.tables.lock().await;
        if let Some(item) = tables.items.iter_mut().find(|i| i.id == item_id) {
            item.updated_at -= chrono::Duration::from_std(by).unwrap_or_default();
        }
    }
}

fn item_mut<'a>(tables: &'a mut Tables, item_id: Uuid) -> Result<&'a mut BatchItem, StoreError> {
    tables
        .items
        .iter_mut()
        .find(|i| i.id == item_id)
        .ok_or_else(|| StoreError::NotFound(format!("Batch item {item_id} not found")))
}

fn batch_mut(tables: &mut Tables, batch_id: Uuid) -> Result<&mut Batch, StoreError> {
    tables
        .batches
        .get_mut(&batch_id)
        .ok_or_else(|| StoreError::NotFound(format!("Batch {batch_id} not found")))
}

#[async_trait]
impl BatchStore for MemoryStore {
    async fn create_batch(&self, user_id: Uuid, label: &str) -> Result<Batch, StoreError> {
        let now = Utc::now();
        let batch = Batch {
            id: Uuid::new_v4(),
            user_id,
            label: label.to_string(),
            total: 0,
            processed: 0,
            failed: 0,
            status: BatchStatus::Created,
            created_at: now,
            updated_at: now,
            started_at: None,
            finished_at: None,
        };
        self.tables
            .lock()
            .await
            .batches
            .insert(batch.id, batch.clone());
        Ok(batch)
    }

    async fn get_batch(&self, batch_id: Uuid) -> Result<Option<Batch>, StoreError> {
        Ok(self.tables.lock().await.batches.get(&batch_id).cloned())
    }

    async fn set_batch_status(
        &self,
        batch_id: Uuid,
        status: BatchStatus,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let batch = batch_mut(&mut tables, batch_id)?;
        let now = Utc::now();
        batch.status = status;
        batch.updated_at = now;
        if status == BatchStatus::Running && batch.started_at.is_none() {
            batch.started_at = Some(now);
        }
        if status.is_terminal() {
            batch.finished_at = Some(now);
        }
        Ok(())
    }

    async fn claim_batch(
        &self,
        batch_id: Uuid,
        stale_after: Option<Duration>,
    ) -> Result<Option<Batch>, StoreError> {
        let mut tables = self.tables.lock().await;
        let Some(batch) = tables.batches.get_mut(&batch_id) else {
            return Ok(None);
        };
        let now = Utc::now();
        let stale = stale_after.is_some_and(|after| {
            batch.updated_at < now - chrono::Duration::from_std(after).unwrap_or_default()
        });
        let claimable = match batch.status {
            BatchStatus::Created => true,
            BatchStatus::Running => stale,
            _ => false,
        };
        if !claimable {
            return Ok(None);
        }
        batch.status = BatchStatus::Running;
        batch.started_at.get_or_insert(now);
        batch.updated_at = now;
        Ok(Some(batch.clone()))
    }

    async fn heartbeat_batch(&self, batch_id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        match tables.batches.get_mut(&batch_id) {
            Some(batch) if batch.status == BatchStatus::Running => {
                batch.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn finalize_batch(
        &self,
        batch_id: Uuid,
        counts: ItemCounts,
        status: BatchStatus,
    ) -> Result<Batch, StoreError> {
        let mut tables = self.tables.lock().await;
        let batch = batch_mut(&mut tables, batch_id)?;
        let now = Utc::now();
        batch.processed = counts.done;
        batch.failed = counts.failed;
        batch.status = status;
        batch.finished_at = Some(now);
        batch.updated_at = now;
        Ok(batch.clone())
    }

    async fn insert_items(
        &self,
        batch_id: Uuid,
        items: &[NewBatchItem],
    ) -> Result<Vec<BatchItem>, StoreError> {
        let mut tables = self.tables.lock().await;
        batch_mut(&mut tables, batch_id)?.total += items.len() as i32;

        let now = Utc::now();
        let inserted: Vec<BatchItem> = items
            .iter()
            .map(|item| BatchItem {
                id: Uuid::new_v4(),
                batch_id,
                company: item.company.clone(),
                role: item.role.clone(),
                jd_url: item.jd_url.clone(),
                jd_text: item.jd_text.clone(),
                keywords: item.keywords.clone(),
                resume_version_id: None,
                ats_score: None,
                status: ItemStatus::Queued,
                error: None,
                assets: BTreeMap::new(),
                attempts: 0,
                created_at: now,
                updated_at: now,
            })
            .collect();
        tables.items.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn list_items(&self, batch_id: Uuid) -> Result<Vec<BatchItem>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .items
            .iter()
            .filter(|i| i.batch_id == batch_id)
            .cloned()
            .collect())
    }

    async fn queued_items(&self, batch_id: Uuid) -> Result<Vec<BatchItem>, StoreError> {
        let tables = self.tables.lock().await;
        if tables.fail_queued_lookup {
            return Err(StoreError::Corrupt("queued item lookup unavailable".to_string()));
        }
        Ok(tables
            .items
            .iter()
            .filter(|i| i.batch_id == batch_id && i.status == ItemStatus::Queued)
            .cloned()
            .collect())
    }

    async fn get_item(&self, item_id: Uuid) -> Result<Option<BatchItem>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.items.iter().find(|i| i.id == item_id).cloned())
    }

    async fn claim_item(&self, item_id: Uuid) -> Result<Option<BatchItem>, StoreError> {
        let mut tables = self.tables.lock().await;
        let item = item_mut(&mut tables, item_id)?;
        if !matches!(item.status, ItemStatus::Queued | ItemStatus::Failed) {
            return Ok(None);
        }
        item.status = ItemStatus::Processing;
        item.error = None;
        item.attempts += 1;
        item.updated_at = Utc::now();
        Ok(Some(item.clone()))
    }

    async fn update_item_jd(&self, item_id: Uuid, jd: ItemJd<'_>) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let item = item_mut(&mut tables, item_id)?;
        item.company = jd.company.map(str::to_string);
        item.role = jd.role.map(str::to_string);
        item.jd_text = Some(jd.jd_text.to_string());
        item.keywords = jd.keywords.to_vec();
        item.updated_at = Utc::now();
        Ok(())
    }

    async fn complete_item(
        &self,
        item_id: Uuid,
        completion: &ItemCompletion,
    ) -> Result<BatchItem, StoreError> {
        let mut tables = self.tables.lock().await;
        let item = item_mut(&mut tables, item_id)?;
        item.status = ItemStatus::Done;
        item.error = None;
        item.resume_version_id = Some(completion.resume_version_id);
        item.ats_score = Some(completion.ats_score);
        item.assets = completion.assets.clone();
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    async fn fail_item(&self, item_id: Uuid, error: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let item = item_mut(&mut tables, item_id)?;
        item.status = ItemStatus::Failed;
        item.error = Some(error.to_string());
        item.updated_at = Utc::now();
        Ok(())
    }

    async fn count_items(&self, batch_id: Uuid) -> Result<ItemCounts, StoreError> {
        let tables = self.tables.lock().await;
        let mut counts = ItemCounts::default();
        for item in tables.items.iter().filter(|i| i.batch_id == batch_id) {
            match item.status {
                ItemStatus::Queued => counts.queued += 1,
                ItemStatus::Processing => counts.processing += 1,
                ItemStatus::Done => counts.done += 1,
                ItemStatus::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }

    async fn requeue_stale(
        &self,
        batch_id: Uuid,
        older_than: Duration,
    ) -> Result<u64, StoreError> {
        let cutoff = Utc::now() - chrono::Duration::from_std(older_than).unwrap_or_default();
        let mut tables = self.tables.lock().await;
        let mut requeued = 0;
        for item in tables.items.iter_mut().filter(|i| {
            i.batch_id == batch_id && i.status == ItemStatus::Processing && i.updated_at < cutoff
        }) {
            item.status = ItemStatus::Queued;
            item.updated_at = Utc::now();
            requeued += 1;
        }
        Ok(requeued)
    }

    async fn create_resume(
        &self,
        resume: &NewResume,
    ) -> Result<(Resume, ResumeVersion), StoreError> {
        let now = Utc::now();
        let row = Resume {
            id: Uuid::new_v4(),
            user_id: resume.user_id,
            title: resume.title.clone(),
            full_name: resume.full_name.clone(),
            email: resume.email.clone(),
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().await.resumes.insert(row.id, row.clone());
        let content = ResumeContent::Structured {
            blocks: resume.blocks.clone(),
        };
        let version = self.insert_resume_version(row.id, &content, None).await?;
        Ok((row, version))
    }

    async fn get_resume(&self, resume_id: Uuid) -> Result<Option<Resume>, StoreError> {
        Ok(self.tables.lock().await.resumes.get(&resume_id).cloned())
    }

    async fn latest_resume(
        &self,
        user_id: Uuid,
    ) -> Result<Option<(Resume, ResumeVersion)>, StoreError> {
        let tables = self.tables.lock().await;
        let Some(resume) = tables
            .resumes
            .values()
            .filter(|r| r.user_id == user_id)
            .max_by_key(|r| r.updated_at)
        else {
            return Ok(None);
        };
        let version = tables
            .versions
            .iter()
            .filter(|v| v.resume_id == resume.id)
            .max_by_key(|v| v.version)
            .cloned();
        Ok(version.map(|v| (resume.clone(), v)))
    }

    async fn insert_resume_version(
        &self,
        resume_id: Uuid,
        content: &ResumeContent,
        ats_score: Option<i32>,
    ) -> Result<ResumeVersion, StoreError> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let resume = tables
            .resumes
            .get_mut(&resume_id)
            .ok_or_else(|| StoreError::NotFound(format!("Resume {resume_id} not found")))?;
        resume.updated_at = now;

        let next = tables
            .versions
            .iter()
            .filter(|v| v.resume_id == resume_id)
            .map(|v| v.version)
            .max()
            .unwrap_or(0)
            + 1;
        let version = ResumeVersion {
            id: Uuid::new_v4(),
            resume_id,
            version: next,
            content: content.clone(),
            ats_score,
            created_at: now,
        };
        tables.versions.push(version.clone());
        Ok(version)
    }

    async fn get_resume_version(
        &self,
        version_id: Uuid,
    ) -> Result<Option<ResumeVersion>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.versions.iter().find(|v| v.id == version_id).cloned())
    }

    async fn list_versions(&self, resume_id: Uuid) -> Result<Vec<ResumeVersion>, StoreError> {
        let tables = self.tables.lock().await;
        let mut versions: Vec<_> = tables
            .versions
            .iter()
            .filter(|v| v.resume_id == resume_id)
            .cloned()
            .collect();
        versions.sort_by_key(|v| v.version);
        Ok(versions)
    }
}

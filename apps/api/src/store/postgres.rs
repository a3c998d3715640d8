use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use super::{BatchStore, StoreError};
use crate::models::batch::{
    Batch, BatchItem, BatchStatus, ItemCompletion, ItemCounts, ItemJd, ItemStatus, NewBatchItem,
};
use crate::models::resume::{NewResume, Resume, ResumeContent, ResumeVersion};

#[derive(Debug, FromRow)]
struct BatchRow {
    id: Uuid,
    user_id: Uuid,
    label: String,
    total: i32,
    processed: i32,
    failed: i32,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<BatchRow> for Batch {
    type Error = StoreError;

    fn try_from(row: BatchRow) -> Result<Self, Self::Error> {
        Ok(Batch {
            id: row.id,
            user_id: row.user_id,
            label: row.label,
            total: row.total,
            processed: row.processed,
            failed: row.failed,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            started_at: row.started_at,
            finished_at: row.finished_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct BatchItemRow {
    id: Uuid,
    batch_id: Uuid,
    company: Option<String>,
    role: Option<String>,
    jd_url: Option<String>,
    jd_text: Option<String>,
    keywords: Vec<String>,
    resume_version_id: Option<Uuid>,
    ats_score: Option<i32>,
    status: String,
    error: Option<String>,
    assets: Json<BTreeMap<String, String>>,
    attempts: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BatchItemRow> for BatchItem {
    type Error = StoreError;

    fn try_from(row: BatchItemRow) -> Result<Self, Self::Error> {
        Ok(BatchItem {
            id: row.id,
            batch_id: row.batch_id,
            company: row.company,
            role: row.role,
            jd_url: row.jd_url,
            jd_text: row.jd_text,
            keywords: row.keywords,
            resume_version_id: row.resume_version_id,
            ats_score: row.ats_score,
            status: row.status.parse()?,
            error: row.error,
            assets: row.assets.0,
            attempts: row.attempts,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ResumeRow {
    id: Uuid,
    user_id: Uuid,
    title: String,
    full_name: String,
    email: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ResumeRow> for Resume {
    fn from(row: ResumeRow) -> Self {
        Resume {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            full_name: row.full_name,
            email: row.email,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ResumeVersionRow {
    id: Uuid,
    resume_id: Uuid,
    version: i32,
    content: Json<ResumeContent>,
    ats_score: Option<i32>,
    created_at: DateTime<Utc>,
}

impl From<ResumeVersionRow> for ResumeVersion {
    fn from(row: ResumeVersionRow) -> Self {
        ResumeVersion {
            id: row.id,
            resume_id: row.resume_id,
            version: row.version,
            content: row.content.0,
            ats_score: row.ats_score,
            created_at: row.created_at,
        }
    }
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BatchStore for PgStore {
    async fn create_batch(&self, user_id: Uuid, label: &str) -> Result<Batch, StoreError> {
        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            INSERT INTO batches (id, user_id, label, total, processed, failed, status)
            VALUES ($1, $2, $3, 0, 0, 0, 'created')
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(label)
        .fetch_one(&self.pool)
        .await?;

        info!("Created batch {} for user {user_id}", row.id);
        row.try_into()
    }

    async fn get_batch(&self, batch_id: Uuid) -> Result<Option<Batch>, StoreError> {
        sqlx::query_as::<_, BatchRow>("SELECT * FROM batches WHERE id = $1")
            .bind(batch_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Batch::try_from)
            .transpose()
    }

    async fn set_batch_status(
        &self,
        batch_id: Uuid,
        status: BatchStatus,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE batches
            SET status = $2,
                started_at = CASE WHEN $2 = 'running' THEN COALESCE(started_at, now()) ELSE started_at END,
                finished_at = CASE WHEN $3 THEN now() ELSE finished_at END,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(batch_id)
        .bind(status.as_str())
        .bind(status.is_terminal())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Batch {batch_id} not found")));
        }
        Ok(())
    }

    async fn claim_batch(
        &self,
        batch_id: Uuid,
        stale_after: Option<Duration>,
    ) -> Result<Option<Batch>, StoreError> {
        sqlx::query_as::<_, BatchRow>(
            r#"
            UPDATE batches
            SET status = 'running', started_at = COALESCE(started_at, now()), updated_at = now()
            WHERE id = $1
              AND (status = 'created'
                   OR (status = 'running'
                       AND $2::float8 IS NOT NULL
                       AND updated_at < now() - make_interval(secs => $2)))
            RETURNING *
            "#,
        )
        .bind(batch_id)
        .bind(stale_after.map(|d| d.as_secs_f64()))
        .fetch_optional(&self.pool)
        .await?
        .map(Batch::try_from)
        .transpose()
    }

    async fn heartbeat_batch(&self, batch_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE batches SET updated_at = now() WHERE id = $1 AND status = 'running'",
        )
        .bind(batch_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn finalize_batch(
        &self,
        batch_id: Uuid,
        counts: ItemCounts,
        status: BatchStatus,
    ) -> Result<Batch, StoreError> {
        sqlx::query_as::<_, BatchRow>(
            r#"
            UPDATE batches
            SET processed = $2, failed = $3, status = $4,
                finished_at = now(), updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(batch_id)
        .bind(counts.done)
        .bind(counts.failed)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("Batch {batch_id} not found")))?
        .try_into()
    }

    async fn insert_items(
        &self,
        batch_id: Uuid,
        items: &[NewBatchItem],
    ) -> Result<Vec<BatchItem>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(items.len());
        for item in items {
            let row = sqlx::query_as::<_, BatchItemRow>(
                r#"
                INSERT INTO batch_items
                    (id, batch_id, company, role, jd_url, jd_text, keywords, status, assets, attempts)
                VALUES ($1, $2, $3, $4, $5, $6, $7, 'queued', '{}'::jsonb, 0)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(batch_id)
            .bind(&item.company)
            .bind(&item.role)
            .bind(&item.jd_url)
            .bind(&item.jd_text)
            .bind(&item.keywords)
            .fetch_one(&mut *tx)
            .await?;
            inserted.push(BatchItem::try_from(row)?);
        }

        sqlx::query("UPDATE batches SET total = total + $2, updated_at = now() WHERE id = $1")
            .bind(batch_id)
            .bind(inserted.len() as i32)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(inserted)
    }

    async fn list_items(&self, batch_id: Uuid) -> Result<Vec<BatchItem>, StoreError> {
        sqlx::query_as::<_, BatchItemRow>(
            "SELECT * FROM batch_items WHERE batch_id = $1 ORDER BY seq",
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(BatchItem::try_from)
        .collect()
    }

    async fn queued_items(&self, batch_id: Uuid) -> Result<Vec<BatchItem>, StoreError> {
        sqlx::query_as::<_, BatchItemRow>(
            r#"
            SELECT * FROM batch_items
            WHERE batch_id = $1 AND status = 'queued'
            ORDER BY seq
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(BatchItem::try_from)
        .collect()
    }

    async fn get_item(&self, item_id: Uuid) -> Result<Option<BatchItem>, StoreError> {
        sqlx::query_as::<_, BatchItemRow>("SELECT * FROM batch_items WHERE id = $1")
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?
            .map(BatchItem::try_from)
            .transpose()
    }

    async fn claim_item(&self, item_id: Uuid) -> Result<Option<BatchItem>, StoreError> {
        sqlx::query_as::<_, BatchItemRow>(
            r#"
            UPDATE batch_items
            SET status = 'processing', error = NULL, attempts = attempts + 1, updated_at = now()
            WHERE id = $1 AND status IN ('queued', 'failed')
            RETURNING *
            "#,
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?
        .map(BatchItem::try_from)
        .transpose()
    }

    async fn update_item_jd(&self, item_id: Uuid, jd: ItemJd<'_>) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE batch_items
            SET company = $2, role = $3, jd_text = $4, keywords = $5, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(item_id)
        .bind(jd.company)
        .bind(jd.role)
        .bind(jd.jd_text)
        .bind(jd.keywords)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn complete_item(
        &self,
        item_id: Uuid,
        completion: &ItemCompletion,
    ) -> Result<BatchItem, StoreError> {
        sqlx::query_as::<_, BatchItemRow>(
            r#"
            UPDATE batch_items
            SET status = 'done', error = NULL, resume_version_id = $2, ats_score = $3,
                assets = $4, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(item_id)
        .bind(completion.resume_version_id)
        .bind(completion.ats_score)
        .bind(Json(&completion.assets))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("Batch item {item_id} not found")))?
        .try_into()
    }

    async fn fail_item(&self, item_id: Uuid, error: &str) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE batch_items SET status = 'failed', error = $2, updated_at = now() WHERE id = $1",
        )
        .bind(item_id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count_items(&self, batch_id: Uuid) -> Result<ItemCounts, StoreError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM batch_items WHERE batch_id = $1 GROUP BY status",
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = ItemCounts::default();
        for (status, count) in rows {
            let count = count as i32;
            match status.parse::<ItemStatus>()? {
                ItemStatus::Queued => counts.queued = count,
                ItemStatus::Processing => counts.processing = count,
                ItemStatus::Done => counts.done = count,
                ItemStatus::Failed => counts.failed = count,
            }
        }
        Ok(counts)
    }

    async fn requeue_stale(
        &self,
        batch_id: Uuid,
        older_than: Duration,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE batch_items
            SET status = 'queued', updated_at = now()
            WHERE batch_id = $1
              AND status = 'processing'
              AND updated_at < now() - make_interval(secs => $2)
            "#,
        )
        .bind(batch_id)
        .bind(older_than.as_secs_f64())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn create_resume(
        &self,
        resume: &NewResume,
    ) -> Result<(Resume, ResumeVersion), StoreError> {
        let row = sqlx::query_as::<_, ResumeRow>(
            r#"
            INSERT INTO resumes (id, user_id, title, full_name, email)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(resume.user_id)
        .bind(&resume.title)
        .bind(&resume.full_name)
        .bind(&resume.email)
        .fetch_one(&self.pool)
        .await?;

        let content = ResumeContent::Structured {
            blocks: resume.blocks.clone(),
        };
        let version = self.insert_resume_version(row.id, &content, None).await?;
        Ok((row.into(), version))
    }

    async fn get_resume(&self, resume_id: Uuid) -> Result<Option<Resume>, StoreError> {
        Ok(
            sqlx::query_as::<_, ResumeRow>("SELECT * FROM resumes WHERE id = $1")
                .bind(resume_id)
                .fetch_optional(&self.pool)
                .await?
                .map(Resume::from),
        )
    }

    async fn latest_resume(
        &self,
        user_id: Uuid,
    ) -> Result<Option<(Resume, ResumeVersion)>, StoreError> {
        let Some(resume) = sqlx::query_as::<_, ResumeRow>(
            "SELECT * FROM resumes WHERE user_id = $1 ORDER BY updated_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let version = sqlx::query_as::<_, ResumeVersionRow>(
            "SELECT * FROM resume_versions WHERE resume_id = $1 ORDER BY version DESC LIMIT 1",
        )
        .bind(resume.id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(version.map(|v| (resume.into(), v.into())))
    }

    async fn insert_resume_version(
        &self,
        resume_id: Uuid,
        content: &ResumeContent,
        ats_score: Option<i32>,
    ) -> Result<ResumeVersion, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the resume serializes version allocation across workers.
        let locked: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM resumes WHERE id = $1 FOR UPDATE")
                .bind(resume_id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(StoreError::NotFound(format!("Resume {resume_id} not found")));
        }

        let row = sqlx::query_as::<_, ResumeVersionRow>(
            r#"
            INSERT INTO resume_versions (id, resume_id, version, content, ats_score)
            SELECT $1, $2, COALESCE(MAX(version), 0) + 1, $3, $4
            FROM resume_versions
            WHERE resume_id = $2
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(resume_id)
        .bind(Json(content))
        .bind(ats_score)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE resumes SET updated_at = now() WHERE id = $1")
            .bind(resume_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("Inserted resume {resume_id} version {}", row.version);
        Ok(row.into())
    }

    async fn get_resume_version(
        &self,
        version_id: Uuid,
    ) -> Result<Option<ResumeVersion>, StoreError> {
        Ok(
            sqlx::query_as::<_, ResumeVersionRow>("SELECT * FROM resume_versions WHERE id = $1")
                .bind(version_id)
                .fetch_optional(&self.pool)
                .await?
                .map(ResumeVersion::from),
        )
    }

    async fn list_versions(&self, resume_id: Uuid) -> Result<Vec<ResumeVersion>, StoreError> {
        Ok(sqlx::query_as::<_, ResumeVersionRow>(
            "SELECT * FROM resume_versions WHERE resume_id = $1 ORDER BY version ASC",
        )
        .bind(resume_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(ResumeVersion::from)
        .collect())
    }
}

//! Single-item pipeline: JD → coaching → new resume version → PDFs → upload → outreach.
//!
//! Any stage error aborts the rest and leaves the item `failed` with the error
//! message. Objects uploaded during the failed attempt are deleted best-effort.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::outreach::{self, Target};
use super::runner::ItemProcessor;
use crate::coaching::{Coach, JdTarget, TailorBackend};
use crate::jd::{extract_keywords, normalize, JdFetcher, JdInput, NormalizeError, NormalizedJd};
use crate::models::batch::{asset, BatchItem, ItemCompletion, ItemJd};
use crate::models::resume::{ResumeContent, TailoredContent};
use crate::notify::{ItemEvent, Notifier, ITEM_COMPLETED};
use crate::render::{
    CoverLetterDocument, Document, PdfRenderer, RenderError, ResumeDocument, PDF_CONTENT_TYPE,
};
use crate::resumes::latest_for_user;
use crate::storage::{item_key, ObjectStorage, StorageError};
use crate::store::{BatchStore, StoreError};

const RESUME_FILE: &str = "resume.pdf";
const COVER_LETTER_FILE: &str = "cover_letter.pdf";

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Batch item {0} not found")]
    ItemNotFound(Uuid),

    #[error("Batch {0} not found")]
    BatchNotFound(Uuid),

    #[error("user {0} has no resume to tailor")]
    NoResume(Uuid),

    #[error("job description: {0}")]
    Jd(#[from] NormalizeError),

    #[error("render: {0}")]
    Render(#[from] RenderError),

    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("store: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemOutcome {
    pub item: BatchItem,
    /// Which tailoring backend produced the version; `None` when nothing ran.
    pub backend: Option<TailorBackend>,
    /// The item was `done` or claimed by another worker, and was returned as stored.
    pub skipped: bool,
}

pub struct BatchItemProcessor {
    store: Arc<dyn BatchStore>,
    fetcher: Arc<dyn JdFetcher>,
    coach: Coach,
    renderer: Arc<dyn PdfRenderer>,
    storage: Arc<dyn ObjectStorage>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl BatchItemProcessor {
    pub fn new(
        store: Arc<dyn BatchStore>,
        fetcher: Arc<dyn JdFetcher>,
        coach: Coach,
        renderer: Arc<dyn PdfRenderer>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self {
            store,
            fetcher,
            coach,
            renderer,
            storage,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Stored JD text is used as-is (ingest already normalized it); otherwise
    /// the URL is fetched now so failures go through the runner's retries.
    async fn resolve_jd(&self, item: &BatchItem) -> Result<NormalizedJd, ProcessError> {
        if let Some(text) = item.jd_text.as_deref().filter(|t| !t.trim().is_empty()) {
            let keywords = if item.keywords.is_empty() {
                extract_keywords(text)
            } else {
                item.keywords.clone()
            };
            return Ok(NormalizedJd {
                company: item.company.clone(),
                role: item.role.clone(),
                jd_text: text.to_string(),
                keywords,
            });
        }

        let input = JdInput {
            url: item.jd_url.clone(),
            text: None,
            company: item.company.clone(),
            role: item.role.clone(),
        };
        Ok(normalize(&input, self.fetcher.as_ref()).await?)
    }

    async fn upload(
        &self,
        key: String,
        body: Bytes,
        uploaded: &mut Vec<String>,
    ) -> Result<String, ProcessError> {
        self.storage.put(&key, body, PDF_CONTENT_TYPE).await?;
        uploaded.push(key.clone());
        Ok(self.storage.url(&key).await?)
    }

    async fn run_stages(
        &self,
        item: &BatchItem,
        uploaded: &mut Vec<String>,
    ) -> Result<(BatchItem, TailorBackend), ProcessError> {
        let batch = self
            .store
            .get_batch(item.batch_id)
            .await?
            .ok_or(ProcessError::BatchNotFound(item.batch_id))?;
        let (resume, version) = latest_for_user(self.store.as_ref(), batch.user_id)
            .await?
            .ok_or(ProcessError::NoResume(batch.user_id))?;

        let jd = self.resolve_jd(item).await?;
        self.store
            .update_item_jd(
                item.id,
                ItemJd {
                    company: jd.company.as_deref(),
                    role: jd.role.as_deref(),
                    jd_text: &jd.jd_text,
                    keywords: &jd.keywords,
                },
            )
            .await?;
        info!(
            "Item {}: JD normalized ({} keywords, company={:?}, role={:?})",
            item.id,
            jd.keywords.len(),
            jd.company,
            jd.role
        );

        // Always tailor the structured blocks, never a previous pass's rewrite.
        let blocks = version.content.blocks().to_vec();
        let target_jd = JdTarget {
            text: jd.jd_text.clone(),
            keywords: jd.keywords.clone(),
        };
        let tailoring = self.coach.tailor(&blocks, &target_jd).await;
        info!(
            "Item {}: tailored with {:?} backend, ats_score={}",
            item.id, tailoring.backend, tailoring.ats_score
        );

        let content = ResumeContent::Tailored {
            blocks: blocks.clone(),
            tailored: TailoredContent {
                rewritten_blocks: tailoring.rewritten_blocks.clone(),
                ats_score: tailoring.ats_score,
                gap_suggestions: tailoring.gap_suggestions.clone(),
                jd_keywords: jd.keywords.clone(),
                jd_text: jd.jd_text.clone(),
            },
        };
        let new_version = self
            .store
            .insert_resume_version(resume.id, &content, Some(tailoring.ats_score))
            .await?;

        let target = Target::new(jd.company.as_deref(), jd.role.as_deref());
        let letter = outreach::cover_letter(&resume.full_name, target, &tailoring);

        let resume_pdf = self
            .renderer
            .render(&Document::Resume(ResumeDocument::tailored(
                &resume,
                &blocks,
                &tailoring.rewritten_blocks,
            )))
            .await?;
        let letter_pdf = self
            .renderer
            .render(&Document::CoverLetter(CoverLetterDocument {
                full_name: resume.full_name.clone(),
                email: resume.email.clone(),
                body: letter.clone(),
            }))
            .await?;

        let resume_url = self
            .upload(item_key(batch.id, item.id, RESUME_FILE), resume_pdf, uploaded)
            .await?;
        let letter_url = self
            .upload(item_key(batch.id, item.id, COVER_LETTER_FILE), letter_pdf, uploaded)
            .await?;

        let messages = outreach::compose(&resume.full_name, target, &tailoring);
        let assets = BTreeMap::from([
            (asset::RESUME_PDF.to_string(), resume_url),
            (asset::COVER_LETTER_PDF.to_string(), letter_url),
            (asset::COVER_LETTER_TEXT.to_string(), letter),
            (asset::EMAIL_SUBJECT.to_string(), messages.email_subject),
            (asset::EMAIL_BODY.to_string(), messages.email_body),
            (asset::INMAIL.to_string(), messages.inmail),
        ]);

        let done = self
            .store
            .complete_item(
                item.id,
                &ItemCompletion {
                    resume_version_id: new_version.id,
                    ats_score: tailoring.ats_score,
                    assets,
                },
            )
            .await?;

        Ok((done, tailoring.backend))
    }

    async fn discard_uploads(&self, item_id: Uuid, keys: &[String]) {
        for key in keys {
            match self.storage.delete(key).await {
                Ok(()) => info!("Item {item_id}: removed {key} after failed attempt"),
                Err(e) => warn!("Item {item_id}: could not remove {key}: {e}"),
            }
        }
    }

    async fn notify_completed(&self, item: &BatchItem) {
        let (Some(notifier), Some(resume_version_id), Some(ats_score)) =
            (&self.notifier, item.resume_version_id, item.ats_score)
        else {
            return;
        };
        let event = ItemEvent {
            event: ITEM_COMPLETED,
            batch_id: item.batch_id,
            item_id: item.id,
            resume_version_id,
            ats_score,
            assets: item.assets.clone(),
        };
        if let Err(e) = notifier.notify(&event).await {
            warn!("Item {}: webhook failed, ignoring: {e}", item.id);
        }
    }
}

#[async_trait]
impl ItemProcessor for BatchItemProcessor {
    async fn process(&self, item_id: Uuid) -> Result<ItemOutcome, ProcessError> {
        let item = self
            .store
            .get_item(item_id)
            .await?
            .ok_or(ProcessError::ItemNotFound(item_id))?;
        // Done items and items held by another worker are left alone.
        let Some(item) = self.store.claim_item(item_id).await? else {
            info!("Item {item_id} is {}, skipping", item.status.as_str());
            return Ok(ItemOutcome {
                item,
                backend: None,
                skipped: true,
            });
        };
        info!("Item {item_id}: attempt {} started", item.attempts);

        let mut uploaded = Vec::new();
        match self.run_stages(&item, &mut uploaded).await {
            Ok((done, backend)) => {
                info!("Item {item_id}: done");
                self.notify_completed(&done).await;
                Ok(ItemOutcome {
                    item: done,
                    backend: Some(backend),
                    skipped: false,
                })
            }
            Err(e) => {
                warn!("Item {item_id}: attempt {} failed: {e}", item.attempts);
                self.discard_uploads(item_id, &uploaded).await;
                if let Err(write_err) = self.store.fail_item(item_id, &e.to_string()).await {
                    error!("Item {item_id}: could not record failure: {write_err}");
                }
                Err(e)
            }
        }
    }
}

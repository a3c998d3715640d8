//! Axum route handlers for the Batch API.

use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::batch::ingest::{ingest, IngestResponse};
use crate::batch::processor::ItemOutcome;
use crate::batch::runner::{self, cancel_batch, final_status, RunOptions};
use crate::errors::AppError;
use crate::jd::JdInput;
use crate::models::batch::{Batch, BatchItem, BatchStatus, ItemCounts};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBatchRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct BatchDetailResponse {
    pub batch: Batch,
    pub counts: ItemCounts,
    pub items: Vec<BatchItem>,
}

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub items: Vec<JdInput>,
}

/// Per-run overrides of the configured defaults.
#[derive(Debug, Default, Deserialize)]
pub struct RunRequest {
    pub concurrency: Option<usize>,
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct RunAccepted {
    pub batch_id: Uuid,
    pub queued: i32,
    pub options: RunOptionsView,
}

#[derive(Debug, Serialize)]
pub struct RunOptionsView {
    pub concurrency: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

const MAX_CONCURRENCY: usize = 16;
const MAX_RETRIES: u32 = 10;

impl RunRequest {
    fn resolve(&self, mut options: RunOptions) -> Result<RunOptions, AppError> {
        if let Some(concurrency) = self.concurrency {
            if concurrency == 0 || concurrency > MAX_CONCURRENCY {
                return Err(AppError::Validation(format!(
                    "concurrency must be between 1 and {MAX_CONCURRENCY}"
                )));
            }
            options.concurrency = concurrency;
        }
        if let Some(max_retries) = self.max_retries {
            if max_retries == 0 || max_retries > MAX_RETRIES {
                return Err(AppError::Validation(format!(
                    "max_retries must be between 1 and {MAX_RETRIES}"
                )));
            }
            options.max_retries = max_retries;
        }
        if let Some(ms) = self.retry_delay_ms {
            options.retry_delay = Duration::from_millis(ms);
        }
        Ok(options)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/batches
pub async fn handle_create_batch(
    State(state): State<AppState>,
    Json(request): Json<CreateBatchRequest>,
) -> Result<(StatusCode, Json<Batch>), AppError> {
    let label = request.label.trim();
    let label = if label.is_empty() { "Untitled batch" } else { label };
    let batch = state.store.create_batch(request.user_id, label).await?;
    info!("Created batch {} for user {}", batch.id, batch.user_id);
    Ok((StatusCode::CREATED, Json(batch)))
}

/// GET /api/v1/batches/:id
pub async fn handle_get_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> Result<Json<BatchDetailResponse>, AppError> {
    let batch = state
        .store
        .get_batch(batch_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Batch {batch_id} not found")))?;
    let counts = state.store.count_items(batch_id).await?;
    let items = state.store.list_items(batch_id).await?;
    Ok(Json(BatchDetailResponse {
        batch,
        counts,
        items,
    }))
}

/// POST /api/v1/batches/:id/items
///
/// Queues job postings. Bad items are reported per index and do not fail the request.
pub async fn handle_ingest(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    let response = ingest(
        state.store.as_ref(),
        batch_id,
        &request.items,
        state.config.ingest_max_items,
    )
    .await?;
    Ok(Json(response))
}

/// POST /api/v1/batches/:id/run
///
/// Claims the batch, then runs it in the background. Poll the batch for progress.
/// A `running` batch is only taken over when stale recovery is configured and its
/// runner has stopped checking in.
pub async fn handle_run_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
    request: Option<Json<RunRequest>>,
) -> Result<(StatusCode, Json<RunAccepted>), AppError> {
    let mut options: RunOptions = state.config.batch.into();
    options.stale_after = state.config.stale_processing_after;
    let options = request.map(|Json(r)| r).unwrap_or_default().resolve(options)?;

    runner::claim_batch(state.store.as_ref(), batch_id, options.stale_after).await?;
    let counts = state.store.count_items(batch_id).await?;

    let store = state.store.clone();
    let processor = state.processor.clone();
    tokio::spawn(async move {
        if let Err(e) = runner::run_claimed(store, processor, batch_id, options).await {
            error!("Background run of batch {batch_id} failed: {e}");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(RunAccepted {
            batch_id,
            queued: counts.queued,
            options: RunOptionsView {
                concurrency: options.concurrency,
                max_retries: options.max_retries,
                retry_delay_ms: options.retry_delay.as_millis() as u64,
            },
        }),
    ))
}

/// POST /api/v1/batches/:id/cancel
pub async fn handle_cancel_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> Result<Json<Batch>, AppError> {
    let batch = cancel_batch(state.store.as_ref(), batch_id).await?;
    Ok(Json(batch))
}

/// POST /api/v1/batch-items/:id/process
///
/// Runs one attempt for a single item outside the worker pool, e.g. to retry a
/// failed item after fixing its cause. Counters of a finished batch are refreshed.
pub async fn handle_process_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<ItemOutcome>, AppError> {
    let item = state
        .store
        .get_item(item_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Batch item {item_id} not found")))?;

    let result = state.processor.process(item_id).await;

    if let Some(batch) = state.store.get_batch(item.batch_id).await? {
        if matches!(batch.status, BatchStatus::Completed | BatchStatus::Failed) {
            let counts = state.store.count_items(batch.id).await?;
            state
                .store
                .finalize_batch(batch.id, counts, final_status(&counts))
                .await?;
        }
    }

    Ok(Json(result?))
}

//! Outbound notifications about finished batch items.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub mod webhook;

pub use webhook::WebhookNotifier;

pub const ITEM_COMPLETED: &str = "batch_item.completed";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to reach {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    #[error("{endpoint} returned status {status}")]
    Status { endpoint: String, status: u16 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemEvent {
    pub event: &'static str,
    pub batch_id: Uuid,
    pub item_id: Uuid,
    pub resume_version_id: Uuid,
    pub ats_score: i32,
    pub assets: BTreeMap<String, String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &ItemEvent) -> Result<(), NotifyError>;
}

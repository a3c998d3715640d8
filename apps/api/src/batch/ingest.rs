//! Ingest: validates and queues job postings into a `created` batch.

use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;
use tracing::info;
use url::Url;
use uuid::Uuid;

use crate::jd::{normalize_text, JdInput};
use crate::models::batch::{BatchStatus, NewBatchItem};
use crate::store::{BatchStore, StoreError};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Batch {0} not found")]
    BatchNotFound(Uuid),

    #[error("Batch {id} is {status} and no longer accepts items")]
    NotAccepting { id: Uuid, status: BatchStatus },

    #[error("items cannot be empty")]
    Empty,

    #[error("{count} items exceeds the limit of {max}")]
    TooMany { count: usize, max: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One item that could not be queued. Does not fail the request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemRejection {
    pub index: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    pub queued: usize,
    pub duplicates: usize,
    pub item_ids: Vec<Uuid>,
    pub errors: Vec<ItemRejection>,
}

/// Trimmed, fragment-free http(s) URL used as the dedup key.
pub fn normalize_url(raw: &str) -> Result<String, String> {
    let mut url = Url::parse(raw.trim()).map_err(|e| format!("invalid url: {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported url scheme: {}", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("url has no host".to_string());
    }
    url.set_fragment(None);
    Ok(url.to_string())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Text items are normalized here since that needs no network; URL-only
/// items are left for the processor so fetch failures get retried.
fn prepare(item: &JdInput, url: Option<String>) -> Result<NewBatchItem, String> {
    let company = non_blank(item.company.as_deref());
    let role = non_blank(item.role.as_deref());

    match non_blank(item.text.as_deref()) {
        Some(text) => {
            let jd = normalize_text(text, company, role).map_err(|e| e.to_string())?;
            Ok(NewBatchItem {
                company: jd.company,
                role: jd.role,
                jd_url: url,
                jd_text: Some(jd.jd_text),
                keywords: jd.keywords,
            })
        }
        None => Ok(NewBatchItem {
            company: company.map(str::to_string),
            role: role.map(str::to_string),
            jd_url: url,
            jd_text: None,
            keywords: Vec::new(),
        }),
    }
}

pub async fn ingest(
    store: &dyn BatchStore,
    batch_id: Uuid,
    items: &[JdInput],
    max_items: usize,
) -> Result<IngestResponse, IngestError> {
    let batch = store
        .get_batch(batch_id)
        .await?
        .ok_or(IngestError::BatchNotFound(batch_id))?;
    if batch.status != BatchStatus::Created {
        return Err(IngestError::NotAccepting {
            id: batch_id,
            status: batch.status,
        });
    }
    if items.is_empty() {
        return Err(IngestError::Empty);
    }
    if items.len() > max_items {
        return Err(IngestError::TooMany {
            count: items.len(),
            max: max_items,
        });
    }

    let mut seen_urls: HashSet<String> = store
        .list_items(batch_id)
        .await?
        .into_iter()
        .filter_map(|item| item.jd_url)
        .filter_map(|url| normalize_url(&url).ok())
        .collect();

    let mut to_insert = Vec::new();
    let mut errors = Vec::new();
    let mut duplicates = 0;

    for (index, item) in items.iter().enumerate() {
        let url = match non_blank(item.url.as_deref()).map(normalize_url).transpose() {
            Ok(url) => url,
            Err(message) => {
                errors.push(ItemRejection { index, message });
                continue;
            }
        };
        if url.is_none() && non_blank(item.text.as_deref()).is_none() {
            errors.push(ItemRejection {
                index,
                message: "either url or text is required".to_string(),
            });
            continue;
        }
        if let Some(url) = &url {
            if !seen_urls.insert(url.clone()) {
                duplicates += 1;
                continue;
            }
        }

        match prepare(item, url) {
            Ok(new_item) => to_insert.push(new_item),
            Err(message) => errors.push(ItemRejection { index, message }),
        }
    }

    let inserted = if to_insert.is_empty() {
        Vec::new()
    } else {
        store.insert_items(batch_id, &to_insert).await?
    };

    info!(
        "Ingested into batch {batch_id}: queued={} duplicates={duplicates} rejected={}",
        inserted.len(),
        errors.len()
    );

    Ok(IngestResponse {
        queued: inserted.len(),
        duplicates,
        item_ids: inserted.iter().map(|i| i.id).collect(),
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn url_item(url: &str) -> JdInput {
        JdInput {
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    fn text_item(text: &str) -> JdInput {
        JdInput {
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    async fn batch(store: &MemoryStore) -> Uuid {
        store.create_batch(Uuid::new_v4(), "spring").await.unwrap().id
    }

    #[test]
    fn test_normalize_url_drops_fragment_and_whitespace() {
        assert_eq!(
            normalize_url("  https://jobs.example.com/42#apply ").unwrap(),
            "https://jobs.example.com/42"
        );
        assert!(normalize_url("ftp://jobs.example.com/42").is_err());
        assert!(normalize_url("not a url").is_err());
    }

    #[tokio::test]
    async fn test_dedup_within_request_and_against_batch() {
        let store = MemoryStore::new();
        let id = batch(&store).await;

        let first = ingest(&store, id, &[url_item("https://jobs.example.com/1")], 50)
            .await
            .unwrap();
        assert_eq!(first.queued, 1);

        let second = ingest(
            &store,
            id,
            &[
                url_item("https://jobs.example.com/1#top"),
                url_item("https://jobs.example.com/2"),
                url_item("https://jobs.example.com/2"),
            ],
            50,
        )
        .await
        .unwrap();
        assert_eq!(second.queued, 1);
        assert_eq!(second.duplicates, 2);

        let stored = store.get_batch(id).await.unwrap().unwrap();
        assert_eq!(stored.total, 2);
    }

    #[tokio::test]
    async fn test_bad_items_are_reported_per_index() {
        let store = MemoryStore::new();
        let id = batch(&store).await;

        let response = ingest(
            &store,
            id,
            &[
                url_item("mailto:jobs@example.com"),
                JdInput::default(),
                text_item("Senior Backend Engineer needed. Must know Python."),
                text_item("<div><script>x()</script></div>"),
            ],
            50,
        )
        .await
        .unwrap();

        assert_eq!(response.queued, 1);
        let indexes: Vec<usize> = response.errors.iter().map(|e| e.index).collect();
        assert_eq!(indexes, vec![0, 1, 3]);
    }

    #[tokio::test]
    async fn test_text_items_are_normalized_up_front() {
        let store = MemoryStore::new();
        let id = batch(&store).await;

        let response = ingest(
            &store,
            id,
            &[text_item("Senior Backend Engineer needed. Must know Python and Kubernetes.")],
            50,
        )
        .await
        .unwrap();
        let item = store.get_item(response.item_ids[0]).await.unwrap().unwrap();
        assert_eq!(item.role.as_deref(), Some("Senior Backend Engineer"));
        assert!(item.keywords.contains(&"kubernetes".to_string()));
        assert!(item.jd_text.is_some());
    }

    #[tokio::test]
    async fn test_request_level_rejections() {
        let store = MemoryStore::new();
        let id = batch(&store).await;

        let err = ingest(&store, id, &[], 50).await.unwrap_err();
        assert!(matches!(err, IngestError::Empty));

        let many: Vec<JdInput> = (0..3)
            .map(|i| url_item(&format!("https://jobs.example.com/{i}")))
            .collect();
        let err = ingest(&store, id, &many, 2).await.unwrap_err();
        assert!(matches!(err, IngestError::TooMany { count: 3, max: 2 }));

        let err = ingest(&store, Uuid::new_v4(), &many, 50).await.unwrap_err();
        assert!(matches!(err, IngestError::BatchNotFound(_)));

        store.set_batch_status(id, BatchStatus::Running).await.unwrap();
        let err = ingest(&store, id, &many, 50).await.unwrap_err();
        assert!(matches!(err, IngestError::NotAccepting { .. }));
    }
}

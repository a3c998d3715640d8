//! Object storage for rendered assets.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

pub mod s3;

pub use s3::S3Storage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("upload of {key} failed: {message}")]
    Upload { key: String, message: String },

    #[error("could not sign URL for {key}: {message}")]
    Presign { key: String, message: String },

    #[error("delete of {key} failed: {message}")]
    Delete { key: String, message: String },
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StorageError>;

    /// A URL the item's consumer can download the object from.
    async fn url(&self, key: &str) -> Result<String, StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// `batches/{batch_id}/{item_id}/{file_name}`
pub fn item_key(batch_id: Uuid, item_id: Uuid, file_name: &str) -> String {
    format!("batches/{batch_id}/{item_id}/{file_name}")
}

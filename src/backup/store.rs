// pg-s3-backup/src/backup/store.rs
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::Result;

/// One entry of a bucket listing.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteObject {
    pub key: String,
    pub last_modified: Option<DateTime<Utc>>,
}

/// A bounded page of a bucket listing.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub objects: Vec<RemoteObject>,
    /// Set when the backend has more pages after this one.
    pub next_continuation_token: Option<String>,
}

/// Object storage as seen by the backup pipeline.
#[async_trait]
pub trait BackupStore: Send + Sync {
    /// Uploads the file at `path` under `object_key(subfolder, name)` in the configured bucket.
    async fn upload(&self, name: &str, path: &Path) -> Result<()>;

    /// Fetches one listing page. `None` requests the first page.
    async fn list_page(&self, bucket: &str, continuation_token: Option<String>)
    -> Result<ListingPage>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;
}

/// `<subfolder>/<name>` when a subfolder is configured, otherwise `name` unchanged.
pub fn object_key(subfolder: Option<&str>, name: &str) -> String {
    match subfolder {
        Some(folder) => format!("{}/{}", folder, name),
        None => name.to_string(),
    }
}

// pg-s3-backup/src/backup/retention.rs
use chrono::{DateTime, Duration, Utc};
use futures::{Stream, TryStreamExt, stream};
use tracing::info;

use crate::backup::store::{BackupStore, RemoteObject};
use crate::errors::{BackupError, Result};

/// Backups older than this are deleted from the bucket.
pub const RETENTION_DAYS: i64 = 4;

pub fn retention_threshold(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(RETENTION_DAYS)
}

/// Objects without a last-modified stamp are never considered expired.
pub fn is_expired(object: &RemoteObject, threshold: DateTime<Utc>) -> bool {
    object.last_modified.is_some_and(|modified| modified < threshold)
}

/// Lazily walks a bucket listing, one page per item, until the backend reports no further pages.
pub fn list_pages<'a>(
    store: &'a dyn BackupStore,
    bucket: &'a str,
) -> impl Stream<Item = Result<Vec<RemoteObject>>> + 'a {
    // State: `None` once the last page was fetched, otherwise the token for the next request.
    stream::try_unfold(Some(None::<String>), move |state| async move {
        let Some(token) = state else {
            return Ok(None);
        };
        let page = store.list_page(bucket, token).await?;
        let next_state = page.next_continuation_token.map(Some);
        Ok::<_, BackupError>(Some((page.objects, next_state)))
    })
}

/// Deletes every object in `bucket` last modified before `now - RETENTION_DAYS`.
///
/// Objects are deleted one request at a time; the first failed delete aborts the prune.
/// Returns the number of deleted objects.
pub async fn prune_old_backups(
    store: &dyn BackupStore,
    bucket: &str,
    now: DateTime<Utc>,
) -> Result<usize> {
    let threshold = retention_threshold(now);
    info!("Deleting backups older than {} from bucket {}", threshold.to_rfc3339(), bucket);

    let mut pages = Box::pin(list_pages(store, bucket));
    let mut deleted = 0;
    while let Some(objects) = pages.try_next().await? {
        for object in objects.iter().filter(|o| is_expired(o, threshold)) {
            store.delete_object(bucket, &object.key).await?;
            info!("🗑 Deleted old backup {}", object.key);
            deleted += 1;
        }
    }

    info!("Retention pruning removed {} object(s)", deleted);
    Ok(deleted)
}

// pg-s3-backup/src/utils/naming.rs
use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use url::Url;

use crate::errors::{BackupError, Result};

static KEY_UNSAFE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[:.]+").expect("static regex is valid"));

/// ISO-8601 UTC timestamp with millisecond precision, made safe for file names and object keys.
///
/// `2026-10-18T09:05:03.120Z` becomes `2026-10-18T09-05-03-120Z`.
pub fn archive_timestamp(now: DateTime<Utc>) -> String {
    let iso = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    KEY_UNSAFE.replace_all(&iso, "-").into_owned()
}

/// `<db>_<prefix>-<timestamp>.tar.gz`, or `<prefix>-<timestamp>.tar.gz` for a whole-cluster dump.
pub fn archive_file_name(database: Option<&str>, prefix: &str, timestamp: &str) -> String {
    match database {
        Some(db) => format!("{}_{}-{}.tar.gz", db, prefix, timestamp),
        None => format!("{}-{}.tar.gz", prefix, timestamp),
    }
}

/// Replaces the final path segment of a cluster URL with `database`.
/// Credentials, host, port and query parameters are kept.
pub fn database_url_for(cluster_url: &str, database: &str) -> Result<String> {
    let mut url = Url::parse(cluster_url)
        .map_err(|e| BackupError::Config(format!("Invalid database URL format: {}", e)))?;
    let head = url
        .path()
        .rsplit_once('/')
        .map(|(head, _)| head.to_string())
        .unwrap_or_default();
    url.set_path(&format!("{}/{}", head, database));
    Ok(url.to_string())
}

/// Masks the password of a connection URL so it can be logged.
pub fn redact_url(connection: &str) -> String {
    match Url::parse(connection) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("****"));
            }
            url.to_string()
        }
        Err(_) => "<unparseable connection string>".to_string(),
    }
}

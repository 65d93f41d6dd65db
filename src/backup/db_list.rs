// pg-s3-backup/src/backup/db_list.rs
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::errors::{BackupError, Result};
use crate::utils::find_psql_executable;
use crate::utils::naming::redact_url;

const LIST_DATABASES_QUERY: &str =
    "SELECT datname FROM pg_database WHERE datistemplate = false AND datname NOT IN ('postgres');";

#[async_trait]
pub trait DatabaseLister: Send + Sync {
    /// Names of the databases on the cluster that should be backed up.
    async fn list_databases(&self, cluster_url: &str) -> Result<Vec<String>>;
}

/// Lists databases by running `psql` against the cluster.
pub struct PsqlLister;

#[async_trait]
impl DatabaseLister for PsqlLister {
    async fn list_databases(&self, cluster_url: &str) -> Result<Vec<String>> {
        info!("Fetching list of databases from {}", redact_url(cluster_url));
        let psql_path = find_psql_executable().map_err(BackupError::Connection)?;

        // -A unaligned, -t tuples only: one bare name per line
        let mut command = Command::new(&psql_path);
        command
            .arg(cluster_url)
            .arg("-At")
            .arg("-c")
            .arg(LIST_DATABASES_QUERY);

        run_list_query(command).await
    }
}

/// Runs the catalog query process. A nonzero exit is fatal; stderr alongside a
/// successful exit is only reported as a warning.
pub async fn run_list_query(mut command: Command) -> Result<Vec<String>> {
    let output = command
        .output()
        .await
        .map_err(|e| BackupError::Connection(format!("Failed to execute psql: {}", e)))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        return Err(BackupError::Connection(format!(
            "psql exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    if !stderr.trim().is_empty() {
        warn!("psql reported: {}", stderr.trim());
    }

    Ok(parse_database_list(&String::from_utf8_lossy(&output.stdout)))
}

/// Parses `psql -At` output into database names, dropping anything not eligible for backup.
pub fn parse_database_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .filter(|name| is_backup_eligible(name))
        .map(str::to_string)
        .collect()
}

/// The administrative `postgres` database and template databases are never backed up.
pub fn is_backup_eligible(name: &str) -> bool {
    name != "postgres" && !name.starts_with("template")
}

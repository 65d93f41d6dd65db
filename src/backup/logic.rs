// pg-s3-backup/src/backup/logic.rs
use std::env;
use std::path::{Path, PathBuf};

use bytesize::ByteSize;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::backup::db_dump::Dumper;
use crate::backup::db_list::DatabaseLister;
use crate::backup::retention::prune_old_backups;
use crate::backup::store::BackupStore;
use crate::config::AppConfig;
use crate::errors::{BackupError, Result};
use crate::utils::naming::{archive_file_name, archive_timestamp, database_url_for};

/// One backup run: enumerate → prune → {dump → upload → delete local file} per database.
///
/// Every step is awaited before the next one starts and the first failure aborts the run.
pub struct BackupPipeline<'a> {
    lister: &'a dyn DatabaseLister,
    dumper: &'a dyn Dumper,
    store: &'a dyn BackupStore,
    cluster_url: String,
    bucket: String,
    file_prefix: String,
    work_dir: PathBuf,
}

impl<'a> BackupPipeline<'a> {
    pub fn new(
        config: &AppConfig,
        lister: &'a dyn DatabaseLister,
        dumper: &'a dyn Dumper,
        store: &'a dyn BackupStore,
    ) -> Self {
        BackupPipeline {
            lister,
            dumper,
            store,
            cluster_url: config.database_url.clone(),
            bucket: config.storage.bucket_name.clone(),
            file_prefix: config.backup_file_prefix.clone(),
            work_dir: env::temp_dir(),
        }
    }

    /// Directory the archives are written to before upload. Defaults to the platform temp dir.
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    /// Backs up every eligible database on the cluster. Returns the uploaded archive names.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        info!("Initiating DB backup...");

        let databases = self.lister.list_databases(&self.cluster_url).await?;
        prune_old_backups(self.store, &self.bucket, now).await?;

        if databases.is_empty() {
            warn!("No databases found to back up");
        } else {
            info!("Found databases: {}", databases.join(", "));
        }

        let timestamp = archive_timestamp(now);
        let mut uploaded = Vec::with_capacity(databases.len());
        for db in &databases {
            let file_name = archive_file_name(Some(db), &self.file_prefix, &timestamp);
            let connection = database_url_for(&self.cluster_url, db)?;

            self.backup_one(&connection, &file_name).await?;

            info!("✔ Backup of \"{}\" completed", db);
            uploaded.push(file_name);
        }

        info!("DB backup complete...");
        Ok(uploaded)
    }

    /// Dumps the configured connection as a single archive, without enumeration or pruning.
    pub async fn run_legacy(&self, now: DateTime<Utc>) -> Result<String> {
        info!("Initiating DB backup...");

        let file_name = archive_file_name(None, &self.file_prefix, &archive_timestamp(now));
        self.backup_one(&self.cluster_url, &file_name).await?;

        info!("DB backup complete...");
        Ok(file_name)
    }

    async fn backup_one(&self, connection: &str, file_name: &str) -> Result<()> {
        let path = self.work_dir.join(file_name);

        let archive = self.dumper.dump(connection, &path).await?;
        info!("Uploading backup {} ({})...", file_name, ByteSize::b(archive.size));
        self.store.upload(file_name, &archive.path).await?;
        remove_local_archive(&archive.path).await
    }
}

async fn remove_local_archive(path: &Path) -> Result<()> {
    info!("Deleting file {}...", path.display());
    tokio::fs::remove_file(path).await.map_err(|e| {
        BackupError::Delete(format!("Failed to delete local file {}: {}", path.display(), e))
    })
}

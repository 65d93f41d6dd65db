pub(crate) mod db_dump; // pg_dump → gzip archive
pub(crate) mod db_list; // database enumeration via psql
mod logic;
pub(crate) mod retention; // 4-day retention pruning
pub(crate) mod s3_upload; // S3 client: upload, list, delete
pub(crate) mod store;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use crate::config::AppConfig;
use db_dump::PgDumper;
use db_list::PsqlLister;
use logic::BackupPipeline;
use s3_upload::S3BackupStore;

/// Backs up every database on the configured cluster and prunes expired backups.
pub async fn run_backup_flow(app_config: &AppConfig) -> Result<()> {
    let store = S3BackupStore::connect(&app_config.storage).await;
    let dumper = PgDumper::new(app_config.backup_options.clone());

    let uploaded = BackupPipeline::new(app_config, &PsqlLister, &dumper, &store)
        .run(Utc::now())
        .await
        .context("Backup run failed")?;

    info!("Uploaded {} archive(s)", uploaded.len());
    Ok(())
}

/// Legacy single-target backup: dumps the configured connection as one archive.
pub async fn run_legacy_backup_flow(app_config: &AppConfig) -> Result<()> {
    let store = S3BackupStore::connect(&app_config.storage).await;
    let dumper = PgDumper::new(app_config.backup_options.clone());

    let uploaded = BackupPipeline::new(app_config, &PsqlLister, &dumper, &store)
        .run_legacy(Utc::now())
        .await
        .context("Legacy backup run failed")?;

    info!("Uploaded {}", uploaded);
    Ok(())
}

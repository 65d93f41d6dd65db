//! PostgreSQL → S3 backup tool
//!
//! Dumps every database of a cluster, uploads the archives to object storage
//! and prunes backups older than the retention window. Meant to be run by an
//! external scheduler (cron, Kubernetes CronJob, ...).

// pg-s3-backup/src/main.rs
mod backup;
mod config;
mod errors;
mod utils;

use anyhow::{Context, Result};
use config::AppConfig;
use std::env;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Main entry point for the backup tool
#[tokio::main]
async fn main() -> ExitCode {
    // Before logging is set up, so RUST_LOG from .env takes effect.
    let dotenv_path = dotenv::dotenv().ok();
    init_tracing();
    if let Some(path) = dotenv_path {
        info!("Loaded environment from {}", path.display());
    }

    match run_app().await {
        Ok(_) => {
            info!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(EnvFilter::DEFAULT_ENV))
        .with_target(false)
        .init();
}

/// Filter from `env_var` (normally `RUST_LOG`), falling back to `info`.
fn log_filter(env_var: &str) -> EnvFilter {
    EnvFilter::try_from_env(env_var).unwrap_or_else(|_| EnvFilter::new("info"))
}

async fn run_app() -> Result<()> {
    let app_config = AppConfig::from_env().context("Failed to load configuration from environment")?;

    let choice = env::args().nth(1).map(|arg| arg.trim().to_string());

    match choice.as_deref().unwrap_or("backup") {
        "backup" => {
            info!("🚀 Starting backup process...");
            backup::run_backup_flow(&app_config)
                .await
                .context("Backup process failed")?;
        }
        "backup-old" => {
            info!("🚀 Starting legacy single-target backup...");
            backup::run_legacy_backup_flow(&app_config)
                .await
                .context("Legacy backup process failed")?;
        }
        other => {
            error!("Invalid operation '{}'. Use 'backup' or 'backup-old'.", other);
            anyhow::bail!("Invalid operation choice");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_log_filter_reads_value_loaded_from_dotenv() -> anyhow::Result<()> {
        let mut dotenv_file = tempfile::NamedTempFile::new()?;
        writeln!(dotenv_file, "PG_S3_BACKUP_TEST_LOG=pg_s3_backup=debug")?;
        dotenv_file.flush()?;

        dotenv::from_path(dotenv_file.path())?;

        assert_eq!(log_filter("PG_S3_BACKUP_TEST_LOG").to_string(), "pg_s3_backup=debug");
        Ok(())
    }

    #[test]
    fn test_log_filter_defaults_to_info() {
        assert_eq!(log_filter("PG_S3_BACKUP_UNSET_LOG").to_string(), "info");
    }
}

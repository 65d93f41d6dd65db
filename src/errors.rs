use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to list databases: {0}")]
    Connection(String),

    #[error("Database dump failed: {0}")]
    Dump(String),

    #[error("Backup archive file is invalid or empty; check for errors above ({0})")]
    EmptyArchive(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Listing stored backups failed: {0}")]
    Listing(String),

    #[error("Delete failed: {0}")]
    Delete(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BackupError>;

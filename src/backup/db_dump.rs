// pg-s3-backup/src/backup/db_dump.rs
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use async_trait::async_trait;
use bytesize::ByteSize;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tracing::{info, warn};

use crate::errors::{BackupError, Result};
use crate::utils::find_pg_dump_executable;
use crate::utils::naming::redact_url;

/// A validated, non-empty compressed archive on local disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveFile {
    pub path: PathBuf,
    pub size: u64,
}

#[async_trait]
pub trait Dumper: Send + Sync {
    /// Dumps the database behind `connection` into a gzip-compressed archive at `destination`.
    async fn dump(&self, connection: &str, destination: &Path) -> Result<ArchiveFile>;
}

/// Dumps with `pg_dump --format=tar`, compressing its output with gzip.
pub struct PgDumper {
    extra_options: Vec<String>,
}

impl PgDumper {
    pub fn new(extra_options: Vec<String>) -> Self {
        PgDumper { extra_options }
    }
}

#[async_trait]
impl Dumper for PgDumper {
    async fn dump(&self, connection: &str, destination: &Path) -> Result<ArchiveFile> {
        info!("Dumping {} to file...", redact_url(connection));
        let pg_dump_path = find_pg_dump_executable().map_err(BackupError::Dump)?;

        let mut command = Command::new(pg_dump_path);
        command
            .arg(format!("--dbname={}", connection))
            .arg("--format=tar")
            .args(&self.extra_options);

        let destination = destination.to_path_buf();
        let archive = tokio::task::spawn_blocking(move || produce_archive(command, &destination))
            .await
            .map_err(|e| BackupError::Dump(format!("Dump task failed: {}", e)))??;

        info!("DB dumped to file...");
        Ok(archive)
    }
}

/// Runs `command`, gzips its stdout into `destination` and validates the result.
///
/// Anything the process writes to stderr is only advisory unless it also exits
/// unsuccessfully: pg_dump prints notices there on perfectly good runs.
/// A failed or invalid archive is removed before the error is returned.
pub fn produce_archive(mut command: Command, destination: &Path) -> Result<ArchiveFile> {
    let result = build_archive(&mut command, destination);
    if result.is_err() && destination.exists() {
        if let Err(e) = fs::remove_file(destination) {
            warn!("Could not remove failed archive {}: {}", destination.display(), e);
        }
    }
    result
}

fn build_archive(command: &mut Command, destination: &Path) -> Result<ArchiveFile> {
    let stderr_text = run_compressed(command, destination)?;

    validate_archive(destination)?;

    if !stderr_text.trim().is_empty() {
        warn!("stderr: {}", stderr_text.trim_end());
    }

    let size = fs::metadata(destination)?.len();
    info!("Backup archive file is valid");
    info!("Backup filesize: {}", ByteSize::b(size));

    if !stderr_text.trim().is_empty() {
        warn!(
            "Potential warnings detected; please ensure the backup file \"{}\" contains all needed data",
            destination
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        );
    }

    Ok(ArchiveFile {
        path: destination.to_path_buf(),
        size,
    })
}

/// Streams the process's stdout through a gzip encoder. Returns the captured stderr.
fn run_compressed(command: &mut Command, destination: &Path) -> Result<String> {
    let file = File::create(destination).map_err(|e| {
        BackupError::Dump(format!(
            "Failed to create archive file {}: {}",
            destination.display(),
            e
        ))
    })?;

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BackupError::Dump(format!("Failed to start dump process: {}", e)))?;

    let (Some(mut stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return Err(BackupError::Dump("Dump process pipes were not captured".to_string()));
    };

    // Drained on its own thread so a chatty stderr cannot stall stdout.
    let stderr_reader = thread::spawn(move || {
        let mut text = String::new();
        let _ = stderr.read_to_string(&mut text);
        text
    });

    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let copied = io::copy(&mut stdout, &mut encoder)
        .and_then(|_| encoder.finish())
        .and_then(|mut writer| writer.flush());
    drop(stdout);

    let status = child
        .wait()
        .map_err(|e| BackupError::Dump(format!("Failed to wait for dump process: {}", e)))?;
    let stderr_text = stderr_reader.join().unwrap_or_default();

    if !status.success() {
        return Err(BackupError::Dump(format!(
            "dump process exited with {}: {}",
            status,
            stderr_text.trim_end()
        )));
    }
    copied.map_err(|e| {
        BackupError::Dump(format!(
            "Failed to write compressed archive {}: {}",
            destination.display(),
            e
        ))
    })?;

    Ok(stderr_text)
}

/// The archive must decompress to at least one byte.
pub fn validate_archive(path: &Path) -> Result<()> {
    let invalid = |reason: String| BackupError::EmptyArchive(format!("{}: {}", path.display(), reason));

    let file = File::open(path).map_err(|e| invalid(e.to_string()))?;
    let mut first_byte = [0u8; 1];
    match GzDecoder::new(file).read(&mut first_byte) {
        Ok(1) => Ok(()),
        Ok(_) => Err(invalid("archive contains no data".to_string())),
        Err(e) => Err(invalid(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_gzip(path: &Path, content: &[u8]) -> anyhow::Result<()> {
        let mut encoder = GzEncoder::new(File::create(path)?, Compression::default());
        encoder.write_all(content)?;
        encoder.finish()?;
        Ok(())
    }

    #[test]
    fn test_validate_archive_with_data() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("alpha_backup.tar.gz");
        write_gzip(&path, b"toc.dat")?;

        validate_archive(&path)?;
        Ok(())
    }

    #[test]
    fn test_validate_archive_empty() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("empty.tar.gz");
        write_gzip(&path, b"")?;

        let err = validate_archive(&path).unwrap_err();
        assert!(matches!(err, BackupError::EmptyArchive(_)));
        Ok(())
    }

    #[test]
    fn test_validate_archive_not_gzip() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("garbage.tar.gz");
        fs::write(&path, b"definitely not gzip")?;

        assert!(matches!(validate_archive(&path), Err(BackupError::EmptyArchive(_))));
        Ok(())
    }

    #[test]
    fn test_validate_archive_zero_length_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("zero.tar.gz");
        File::create(&path)?;

        assert!(matches!(validate_archive(&path), Err(BackupError::EmptyArchive(_))));
        Ok(())
    }

    #[cfg(unix)]
    fn shell(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    #[cfg(unix)]
    #[test]
    fn test_produce_archive_compresses_output() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("alpha.tar.gz");

        let archive = produce_archive(shell("printf 'dump-bytes'; echo 'notice: something' >&2"), &path)?;
        assert_eq!(archive.path, path);
        assert_eq!(archive.size, fs::metadata(&path)?.len());
        assert!(ByteSize::b(archive.size).to_string().ends_with('B'));

        let mut decoded = String::new();
        GzDecoder::new(File::open(&path)?).read_to_string(&mut decoded)?;
        assert_eq!(decoded, "dump-bytes");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_produce_archive_process_failure() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("alpha.tar.gz");

        let err = produce_archive(shell("echo 'connection refused' >&2; exit 1"), &path).unwrap_err();
        match err {
            BackupError::Dump(msg) => assert!(msg.contains("connection refused")),
            other => panic!("expected dump error, got {:?}", other),
        }
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_produce_archive_empty_output() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("alpha.tar.gz");

        let err = produce_archive(shell("true"), &path).unwrap_err();
        assert!(matches!(err, BackupError::EmptyArchive(_)));
        assert!(!path.exists());
        Ok(())
    }
}

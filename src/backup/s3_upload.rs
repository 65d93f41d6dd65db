// pg-s3-backup/src/backup/s3_upload.rs
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use aws_sdk_s3 as s3;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use s3::config::Region;
use s3::error::DisplayErrorContext;
use s3::primitives::ByteStream;
use s3::types::ChecksumAlgorithm;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::backup::store::{BackupStore, ListingPage, RemoteObject, object_key};
use crate::config::StorageConfig;
use crate::errors::{BackupError, Result};

/// S3-compatible object storage (AWS, MinIO, DigitalOcean Spaces, ...).
pub struct S3BackupStore {
    client: s3::Client,
    bucket: String,
    subfolder: Option<String>,
    support_object_lock: bool,
}

impl S3BackupStore {
    pub async fn connect(storage: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(s3::config::BehaviorVersion::latest())
            .region(Region::new(storage.region.clone()));

        if let Some(endpoint) = &storage.endpoint_url {
            info!("Using custom endpoint: {}", endpoint);
            loader = loader.endpoint_url(endpoint);
        }

        if let (Some(key_id), Some(secret)) = (&storage.access_key_id, &storage.secret_access_key) {
            loader = loader.credentials_provider(s3::config::Credentials::new(
                key_id,
                secret,
                None,     // session_token
                None,     // expiry
                "Static", // provider_name
            ));
        }

        let sdk_config = loader.load().await;
        let s3_config = s3::config::Builder::from(&sdk_config)
            .force_path_style(storage.force_path_style)
            .build();

        S3BackupStore {
            client: s3::Client::from_conf(s3_config),
            bucket: storage.bucket_name.clone(),
            subfolder: storage.bucket_subfolder.clone(),
            support_object_lock: storage.support_object_lock,
        }
    }
}

#[async_trait]
impl BackupStore for S3BackupStore {
    async fn upload(&self, name: &str, path: &Path) -> Result<()> {
        let key = object_key(self.subfolder.as_deref(), name);
        info!("Uploading {} to bucket {} with key {}", path.display(), self.bucket, key);

        let checksum = if self.support_object_lock {
            info!("Hashing file...");
            let digest = sha256_file(path.to_path_buf()).await?;
            info!("Done hashing file (sha256 {})", hex::encode(digest));
            Some(BASE64.encode(digest))
        } else {
            None
        };

        let body = ByteStream::from_path(path).await.map_err(|e| {
            BackupError::Upload(format!("Failed to open {} for upload: {}", path.display(), e))
        })?;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body);
        if let Some(checksum) = checksum {
            request = request
                .checksum_algorithm(ChecksumAlgorithm::Sha256)
                .checksum_sha256(checksum);
        }

        request.send().await.map_err(|e| {
            BackupError::Upload(format!(
                "Failed to upload {} to bucket {} with key {}: {}",
                path.display(),
                self.bucket,
                key,
                DisplayErrorContext(&e)
            ))
        })?;

        info!("✅ Backup uploaded to bucket {} with key {}", self.bucket, key);
        Ok(())
    }

    async fn list_page(
        &self,
        bucket: &str,
        continuation_token: Option<String>,
    ) -> Result<ListingPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .set_continuation_token(continuation_token)
            .send()
            .await
            .map_err(|e| {
                BackupError::Listing(format!(
                    "Failed to list objects in bucket {}: {}",
                    bucket,
                    DisplayErrorContext(&e)
                ))
            })?;

        let objects = output
            .contents()
            .iter()
            .filter_map(|object| {
                Some(RemoteObject {
                    key: object.key()?.to_string(),
                    last_modified: object.last_modified().and_then(|t| {
                        DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos())
                    }),
                })
            })
            .collect();

        let next_continuation_token = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListingPage {
            objects,
            next_continuation_token,
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                BackupError::Delete(format!(
                    "Failed to delete {} from bucket {}: {}",
                    key,
                    bucket,
                    DisplayErrorContext(&e)
                ))
            })?;
        Ok(())
    }
}

/// SHA-256 of a file, read in chunks on the blocking pool.
async fn sha256_file(path: PathBuf) -> Result<[u8; 32]> {
    tokio::task::spawn_blocking(move || -> Result<[u8; 32]> {
        let mut file = File::open(&path)?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; 64 * 1024];
        loop {
            let read = file.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
        Ok(hasher.finalize().into())
    })
    .await
    .map_err(|e| BackupError::Upload(format!("Hashing task failed: {}", e)))?
}

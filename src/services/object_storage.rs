//! src/services/object_storage.rs
//!
//! The storage client wrapper: a small capability trait over the object
//! store, with an S3-compatible backend (MinIO or AWS) and a local-disk
//! fallback. Constructed once from configuration and passed into the
//! services that need it, so tests can substitute a fake backend.

use crate::config::{StorageConfig, StorageMode};
use async_trait::async_trait;
use bytes::Bytes;
use s3::creds::Credentials;
use s3::{Bucket, BucketConfiguration, Region};
use std::io::{self, ErrorKind};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

const MAX_OBJECT_NAME_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid object name")]
    InvalidObjectName,
    #[error("presigned URLs are not available for {0} storage")]
    PresignUnsupported(&'static str),
    #[error("storage configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Backend(#[from] s3::error::S3Error),
    #[error(transparent)]
    Credentials(#[from] s3::creds::error::CredentialsError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Result of a completed object write.
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// Entity tag reported by the backend (md5 hex for the local backend).
    pub etag: Option<String>,
}

/// Capability interface over the object store.
///
/// All operations are network or disk I/O against the backend; no state is
/// retained beyond the configured bucket name. Deleting an object that is
/// already gone counts as success.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// The bucket this service was configured with.
    fn bucket_name(&self) -> &str;

    /// Backend tag surfaced in upload responses ("local", "minio", "s3").
    fn provider(&self) -> &'static str;

    /// Idempotently guarantee `bucket` exists, creating it if absent.
    async fn ensure_bucket(&self, bucket: &str) -> StorageResult<()>;

    /// Store `bytes` under `object_name`, ensuring the bucket first.
    async fn upload_file(
        &self,
        bucket: &str,
        object_name: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> StorageResult<StoredObject>;

    /// Time-limited URL an external client can PUT to directly, bypassing
    /// this server. Ensures the bucket first.
    async fn presigned_upload_url(
        &self,
        bucket: &str,
        object_name: &str,
        expiry_secs: u32,
    ) -> StorageResult<String>;

    /// Time-limited URL for fetching an existing object.
    async fn presigned_download_url(
        &self,
        bucket: &str,
        object_name: &str,
        expiry_secs: u32,
    ) -> StorageResult<String>;

    /// Remove the object. Missing objects are treated as already deleted.
    async fn delete_file(&self, bucket: &str, object_name: &str) -> StorageResult<()>;

    /// Cheap backend probe for the readiness endpoint.
    async fn healthcheck(&self) -> StorageResult<()>;
}

/// Build the backend selected by configuration.
pub fn from_config(cfg: &StorageConfig) -> StorageResult<Arc<dyn ObjectStorage>> {
    match cfg.mode {
        StorageMode::Local => Ok(Arc::new(LocalStorage::new(
            cfg.upload_dir.clone(),
            cfg.bucket.clone(),
        ))),
        StorageMode::Minio | StorageMode::S3 => Ok(Arc::new(S3Storage::from_config(cfg)?)),
    }
}

/// Reject object names that could escape the bucket namespace. Names the
/// upload path generates always pass; the guard exists because the trait
/// is public.
fn ensure_object_name_safe(name: &str) -> StorageResult<()> {
    if name.is_empty() || name.len() > MAX_OBJECT_NAME_LEN {
        return Err(StorageError::InvalidObjectName);
    }
    if name.starts_with('/') || name.contains("..") {
        return Err(StorageError::InvalidObjectName);
    }
    if name
        .bytes()
        .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
    {
        return Err(StorageError::InvalidObjectName);
    }
    Ok(())
}

/// S3-compatible backend. In `minio` mode this points at a custom endpoint
/// with path-style addressing; in `s3` mode at an AWS region.
pub struct S3Storage {
    bucket: String,
    region: Region,
    credentials: Credentials,
    path_style: bool,
    provider: &'static str,
}

impl S3Storage {
    pub fn from_config(cfg: &StorageConfig) -> StorageResult<Self> {
        let credentials = Credentials::new(
            Some(&cfg.access_key),
            Some(&cfg.secret_key),
            None,
            None,
            None,
        )?;

        let (region, path_style, provider) = match cfg.mode {
            StorageMode::Minio => {
                let scheme = if cfg.use_ssl { "https" } else { "http" };
                let region = Region::Custom {
                    region: cfg.region.clone(),
                    endpoint: format!("{}://{}:{}", scheme, cfg.endpoint, cfg.endpoint_port),
                };
                (region, true, "minio")
            }
            StorageMode::S3 => {
                let region = cfg
                    .region
                    .parse::<Region>()
                    .map_err(|_| StorageError::Config(format!("bad region `{}`", cfg.region)))?;
                (region, false, "s3")
            }
            StorageMode::Local => {
                return Err(StorageError::Config(
                    "local mode does not use the S3 backend".into(),
                ));
            }
        };

        info!(
            "initializing {} storage (endpoint: {}, bucket: {})",
            provider,
            region.endpoint(),
            cfg.bucket
        );

        Ok(Self {
            bucket: cfg.bucket.clone(),
            region,
            credentials,
            path_style,
            provider,
        })
    }

    /// Per-call bucket handle; `Bucket` holds no connection, so this is cheap.
    fn handle(&self, bucket: &str) -> StorageResult<Box<Bucket>> {
        let handle = Bucket::new(bucket, self.region.clone(), self.credentials.clone())?;
        Ok(if self.path_style {
            Box::new(handle.with_path_style())
        } else {
            Box::new(handle)
        })
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    fn bucket_name(&self) -> &str {
        &self.bucket
    }

    fn provider(&self) -> &'static str {
        self.provider
    }

    async fn ensure_bucket(&self, bucket: &str) -> StorageResult<()> {
        if self.handle(bucket)?.exists().await? {
            return Ok(());
        }
        let config = BucketConfiguration::default();
        if self.path_style {
            Bucket::create_with_path_style(
                bucket,
                self.region.clone(),
                self.credentials.clone(),
                config,
            )
            .await?;
        } else {
            Bucket::create(bucket, self.region.clone(), self.credentials.clone(), config).await?;
        }
        info!("created bucket {bucket}");
        Ok(())
    }

    async fn upload_file(
        &self,
        bucket: &str,
        object_name: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> StorageResult<StoredObject> {
        ensure_object_name_safe(object_name)?;
        self.ensure_bucket(bucket).await?;
        let response = self
            .handle(bucket)?
            .put_object_with_content_type(object_name, &bytes, content_type)
            .await?;
        let etag = response
            .headers()
            .get("etag")
            .map(|value| value.trim_matches('"').to_string());
        debug!("uploaded {bucket}/{object_name} ({} bytes)", bytes.len());
        Ok(StoredObject { etag })
    }

    async fn presigned_upload_url(
        &self,
        bucket: &str,
        object_name: &str,
        expiry_secs: u32,
    ) -> StorageResult<String> {
        ensure_object_name_safe(object_name)?;
        self.ensure_bucket(bucket).await?;
        let url = self
            .handle(bucket)?
            .presign_put(object_name, expiry_secs, None)
            .await?;
        debug!("presigned upload for {bucket}/{object_name} (expires in {expiry_secs}s)");
        Ok(url)
    }

    async fn presigned_download_url(
        &self,
        bucket: &str,
        object_name: &str,
        expiry_secs: u32,
    ) -> StorageResult<String> {
        ensure_object_name_safe(object_name)?;
        let url = self
            .handle(bucket)?
            .presign_get(object_name, expiry_secs, None)
            .await?;
        Ok(url)
    }

    async fn delete_file(&self, bucket: &str, object_name: &str) -> StorageResult<()> {
        ensure_object_name_safe(object_name)?;
        self.handle(bucket)?.delete_object(object_name).await?;
        debug!("deleted {bucket}/{object_name}");
        Ok(())
    }

    async fn healthcheck(&self) -> StorageResult<()> {
        self.handle(&self.bucket)?.exists().await?;
        Ok(())
    }
}

/// Local-disk fallback. Objects live at `{base_path}/{bucket}/{name}`;
/// writes go through a temp file and rename so a crashed upload never
/// leaves a partial object behind.
pub struct LocalStorage {
    base_path: PathBuf,
    bucket: String,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>, bucket: String) -> Self {
        Self {
            base_path: base_path.into(),
            bucket,
        }
    }

    fn bucket_root(&self, bucket: &str) -> PathBuf {
        self.base_path.join(bucket)
    }

    fn object_path(&self, bucket: &str, object_name: &str) -> PathBuf {
        self.bucket_root(bucket).join(object_name)
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    fn bucket_name(&self) -> &str {
        &self.bucket
    }

    fn provider(&self) -> &'static str {
        "local"
    }

    async fn ensure_bucket(&self, bucket: &str) -> StorageResult<()> {
        fs::create_dir_all(self.bucket_root(bucket)).await?;
        Ok(())
    }

    async fn upload_file(
        &self,
        bucket: &str,
        object_name: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> StorageResult<StoredObject> {
        ensure_object_name_safe(object_name)?;
        self.ensure_bucket(bucket).await?;

        let file_path = self.object_path(bucket, object_name);
        let tmp_path = self
            .bucket_root(bucket)
            .join(format!(".tmp-{}", Uuid::new_v4()));

        let mut file = File::create(&tmp_path).await?;
        if let Err(err) = file.write_all(&bytes).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        let etag = format!("{:x}", md5::compute(&bytes));
        debug!(
            "stored {} ({} bytes, {content_type})",
            file_path.display(),
            bytes.len()
        );
        Ok(StoredObject { etag: Some(etag) })
    }

    async fn presigned_upload_url(
        &self,
        _bucket: &str,
        _object_name: &str,
        _expiry_secs: u32,
    ) -> StorageResult<String> {
        Err(StorageError::PresignUnsupported("local"))
    }

    async fn presigned_download_url(
        &self,
        _bucket: &str,
        _object_name: &str,
        _expiry_secs: u32,
    ) -> StorageResult<String> {
        Err(StorageError::PresignUnsupported("local"))
    }

    async fn delete_file(&self, bucket: &str, object_name: &str) -> StorageResult<()> {
        ensure_object_name_safe(object_name)?;
        let file_path = self.object_path(bucket, object_name);
        match fs::remove_file(&file_path).await {
            Ok(()) => {
                debug!("removed {}", file_path.display());
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("{} already missing", file_path.display());
                Ok(())
            }
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    async fn healthcheck(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.base_path).await?;
        let probe = self.base_path.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&probe, b"readyz").await?;
        let read_back = fs::read(&probe).await?;
        let _ = fs::remove_file(&probe).await;
        if read_back != b"readyz" {
            return Err(StorageError::Io(io::Error::new(
                ErrorKind::InvalidData,
                "probe file content mismatch",
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (LocalStorage, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStorage::new(dir.path().join("objects"), "pdf-uploads".into());
        (store, dir)
    }

    #[tokio::test]
    async fn local_upload_writes_bytes_and_md5_etag() {
        let (store, _dir) = temp_store();
        let stored = store
            .upload_file(
                "pdf-uploads",
                "1700000000000_report.pdf",
                Bytes::from_static(b"%PDF-1.4 test"),
                "application/pdf",
            )
            .await
            .unwrap();

        let expected = format!("{:x}", md5::compute(b"%PDF-1.4 test"));
        assert_eq!(stored.etag.as_deref(), Some(expected.as_str()));

        let on_disk = std::fs::read(
            store
                .base_path
                .join("pdf-uploads")
                .join("1700000000000_report.pdf"),
        )
        .unwrap();
        assert_eq!(on_disk, b"%PDF-1.4 test");
    }

    #[tokio::test]
    async fn local_ensure_bucket_is_idempotent() {
        let (store, _dir) = temp_store();
        store.ensure_bucket("pdf-uploads").await.unwrap();
        store.ensure_bucket("pdf-uploads").await.unwrap();
        assert!(store.bucket_root("pdf-uploads").is_dir());
    }

    #[tokio::test]
    async fn local_delete_of_missing_object_is_success() {
        let (store, _dir) = temp_store();
        store.ensure_bucket("pdf-uploads").await.unwrap();
        store
            .delete_file("pdf-uploads", "1700000000000_gone.pdf")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn local_delete_removes_object() {
        let (store, _dir) = temp_store();
        store
            .upload_file(
                "pdf-uploads",
                "1_a.pdf",
                Bytes::from_static(b"x"),
                "application/pdf",
            )
            .await
            .unwrap();
        store.delete_file("pdf-uploads", "1_a.pdf").await.unwrap();
        assert!(!store.object_path("pdf-uploads", "1_a.pdf").exists());
        // and again, idempotently
        store.delete_file("pdf-uploads", "1_a.pdf").await.unwrap();
    }

    #[tokio::test]
    async fn local_rejects_traversal_names() {
        let (store, _dir) = temp_store();
        let result = store
            .upload_file(
                "pdf-uploads",
                "../escape.pdf",
                Bytes::from_static(b"x"),
                "application/pdf",
            )
            .await;
        assert!(matches!(result, Err(StorageError::InvalidObjectName)));
    }

    #[tokio::test]
    async fn local_presign_is_unsupported() {
        let (store, _dir) = temp_store();
        let result = store
            .presigned_upload_url("pdf-uploads", "1_a.pdf", 300)
            .await;
        assert!(matches!(result, Err(StorageError::PresignUnsupported("local"))));
    }

    #[tokio::test]
    async fn local_healthcheck_probes_disk() {
        let (store, _dir) = temp_store();
        store.healthcheck().await.unwrap();
    }
}

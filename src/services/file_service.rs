//! Upload validation, object naming, and file metadata operations.
//!
//! Both upload paths (direct multipart and presigned-URL) run through the
//! same `validate_upload` predicate, and both derive object names from
//! `object_name_for`.

use crate::models::Pagination;
use crate::models::file_record::{FileRecord, FileType, ProcessingStatus};
use crate::services::object_storage::{ObjectStorage, StorageError};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// The single MIME type the strict upload flow accepts.
pub const ALLOWED_UPLOAD_CONTENT_TYPE: &str = "application/pdf";

const FILE_COLUMNS: &str = "id, file_key, original_filename, file_size, content_type, file_type, \
     bucket, storage_provider, etag, user_id, uploaded_by, processing_status, \
     uploaded_at, updated_at, metadata";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadValidationError {
    #[error("unsupported media type `{0}`; only application/pdf is accepted")]
    UnsupportedMediaType(String),
    #[error("file of {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { size: u64, max: u64 },
}

#[derive(Debug, Error)]
pub enum FileServiceError {
    #[error("file {0} not found")]
    NotFound(i64),
    #[error(transparent)]
    Validation(#[from] UploadValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

pub type FileResult<T> = Result<T, FileServiceError>;

/// Shared validation predicate for both upload paths.
///
/// Content type is checked before size, matching the order the transport
/// enforces anyway (oversized bodies are cut off before reaching here).
pub fn validate_upload(
    content_type: &str,
    size: u64,
    max_bytes: u64,
) -> Result<(), UploadValidationError> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim();
    if !essence.eq_ignore_ascii_case(ALLOWED_UPLOAD_CONTENT_TYPE) {
        return Err(UploadValidationError::UnsupportedMediaType(
            content_type.to_string(),
        ));
    }
    if size > max_bytes {
        return Err(UploadValidationError::PayloadTooLarge {
            size,
            max: max_bytes,
        });
    }
    Ok(())
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Storage object name: millisecond timestamp prefix + sanitized filename.
/// The timestamp prefix is the sole collision-avoidance strategy; two
/// uploads of the same name in the same millisecond collide.
pub fn object_name_for(filename: &str, now: DateTime<Utc>) -> String {
    format!("{}_{}", now.timestamp_millis(), sanitize_filename(filename))
}

/// Result of the presigned-URL flow.
#[derive(Debug, Clone)]
pub struct PresignedUpload {
    pub upload_url: String,
    pub object_name: String,
    pub bucket: String,
    pub expires_in: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_upload_bytes: u64,
    pub presign_expiry_secs: u32,
}

/// File operations: upload orchestration plus metadata CRUD.
///
/// The metadata row and the stored blob are two independently-owned
/// resources linked only by `file_key`; no transaction spans them. Writes
/// go blob-first, with a best-effort blob delete if the row insert fails.
#[derive(Clone)]
pub struct FileService {
    pub db: Arc<SqlitePool>,
    pub storage: Arc<dyn ObjectStorage>,
    pub limits: UploadLimits,
}

impl FileService {
    pub fn new(db: Arc<SqlitePool>, storage: Arc<dyn ObjectStorage>, limits: UploadLimits) -> Self {
        Self {
            db,
            storage,
            limits,
        }
    }

    /// Direct upload: validate, store the bytes, then record the metadata
    /// row. Returns the inserted row.
    pub async fn store_upload(
        &self,
        original_filename: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> FileResult<FileRecord> {
        let size = bytes.len() as u64;
        validate_upload(content_type, size, self.limits.max_upload_bytes)?;

        let uploaded_at = Utc::now();
        let object_name = object_name_for(original_filename, uploaded_at);
        let bucket = self.storage.bucket_name().to_string();

        let stored = self
            .storage
            .upload_file(&bucket, &object_name, bytes, content_type)
            .await?;

        let insert = sqlx::query_as::<_, FileRecord>(&format!(
            "INSERT INTO files (file_key, original_filename, file_size, content_type, file_type, \
             bucket, storage_provider, etag, user_id, uploaded_by, processing_status, \
             uploaded_at, updated_at, metadata) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL, ?, ?, ?, NULL) \
             RETURNING {FILE_COLUMNS}"
        ))
        .bind(&object_name)
        .bind(original_filename)
        .bind(size as i64)
        .bind(content_type)
        .bind(FileType::from_content_type(content_type))
        .bind(&bucket)
        .bind(self.storage.provider())
        .bind(stored.etag.as_deref())
        .bind(ProcessingStatus::Pending)
        .bind(uploaded_at)
        .bind(uploaded_at)
        .fetch_one(&*self.db)
        .await;

        match insert {
            Ok(record) => Ok(record),
            Err(err) => {
                if let Err(cleanup) = self.storage.delete_file(&bucket, &object_name).await {
                    warn!(
                        "could not remove {bucket}/{object_name} after metadata insert failure: {cleanup}"
                    );
                }
                Err(err.into())
            }
        }
    }

    /// Presigned flow: validate the declared metadata, then hand back a
    /// time-limited upload URL. No row is written; the server never
    /// observes completion of a direct-to-storage upload.
    pub async fn presigned_upload(
        &self,
        filename: &str,
        content_type: &str,
        declared_size: u64,
    ) -> FileResult<PresignedUpload> {
        validate_upload(content_type, declared_size, self.limits.max_upload_bytes)?;

        let object_name = object_name_for(filename, Utc::now());
        let bucket = self.storage.bucket_name().to_string();
        let expires_in = self.limits.presign_expiry_secs;
        let upload_url = self
            .storage
            .presigned_upload_url(&bucket, &object_name, expires_in)
            .await?;

        Ok(PresignedUpload {
            upload_url,
            object_name,
            bucket,
            expires_in,
        })
    }

    /// List rows, newest first, optionally filtered by coarse type.
    pub async fn list(
        &self,
        file_type: Option<FileType>,
        page: u32,
        page_size: u32,
    ) -> FileResult<(Vec<FileRecord>, Pagination)> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 100);

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM files");
        if let Some(ft) = file_type {
            count.push(" WHERE file_type = ");
            count.push_bind(ft);
        }
        let total: i64 = count.build_query_scalar().fetch_one(&*self.db).await?;

        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT {FILE_COLUMNS} FROM files"));
        if let Some(ft) = file_type {
            builder.push(" WHERE file_type = ");
            builder.push_bind(ft);
        }
        builder.push(" ORDER BY uploaded_at DESC, id DESC LIMIT ");
        builder.push_bind(page_size as i64);
        builder.push(" OFFSET ");
        builder.push_bind(((page - 1) * page_size) as i64);

        let files: Vec<FileRecord> = builder.build_query_as().fetch_all(&*self.db).await?;
        let pagination = Pagination::for_total(page, page_size, total.max(0) as u64);
        Ok((files, pagination))
    }

    pub async fn get(&self, id: i64) -> FileResult<FileRecord> {
        sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE id = ?"
        ))
        .bind(id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => FileServiceError::NotFound(id),
            other => other.into(),
        })
    }

    /// Fresh presigned download URL for an existing row.
    pub async fn download_url(&self, id: i64) -> FileResult<(String, u32)> {
        let record = self.get(id).await?;
        let expires_in = self.limits.presign_expiry_secs;
        let url = self
            .storage
            .presigned_download_url(&record.bucket, &record.file_key, expires_in)
            .await?;
        Ok((url, expires_in))
    }

    /// Delete the blob, then the row. If the blob delete fails the row is
    /// kept so the file stays visible rather than silently orphaning.
    pub async fn delete(&self, id: i64) -> FileResult<()> {
        let record = self.get(id).await?;
        self.storage
            .delete_file(&record.bucket, &record.file_key)
            .await?;
        sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        Ok(())
    }
}

//! HTTP handlers for the upload and file-metadata endpoints.
//! Validation and storage concerns live in `FileService`; handlers shape
//! requests and responses.

use crate::{
    errors::AppError,
    models::{Pagination, file_record::{FileRecord, FileType}},
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    http::StatusCode,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Query params accepted by `GET /api/v1/files`.
#[derive(Debug, Deserialize)]
pub struct ListFilesQuery {
    #[serde(rename = "type")]
    pub file_type: Option<FileType>,
    pub page: Option<u32>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<u32>,
}

/// Request body for `POST /api/v1/upload/presigned-url`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrlRequest {
    pub filename: String,
    pub content_type: String,
    pub size: u64,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub file: UploadedFileBody,
    #[serde(rename = "storageType")]
    pub storage_type: String,
}

#[derive(Serialize)]
pub struct UploadedFileBody {
    pub name: String,
    pub size: i64,
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(rename = "savedAs")]
    pub saved_as: String,
    pub bucket: String,
    #[serde(rename = "uploadedAt")]
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrlResponse {
    pub success: bool,
    pub upload_url: String,
    pub object_name: String,
    pub bucket_name: String,
    pub expires_in: u32,
}

#[derive(Serialize)]
pub struct FileListResponse {
    pub success: bool,
    pub data: Vec<FileRecord>,
    pub pagination: Pagination,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadUrlResponse {
    pub success: bool,
    pub download_url: String,
    pub expires_in: u32,
}

#[derive(Serialize)]
pub struct DeletedResponse {
    pub success: bool,
    pub message: String,
}

/// `POST /api/v1/upload` — direct multipart upload. Expects a `file` field.
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut upload: Option<(String, String, Bytes)> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload.pdf").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some((filename, content_type, bytes));
        break;
    }

    let (filename, content_type, bytes) =
        upload.ok_or_else(|| AppError::bad_request("missing `file` field"))?;

    let record = state
        .files
        .store_upload(&filename, &content_type, bytes)
        .await?;

    Ok(Json(UploadResponse {
        success: true,
        storage_type: record.storage_provider.clone(),
        file: UploadedFileBody {
            name: record.original_filename,
            size: record.file_size,
            content_type: record.content_type,
            saved_as: record.file_key,
            bucket: record.bucket,
            uploaded_at: record.uploaded_at,
        },
    }))
}

/// `POST /api/v1/upload/presigned-url` — validate declared metadata and
/// hand back a direct-to-storage upload URL.
pub async fn presigned_upload_url(
    State(state): State<AppState>,
    Json(request): Json<PresignedUrlRequest>,
) -> Result<Json<PresignedUrlResponse>, AppError> {
    let presigned = state
        .files
        .presigned_upload(&request.filename, &request.content_type, request.size)
        .await?;

    Ok(Json(PresignedUrlResponse {
        success: true,
        upload_url: presigned.upload_url,
        object_name: presigned.object_name,
        bucket_name: presigned.bucket,
        expires_in: presigned.expires_in,
    }))
}

/// `GET /api/v1/files` — list rows, optionally filtered by `?type=`.
pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<FileListResponse>, AppError> {
    let (data, pagination) = state
        .files
        .list(
            query.file_type,
            query.page.unwrap_or(1),
            query.page_size.unwrap_or(50),
        )
        .await?;

    Ok(Json(FileListResponse {
        success: true,
        data,
        pagination,
    }))
}

/// `GET /api/v1/files/{id}/download` — fresh presigned download URL.
pub async fn download_url(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DownloadUrlResponse>, AppError> {
    let (download_url, expires_in) = state.files.download_url(id).await?;
    Ok(Json(DownloadUrlResponse {
        success: true,
        download_url,
        expires_in,
    }))
}

/// `DELETE /api/v1/files/{id}` — remove the object and its row.
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeletedResponse>, AppError> {
    state.files.delete(id).await?;
    Ok(Json(DeletedResponse {
        success: true,
        message: format!("file {id} deleted"),
    }))
}

/// Multipart read failures carry their own status; a body over the
/// transport limit surfaces here as 413.
fn multipart_error(err: MultipartError) -> AppError {
    let status = err.status();
    let message = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "file exceeds the upload size limit".to_string()
    } else {
        format!("multipart error: {}", err.body_text())
    };
    AppError::new(status, message)
}

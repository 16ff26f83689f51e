//! Metadata row for a file stored in the object store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

/// Coarse classification of an uploaded file, derived from its content type.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Image,
    Document,
    Other,
}

impl FileType {
    /// Map a MIME type onto the coarse tag stored alongside the row.
    /// Content-type parameters (`; charset=...`) are ignored.
    pub fn from_content_type(content_type: &str) -> Self {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or(content_type)
            .trim();
        match essence {
            "application/pdf" => Self::Pdf,
            "application/msword" | "text/plain" | "text/markdown" => Self::Document,
            t if t.starts_with("image/") => Self::Image,
            t if t.contains("officedocument") => Self::Document,
            _ => Self::Other,
        }
    }
}

/// Processing pipeline status. Rows are created as `Pending`; nothing in
/// this service transitions the state yet.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// A single uploaded file's metadata.
///
/// The `file_key` is the object name under which the bytes live in the
/// store; it is globally unique and is the only link between this row and
/// the stored blob.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Internal row id.
    pub id: i64,

    /// Storage object name (`<millis>_<sanitized filename>`).
    pub file_key: String,

    /// Filename as supplied by the uploader, unsanitized.
    pub original_filename: String,

    /// Size in bytes.
    pub file_size: i64,

    /// Declared MIME type.
    pub content_type: String,

    /// Coarse type tag used by list filtering.
    pub file_type: FileType,

    /// Bucket holding the object.
    pub bucket: String,

    /// Which backend stored the bytes ("local", "minio", "s3").
    pub storage_provider: String,

    /// Entity tag reported by the storage backend, if any.
    pub etag: Option<String>,

    /// Owning account, when known.
    pub user_id: Option<i64>,

    /// Free-form uploader label.
    pub uploaded_by: Option<String>,

    pub processing_status: ProcessingStatus,

    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Free-form metadata map.
    pub metadata: Option<Json<serde_json::Map<String, serde_json::Value>>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_content_types() {
        assert_eq!(FileType::from_content_type("application/pdf"), FileType::Pdf);
        assert_eq!(
            FileType::from_content_type("application/pdf; charset=binary"),
            FileType::Pdf
        );
        assert_eq!(FileType::from_content_type("image/png"), FileType::Image);
        assert_eq!(FileType::from_content_type("text/plain"), FileType::Document);
        assert_eq!(
            FileType::from_content_type(
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            ),
            FileType::Document
        );
        assert_eq!(
            FileType::from_content_type("application/zip"),
            FileType::Other
        );
    }
}

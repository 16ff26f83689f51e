//! Upload client: drives uploads against the HTTP API and tracks per-file
//! progress the way the browser frontend did.
//!
//! Each in-flight upload walks `Idle → Uploading → {Success | Error}`.
//! Errors are retryable by starting the upload again; cancellation
//! mid-`Uploading` returns the file to `Idle` and is not an error.
//! Progress is an in-memory map keyed by filename (last write wins);
//! dropping the manager loses all of it.

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Maximum number of files accepted per batch.
pub const MAX_BATCH_FILES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Uploading,
    Success { saved_as: String },
    Error { message: String, retryable: bool },
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// What the server reported for a completed upload.
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub saved_as: String,
    pub bucket: String,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("upload rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("transport failure: {0}")]
    Connection(String),
}

impl TransportError {
    /// 429 and 5xx rejections are worth retrying; validation rejections
    /// (wrong type, too large) are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("batch of {count} files exceeds the limit of {} files", MAX_BATCH_FILES)]
    TooManyFiles { count: usize },
}

/// Seam between the state machine and the wire, so tests can substitute a
/// fake transport.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn upload(&self, request: &UploadRequest) -> Result<UploadReceipt, TransportError>;
}

/// Tracks every file's upload state and drives transfers through the
/// transport. Uploads within a batch run concurrently and independently;
/// there is no ordering guarantee between them, and nothing is retried
/// without an explicit new `upload` call.
pub struct UploadManager {
    transport: Arc<dyn UploadTransport>,
    progress: Mutex<HashMap<String, UploadState>>,
    cancellations: Mutex<HashMap<String, CancellationToken>>,
}

impl UploadManager {
    pub fn new(transport: Arc<dyn UploadTransport>) -> Self {
        Self {
            transport,
            progress: Mutex::new(HashMap::new()),
            cancellations: Mutex::new(HashMap::new()),
        }
    }

    /// Current state for a file; files never seen report `Idle`.
    pub fn state(&self, filename: &str) -> UploadState {
        lock(&self.progress)
            .get(filename)
            .cloned()
            .unwrap_or(UploadState::Idle)
    }

    /// Cancel an in-flight upload. A no-op for files that are not uploading.
    pub fn cancel(&self, filename: &str) {
        if let Some(token) = lock(&self.cancellations).get(filename) {
            token.cancel();
        }
    }

    /// Run one upload to completion (or cancellation) and return the final
    /// state. Calling this again on an `Error` file is the retry path.
    pub async fn upload(&self, request: UploadRequest) -> UploadState {
        let token = CancellationToken::new();
        lock(&self.cancellations).insert(request.filename.clone(), token.clone());
        self.set_state(&request.filename, UploadState::Uploading);

        let outcome = tokio::select! {
            // Cancellation is client-initiated, not a failure.
            _ = token.cancelled() => UploadState::Idle,
            result = self.transport.upload(&request) => match result {
                Ok(receipt) => UploadState::Success {
                    saved_as: receipt.saved_as,
                },
                Err(err) => UploadState::Error {
                    retryable: err.is_retryable(),
                    message: err.to_string(),
                },
            },
        };

        self.set_state(&request.filename, outcome.clone());
        lock(&self.cancellations).remove(&request.filename);
        outcome
    }

    /// Upload a batch of files concurrently. At most `MAX_BATCH_FILES` per
    /// call; results come back in request order.
    pub async fn upload_batch(
        &self,
        requests: Vec<UploadRequest>,
    ) -> Result<Vec<UploadState>, BatchError> {
        if requests.len() > MAX_BATCH_FILES {
            return Err(BatchError::TooManyFiles {
                count: requests.len(),
            });
        }
        Ok(join_all(requests.into_iter().map(|request| self.upload(request))).await)
    }

    fn set_state(&self, filename: &str, state: UploadState) {
        lock(&self.progress).insert(filename.to_string(), state);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Real transport: multipart POST to `/api/v1/upload`.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct UploadResponseBody {
    file: UploadedFileBody,
}

#[derive(Deserialize)]
struct UploadedFileBody {
    #[serde(rename = "savedAs")]
    saved_as: String,
    bucket: String,
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn upload(&self, request: &UploadRequest) -> Result<UploadReceipt, TransportError> {
        let part = reqwest::multipart::Part::stream(request.bytes.clone())
            .file_name(request.filename.clone())
            .mime_str(&request.content_type)
            .map_err(|err| TransportError::Connection(err.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(format!(
                "{}/api/v1/upload",
                self.base_url.trim_end_matches('/')
            ))
            .multipart(form)
            .send()
            .await
            .map_err(|err| TransportError::Connection(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.error)
                .unwrap_or_else(|_| status.to_string());
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: UploadResponseBody = response
            .json()
            .await
            .map_err(|err| TransportError::Connection(err.to_string()))?;
        Ok(UploadReceipt {
            saved_as: body.file.saved_as,
            bucket: body.file.bucket,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    fn request(filename: &str) -> UploadRequest {
        UploadRequest {
            filename: filename.to_string(),
            content_type: "application/pdf".to_string(),
            bytes: Bytes::from_static(b"%PDF-1.4"),
        }
    }

    fn receipt(filename: &str) -> UploadReceipt {
        UploadReceipt {
            saved_as: format!("1700000000000_{filename}"),
            bucket: "pdf-uploads".to_string(),
        }
    }

    /// Scripted transport: pops the next outcome per filename; files with
    /// no script succeed.
    #[derive(Default)]
    struct FakeTransport {
        scripts: Mutex<HashMap<String, VecDeque<Result<UploadReceipt, TransportError>>>>,
    }

    impl FakeTransport {
        fn script(&self, filename: &str, outcome: Result<UploadReceipt, TransportError>) {
            lock(&self.scripts)
                .entry(filename.to_string())
                .or_default()
                .push_back(outcome);
        }
    }

    #[async_trait]
    impl UploadTransport for FakeTransport {
        async fn upload(&self, request: &UploadRequest) -> Result<UploadReceipt, TransportError> {
            let scripted = lock(&self.scripts)
                .get_mut(&request.filename)
                .and_then(|queue| queue.pop_front());
            scripted.unwrap_or_else(|| Ok(receipt(&request.filename)))
        }
    }

    /// Transport that never completes, for exercising cancellation.
    struct PendingTransport;

    #[async_trait]
    impl UploadTransport for PendingTransport {
        async fn upload(&self, _: &UploadRequest) -> Result<UploadReceipt, TransportError> {
            futures::future::pending().await
        }
    }

    #[tokio::test]
    async fn successful_upload_ends_in_success() {
        let manager = UploadManager::new(Arc::new(FakeTransport::default()));
        assert_eq!(manager.state("report.pdf"), UploadState::Idle);

        let outcome = manager.upload(request("report.pdf")).await;
        assert_eq!(
            outcome,
            UploadState::Success {
                saved_as: "1700000000000_report.pdf".to_string()
            }
        );
        assert_eq!(manager.state("report.pdf"), outcome);
    }

    #[tokio::test]
    async fn server_rejection_is_not_retryable() {
        let transport = Arc::new(FakeTransport::default());
        transport.script(
            "notes.txt",
            Err(TransportError::Rejected {
                status: 415,
                message: "unsupported media type".into(),
            }),
        );
        let manager = UploadManager::new(transport);

        match manager.upload(request("notes.txt")).await {
            UploadState::Error { retryable, .. } => assert!(!retryable),
            other => panic!("expected error state, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_upload_can_be_retried_to_success() {
        let transport = Arc::new(FakeTransport::default());
        transport.script(
            "report.pdf",
            Err(TransportError::Rejected {
                status: 503,
                message: "storage backend unavailable".into(),
            }),
        );
        let manager = UploadManager::new(transport);

        match manager.upload(request("report.pdf")).await {
            UploadState::Error { retryable, .. } => assert!(retryable),
            other => panic!("expected error state, got {other:?}"),
        }

        // Retry is just another upload call; the script is exhausted so the
        // fake succeeds.
        let outcome = manager.upload(request("report.pdf")).await;
        assert!(matches!(outcome, UploadState::Success { .. }));
        assert_eq!(manager.state("report.pdf"), outcome);
    }

    #[tokio::test]
    async fn cancellation_returns_file_to_idle() {
        let manager = Arc::new(UploadManager::new(Arc::new(PendingTransport)));

        let task = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.upload(request("big.pdf")).await })
        };

        // Let the upload task reach Uploading before cancelling.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(manager.state("big.pdf"), UploadState::Uploading);

        manager.cancel("big.pdf");
        let outcome = task.await.unwrap();
        assert_eq!(outcome, UploadState::Idle);
        assert_eq!(manager.state("big.pdf"), UploadState::Idle);
    }

    #[tokio::test]
    async fn batch_over_limit_is_rejected() {
        let manager = UploadManager::new(Arc::new(FakeTransport::default()));
        let requests = (0..6).map(|i| request(&format!("f{i}.pdf"))).collect();

        assert_eq!(
            manager.upload_batch(requests).await,
            Err(BatchError::TooManyFiles { count: 6 })
        );
    }

    #[tokio::test]
    async fn batch_uploads_track_each_file_independently() {
        let transport = Arc::new(FakeTransport::default());
        transport.script(
            "b.pdf",
            Err(TransportError::Connection("connection reset".into())),
        );
        let manager = UploadManager::new(transport);

        let outcomes = manager
            .upload_batch(vec![request("a.pdf"), request("b.pdf"), request("c.pdf")])
            .await
            .unwrap();

        assert!(matches!(outcomes[0], UploadState::Success { .. }));
        assert!(matches!(
            outcomes[1],
            UploadState::Error { retryable: true, .. }
        ));
        assert!(matches!(outcomes[2], UploadState::Success { .. }));

        assert!(matches!(manager.state("a.pdf"), UploadState::Success { .. }));
        assert!(matches!(manager.state("b.pdf"), UploadState::Error { .. }));
    }
}

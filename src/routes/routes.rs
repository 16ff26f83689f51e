//! Defines routes for the Scimus API.
//!
//! ## Structure
//! - **Root endpoints**
//!   - `GET /`        — API banner
//!   - `GET /health`  — liveness
//!   - `GET /readyz`  — readiness (database + storage backend)
//!
//! - **`/api/v1` endpoints**
//!   - `POST   /upload`               — direct multipart upload (PDF only)
//!   - `POST   /upload/presigned-url` — direct-to-storage upload URL
//!   - `GET    /files`                — list metadata rows (`?type=` filter)
//!   - `GET    /files/{id}/download`  — fresh presigned download URL
//!   - `DELETE /files/{id}`           — delete object + row
//!   - `GET/POST /notes`, `GET/PUT/DELETE /notes/{id}`

use crate::{
    handlers::{
        file_handlers::{delete_file, download_url, list_files, presigned_upload_url, upload_file},
        health_handlers::{health, readyz, welcome},
        note_handlers::{create_note, delete_note, get_note, list_notes, update_note},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Headroom on top of the configured maximum so multipart framing does not
/// push a limit-sized file over the transport cutoff.
const MULTIPART_OVERHEAD_BYTES: usize = 16 * 1024;

/// Build and return the router for all Scimus routes.
///
/// The router carries shared state (`AppState`) to all handlers. The size
/// cutoff on the upload route is the transport-layer half of the size
/// check; `FileService` re-validates in handler logic.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    let api = Router::new()
        .route(
            "/upload",
            post(upload_file)
                .layer(DefaultBodyLimit::max(max_upload_bytes + MULTIPART_OVERHEAD_BYTES)),
        )
        .route("/upload/presigned-url", post(presigned_upload_url))
        .route("/files", get(list_files))
        .route("/files/{id}/download", get(download_url))
        .route("/files/{id}", axum::routing::delete(delete_file))
        .route("/notes", get(list_notes).post(create_note))
        .route(
            "/notes/{id}",
            get(get_note).put(update_note).delete(delete_note),
        );

    Router::new()
        .route("/", get(welcome))
        .route("/health", get(health))
        .route("/readyz", get(readyz))
        .nest("/api/v1", api)
}

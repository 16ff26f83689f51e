use crate::services::{file_service::FileService, note_service::NoteService};

/// Shared router state carried into every handler.
#[derive(Clone)]
pub struct AppState {
    pub files: FileService,
    pub notes: NoteService,
}

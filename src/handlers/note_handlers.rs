//! HTTP handlers for notes CRUD.

use crate::{
    errors::AppError,
    models::{
        Pagination,
        note::{NewNote, Note, UpdateNote},
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ListNotesQuery {
    pub page: Option<u32>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<u32>,
}

#[derive(Serialize)]
pub struct NoteResponse {
    pub success: bool,
    pub data: Note,
}

#[derive(Serialize)]
pub struct NoteListResponse {
    pub success: bool,
    pub data: Vec<Note>,
    pub pagination: Pagination,
}

#[derive(Serialize)]
pub struct DeletedNoteResponse {
    pub success: bool,
    pub message: String,
}

/// `GET /api/v1/notes`
pub async fn list_notes(
    State(state): State<AppState>,
    Query(query): Query<ListNotesQuery>,
) -> Result<Json<NoteListResponse>, AppError> {
    let (data, pagination) = state
        .notes
        .list(query.page.unwrap_or(1), query.page_size.unwrap_or(50))
        .await?;
    Ok(Json(NoteListResponse {
        success: true,
        data,
        pagination,
    }))
}

/// `POST /api/v1/notes`
pub async fn create_note(
    State(state): State<AppState>,
    Json(new): Json<NewNote>,
) -> Result<Json<NoteResponse>, AppError> {
    let data = state.notes.create(new).await?;
    Ok(Json(NoteResponse {
        success: true,
        data,
    }))
}

/// `GET /api/v1/notes/{id}`
pub async fn get_note(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<NoteResponse>, AppError> {
    let data = state.notes.get(id).await?;
    Ok(Json(NoteResponse {
        success: true,
        data,
    }))
}

/// `PUT /api/v1/notes/{id}` — partial update.
pub async fn update_note(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<UpdateNote>,
) -> Result<Json<NoteResponse>, AppError> {
    let data = state.notes.update(id, update).await?;
    Ok(Json(NoteResponse {
        success: true,
        data,
    }))
}

/// `DELETE /api/v1/notes/{id}`
pub async fn delete_note(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeletedNoteResponse>, AppError> {
    state.notes.delete(id).await?;
    Ok(Json(DeletedNoteResponse {
        success: true,
        message: format!("note {id} deleted"),
    }))
}

//! Notes CRUD.

use crate::models::Pagination;
use crate::models::note::{NewNote, Note, UpdateNote};
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::types::Json;
use std::sync::Arc;
use thiserror::Error;

const NOTE_COLUMNS: &str =
    "id, title, content, user_id, created_by, tags, created_at, updated_at, metadata";

#[derive(Debug, Error)]
pub enum NoteServiceError {
    #[error("note {0} not found")]
    NotFound(i64),
    #[error("{0}")]
    Invalid(&'static str),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

pub type NoteResult<T> = Result<T, NoteServiceError>;

#[derive(Clone)]
pub struct NoteService {
    pub db: Arc<SqlitePool>,
}

impl NoteService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    pub async fn create(&self, new: NewNote) -> NoteResult<Note> {
        if new.title.trim().is_empty() {
            return Err(NoteServiceError::Invalid("title is required"));
        }
        if new.content.trim().is_empty() {
            return Err(NoteServiceError::Invalid("content is required"));
        }

        let now = Utc::now();
        let note = sqlx::query_as::<_, Note>(&format!(
            "INSERT INTO notes (title, content, user_id, created_by, tags, created_at, updated_at, metadata) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING {NOTE_COLUMNS}"
        ))
        .bind(&new.title)
        .bind(&new.content)
        .bind(new.user_id)
        .bind(&new.created_by)
        .bind(new.tags.map(Json))
        .bind(now)
        .bind(now)
        .bind(new.metadata.map(Json))
        .fetch_one(&*self.db)
        .await?;
        Ok(note)
    }

    pub async fn list(&self, page: u32, page_size: u32) -> NoteResult<(Vec<Note>, Pagination)> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 100);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notes")
            .fetch_one(&*self.db)
            .await?;

        let notes = sqlx::query_as::<_, Note>(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes ORDER BY updated_at DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(page_size as i64)
        .bind(((page - 1) * page_size) as i64)
        .fetch_all(&*self.db)
        .await?;

        let pagination = Pagination::for_total(page, page_size, total.max(0) as u64);
        Ok((notes, pagination))
    }

    pub async fn get(&self, id: i64) -> NoteResult<Note> {
        sqlx::query_as::<_, Note>(&format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?"))
            .bind(id)
            .fetch_one(&*self.db)
            .await
            .map_err(|err| match err {
                sqlx::Error::RowNotFound => NoteServiceError::NotFound(id),
                other => other.into(),
            })
    }

    /// Partial update: absent fields keep their stored value.
    pub async fn update(&self, id: i64, update: UpdateNote) -> NoteResult<Note> {
        let existing = self.get(id).await?;

        let title = update.title.unwrap_or(existing.title);
        let content = update.content.unwrap_or(existing.content);
        if title.trim().is_empty() {
            return Err(NoteServiceError::Invalid("title is required"));
        }
        if content.trim().is_empty() {
            return Err(NoteServiceError::Invalid("content is required"));
        }
        let tags = update.tags.map(Json).or(existing.tags);
        let metadata = update.metadata.map(Json).or(existing.metadata);

        let note = sqlx::query_as::<_, Note>(&format!(
            "UPDATE notes SET title = ?, content = ?, tags = ?, metadata = ?, updated_at = ? \
             WHERE id = ? RETURNING {NOTE_COLUMNS}"
        ))
        .bind(&title)
        .bind(&content)
        .bind(tags)
        .bind(metadata)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&*self.db)
        .await?;
        Ok(note)
    }

    pub async fn delete(&self, id: i64) -> NoteResult<()> {
        let result = sqlx::query("DELETE FROM notes WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(NoteServiceError::NotFound(id));
        }
        Ok(())
    }
}

//! Core data models for the Scimus API.
//!
//! These entities represent uploaded files, notes, and accounts. They map
//! cleanly to database tables via `sqlx::FromRow` and serialize naturally
//! as camelCase JSON via `serde`.

use serde::{Deserialize, Serialize};

pub mod file_record;
pub mod note;
pub mod user;

/// Pagination envelope attached to list responses.
#[derive(Serialize, Deserialize, Clone, Copy, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl Pagination {
    /// Compute the envelope for a `total` row count at the given page size.
    pub fn for_total(page: u32, page_size: u32, total: u64) -> Self {
        let total_pages = (total.div_ceil(page_size.max(1) as u64)) as u32;
        Self {
            page,
            page_size,
            total,
            total_pages,
        }
    }
}

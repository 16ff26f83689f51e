//! SQLite pool construction and the migration runner.

use anyhow::Result;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::{fs, path::Path, sync::Arc};
use tracing::debug;

/// Embedded schema, applied statement by statement. Every statement is
/// `IF NOT EXISTS`, so re-running is harmless.
const MIGRATIONS: &str = include_str!("../migrations/0001_init.sql");

/// Open the SQLite pool, creating the database file and its parent
/// directory when they do not exist yet.
pub async fn connect(database_url: &str) -> Result<Arc<SqlitePool>> {
    let db_path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("file:");

    if !database_url.contains(":memory:") {
        let db_path_obj = Path::new(db_path);
        if let Some(parent) = db_path_obj.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
                debug!("created missing directory {:?}", parent);
            }
        }
        // SQLx refuses to open a missing file; touch it first.
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(db_path)?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    Ok(Arc::new(pool))
}

/// Run the embedded SQL migrations.
pub async fn run_migrations(db: &SqlitePool) -> Result<()> {
    let statements = MIGRATIONS
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    debug!("running {} migration statements", statements.len());
    for stmt in statements {
        sqlx::query(stmt).execute(db).await?;
    }
    Ok(())
}

use anyhow::Result;
use axum::http::{HeaderValue, Method, header};
use scimus::config::{AppConfig, StorageMode};
use scimus::services::file_service::{FileService, UploadLimits};
use scimus::services::note_service::NoteService;
use scimus::services::object_storage;
use scimus::state::AppState;
use scimus::{db, routes};
use std::{fs, io::ErrorKind, path::Path};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!(
        "starting scimus ({} storage, bucket {})",
        cfg.storage.mode,
        cfg.storage.bucket
    );

    // --- Ensure the local upload directory exists ---
    if cfg.storage.mode == StorageMode::Local && !Path::new(&cfg.storage.upload_dir).exists() {
        fs::create_dir_all(&cfg.storage.upload_dir)?;
        tracing::info!("created upload directory at {}", cfg.storage.upload_dir);
    }

    // --- Initialize SQLite + schema ---
    let db = db::connect(&cfg.database_url).await?;
    db::run_migrations(&db).await?;
    if migrate {
        tracing::info!("database migration complete");
        return Ok(());
    }

    // --- Initialize the storage backend ---
    let storage = object_storage::from_config(&cfg.storage)?;
    if let Err(err) = storage.ensure_bucket(storage.bucket_name()).await {
        // The backend may simply not be up yet; uploads re-ensure per call.
        tracing::warn!(
            "could not ensure bucket `{}` at startup: {err}",
            storage.bucket_name()
        );
    }

    // --- Build router ---
    let limits = UploadLimits {
        max_upload_bytes: cfg.max_upload_bytes,
        presign_expiry_secs: cfg.presign_expiry_secs,
    };
    let state = AppState {
        files: FileService::new(db.clone(), storage, limits),
        notes: NoteService::new(db.clone()),
    };
    let app = routes::routes::routes(cfg.max_upload_bytes as usize)
        .with_state(state)
        .layer(cors_layer(&cfg.allowed_origins)?)
        .layer(TraceLayer::new_for_http());

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer> {
    let origins = allowed_origins
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true))
}

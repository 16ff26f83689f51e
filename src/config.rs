use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::env;
use std::fmt;
use std::str::FromStr;

const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;
const DEFAULT_PRESIGN_EXPIRY_SECS: u32 = 300;

/// Which backend holds uploaded bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageMode {
    Local,
    Minio,
    S3,
}

impl FromStr for StorageMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "minio" => Ok(Self::Minio),
            "s3" => Ok(Self::S3),
            other => bail!("unsupported storage mode `{other}` (expected local, minio, or s3)"),
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Minio => write!(f, "minio"),
            Self::S3 => write!(f, "s3"),
        }
    }
}

/// Object-storage backend settings.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub mode: StorageMode,
    /// Root directory for the local backend.
    pub upload_dir: String,
    pub endpoint: String,
    pub endpoint_port: u16,
    pub use_ssl: bool,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub storage: StorageConfig,
    pub max_upload_bytes: u64,
    pub presign_expiry_secs: u32,
    pub allowed_origins: Vec<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Scimus knowledge-management API")]
pub struct Args {
    /// Host to bind to (overrides SCIMUS_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides SCIMUS_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides SCIMUS_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Storage backend (overrides STORAGE_TYPE)
    #[arg(long, value_enum)]
    pub storage_type: Option<StorageMode>,

    /// Directory for local-mode uploads (overrides SCIMUS_UPLOAD_DIR)
    #[arg(long)]
    pub upload_dir: Option<String>,

    /// Bucket for uploaded objects (overrides MINIO_BUCKET_NAME)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        Self::merge(args)
    }

    fn merge(args: Args) -> Result<(Self, bool)> {
        let storage = StorageConfig {
            mode: match args.storage_type {
                Some(mode) => mode,
                None => env_or("STORAGE_TYPE", "local").parse()?,
            },
            upload_dir: args
                .upload_dir
                .unwrap_or_else(|| env_or("SCIMUS_UPLOAD_DIR", "./data/uploads")),
            endpoint: env_or("MINIO_ENDPOINT", "localhost"),
            endpoint_port: env_parse("MINIO_PORT", 9000)?,
            use_ssl: env_or("MINIO_USE_SSL", "false") == "true",
            access_key: env_or("MINIO_ACCESS_KEY", "minioadmin"),
            secret_key: env_or("MINIO_SECRET_KEY", "minioadmin"),
            bucket: args
                .bucket
                .unwrap_or_else(|| env_or("MINIO_BUCKET_NAME", "pdf-uploads")),
            region: env_or("SCIMUS_REGION", "us-east-1"),
        };

        let cfg = Self {
            host: args.host.unwrap_or_else(|| env_or("SCIMUS_HOST", "0.0.0.0")),
            port: match args.port {
                Some(port) => port,
                None => env_parse("SCIMUS_PORT", 3001)?,
            },
            database_url: args
                .database_url
                .unwrap_or_else(|| env_or("SCIMUS_DATABASE_URL", "sqlite://./data/scimus.db")),
            storage,
            max_upload_bytes: env_parse("SCIMUS_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            presign_expiry_secs: env_parse(
                "SCIMUS_PRESIGN_EXPIRY_SECS",
                DEFAULT_PRESIGN_EXPIRY_SECS,
            )?,
            allowed_origins: env_or(
                "SCIMUS_ALLOWED_ORIGINS",
                "http://localhost:5173,http://localhost:3000",
            )
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect(),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.into())
}

fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {name} value `{value}`")),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).context(format!("reading {name}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_mode_parses_case_insensitively() {
        assert_eq!("local".parse::<StorageMode>().unwrap(), StorageMode::Local);
        assert_eq!("MinIO".parse::<StorageMode>().unwrap(), StorageMode::Minio);
        assert_eq!("S3".parse::<StorageMode>().unwrap(), StorageMode::S3);
        assert!("gcs".parse::<StorageMode>().is_err());
    }
}

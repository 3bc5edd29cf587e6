use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Which bindings back the external platform capabilities.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlatformMode {
    /// In-memory document and blob stores, for tests and local development.
    Memory,
    /// Redis document store plus on-disk submission storage.
    Redis,
}

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Which platform bindings to build.
    pub platform: PlatformMode,
    /// The URL of the Redis server.
    pub redis_url: String,
    /// Where submission blobs land in `redis` mode.
    pub submissions_dir: PathBuf,
    /// The directory served as the static single-page frontend.
    pub public_dir: PathBuf,
    /// How often the record observation polls for changes.
    pub record_poll_interval: Duration,
    /// The assignment window, in minutes, used to derive the deadline.
    pub assignment_duration_mins: i64,
    /// The maximum accepted submission size, in bytes.
    pub max_submission_bytes: usize,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        let platform = match env::var("PLATFORM")
            .unwrap_or_else(|_| "redis".to_string())
            .as_str()
        {
            "memory" => PlatformMode::Memory,
            "redis" => PlatformMode::Redis,
            other => anyhow::bail!("PLATFORM must be 'memory' or 'redis', got '{}'", other),
        };

        Ok(Self {
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
                .parse()
                .context("Invalid BIND_ADDR")?,
            platform,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            submissions_dir: env::var("SUBMISSIONS_DIR")
                .unwrap_or_else(|_| "files/submissions".to_string())
                .into(),
            public_dir: env::var("PUBLIC_DIR")
                .unwrap_or_else(|_| "files/public".to_string())
                .into(),
            record_poll_interval: Duration::from_millis(
                env::var("RECORD_POLL_INTERVAL_MS")
                    .unwrap_or_else(|_| "500".to_string())
                    .parse()
                    .context("Invalid RECORD_POLL_INTERVAL_MS")?,
            ),
            assignment_duration_mins: env::var("ASSIGNMENT_DURATION_MINS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .context("Invalid ASSIGNMENT_DURATION_MINS")?,
            max_submission_bytes: env::var("MAX_SUBMISSION_BYTES")
                .unwrap_or_else(|_| (100 * 1024 * 1024).to_string())
                .parse()
                .context("Invalid MAX_SUBMISSION_BYTES")?,
        })
    }
}

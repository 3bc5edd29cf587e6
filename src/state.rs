use std::sync::Arc;

use redis::aio::ConnectionManager;

use crate::config::{Config, PlatformMode};
use crate::error::Result;
use crate::platform::blobs::{BlobStore, FsBlobs, MemoryBlobs};
use crate::platform::documents::DocumentStore;
use crate::platform::identity::IdentityBroker;
use crate::platform::memory::MemoryDocuments;
use crate::platform::notify::Notifier;
use crate::platform::redis::RedisDocuments;
use crate::session::controller::LifecycleController;

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The session lifecycle controller.
    pub controller: LifecycleController,
    /// The identity broker, shared with the controller.
    pub identity: IdentityBroker,
    /// The UI event feed.
    pub notifier: Notifier,
    /// The application's configuration.
    pub config: Config,
}

impl AppState {
    /// Builds the platform bindings selected by the configuration and the
    /// controller on top of them.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn new(config: &Config) -> Result<Self> {
        let (documents, blobs) = match config.platform {
            PlatformMode::Memory => {
                tracing::info!("✅ Platform bindings: in-memory");
                (
                    DocumentStore::Memory(MemoryDocuments::new()),
                    BlobStore::Memory(MemoryBlobs::new()),
                )
            }
            PlatformMode::Redis => {
                let client = redis::Client::open(config.redis_url.as_str())?;
                let conn = ConnectionManager::new(client).await?;
                tracing::info!("✅ Redis Connection Manager initialized (pooled)");
                (
                    DocumentStore::Redis(RedisDocuments::new(conn, config.record_poll_interval)),
                    BlobStore::Fs(FsBlobs::new(config.submissions_dir.clone())),
                )
            }
        };

        let identity = IdentityBroker::new();
        let notifier = Notifier::new();
        let controller = LifecycleController::new(
            identity.clone(),
            Arc::new(documents),
            Arc::new(blobs),
            notifier.clone(),
        );
        tracing::info!("✅ Session lifecycle controller initialized");

        Ok(AppState {
            controller,
            identity,
            notifier,
            config: config.clone(),
        })
    }
}

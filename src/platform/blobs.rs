use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Bytes;

use crate::error::{AppError, Result};

fn blob_key(uid: &str) -> String {
    format!("submissions/{}.zip", uid)
}

/// The external submission blob store, behind one of its bindings.
pub enum BlobStore {
    Memory(MemoryBlobs),
    Fs(FsBlobs),
}

impl BlobStore {
    /// Stores the candidate's submission under `submissions/{uid}.zip`,
    /// overwriting any prior upload. No deletion or versioning.
    pub async fn upload(&self, uid: &str, bytes: Bytes) -> Result<()> {
        match self {
            BlobStore::Memory(store) => store.upload(uid, bytes),
            BlobStore::Fs(store) => store.upload(uid, bytes).await,
        }
    }
}

/// In-memory blob binding for tests and local development.
#[derive(Clone)]
pub struct MemoryBlobs {
    inner: Arc<BlobsInner>,
}

struct BlobsInner {
    blobs: Mutex<HashMap<String, Bytes>>,
    fail_uploads: AtomicBool,
}

impl MemoryBlobs {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BlobsInner {
                blobs: Mutex::new(HashMap::new()),
                fail_uploads: AtomicBool::new(false),
            }),
        }
    }

    /// Makes subsequent uploads fail.
    pub fn fail_uploads(&self, fail: bool) {
        self.inner.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// The stored blob for a uid, if one was uploaded.
    pub fn stored(&self, uid: &str) -> Option<Bytes> {
        self.inner.blobs.lock().unwrap().get(&blob_key(uid)).cloned()
    }

    fn upload(&self, uid: &str, bytes: Bytes) -> Result<()> {
        if self.inner.fail_uploads.load(Ordering::SeqCst) {
            return Err(AppError::Internal("blob store unavailable".to_string()));
        }
        self.inner.blobs.lock().unwrap().insert(blob_key(uid), bytes);
        Ok(())
    }
}

impl Default for MemoryBlobs {
    fn default() -> Self {
        Self::new()
    }
}

/// Filesystem blob binding: submissions land under the configured root.
pub struct FsBlobs {
    root: PathBuf,
}

impl FsBlobs {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    async fn upload(&self, uid: &str, bytes: Bytes) -> Result<()> {
        // The uid becomes a path segment under the root; anything that
        // could navigate out of it is refused outright.
        if uid.contains(['/', '\\']) || uid.contains("..") {
            return Err(AppError::Validation(
                "uid is not a valid storage key".to_string(),
            ));
        }
        let path = self.root.join(blob_key(uid));
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;
        tracing::debug!("submission stored at {}", path.display());
        Ok(())
    }
}

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::models::session::{CandidateMetadata, SessionRecord};

use super::memory::MemoryDocuments;
use super::redis::RedisDocuments;

/// A cancellable handle to one record observation. Dropping it tears the
/// observation down.
pub struct RecordWatch {
    task: JoinHandle<()>,
}

impl RecordWatch {
    pub(crate) fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }
}

impl Drop for RecordWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// The external per-candidate document store, behind one of its bindings.
pub enum DocumentStore {
    Memory(MemoryDocuments),
    Redis(RedisDocuments),
}

impl DocumentStore {
    /// Creates the candidate's session record with a non-merging overwrite:
    /// the store stamps `started_at`, `finished_at` starts absent, and a
    /// pre-existing record for the same uid is replaced wholesale.
    pub async fn create_session(&self, uid: &str, metadata: CandidateMetadata) -> Result<()> {
        match self {
            DocumentStore::Memory(store) => store.create_session(uid, metadata),
            DocumentStore::Redis(store) => store.create_session(uid, metadata).await,
        }
    }

    /// Marks the candidate's session finished with a partial update: only
    /// `finished_at` is written, stamped by the store. Fails if no record
    /// exists for the uid.
    pub async fn mark_finished(&self, uid: &str) -> Result<()> {
        match self {
            DocumentStore::Memory(store) => store.mark_finished(uid),
            DocumentStore::Redis(store) => store.mark_finished(uid).await,
        }
    }

    /// Starts observing the candidate's record. The current state is
    /// delivered first, then every change; observation errors degrade to
    /// `None` ("record absent"). The returned handle cancels the
    /// observation when dropped.
    pub fn observe(
        &self,
        uid: &str,
        tx: mpsc::UnboundedSender<Option<SessionRecord>>,
    ) -> RecordWatch {
        match self {
            DocumentStore::Memory(store) => store.observe(uid, tx),
            DocumentStore::Redis(store) => store.observe(uid, tx),
        }
    }
}

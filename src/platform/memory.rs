use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};

use crate::error::{AppError, Result};
use crate::models::session::{CandidateMetadata, SessionRecord};

use super::documents::RecordWatch;

/// In-memory document binding used by tests and local development.
///
/// Semantics mirror the redis binding: non-merging create, partial finish
/// update, observation that delivers the current record and then every
/// change. The failure switches let tests drive the degraded paths without
/// a real backend.
#[derive(Clone)]
pub struct MemoryDocuments {
    inner: Arc<Inner>,
}

struct Inner {
    records: Mutex<HashMap<String, SessionRecord>>,
    changed: broadcast::Sender<String>,
    fail_writes: AtomicBool,
    fail_observe: AtomicBool,
}

impl MemoryDocuments {
    pub fn new() -> Self {
        let (changed, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                records: Mutex::new(HashMap::new()),
                changed,
                fail_writes: AtomicBool::new(false),
                fail_observe: AtomicBool::new(false),
            }),
        }
    }

    /// Makes subsequent writes fail.
    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes observations report "record absent" regardless of contents.
    pub fn fail_observe(&self, fail: bool) {
        self.inner.fail_observe.store(fail, Ordering::SeqCst);
    }

    /// The stored record for a uid, as of this instant.
    pub fn record(&self, uid: &str) -> Option<SessionRecord> {
        self.inner.records.lock().unwrap().get(uid).cloned()
    }

    pub fn create_session(&self, uid: &str, metadata: CandidateMetadata) -> Result<()> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("document store unavailable".to_string()));
        }
        let record = SessionRecord {
            started_at: Some(Utc::now()),
            finished_at: None,
            metadata,
        };
        self.inner
            .records
            .lock()
            .unwrap()
            .insert(uid.to_string(), record);
        let _ = self.inner.changed.send(uid.to_string());
        Ok(())
    }

    pub fn mark_finished(&self, uid: &str) -> Result<()> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("document store unavailable".to_string()));
        }
        {
            let mut records = self.inner.records.lock().unwrap();
            let record = records.get_mut(uid).ok_or(AppError::RecordNotFound)?;
            record.finished_at = Some(Utc::now());
        }
        let _ = self.inner.changed.send(uid.to_string());
        Ok(())
    }

    pub fn observe(
        &self,
        uid: &str,
        tx: mpsc::UnboundedSender<Option<SessionRecord>>,
    ) -> RecordWatch {
        let uid = uid.to_string();
        let inner = self.inner.clone();
        // Subscribed before the initial read, so no change can slip between
        // the snapshot and the first notification.
        let mut changes = self.inner.changed.subscribe();
        let task = tokio::spawn(async move {
            if tx.send(current(&inner, &uid)).is_err() {
                return;
            }
            loop {
                match changes.recv().await {
                    Ok(changed_uid) if changed_uid == uid => {
                        if tx.send(current(&inner, &uid)).is_err() {
                            return;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        if tx.send(current(&inner, &uid)).is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });
        RecordWatch::new(task)
    }
}

impl Default for MemoryDocuments {
    fn default() -> Self {
        Self::new()
    }
}

fn current(inner: &Inner, uid: &str) -> Option<SessionRecord> {
    if inner.fail_observe.load(Ordering::SeqCst) {
        return None;
    }
    inner.records.lock().unwrap().get(uid).cloned()
}

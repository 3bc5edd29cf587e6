use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use axum::body::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::models::identity::{Identity, SignInError};
use crate::models::session::{CandidateMetadata, Phase, SessionRecord};
use crate::platform::blobs::BlobStore;
use crate::platform::documents::{DocumentStore, RecordWatch};
use crate::platform::identity::IdentityBroker;
use crate::platform::notify::Notifier;

/// A file picked by the candidate for submission.
#[derive(Debug, Clone)]
pub struct SubmissionFile {
    pub name: String,
    pub bytes: Bytes,
}

/// What the controller currently knows about the candidate's session.
#[derive(Debug, Clone, Default)]
pub struct SessionView {
    pub identity: Option<Identity>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SessionView {
    /// Derived phase. Identity absence outranks stale record fields, so a
    /// sign-out mid-assignment reads as `LoggedOut` even before the record
    /// subscription clears the timestamps.
    pub fn phase(&self) -> Phase {
        if self.identity.is_none() {
            return Phase::LoggedOut;
        }
        if self.finished_at.is_some() {
            Phase::Finished
        } else if self.started_at.is_some() {
            Phase::InProgress
        } else {
            Phase::LoggedOut
        }
    }
}

/// Scoped hold on a busy flag, released on every exit path.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    /// Takes the flag, or `None` if another operation already holds it.
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// The producer/consumer pair behind one record observation.
struct RecordSubscription {
    _producer: RecordWatch,
    consumer: JoinHandle<()>,
}

impl Drop for RecordSubscription {
    fn drop(&mut self) {
        self.consumer.abort();
    }
}

/// Drives the candidate's session through `LoggedOut -> InProgress ->
/// Finished`.
///
/// Two reactive subscriptions feed the held state: the identity
/// subscription lives for the controller's lifetime, and the record
/// subscription is re-established on every identity change, with the prior
/// handle dropped first. Both run concurrently with any in-flight `start` /
/// `submit`; a record notification arriving mid-operation simply overwrites
/// the held timestamps with the latest observed values. The busy flags only
/// suppress redundant retries; the external store remains the sole arbiter
/// of write ordering.
#[derive(Clone)]
pub struct LifecycleController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    identity: IdentityBroker,
    documents: Arc<DocumentStore>,
    blobs: Arc<BlobStore>,
    notifier: Notifier,
    view: watch::Sender<SessionView>,
    logging_in: AtomicBool,
    submitting: AtomicBool,
    record_watch: Mutex<Option<RecordSubscription>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.lock().unwrap().take() {
            watcher.abort();
        }
    }
}

impl LifecycleController {
    /// Builds the controller and installs its identity subscription. Must
    /// be called from within a tokio runtime.
    pub fn new(
        identity: IdentityBroker,
        documents: Arc<DocumentStore>,
        blobs: Arc<BlobStore>,
        notifier: Notifier,
    ) -> Self {
        let (view, _) = watch::channel(SessionView::default());
        let identities = identity.subscribe();
        let inner = Arc::new(ControllerInner {
            identity,
            documents,
            blobs,
            notifier,
            view,
            logging_in: AtomicBool::new(false),
            submitting: AtomicBool::new(false),
            record_watch: Mutex::new(None),
            watcher: Mutex::new(None),
        });

        let watcher = tokio::spawn(watch_identity(Arc::downgrade(&inner), identities));
        *inner.watcher.lock().unwrap() = Some(watcher);

        Self { inner }
    }

    /// Runs the interactive sign-in and creates the session record.
    ///
    /// Cancellation of the external flow is a silent no-op; any other
    /// failure surfaces one generic notification. The busy flag is released
    /// and the page scrolled back to the top on every path.
    pub async fn start(&self) {
        let Some(_busy) = BusyGuard::acquire(&self.inner.logging_in) else {
            tracing::debug!("sign-in already in flight, ignoring retry");
            return;
        };

        match self.inner.identity.sign_in().await {
            Ok(identity) => {
                let metadata = CandidateMetadata {
                    display_name: identity.display_name.clone(),
                    email: identity.email.clone(),
                };
                match self
                    .inner
                    .documents
                    .create_session(&identity.uid, metadata)
                    .await
                {
                    Ok(()) => tracing::info!(uid = %identity.uid, "session started"),
                    Err(e) => {
                        tracing::error!("failed to create session record: {}", e);
                        self.inner.notifier.error();
                    }
                }
            }
            Err(SignInError::Cancelled) => {
                tracing::debug!("candidate cancelled the sign-in flow");
            }
            Err(SignInError::Failed(reason)) => {
                tracing::error!("sign-in failed: {}", reason);
                self.inner.notifier.error();
            }
        }

        self.inner.notifier.scroll_to_top();
    }

    /// Uploads the picked file and marks the session finished.
    ///
    /// A missing identity or missing file is a no-op that leaves the busy
    /// flag untouched. The record is only marked finished after a
    /// successful upload; a failure at either step surfaces one generic
    /// notification and leaves the phase where it was.
    pub async fn submit(&self, file: Option<SubmissionFile>) {
        let Some(identity) = self.inner.identity.current() else {
            return;
        };
        let Some(file) = file else {
            return;
        };
        let Some(_busy) = BusyGuard::acquire(&self.inner.submitting) else {
            tracing::debug!("submission already in flight, ignoring retry");
            return;
        };

        tracing::info!(
            uid = %identity.uid,
            file = %file.name,
            size = file.bytes.len(),
            "uploading submission"
        );

        match self.inner.blobs.upload(&identity.uid, file.bytes).await {
            Ok(()) => match self.inner.documents.mark_finished(&identity.uid).await {
                Ok(()) => tracing::info!(uid = %identity.uid, "session finished"),
                Err(e) => {
                    // The blob stayed uploaded; re-uploading recovers.
                    tracing::error!("failed to mark session finished: {}", e);
                    self.inner.notifier.error();
                }
            },
            Err(e) => {
                tracing::error!("submission upload failed: {}", e);
                self.inner.notifier.error();
            }
        }
    }

    /// The held state as of this instant.
    pub fn view(&self) -> SessionView {
        self.inner.view.borrow().clone()
    }

    /// Observes every change to the held state.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.inner.view.subscribe()
    }

    pub fn logging_in(&self) -> bool {
        self.inner.logging_in.load(Ordering::SeqCst)
    }

    pub fn submitting(&self) -> bool {
        self.inner.submitting.load(Ordering::SeqCst)
    }
}

impl ControllerInner {
    fn apply_identity(self: &Arc<Self>, identity: Option<Identity>) {
        tracing::debug!(present = identity.is_some(), "identity changed");
        self.view
            .send_modify(|view| view.identity = identity.clone());

        // Tear down the watch for the previous identity before installing
        // the next one.
        self.record_watch.lock().unwrap().take();

        match identity {
            Some(identity) => {
                let (tx, mut rx) = mpsc::unbounded_channel();
                let producer = self.documents.observe(&identity.uid, tx);
                let weak = Arc::downgrade(self);
                let consumer = tokio::spawn(async move {
                    while let Some(record) = rx.recv().await {
                        let Some(inner) = weak.upgrade() else { return };
                        inner.apply_record(record);
                    }
                });
                *self.record_watch.lock().unwrap() = Some(RecordSubscription {
                    _producer: producer,
                    consumer,
                });
            }
            None => self.apply_record(None),
        }
    }

    fn apply_record(&self, record: Option<SessionRecord>) {
        self.view.send_modify(|view| match &record {
            Some(record) => {
                view.started_at = record.started_at;
                view.finished_at = record.finished_at;
            }
            None => {
                view.started_at = None;
                view.finished_at = None;
            }
        });
    }
}

/// The controller-lifetime identity subscription. Holds the inner state
/// weakly so dropping the controller tears everything down.
async fn watch_identity(
    inner: Weak<ControllerInner>,
    mut identities: watch::Receiver<Option<Identity>>,
) {
    loop {
        let identity = identities.borrow_and_update().clone();
        let Some(strong) = inner.upgrade() else { return };
        strong.apply_identity(identity);
        drop(strong);
        if identities.changed().await.is_err() {
            return;
        }
    }
}

use std::sync::{Arc, Mutex};

use tokio::sync::{oneshot, watch};

use crate::models::identity::{Identity, SignInError};

/// How the external OAuth flow resolved an interactive sign-in.
#[derive(Debug, Clone)]
pub enum SignInOutcome {
    SignedIn(Identity),
    Cancelled,
    Failed(String),
}

/// Front door to the delegated identity provider.
///
/// The interactive popup lives outside this process, so `sign_in` suspends
/// until the front-channel flow reports back through [`resolve`]. The
/// current identity is published on a watch channel, so observers see every
/// change, including sign-out and provider-driven replacement.
///
/// [`resolve`]: IdentityBroker::resolve
#[derive(Clone)]
pub struct IdentityBroker {
    inner: Arc<BrokerInner>,
}

struct BrokerInner {
    current: watch::Sender<Option<Identity>>,
    pending: Mutex<Option<oneshot::Sender<SignInOutcome>>>,
}

impl IdentityBroker {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            inner: Arc::new(BrokerInner {
                current,
                pending: Mutex::new(None),
            }),
        }
    }

    /// Runs one interactive sign-in attempt, suspending until the external
    /// flow resolves it. No timeout: a hung flow keeps the attempt pending
    /// until its transport gives up.
    pub async fn sign_in(&self) -> Result<Identity, SignInError> {
        let (tx, rx) = oneshot::channel();
        // A second attempt supersedes the first; the superseded receiver
        // resolves as cancelled below.
        *self.inner.pending.lock().unwrap() = Some(tx);

        match rx.await {
            Ok(SignInOutcome::SignedIn(identity)) => {
                tracing::info!(uid = %identity.uid, "candidate signed in");
                self.inner.current.send_replace(Some(identity.clone()));
                Ok(identity)
            }
            Ok(SignInOutcome::Cancelled) | Err(_) => Err(SignInError::Cancelled),
            Ok(SignInOutcome::Failed(reason)) => Err(SignInError::Failed(reason)),
        }
    }

    /// Completes a pending sign-in attempt. When none is pending and the
    /// outcome carries an identity, the provider restored an external
    /// session: the identity still replaces the current one.
    pub fn resolve(&self, outcome: SignInOutcome) {
        let pending = self.inner.pending.lock().unwrap().take();
        match pending {
            Some(tx) => {
                let _ = tx.send(outcome);
            }
            None => {
                if let SignInOutcome::SignedIn(identity) = outcome {
                    tracing::info!(uid = %identity.uid, "restored external session");
                    self.inner.current.send_replace(Some(identity));
                }
            }
        }
    }

    /// Signs the current candidate out.
    pub fn sign_out(&self) {
        tracing::info!("candidate signed out");
        self.inner.current.send_replace(None);
    }

    /// Observes every identity change, including to absent.
    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.inner.current.subscribe()
    }

    /// The identity as of this instant.
    pub fn current(&self) -> Option<Identity> {
        self.inner.current.borrow().clone()
    }

    /// Whether an interactive sign-in is waiting on the external flow.
    pub fn has_pending_sign_in(&self) -> bool {
        self.inner.pending.lock().unwrap().is_some()
    }
}

impl Default for IdentityBroker {
    fn default() -> Self {
        Self::new()
    }
}

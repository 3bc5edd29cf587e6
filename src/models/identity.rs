use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The authenticated candidate, as reported by the external identity
/// provider. Held read-only and replaced wholesale on every provider-pushed
/// change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// The provider's unique id for the candidate.
    pub uid: String,
    /// The candidate's display name, when the provider shares one.
    pub display_name: Option<String>,
    /// The candidate's email address, when the provider shares one.
    pub email: Option<String>,
}

/// Why an interactive sign-in attempt produced no identity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignInError {
    /// The candidate closed or dismissed the interactive flow.
    #[error("sign-in cancelled by the candidate")]
    Cancelled,

    /// Anything else the provider reported.
    #[error("sign-in failed: {0}")]
    Failed(String),
}

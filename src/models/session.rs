use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Profile details captured when the session record is created. Immutable
/// afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateMetadata {
    pub display_name: Option<String>,
    pub email: Option<String>,
}

/// The per-candidate session record held by the external document store.
///
/// `started_at` is stamped by the store once at creation; `finished_at`
/// transitions from absent to a value exactly once, on a successful
/// submission. Records are never deleted by this system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// When the candidate first signed in and the clock started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the candidate's submission landed.
    pub finished_at: Option<DateTime<Utc>>,
    /// Profile details captured at creation.
    pub metadata: CandidateMetadata,
}

/// Derived page phase. Never stored: always recomputed from the current
/// identity and record state, so the page cannot desynchronize from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    LoggedOut,
    InProgress,
    Finished,
}

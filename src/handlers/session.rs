use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::{
    error::{AppError, Result},
    models::{identity::Identity, session::Phase},
    session::controller::SubmissionFile,
    state::AppState,
};

/// Snapshot of the candidate's session as seen by the page.
#[derive(Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub identity: Option<Identity>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// `started_at` plus the configured assignment window.
    pub deadline: Option<DateTime<Utc>>,
    pub logging_in: bool,
    pub submitting: bool,
}

pub(crate) fn snapshot(state: &AppState) -> SessionSnapshot {
    let view = state.controller.view();
    let deadline = view
        .started_at
        .map(|started| started + Duration::minutes(state.config.assignment_duration_mins));
    SessionSnapshot {
        phase: view.phase(),
        identity: view.identity,
        started_at: view.started_at,
        finished_at: view.finished_at,
        deadline,
        logging_in: state.controller.logging_in(),
        submitting: state.controller.submitting(),
    }
}

/// Returns the current session snapshot.
#[axum::debug_handler]
pub async fn status(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(snapshot(&state))
}

/// Accepts the candidate's submission as a multipart upload and feeds it to
/// the controller. A request without a `file` field is a no-op, mirroring
/// an empty file picker.
#[axum::debug_handler]
pub async fn submit(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Multipart(e.to_string()))?
    {
        if field.name() == Some("file") {
            let name = field.file_name().unwrap_or("submission.zip").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Multipart(e.to_string()))?;
            file = Some(SubmissionFile { name, bytes });
        }
    }

    state.controller.submit(file).await;

    Ok((StatusCode::OK, Json(snapshot(&state))))
}

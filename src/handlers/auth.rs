use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, Result},
    models::identity::Identity,
    platform::identity::SignInOutcome,
    state::AppState,
};

use super::session::snapshot;

/// The outcome posted back by the external OAuth flow.
#[derive(Deserialize, Debug)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CallbackRequest {
    SignedIn {
        uid: String,
        display_name: Option<String>,
        email: Option<String>,
    },
    Cancelled,
    Failed {
        reason: String,
    },
}

/// The response payload for authentication-related requests.
#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
}

/// The uid keys both the session record and the submission blob, so it
/// must be a single plain path segment with no surrounding whitespace.
fn validate_uid(uid: &str) -> Result<()> {
    if uid.trim().is_empty() {
        return Err(AppError::Validation("uid cannot be empty".to_string()));
    }
    if uid != uid.trim() {
        return Err(AppError::Validation(
            "uid cannot contain surrounding whitespace".to_string(),
        ));
    }
    if uid.contains(['/', '\\']) || uid.contains("..") {
        return Err(AppError::Validation(
            "uid cannot contain path separators".to_string(),
        ));
    }
    Ok(())
}

/// Kicks off the interactive sign-in. Responds once the external flow has
/// posted its outcome to the callback endpoint; the response carries the
/// post-operation snapshot.
#[axum::debug_handler]
pub async fn start(State(state): State<AppState>) -> impl IntoResponse {
    tracing::info!("🔐 Sign-in requested");
    state.controller.start().await;
    Json(snapshot(&state))
}

/// Completion endpoint for the external OAuth flow.
#[axum::debug_handler]
pub async fn callback(
    State(state): State<AppState>,
    Json(payload): Json<CallbackRequest>,
) -> Result<impl IntoResponse> {
    let outcome = match payload {
        CallbackRequest::SignedIn {
            uid,
            display_name,
            email,
        } => {
            validate_uid(&uid)?;
            SignInOutcome::SignedIn(Identity {
                uid,
                display_name,
                email,
            })
        }
        CallbackRequest::Cancelled => SignInOutcome::Cancelled,
        CallbackRequest::Failed { reason } => SignInOutcome::Failed(reason),
    };

    state.identity.resolve(outcome);

    Ok(StatusCode::NO_CONTENT)
}

/// Signs the candidate out.
#[axum::debug_handler]
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    tracing::info!("👋 Sign-out requested");
    state.identity.sign_out();

    let response = AuthResponse {
        success: true,
        message: "Signed out".to_string(),
    };

    (StatusCode::OK, Json(response))
}

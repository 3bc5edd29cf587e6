use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use http::{Method, header};
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{handlers, state::AppState};

/// Assembles the application router: the session API, the auth flow
/// endpoints, and the static page fallback.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            "http://localhost:3000".parse().unwrap(),
            "http://127.0.0.1:3000".parse().unwrap(),
        ])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(86400));

    let action_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(100)
            .burst_size(200)
            .use_headers()
            .finish()
            .unwrap(),
    );

    let action_routes = Router::new()
        .route("/api/auth/start", post(handlers::auth::start))
        .route("/api/auth/callback", post(handlers::auth::callback))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/session/submit", post(handlers::session::submit))
        .layer(tower_governor::GovernorLayer::new(action_governor_conf))
        .with_state(state.clone());

    let status_routes = Router::new()
        .route("/api/session", get(handlers::session::status))
        .with_state(state.clone());

    Router::new()
        .merge(action_routes)
        .merge(status_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(DefaultBodyLimit::max(state.config.max_submission_bytes))
        .layer(cors)
        .fallback_service(ServeDir::new(&state.config.public_dir))
}

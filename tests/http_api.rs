use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::Extension;
use axum::extract::ConnectInfo;
use http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use fresh_intake::config::{Config, PlatformMode};
use fresh_intake::routes;
use fresh_intake::state::AppState;

fn test_config() -> Config {
    Config {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        platform: PlatformMode::Memory,
        redis_url: "redis://127.0.0.1:6379".to_string(),
        submissions_dir: std::env::temp_dir().join(format!("intake-{}", uuid::Uuid::new_v4())),
        public_dir: std::env::temp_dir(),
        record_poll_interval: Duration::from_millis(50),
        assignment_duration_mins: 120,
        max_submission_bytes: 10 * 1024 * 1024,
    }
}

async fn app() -> (Router, AppState) {
    let state = AppState::new(&test_config()).await.unwrap();
    // tower_governor's PeerIpKeyExtractor reads a real `ConnectInfo`
    // extension, which `MockConnectInfo` does not provide.
    let router = routes::router(state.clone()).layer(Extension(ConnectInfo(SocketAddr::from((
        [127, 0, 0, 1],
        1337,
    )))));
    (router, state)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn get_session(router: &Router) -> Value {
    let (status, body) = send(
        router,
        Request::builder()
            .uri("/api/session")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

async fn post_json(router: &Router, uri: &str, payload: Value) -> (StatusCode, Value) {
    send(
        router,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap(),
    )
    .await
}

async fn wait_for_phase(router: &Router, phase: &str) -> Value {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let body = get_session(router).await;
            if body["phase"] == phase {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for phase {}", phase))
}

fn multipart_submission(bytes: &str) -> Request<Body> {
    let boundary = "intake-test-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"archive.zip\"\r\n\
         Content-Type: application/zip\r\n\r\n{bytes}\r\n--{b}--\r\n",
        b = boundary,
        bytes = bytes
    );
    Request::builder()
        .method("POST")
        .uri("/api/session/submit")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn fresh_session_reads_logged_out() {
    let (router, _state) = app().await;

    let body = get_session(&router).await;
    assert_eq!(body["phase"], "logged_out");
    assert_eq!(body["identity"], Value::Null);
    assert_eq!(body["started_at"], Value::Null);
    assert_eq!(body["deadline"], Value::Null);
    assert_eq!(body["logging_in"], false);
    assert_eq!(body["submitting"], false);
}

#[tokio::test]
async fn full_assignment_flow_over_http() {
    let (router, state) = app().await;

    // The start request suspends until the external flow posts back.
    let start_router = router.clone();
    let start = tokio::spawn(async move {
        send(
            &start_router,
            Request::builder()
                .method("POST")
                .uri("/api/auth/start")
                .body(Body::empty())
                .unwrap(),
        )
        .await
    });
    let identity = state.identity.clone();
    tokio::time::timeout(Duration::from_secs(2), async move {
        while !identity.has_pending_sign_in() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("sign-in attempt never registered");

    let (status, _) = post_json(
        &router,
        "/api/auth/callback",
        json!({
            "outcome": "signed_in",
            "uid": "u1",
            "display_name": "Ada Lovelace",
            "email": "ada@example.com"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = start.await.unwrap();
    assert_eq!(status, StatusCode::OK);

    let body = wait_for_phase(&router, "in_progress").await;
    assert_eq!(body["identity"]["uid"], "u1");
    assert_eq!(body["finished_at"], Value::Null);

    // The deadline is the configured window past started_at.
    let started: chrono::DateTime<chrono::Utc> =
        body["started_at"].as_str().unwrap().parse().unwrap();
    let deadline: chrono::DateTime<chrono::Utc> =
        body["deadline"].as_str().unwrap().parse().unwrap();
    assert_eq!(deadline - started, chrono::Duration::minutes(120));

    let (status, _) = send(&router, multipart_submission("PK fake zip bytes")).await;
    assert_eq!(status, StatusCode::OK);
    wait_for_phase(&router, "finished").await;

    let (status, body) = post_json(&router, "/api/auth/logout", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    wait_for_phase(&router, "logged_out").await;
}

#[tokio::test]
async fn callback_with_empty_uid_is_rejected() {
    let (router, state) = app().await;

    let (status, body) = post_json(
        &router,
        "/api/auth/callback",
        json!({ "outcome": "signed_in", "uid": "  " }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "uid cannot be empty");
    assert!(state.identity.current().is_none());
}

#[tokio::test]
async fn callback_with_path_traversal_uid_is_rejected() {
    let (router, state) = app().await;

    // A uid keys filesystem paths, so nothing that can navigate out of
    // them may get through.
    for uid in ["../../tmp/escape", "a/b", "a\\b", ".."] {
        let (status, body) = post_json(
            &router,
            "/api/auth/callback",
            json!({ "outcome": "signed_in", "uid": uid }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "uid {:?} got through", uid);
        assert_eq!(body["error"], "uid cannot contain path separators");
    }
    assert!(state.identity.current().is_none());
}

#[tokio::test]
async fn callback_with_padded_uid_is_rejected() {
    let (router, state) = app().await;

    // " u1" must not become a candidate distinct from "u1".
    let (status, body) = post_json(
        &router,
        "/api/auth/callback",
        json!({ "outcome": "signed_in", "uid": " u1" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "uid cannot contain surrounding whitespace");
    assert!(state.identity.current().is_none());
}

#[tokio::test]
async fn cancelled_callback_without_pending_sign_in_changes_nothing() {
    let (router, state) = app().await;

    let (status, _) = post_json(&router, "/api/auth/callback", json!({ "outcome": "cancelled" })).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(state.identity.current().is_none());

    let body = get_session(&router).await;
    assert_eq!(body["phase"], "logged_out");
}

#[tokio::test]
async fn restored_session_appears_in_the_snapshot() {
    let (router, _state) = app().await;

    // The provider can push an identity with no sign-in pending.
    let (status, _) = post_json(
        &router,
        "/api/auth/callback",
        json!({ "outcome": "signed_in", "uid": "u9" }),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let body = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let body = get_session(&router).await;
            if body["identity"]["uid"] == "u9" {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("identity never reached the snapshot");

    // No record was ever created, so the phase stays logged out.
    assert_eq!(body["phase"], "logged_out");
}

#[tokio::test]
async fn submit_without_a_file_field_is_a_noop() {
    let (router, state) = app().await;

    let boundary = "intake-test-boundary";
    let body = format!("--{b}--\r\n", b = boundary);
    let request = Request::builder()
        .method("POST")
        .uri("/api/session/submit")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "logged_out");
    assert_eq!(body["submitting"], false);
    assert!(state.identity.current().is_none());
}

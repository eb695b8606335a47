//! Purge-on-publish against a mocked Fastly API, through the publish webhook.

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header::AUTHORIZATION},
};
use cachepilot::{
    application::purge::{
        CdnPurger, PublishOutcome, PurgeError, PurgeOnPublish, build_purge_request,
    },
    config::{FastlySettings, PurgeMode},
    domain::purge::{ContentPublished, PublishedContentRef},
    infra::{
        fastly::{self, FastlyClient},
        http::{CONTENT_PUBLISHED_PATH, HookState, build_router},
    },
};
use httpmock::MockServer;
use reqwest::Url;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

fn fastly(server: &MockServer) -> FastlyClient {
    let base = Url::parse(&format!("{}/", server.base_url())).expect("mock base url");
    FastlyClient::new(base, "test-key").expect("fastly client")
}

fn settings(server: &MockServer, purge_all_on_publish: bool) -> FastlySettings {
    FastlySettings {
        api_base: Url::parse(&format!("{}/", server.base_url())).expect("mock base url"),
        service_id: Some("abc123".to_string()),
        api_key: Some("test-key".to_string()),
        purge_all_on_publish,
        ..Default::default()
    }
}

fn unreachable_fastly() -> FastlyClient {
    let base = Url::parse("http://127.0.0.1:1/").expect("unreachable base url");
    FastlyClient::new(base, "test-key").expect("fastly client")
}

fn router(purge: PurgeOnPublish, token: Option<&str>) -> Router {
    build_router(HookState::new(purge, token.map(str::to_string)))
}

async fn publish(app: Router, body: &str, token: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(CONTENT_PUBLISHED_PATH)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = builder
        .body(Body::from(body.to_string()))
        .expect("request should build");

    let response = app.oneshot(request).await.expect("router should respond");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body should collect");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, json)
}

#[tokio::test]
async fn purge_all_posts_once_with_key_and_empty_body() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST")
            .path("/service/abc123/purge_all")
            .header("fastly-key", "test-key")
            .header("accept", "application/json")
            .body("");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"status":"ok"}"#);
    });

    let receipt = fastly(&server)
        .purge_all(&build_purge_request("abc123"))
        .await
        .expect("purge accepted");

    assert_eq!(receipt.status, 200);
    mock.assert();
}

#[tokio::test]
async fn rejected_purge_reports_status() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST").path("/service/abc123/purge_all");
        then.status(401).body(r#"{"msg":"Provided credentials are missing or invalid"}"#);
    });

    let err = fastly(&server)
        .purge_all(&build_purge_request("abc123"))
        .await
        .expect_err("purge rejected");

    assert!(matches!(err, PurgeError::Rejected { status: 401, .. }));
    mock.assert();
}

#[tokio::test]
async fn unreachable_api_is_a_transport_error() {
    let err = unreachable_fastly()
        .purge_all(&build_purge_request("abc123"))
        .await
        .expect_err("connection refused");
    assert!(matches!(err, PurgeError::Transport(_)));
}

#[tokio::test]
async fn publish_hook_purges_through_fastly() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST")
            .path("/service/abc123/purge_all")
            .header("fastly-key", "test-key");
        then.status(200).body(r#"{"status":"ok"}"#);
    });

    let purge = PurgeOnPublish::new(Arc::new(fastly(&server)), "abc123", PurgeMode::Await);
    let event = serde_json::to_string(&ContentPublished {
        items: vec![PublishedContentRef {
            id: Uuid::new_v4(),
            name: "home".to_string(),
        }],
    })
    .expect("event json");

    let (status, body) = publish(router(purge, None), &event, None).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["purge"], "purged");
    mock.assert();
}

#[tokio::test]
async fn network_failure_does_not_fail_publish() {
    let purge = PurgeOnPublish::new(Arc::new(unreachable_fastly()), "abc123", PurgeMode::Await);

    let (status, body) = publish(router(purge, None), "{}", None).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["purge"], "failed");
}

#[tokio::test]
async fn rejected_purge_does_not_fail_publish() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST").path("/service/abc123/purge_all");
        then.status(503);
    });

    let purge = PurgeOnPublish::new(Arc::new(fastly(&server)), "abc123", PurgeMode::Await);
    let (status, body) = publish(router(purge, None), "", None).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["purge"], "failed");
    mock.assert();
}

#[tokio::test]
async fn disabled_purge_never_calls_fastly() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST");
        then.status(200);
    });

    let (status, body) = publish(router(PurgeOnPublish::disabled(), None), "{}", None).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["purge"], "skipped");
    mock.assert_calls(0);
}

#[tokio::test]
async fn purge_flag_off_never_calls_fastly_despite_credentials() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST");
        then.status(200);
    });

    let purge = fastly::purge_on_publish(&settings(&server, false)).expect("listener");
    assert!(!purge.is_enabled());

    let (status, body) = publish(router(purge, None), "{}", None).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["purge"], "skipped");
    mock.assert_calls(0);
}

#[tokio::test]
async fn purge_flag_without_api_key_never_calls_fastly() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST");
        then.status(200);
    });

    let purge = fastly::purge_on_publish(&FastlySettings {
        api_key: None,
        ..settings(&server, true)
    })
    .expect("listener");
    assert!(!purge.is_enabled());

    let (_, body) = publish(router(purge, None), "{}", None).await;

    assert_eq!(body["purge"], "skipped");
    mock.assert_calls(0);
}

#[tokio::test]
async fn configured_purge_calls_fastly_once() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST")
            .path("/service/abc123/purge_all")
            .header("fastly-key", "test-key");
        then.status(200);
    });

    let purge = fastly::purge_on_publish(&settings(&server, true)).expect("listener");
    assert!(purge.is_enabled());

    let (_, body) = publish(router(purge, None), "{}", None).await;

    assert_eq!(body["purge"], "purged");
    mock.assert_calls(1);
}

#[tokio::test]
async fn detached_purge_returns_immediately() {
    let purge = PurgeOnPublish::new(Arc::new(unreachable_fastly()), "abc123", PurgeMode::Detached);

    let (status, body) = publish(router(purge.clone(), None), "{}", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["purge"], "dispatched");

    let outcome = purge.content_published(&ContentPublished::default()).await;
    assert_eq!(outcome, PublishOutcome::Dispatched);
}

#[tokio::test]
async fn hook_token_is_enforced() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST").path("/service/abc123/purge_all");
        then.status(200);
    });
    let purge = PurgeOnPublish::new(Arc::new(fastly(&server)), "abc123", PurgeMode::Await);

    let (missing, _) = publish(router(purge.clone(), Some("s3cret")), "{}", None).await;
    let (wrong, _) = publish(router(purge.clone(), Some("s3cret")), "{}", Some("guess")).await;
    assert_eq!(missing, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong, StatusCode::UNAUTHORIZED);
    mock.assert_calls(0);

    let (accepted, body) = publish(router(purge, Some("s3cret")), "{}", Some("s3cret")).await;
    assert_eq!(accepted, StatusCode::ACCEPTED);
    assert_eq!(body["purge"], "purged");
    mock.assert_calls(1);
}

#[tokio::test]
async fn malformed_event_is_rejected_without_purge() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST");
        then.status(200);
    });
    let purge = PurgeOnPublish::new(Arc::new(fastly(&server)), "abc123", PurgeMode::Await);

    let (status, body) = publish(router(purge, None), "{not json", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some_and(|msg| msg.contains("invalid publish event")));
    mock.assert_calls(0);
}

#[tokio::test]
async fn health_reports_no_content() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("request should build");
    let response = router(PurgeOnPublish::disabled(), None)
        .oneshot(request)
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

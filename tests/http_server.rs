//! HTTP host tests driving the router without a listener.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use conflict_retry::pipeline::{application_fn, Application};
use conflict_retry::resilience::{RetryableKinds, ReadConflict};
use conflict_retry::store::{CounterApp, VersionedStore};
use conflict_retry::{HttpServer, Retry, RetryPolicy, ServiceConfig};

mod common;

fn router(app: Arc<dyn Application>, config: ServiceConfig) -> Router {
    HttpServer::new(config, app, RetryableKinds::default()).router()
}

fn counter_router(tries: u32, contention_delay: Duration) -> (Router, VersionedStore) {
    let store = VersionedStore::new(contention_delay);
    let app = Retry::new(
        CounterApp::new(store.clone()),
        RetryPolicy::new(tries, RetryableKinds::default()),
    );
    (router(Arc::new(app), ServiceConfig::default()), store)
}

fn post(uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_post_increments_counter() {
    let (router, store) = counter_router(3, Duration::ZERO);

    let response = router
        .oneshot(post("/counters/hits", r#"{"delta": 2}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/json"
    );
    let body = json_body(response).await;
    assert_eq!(body["value"], 2);
    assert_eq!(store.read("hits").value, 2);
}

#[tokio::test]
async fn test_request_id_is_generated_and_propagated() {
    let (router, _) = counter_router(3, Duration::ZERO);

    let generated = router
        .clone()
        .oneshot(Request::get("/counters").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let id = generated.headers().get("x-request-id").unwrap();
    assert!(uuid::Uuid::parse_str(id.to_str().unwrap()).is_ok());

    let echoed = router
        .oneshot(
            Request::get("/counters")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(echoed.headers().get("x-request-id").unwrap(), "req-42");
}

#[tokio::test]
async fn test_exhausted_conflicts_map_to_409() {
    let app = Retry::new(
        application_fn(|_, _| Err(common::conflict())),
        RetryPolicy::new(3, RetryableKinds::default()),
    );
    let router = router(Arc::new(app), ServiceConfig::default());

    let response = router.oneshot(post("/anything", "{}")).await.unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_other_errors_map_to_500() {
    let app = application_fn(|_, _| Err(ReadConflict::new("a").into()));
    let router = router(Arc::new(app), ServiceConfig::default());

    let response = router.oneshot(post("/anything", "{}")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (router, _) = counter_router(3, Duration::ZERO);

    let response = router
        .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let mut config = ServiceConfig::default();
    config.listener.max_body_size = 16;
    let store = VersionedStore::default();
    let router = router(Arc::new(CounterApp::new(store.clone())), config);

    let response = router
        .oneshot(post("/counters/hits", r#"{"delta": 1, "padding": "xxxxxxxxxxxxxxxx"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(store.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_increments_each_apply_once() {
    let (router, store) = counter_router(50, Duration::from_millis(5));

    let requests = (0..8).map(|_| {
        let router = router.clone();
        tokio::spawn(async move { router.oneshot(post("/counters/shared", "")).await.unwrap() })
    });
    let responses = futures_util::future::join_all(requests).await;

    for response in responses {
        assert_eq!(response.unwrap().status(), StatusCode::OK);
    }
    let counter = store.read("shared");
    assert_eq!(counter.value, 8);
    assert_eq!(counter.version, 8);
}

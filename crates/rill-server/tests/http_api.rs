//! Integration tests for the HTTP surface, driven through the router
//! over in-memory adapters and scripted consumers.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use rill_core::blacklist::InMemoryBlacklist;
use rill_core::features::{Feature, InMemoryFeatureGates};
use rill_core::registry::EventType;
use rill_core::stream::StreamMetrics;
use rill_core::subscription::stats::NoConsumerState;
use rill_core::subscription::{InMemorySubscriptionStore, SubscriptionService};
use rill_core::testing::{
    ScriptedConsumerFactory, StaticApplications, StaticEventTypes, Tick,
};
use rill_server::{build_router, AppState};

struct TestApp {
    router: Router,
    gates: Arc<InMemoryFeatureGates>,
}

fn test_app(consumer_factory: ScriptedConsumerFactory) -> TestApp {
    let event_types = Arc::new(
        StaticEventTypes::new()
            .with(EventType::new("orders", vec!["0".into()]))
            .with(EventType::new("x", vec!["0".into()])),
    );
    let gates = Arc::new(InMemoryFeatureGates::new());
    let subscriptions = SubscriptionService::new(
        Arc::new(InMemorySubscriptionStore::new()),
        event_types.clone(),
        Arc::new(StaticApplications::new()),
        Arc::new(NoConsumerState),
        gates.clone(),
    );
    let state = AppState {
        subscriptions,
        event_types,
        consumer_factory: Arc::new(consumer_factory),
        blacklist: Arc::new(InMemoryBlacklist::new()),
        gates: gates.clone(),
        stream_metrics: Arc::new(StreamMetrics::new()),
    };
    TestApp {
        router: build_router(state),
        gates,
    }
}

fn post_subscription(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/subscriptions")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

const ORDERS_SUBSCRIPTION: &str =
    r#"{"owning_application":"app","event_types":["orders"]}"#;

#[tokio::test]
async fn test_create_then_idempotent_collision() {
    let app = test_app(ScriptedConsumerFactory::empty());

    let first = app
        .router
        .clone()
        .oneshot(post_subscription(ORDERS_SUBSCRIPTION))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    let location = first
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(
        first
            .headers()
            .get(header::CONTENT_LOCATION)
            .unwrap()
            .to_str()
            .unwrap(),
        location
    );
    let created = body_json(first).await;
    assert_eq!(location, format!("/subscriptions/{}", created["id"].as_str().unwrap()));

    let second = app
        .router
        .clone()
        .oneshot(post_subscription(ORDERS_SUBSCRIPTION))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(
        second
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap(),
        location
    );
    let existing = body_json(second).await;
    assert_eq!(existing["id"], created["id"]);
}

#[tokio::test]
async fn test_create_with_missing_event_types() {
    let app = test_app(ScriptedConsumerFactory::empty());

    let response = app
        .router
        .oneshot(post_subscription(
            r#"{"owning_application":"app","event_types":["x","y"]}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let problem = body_json(response).await;
    let detail = problem["detail"].as_str().unwrap();
    assert!(detail.contains("'y'"), "detail was: {detail}");
    assert!(!detail.contains("'x'"), "detail was: {detail}");
}

#[tokio::test]
async fn test_list_parameter_validation() {
    let app = test_app(ScriptedConsumerFactory::empty());

    let response = app
        .router
        .clone()
        .oneshot(get("/subscriptions?limit=0"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let problem = body_json(response).await;
    assert_eq!(
        problem["detail"],
        "'limit' parameter should have value from 1 to 1000"
    );

    let response = app
        .router
        .oneshot(get("/subscriptions?offset=-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let problem = body_json(response).await;
    assert_eq!(problem["detail"], "'offset' parameter can't be lower than 0");
}

#[tokio::test]
async fn test_list_returns_items_and_links() {
    let app = test_app(ScriptedConsumerFactory::empty());
    app.router
        .clone()
        .oneshot(post_subscription(ORDERS_SUBSCRIPTION))
        .await
        .unwrap();

    let response = app
        .router
        .oneshot(get("/subscriptions?limit=1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let list = body_json(response).await;
    assert_eq!(list["items"].as_array().unwrap().len(), 1);
    assert_eq!(
        list["_links"]["next"]["href"],
        "/subscriptions?offset=1&limit=1"
    );
}

#[tokio::test]
async fn test_get_subscription_and_unknown_id() {
    let app = test_app(ScriptedConsumerFactory::empty());
    let created = body_json(
        app.router
            .clone()
            .oneshot(post_subscription(ORDERS_SUBSCRIPTION))
            .await
            .unwrap(),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .router
        .clone()
        .oneshot(get(&format!("/subscriptions/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = body_json(response).await;
    assert_eq!(fetched["id"], created["id"]);

    let response = app
        .router
        .oneshot(get("/subscriptions/unknown"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stats_endpoint() {
    let app = test_app(ScriptedConsumerFactory::empty());
    let created = body_json(
        app.router
            .clone()
            .oneshot(post_subscription(ORDERS_SUBSCRIPTION))
            .await
            .unwrap(),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .router
        .clone()
        .oneshot(get(&format!("/subscriptions/{id}/stats")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stats = body_json(response).await;
    assert_eq!(stats["items"][0]["event_type"], "orders");
    assert_eq!(stats["items"][0]["partitions"][0]["state"], "unassigned");

    let response = app
        .router
        .oneshot(get("/subscriptions/unknown/stats"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_high_level_api_gate_returns_501() {
    let app = test_app(ScriptedConsumerFactory::empty());
    app.gates.disable(Feature::HighLevelApi);

    let response = app
        .router
        .clone()
        .oneshot(post_subscription(ORDERS_SUBSCRIPTION))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);

    let response = app.router.clone().oneshot(get("/subscriptions")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);

    let response = app
        .router
        .oneshot(get("/subscriptions/some-id"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_stream_single_batch() {
    let factory = ScriptedConsumerFactory::with_scripts(vec![vec![
        Tick::event("orders", "0", "001", r#"{"a":1}"#),
        Tick::event("orders", "0", "002", r#"{"a":2}"#),
        Tick::event("orders", "0", "003", r#"{"a":3}"#),
    ]]);
    let app = test_app(factory);

    let response = app
        .router
        .oneshot(get(
            "/event-types/orders/events?batch_limit=3&stream_limit=3",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/x-json-stream"
    );

    let body = body_text(response).await;
    assert_eq!(
        body,
        "{\"cursor\":{\"partition\":\"0\",\"offset\":\"003\"},\"events\":[{\"a\":1},{\"a\":2},{\"a\":3}]}\n"
    );
}

#[tokio::test]
async fn test_stream_keep_alive_then_close() {
    let app = test_app(ScriptedConsumerFactory::empty());

    let response = app
        .router
        .oneshot(get(
            "/event-types/orders/events?batch_flush_timeout=1&stream_keep_alive_limit=2",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await;
    assert_eq!(
        body,
        "{\"cursor\":{\"partition\":\"0\",\"offset\":\"begin\"}}\n\
         {\"cursor\":{\"partition\":\"0\",\"offset\":\"begin\"}}\n"
    );
}

#[tokio::test]
async fn test_stream_unknown_event_type() {
    let app = test_app(ScriptedConsumerFactory::empty());
    let response = app
        .router
        .oneshot(get("/event-types/nope/events"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stream_rejects_bad_cursors_header() {
    let app = test_app(ScriptedConsumerFactory::empty());
    let request = Request::builder()
        .uri("/event-types/orders/events")
        .header("x-rill-cursors", "not json")
        .body(Body::empty())
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stream_rejects_zero_batch_timeout() {
    let app = test_app(ScriptedConsumerFactory::empty());
    let response = app
        .router
        .oneshot(get("/event-types/orders/events?batch_flush_timeout=0"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_scope_denied_subscription() {
    let event_types = Arc::new(StaticEventTypes::new().with(
        EventType::new("secure", vec!["0".into()]).with_read_scopes(["secure.read"]),
    ));
    let gates = Arc::new(InMemoryFeatureGates::new());
    let subscriptions = SubscriptionService::new(
        Arc::new(InMemorySubscriptionStore::new()),
        event_types.clone(),
        Arc::new(StaticApplications::new()),
        Arc::new(NoConsumerState),
        gates.clone(),
    );
    let state = AppState {
        subscriptions,
        event_types,
        consumer_factory: Arc::new(ScriptedConsumerFactory::empty()),
        blacklist: Arc::new(InMemoryBlacklist::new()),
        gates,
        stream_metrics: Arc::new(StreamMetrics::new()),
    };
    let router = build_router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/subscriptions")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-rill-client", "app")
        .header("x-rill-scopes", "other.read")
        .body(Body::from(
            r#"{"owning_application":"app","event_types":["secure"]}"#,
        ))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

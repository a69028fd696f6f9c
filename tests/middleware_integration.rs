//! Middleware integration tests
//!
//! These tests drive the tracker through both the tower layer and the axum
//! `from_fn` middleware, checking the recorded points and that the next
//! service always runs exactly once with the original request.

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, Response, StatusCode},
    middleware,
    routing::get,
    Router,
};
use sha2::{Digest, Sha256};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::{service_fn, Layer, ServiceExt};
use visitor_tracker::influx::{FieldValue, MetricsWriter, Point};
use visitor_tracker::{track_visitor, TrackerConfig, TrackerError, VisitorTracker, VisitorTrackerLayer};

#[derive(Default)]
struct CollectingWriter {
    points: Mutex<Vec<Point>>,
}

#[async_trait]
impl MetricsWriter for CollectingWriter {
    fn write_point(&self, point: Point) {
        self.points.lock().unwrap().push(point);
    }

    async fn close(&self) {}
}

impl CollectingWriter {
    fn points(&self) -> Vec<Point> {
        self.points.lock().unwrap().clone()
    }
}

/// Writer whose submission path blows up
struct PanickingWriter;

#[async_trait]
impl MetricsWriter for PanickingWriter {
    fn write_point(&self, _point: Point) {
        panic!("backend client exploded");
    }

    async fn close(&self) {}
}

fn sha256_hex(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

fn tracker_with(writer: Arc<dyn MetricsWriter>, salt: &str) -> Arc<VisitorTracker> {
    let config = TrackerConfig::new("token", "acme").with_salt(salt);
    Arc::new(VisitorTracker::new(&config, writer).unwrap())
}

/// Next handler that counts its invocations and echoes what it saw
fn counting_handler(
    calls: Arc<AtomicUsize>,
) -> impl tower::Service<
    Request<Body>,
    Response = Response<Body>,
    Error = Infallible,
    Future = impl Future<Output = Result<Response<Body>, Infallible>> + Send,
> + Clone
+ Send {
    service_fn(move |request: Request<Body>| {
        let calls = Arc::clone(&calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            let seen = format!(
                "{} {}",
                request.uri(),
                request
                    .headers()
                    .get("x-forwarded-for")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-")
            );
            Ok::<_, Infallible>(Response::new(Body::from(seen)))
        }
    })
}

#[tokio::test]
async fn test_end_to_end_visit_is_recorded_and_forwarded() {
    let writer = Arc::new(CollectingWriter::default());
    let tracker = tracker_with(writer.clone(), "s1");
    let calls = Arc::new(AtomicUsize::new(0));

    let service = VisitorTrackerLayer::new(tracker).layer(counting_handler(calls.clone()));

    let request = Request::builder()
        .uri("/foo")
        .header("host", "example.com")
        .header("x-forwarded-for", "203.0.113.5")
        .header("user-agent", "test-agent")
        .body(Body::empty())
        .unwrap();

    let before = chrono::Utc::now();
    let response = service.oneshot(request).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"/foo 203.0.113.5");

    let points = writer.points();
    assert_eq!(points.len(), 1);
    let point = &points[0];
    assert_eq!(point.measurement(), "visitor_tracking");
    assert_eq!(point.tags()["domain"], "example.com");
    assert_eq!(point.tags()["path"], "/foo");
    assert_eq!(point.tags()["user_agent"], "test-agent");
    assert_eq!(point.tags()["ip_hash"], sha256_hex("203.0.113.5s1"));
    assert_eq!(point.fields()["visit_count"], FieldValue::Integer(1));
    assert!(point.timestamp() >= before);
    assert!((point.timestamp() - before).num_seconds() < 5);
}

#[tokio::test]
async fn test_remote_addr_with_port_is_hashed_as_is() {
    let writer = Arc::new(CollectingWriter::default());
    let tracker = tracker_with(writer.clone(), "s1");
    let calls = Arc::new(AtomicUsize::new(0));

    let service = VisitorTrackerLayer::new(tracker).layer(counting_handler(calls.clone()));

    let mut request = Request::builder()
        .uri("/")
        .header("host", "example.com")
        .body(Body::empty())
        .unwrap();
    let addr: SocketAddr = "10.0.0.9:54321".parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));

    service.oneshot(request).await.unwrap();

    let points = writer.points();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].tags()["ip_hash"], sha256_hex("10.0.0.9:54321s1"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_writer_panic_does_not_block_forwarding() {
    let tracker = tracker_with(Arc::new(PanickingWriter), "s1");
    let calls = Arc::new(AtomicUsize::new(0));

    let service = VisitorTrackerLayer::new(tracker).layer(counting_handler(calls.clone()));

    let request = Request::builder()
        .uri("/still-served")
        .header("x-forwarded-for", "203.0.113.5")
        .body(Body::empty())
        .unwrap();

    let response = service.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_axum_from_fn_middleware_records_each_request() {
    let writer = Arc::new(CollectingWriter::default());
    let tracker = tracker_with(writer.clone(), "s1");

    let app = Router::new()
        .route("/a", get(|| async { "a" }))
        .fallback(|| async { StatusCode::NOT_FOUND })
        .layer(middleware::from_fn_with_state(tracker, track_visitor));

    for (path, ua) in [("/a", "agent-1"), ("/missing", "agent-2")] {
        let request = Request::builder()
            .uri(path)
            .header("host", "example.com")
            .header("x-real-ip", "198.51.100.7")
            .header("user-agent", ua)
            .body(Body::empty())
            .unwrap();
        app.clone().oneshot(request).await.unwrap();
    }

    let points = writer.points();
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].tags()["path"], "/a");
    assert_eq!(points[1].tags()["path"], "/missing");
    assert_eq!(points[1].tags()["user_agent"], "agent-2");
    // Same address and salt, same visitor
    assert_eq!(points[0].tags()["ip_hash"], points[1].tags()["ip_hash"]);
    assert_eq!(points[0].tags()["ip_hash"], sha256_hex("198.51.100.7s1"));
}

#[tokio::test]
async fn test_router_layer_passes_responses_through() {
    let writer = Arc::new(CollectingWriter::default());
    let tracker = tracker_with(writer.clone(), "s1");

    let app = Router::new()
        .route("/teapot", get(|| async { (StatusCode::IM_A_TEAPOT, "short and stout") }))
        .layer(VisitorTrackerLayer::new(tracker));

    let request = Request::builder()
        .uri("/teapot")
        .header("cf-connecting-ip", "192.0.2.1")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"short and stout");
    assert_eq!(writer.points()[0].tags()["ip_hash"], sha256_hex("192.0.2.1s1"));
}

#[tokio::test]
async fn test_concurrent_requests_are_tracked_independently() {
    let writer = Arc::new(CollectingWriter::default());
    let tracker = tracker_with(writer.clone(), "s1");
    let calls = Arc::new(AtomicUsize::new(0));

    let service = VisitorTrackerLayer::new(tracker).layer(counting_handler(calls.clone()));

    let mut handles = Vec::new();
    for i in 0..50 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            let request = Request::builder()
                .uri(format!("/page/{}", i))
                .header("x-forwarded-for", format!("203.0.113.{}", i))
                .body(Body::empty())
                .unwrap();
            service.oneshot(request).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 50);
    let points = writer.points();
    assert_eq!(points.len(), 50);

    let mut hashes: Vec<_> = points.iter().map(|p| p.tags()["ip_hash"].clone()).collect();
    hashes.sort();
    hashes.dedup();
    assert_eq!(hashes.len(), 50);
}

#[test]
fn test_construction_requires_token_and_org() {
    let writer: Arc<dyn MetricsWriter> = Arc::new(CollectingWriter::default());

    let missing_token = TrackerConfig::new("", "acme");
    assert!(matches!(
        VisitorTracker::new(&missing_token, writer.clone()),
        Err(TrackerError::MissingToken)
    ));

    let missing_org = TrackerConfig::new("token", "");
    assert!(matches!(
        VisitorTracker::new(&missing_org, writer.clone()),
        Err(TrackerError::MissingOrg)
    ));

    let minimal = TrackerConfig::new("token", "acme");
    assert!(VisitorTracker::new(&minimal, writer).is_ok());
}

#[test]
fn test_connect_fails_before_spawning_when_credentials_missing() {
    // No runtime here: validation must reject before the writer task spawns
    let config = TrackerConfig::new("", "");
    assert!(matches!(
        VisitorTracker::connect(&config, &Default::default()),
        Err(TrackerError::MissingToken)
    ));
}

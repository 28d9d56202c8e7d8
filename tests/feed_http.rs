// tests/feed_http.rs
//
// HTTP adapters against a local axum stub bound to an ephemeral port.
//
// Covered:
// - EonetFeed::http: success, non-2xx status, undecodable body
// - HttpHandoff: accepted post carries both product files, rejection surfaces

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use reqwest::Url;
use serde_json::Value;

use eonet_ingest::config::HandoffSettings;
use eonet_ingest::error::{FetchError, HandoffError};
use eonet_ingest::feed::{EonetFeed, EventFeed, FeedQuery};
use eonet_ingest::handoff::{Handoff, HandoffRequest, HttpHandoff};
use eonet_ingest::product::write_product_dir;
use eonet_ingest::{build_product, Event};

const FIXTURE: &str = include_str!("fixtures/eonet_events.json");
const TEST_EVENT: &str = include_str!("../src/test_event.json");

#[derive(Clone, Default)]
struct Seen {
    queries: Arc<Mutex<Vec<Option<String>>>>,
    posts: Arc<Mutex<Vec<Value>>>,
}

async fn events(State(seen): State<Seen>, RawQuery(q): RawQuery) -> (StatusCode, String) {
    seen.queries.lock().unwrap().push(q);
    (StatusCode::OK, FIXTURE.to_string())
}

async fn ingest(State(seen): State<Seen>, Json(body): Json<Value>) -> StatusCode {
    seen.posts.lock().unwrap().push(body);
    StatusCode::OK
}

/// Start the stub; returns its base URL and the request log.
async fn spawn_stub() -> (String, Seen) {
    let seen = Seen::default();
    let app = Router::new()
        .route("/ok/events", get(events))
        .route(
            "/down/events",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route("/garbled/events", get(|| async { "<html>not json</html>" }))
        .route("/ingest", post(ingest))
        .route(
            "/ingest-full",
            post(|| async { (StatusCode::UNPROCESSABLE_ENTITY, "dataset exists\n") }),
        )
        .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), seen)
}

fn feed() -> EonetFeed {
    EonetFeed::http(Duration::from_secs(5)).unwrap()
}

fn events_url(base: &str, prefix: &str) -> Url {
    FeedQuery {
        days: Some(2),
        ..FeedQuery::default()
    }
    .url(&format!("{base}/{prefix}"))
    .unwrap()
}

#[tokio::test]
async fn http_feed_decodes_the_response() {
    let (base, seen) = spawn_stub().await;
    let resp = feed().fetch(&events_url(&base, "ok")).await.unwrap();

    assert_eq!(resp.events.len(), 4);
    assert_eq!(resp.events[0].id, "EONET_5001");
    assert_eq!(resp.extra["title"], "EONET Events");
    assert_eq!(
        seen.queries.lock().unwrap().as_slice(),
        &[Some("limit=10000&days=2".to_string())]
    );
}

#[tokio::test]
async fn non_success_status_is_a_fetch_error() {
    let (base, _) = spawn_stub().await;
    let err = feed().fetch(&events_url(&base, "down")).await.unwrap_err();
    match err {
        FetchError::Status { status, url } => {
            assert_eq!(status, reqwest::StatusCode::INTERNAL_SERVER_ERROR);
            assert!(url.ends_with("/down/events?limit=10000&days=2"), "{url}");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn garbled_body_is_a_decode_error() {
    let (base, _) = spawn_stub().await;
    let err = feed().fetch(&events_url(&base, "garbled")).await.unwrap_err();
    assert!(matches!(err, FetchError::Decode { .. }), "got {err:?}");
}

#[tokio::test]
async fn unreachable_feed_is_a_transport_error() {
    // bind then drop, so nothing listens on the port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = Url::parse(&format!("http://{addr}/events")).unwrap();
    let err = feed().fetch(&url).await.unwrap_err();
    assert!(matches!(err, FetchError::Transport { .. }), "got {err:?}");
}

async fn written_product(work: &std::path::Path) -> (String, std::path::PathBuf) {
    let event: Event = serde_json::from_str(TEST_EVENT).unwrap();
    let product = build_product(&event).unwrap();
    let dir = write_product_dir(work, &product).await.unwrap();
    (product.label().to_string(), dir)
}

fn request(label: &str, dir: &std::path::Path, update_url: String) -> HandoffRequest {
    HandoffRequest {
        label: label.to_string(),
        manifest_path: "./datasets.json".into(),
        update_url,
        processed_queue: HandoffSettings::default().processed_queue,
        product_dir: dir.to_path_buf(),
        force: Some(true),
    }
}

#[tokio::test]
async fn handoff_posts_dataset_and_metadata() {
    let (base, seen) = spawn_stub().await;
    let work = tempfile::tempdir().unwrap();
    let (label, dir) = written_product(work.path()).await;

    let handoff = HttpHandoff::new(Duration::from_secs(5)).unwrap();
    handoff
        .submit(&request(&label, &dir, format!("{base}/ingest")))
        .await
        .unwrap();

    let posts = seen.posts.lock().unwrap();
    assert_eq!(posts.len(), 1);
    let body = &posts[0];
    assert_eq!(body["label"], label.as_str());
    assert_eq!(body["queue"], "dataset_processed");
    assert_eq!(body["force"], true);
    assert_eq!(body["dataset"]["label"], label.as_str());
    assert_eq!(body["dataset"]["starttime"], "2019-11-25T06:00:00Z");
    assert_eq!(body["metadata"]["id"], "EONET_4430");
}

#[tokio::test]
async fn rejected_handoff_reports_the_reason() {
    let (base, _) = spawn_stub().await;
    let work = tempfile::tempdir().unwrap();
    let (label, dir) = written_product(work.path()).await;

    let handoff = HttpHandoff::new(Duration::from_secs(5)).unwrap();
    let err = handoff
        .submit(&request(&label, &dir, format!("{base}/ingest-full")))
        .await
        .unwrap_err();
    match err {
        HandoffError::Rejected { label: l, reason } => {
            assert_eq!(l, label);
            assert!(reason.starts_with("422"), "{reason}");
            assert!(reason.ends_with("dataset exists"), "{reason}");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_product_files_fail_before_posting() {
    let (base, seen) = spawn_stub().await;
    let work = tempfile::tempdir().unwrap();

    let handoff = HttpHandoff::new(Duration::from_secs(5)).unwrap();
    let err = handoff
        .submit(&request("EVENT-NOPE", work.path(), format!("{base}/ingest")))
        .await
        .unwrap_err();
    assert!(matches!(err, HandoffError::Io { .. }), "got {err:?}");
    assert!(seen.posts.lock().unwrap().is_empty());
}

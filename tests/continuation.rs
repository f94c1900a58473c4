//! End-to-end comment chain tests against a mock upstream

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tubecache::app::{App, FollowOutcome};
use tubecache::cache::{CacheStore, CommentChunkCache, MemoryCache};
use tubecache::config::Config;
use tubecache::error::{Error, Result};
use tubecache::events::{Event, EventHandler, EventPublisher};
use tubecache::ingest::{CommentIngestor, ContinuationHandler, ResumeOutcome};
use tubecache::meta::MetaDb;
use tubecache::models::{IngestionState, VideoDetails};
use tubecache::upstream::UpstreamClient;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const VIDEO: &str = "vid123";

fn thread(id: &str) -> Value {
    json!({
        "id": id,
        "snippet": { "topLevelComment": { "snippet": { "textDisplay": format!("text {}", id) } } }
    })
}

fn page(ids: &[&str], next: Option<&str>) -> ResponseTemplate {
    let items: Vec<Value> = ids.iter().map(|id| thread(id)).collect();
    let mut body = json!({ "items": items });
    if let Some(token) = next {
        body["nextPageToken"] = json!(token);
    }
    ResponseTemplate::new(200).set_body_json(body)
}

async fn mount_page(server: &MockServer, token: Option<&str>, ids: &[&str], next: Option<&str>) {
    let mock = Mock::given(method("GET")).and(path("/commentThreads"));
    let mock = match token {
        Some(t) => mock.and(query_param("pageToken", t)),
        None => mock.and(query_param_is_missing("pageToken")),
    };
    mock.respond_with(page(ids, next))
        .expect(1)
        .mount(server)
        .await;
}

fn test_config(tmp: &TempDir, server: &MockServer) -> Config {
    let mut config = Config::for_base_dir(Some(tmp.path().to_path_buf()));
    config.upstream.base_url = server.uri();
    config.upstream.backoff_base_ms = 5;
    config.upstream.requests_per_second = 1000;
    config.upstream.comments_page_size = 2;
    config.cache.chunk_size = 2;
    config
}

async fn test_app(tmp: &TempDir, server: &MockServer) -> App {
    let config = test_config(tmp, server);
    let upstream = Arc::new(UpstreamClient::new(&config.upstream, "test-key".to_string()).unwrap());
    let app = App::with_upstream(config, upstream).await.unwrap();
    app.db
        .upsert_video(&VideoDetails {
            video_id: VIDEO.to_string(),
            title: "Video".to_string(),
            description: String::new(),
            view_count: 0,
            like_count: 0,
        })
        .await
        .unwrap();
    app
}

#[tokio::test]
async fn test_chain_walks_every_page_then_completes() {
    let server = MockServer::start().await;
    mount_page(&server, None, &["c1", "c2"], Some("A")).await;
    mount_page(&server, Some("A"), &["c3", "c4"], Some("B")).await;
    mount_page(&server, Some("B"), &["c5"], None).await;

    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp, &server).await;

    let first = app
        .service
        .fetch_video_comments(VIDEO, None, Some(2), Some(1))
        .await
        .unwrap();
    assert_eq!(first.data.len(), 2);

    let outcome = app.follow(VIDEO, false).await.unwrap();
    assert_eq!(outcome, FollowOutcome::Complete);
    assert_eq!(app.bus().failures(), 0);
    assert_eq!(app.service.stored_comment_count(VIDEO).await.unwrap(), 5);

    let last = app
        .service
        .fetch_video_comments(VIDEO, None, Some(2), Some(3))
        .await
        .unwrap();
    let ids: Vec<&str> = last.data.iter().map(|c| c.comment_id.as_str()).collect();
    assert_eq!(ids, vec!["c5"]);
    assert_eq!(last.meta.total, 5);
    assert_eq!(last.meta.total_pages, 3);

    let everything = app
        .service
        .fetch_video_comments(VIDEO, None, Some(10), Some(1))
        .await
        .unwrap();
    assert_eq!(everything.data.len(), 5);

    app.shutdown();
}

#[tokio::test]
async fn test_stalled_chain_resumes_from_recorded_token() {
    let server = MockServer::start().await;
    mount_page(&server, None, &["c1", "c2"], Some("A")).await;
    Mock::given(method("GET"))
        .and(path("/commentThreads"))
        .and(query_param("pageToken", "A"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(&server, Some("A"), &["c3"], None).await;

    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp, &server).await;

    app.service
        .fetch_video_comments(VIDEO, None, None, None)
        .await
        .unwrap();
    assert_eq!(app.follow(VIDEO, false).await.unwrap(), FollowOutcome::Stalled);
    assert_eq!(app.bus().failures(), 1);
    assert_eq!(
        app.service.ingestion_state(VIDEO).await.unwrap(),
        IngestionState::InProgress
    );

    let resumed = app.service.resume(VIDEO).await.unwrap();
    assert!(matches!(resumed, ResumeOutcome::Resumed(_)));
    assert_eq!(app.follow(VIDEO, false).await.unwrap(), FollowOutcome::Complete);
    assert_eq!(app.service.stored_comment_count(VIDEO).await.unwrap(), 3);

    let again = app.service.resume(VIDEO).await.unwrap();
    assert!(matches!(again, ResumeOutcome::AlreadyComplete));

    app.shutdown();
}

/// First page immediately, page `A` (the last one) only after a delay
async fn mount_slow_second_page(server: &MockServer) {
    mount_page(server, None, &["c1", "c2"], Some("A")).await;
    Mock::given(method("GET"))
        .and(path("/commentThreads"))
        .and(query_param("pageToken", "A"))
        .respond_with(page(&["c3", "c4"], None).set_delay(Duration::from_millis(300)))
        .expect(1)
        .mount(server)
        .await;
}

async fn assert_single_copy(app: &App) {
    let window = app
        .service
        .fetch_video_comments(VIDEO, None, Some(10), Some(1))
        .await
        .unwrap();
    let ids: Vec<&str> = window.data.iter().map(|c| c.comment_id.as_str()).collect();
    assert_eq!(ids, vec!["c1", "c2", "c3", "c4"]);
    assert_eq!(window.meta.total, 4);
}

#[tokio::test]
async fn test_resume_leaves_running_chain_alone() {
    let server = MockServer::start().await;
    mount_slow_second_page(&server).await;

    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp, &server).await;

    app.service
        .fetch_video_comments(VIDEO, None, None, None)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let outcome = app.service.resume(VIDEO).await.unwrap();
    assert!(matches!(
        outcome,
        ResumeOutcome::AlreadyRunning | ResumeOutcome::AlreadyComplete
    ));

    assert_eq!(app.follow(VIDEO, false).await.unwrap(), FollowOutcome::Complete);
    assert_single_copy(&app).await;
    app.shutdown();
}

#[tokio::test]
async fn test_explicit_token_does_not_fork_running_chain() {
    let server = MockServer::start().await;
    mount_slow_second_page(&server).await;

    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp, &server).await;

    app.service
        .fetch_video_comments(VIDEO, None, None, None)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    app.service
        .fetch_video_comments(VIDEO, Some("A"), None, None)
        .await
        .unwrap();

    assert_eq!(app.follow(VIDEO, false).await.unwrap(), FollowOutcome::Complete);
    assert_single_copy(&app).await;
    app.shutdown();
}

#[tokio::test]
async fn test_build_without_api_key_is_config_error() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(&tmp, &server);
    config.upstream.api_key = None;
    config.upstream.api_key_env = "TUBECACHE_TEST_KEY_THAT_IS_NEVER_SET".to_string();

    let err = App::build(config).await.err().unwrap();
    assert!(matches!(err, Error::Config(_)));
}

#[derive(Default)]
struct RecordingPublisher {
    events: Mutex<Vec<Event>>,
}

impl RecordingPublisher {
    fn take_last(&self) -> Event {
        self.events.lock().unwrap().pop().unwrap()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: Event) -> Result<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[tokio::test]
async fn test_status_is_complete_only_after_last_page() {
    let server = MockServer::start().await;
    mount_page(&server, None, &["c1", "c2"], Some("A")).await;
    mount_page(&server, Some("A"), &["c3", "c4"], Some("B")).await;
    mount_page(&server, Some("B"), &["c5"], None).await;

    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, &server);
    let db = MetaDb::connect(&config).await.unwrap();
    db.upsert_video(&VideoDetails {
        video_id: VIDEO.to_string(),
        title: "Video".to_string(),
        description: String::new(),
        view_count: 0,
        like_count: 0,
    })
    .await
    .unwrap();

    let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
    let upstream = Arc::new(UpstreamClient::new(&config.upstream, "test-key".to_string()).unwrap());
    let publisher = Arc::new(RecordingPublisher::default());
    let ingestor = Arc::new(CommentIngestor::new(
        db,
        CommentChunkCache::new(cache, 2),
        upstream,
        publisher.clone(),
    ));
    let handler = ContinuationHandler::new(ingestor.clone());

    let started = ingestor.start_if_idle(VIDEO).await.unwrap();
    assert!(started.is_some());

    // two continuation steps follow the first page; status stays open throughout
    for _ in 0..2 {
        assert_eq!(
            ingestor.chunks().state(VIDEO).await.unwrap(),
            IngestionState::InProgress
        );
        handler.execute(publisher.take_last().payload).await.unwrap();
    }
    assert_eq!(
        ingestor.chunks().state(VIDEO).await.unwrap(),
        IngestionState::InProgress
    );

    // the last event carries no token and closes the chain without another fetch
    let last = publisher.take_last();
    assert!(last.payload["nextPageToken"].is_null());
    handler.execute(last.payload).await.unwrap();
    assert_eq!(
        ingestor.chunks().state(VIDEO).await.unwrap(),
        IngestionState::Complete
    );
    assert!(publisher.events.lock().unwrap().is_empty());
}

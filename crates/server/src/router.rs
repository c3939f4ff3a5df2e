//! HTTP router construction.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::api;
use crate::state::AppState;

/// Build the application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>, cors_origin: &str) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/api/ingest", post(api::ingest_trigger))
        .route("/api/ingest/status", get(api::ingest_status))
        .route("/api/ingest/runs", get(api::ingest_runs))
        .route(
            "/api/articles",
            get(api::articles_list).delete(api::articles_delete_all),
        )
        .route("/api/articles/{id}", delete(api::articles_delete))
        .route("/api/categories", get(api::categories_list))
        .route("/api/chat", post(api::chat))
        .route("/api/config", get(api::config_get).post(api::config_update))
        .layer(cors_layer(cors_origin))
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let origin = origin.trim();
    if origin == "*" {
        return CorsLayer::permissive();
    }
    match HeaderValue::from_str(origin) {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(e) => {
            warn!(origin, error = %e, "invalid CORS origin, allowing any");
            CorsLayer::permissive()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use http_body_util::BodyExt;
    use intel_core::{Enrichment, RawItem, Relevance};
    use intel_ingest::{
        Analyzer, AppSettings, FetchClient, IngestError, IngestPipeline, SchedulerController,
        YamlConfigStore,
    };
    use intel_llm::{CompletionRequest, LlmError, LlmProvider};
    use intel_storage::ArticleStore;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tokio::sync::{Notify, Semaphore};
    use tower::ServiceExt;

    use super::*;

    // ── Stubs ─────────────────────────────────────────────────────

    struct Gate {
        entered: Notify,
        release: Semaphore,
    }

    impl Gate {
        fn closed() -> Self {
            Self {
                entered: Notify::new(),
                release: Semaphore::new(0),
            }
        }
    }

    #[derive(Default)]
    struct StubFetcher {
        items: Vec<RawItem>,
        fail: bool,
        gate: Option<Gate>,
        reloads: AtomicUsize,
    }

    #[async_trait]
    impl FetchClient for StubFetcher {
        async fn fetch_all(&self) -> Result<Vec<RawItem>, IngestError> {
            if let Some(gate) = &self.gate {
                gate.entered.notify_one();
                let _permit = gate
                    .release
                    .acquire()
                    .await
                    .map_err(|e| IngestError::Fetch(e.to_string()))?;
            }
            if self.fail {
                return Err(IngestError::Fetch("feed unreachable".into()));
            }
            Ok(self.items.clone())
        }

        fn reload(&self, _settings: &AppSettings) {
            self.reloads.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Even-numbered stories are high relevance, the rest low.
    #[derive(Default)]
    struct StubAnalyzer {
        reloads: AtomicUsize,
    }

    #[async_trait]
    impl Analyzer for StubAnalyzer {
        async fn analyze(&self, item: &RawItem) -> Result<Enrichment, IngestError> {
            let even = item.url.ends_with(['2', '4', '6', '8']);
            Ok(Enrichment {
                relevance: if even { Relevance::High } else { Relevance::Low },
                category: Some(if even { "policy" } else { "markets" }.into()),
                signals: vec!["export controls".into()],
                score: 0.5,
                summary: Some(format!("Analysis of {}", item.title)),
            })
        }

        fn reload(&self, _settings: &AppSettings) {
            self.reloads.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct ScriptedChat {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmProvider for ScriptedChat {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
            let prompt = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            self.prompts.lock().unwrap().push(prompt);
            Ok("Export rules tightened [1].".into())
        }
    }

    fn story(n: u32) -> RawItem {
        RawItem {
            url: format!("https://example.com/story/{n}"),
            title: format!("Chip story {n}"),
            summary: "Semiconductor export rules.".into(),
            published: Some(Utc.with_ymd_and_hms(2025, 6, n, 8, 0, 0).unwrap()),
            source: "wire".into(),
            category: "tech".into(),
        }
    }

    fn stories(count: u32) -> Vec<RawItem> {
        (1..=count).map(story).collect()
    }

    // ── Harness ───────────────────────────────────────────────────

    struct TestApp {
        router: Router,
        fetcher: Arc<StubFetcher>,
        analyzer: Arc<StubAnalyzer>,
        scheduler: Arc<SchedulerController>,
        dir: TempDir,
    }

    fn test_app_with(fetcher: StubFetcher, chat_provider: Option<Arc<dyn LlmProvider>>) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ArticleStore::open(dir.path()).unwrap());
        let config_store = Arc::new(YamlConfigStore::new(dir.path().join("config.yaml")));
        let fetcher = Arc::new(fetcher);
        let analyzer = Arc::new(StubAnalyzer::default());
        let pipeline = Arc::new(IngestPipeline::new(
            fetcher.clone(),
            analyzer.clone(),
            store.clone(),
            config_store,
        ));
        let scheduler = Arc::new(SchedulerController::new(pipeline.clone()));
        let state = Arc::new(AppState {
            pipeline,
            scheduler: scheduler.clone(),
            store,
            fetcher: fetcher.clone(),
            analyzer: analyzer.clone(),
            chat_provider,
        });
        TestApp {
            router: build_router(state, "*"),
            fetcher,
            analyzer,
            scheduler,
            dir,
        }
    }

    fn test_app(items: Vec<RawItem>) -> TestApp {
        test_app_with(
            StubFetcher {
                items,
                ..StubFetcher::default()
            },
            None,
        )
    }

    async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn ingest(app: &TestApp) -> Value {
        let (status, body) = send(&app.router, Method::POST, "/api/ingest", None).await;
        assert_eq!(status, StatusCode::OK);
        body
    }

    // ── Health ────────────────────────────────────────────────────

    #[tokio::test]
    async fn health_reports_ok() {
        let app = test_app(Vec::new());
        let (status, body) = send(&app.router, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["article_count"], 0);
        assert_eq!(body["ingest_running"], false);
    }

    // ── Manual trigger ────────────────────────────────────────────

    #[tokio::test]
    async fn manual_ingest_stores_then_dedups() {
        let app = test_app(stories(3));

        let body = ingest(&app).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["new_articles"], 3);

        let body = ingest(&app).await;
        assert_eq!(body["new_articles"], 0);
        assert_eq!(body["duplicates"], 3);

        let (_, articles) = send(&app.router, Method::GET, "/api/articles", None).await;
        let articles = articles.as_array().unwrap();
        assert_eq!(articles.len(), 3);
        assert_eq!(articles[0]["title"], "Chip story 3", "newest first");

        let (_, runs) = send(&app.router, Method::GET, "/api/ingest/runs?limit=1", None).await;
        let runs = runs.as_array().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0]["trigger"], "manual");
        assert_eq!(runs[0]["status"], "completed");
    }

    #[tokio::test]
    async fn concurrent_manual_trigger_reports_busy() {
        let app = test_app_with(
            StubFetcher {
                items: stories(2),
                gate: Some(Gate::closed()),
                ..StubFetcher::default()
            },
            None,
        );
        let gate = app.fetcher.gate.as_ref().unwrap();

        let router = app.router.clone();
        let first =
            tokio::spawn(async move { send(&router, Method::POST, "/api/ingest", None).await });
        gate.entered.notified().await;

        let (status, body) = send(&app.router, Method::POST, "/api/ingest", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "busy");
        assert_eq!(body["message"], "Ingestion already in progress");

        let (_, status_body) = send(&app.router, Method::GET, "/api/ingest/status", None).await;
        assert_eq!(status_body["running"], true);

        gate.release.add_permits(1);
        let (status, body) = first.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["new_articles"], 2);
    }

    #[tokio::test]
    async fn fetch_failure_is_500_and_releases_lock() {
        let app = test_app_with(
            StubFetcher {
                fail: true,
                ..StubFetcher::default()
            },
            None,
        );

        let (status, body) = send(&app.router, Method::POST, "/api/ingest", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
        assert!(body["detail"].as_str().unwrap().contains("feed unreachable"));

        let (_, status_body) = send(&app.router, Method::GET, "/api/ingest/status", None).await;
        assert_eq!(status_body["running"], false);
        assert_eq!(status_body["last_run"]["status"], "failed");
        assert!(status_body["job"].is_null());
    }

    // ── Articles ──────────────────────────────────────────────────

    #[tokio::test]
    async fn article_filters() {
        let app = test_app(stories(4));
        ingest(&app).await;

        let (_, high) = send(&app.router, Method::GET, "/api/articles?relevance=high", None).await;
        assert_eq!(high.as_array().unwrap().len(), 2);

        let (_, markets) =
            send(&app.router, Method::GET, "/api/articles?category=Markets&limit=1", None).await;
        let markets = markets.as_array().unwrap();
        assert_eq!(markets.len(), 1);
        assert_eq!(markets[0]["category"], "markets");

        let (_, ranged) = send(
            &app.router,
            Method::GET,
            "/api/articles?start_date=2025-06-02&end_date=2025-06-03",
            None,
        )
        .await;
        assert_eq!(ranged.as_array().unwrap().len(), 2);

        let (status, body) =
            send(&app.router, Method::GET, "/api/articles?relevance=sort-of", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");

        let (status, _) =
            send(&app.router, Method::GET, "/api/articles?start_date=yesterday", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, categories) = send(&app.router, Method::GET, "/api/categories", None).await;
        assert_eq!(categories, json!(["markets", "policy"]));
    }

    #[tokio::test]
    async fn delete_one_and_all() {
        let app = test_app(stories(3));
        ingest(&app).await;

        let (_, articles) = send(&app.router, Method::GET, "/api/articles", None).await;
        let id = articles[0]["id"].as_u64().unwrap();
        let uri = format!("/api/articles/{id}");

        let (status, body) = send(&app.router, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");

        let (status, body) = send(&app.router, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Article not found");

        let (status, body) = send(&app.router, Method::DELETE, "/api/articles", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted_count"], 2);

        let (_, health) = send(&app.router, Method::GET, "/health", None).await;
        assert_eq!(health["article_count"], 0);
    }

    // ── Settings ──────────────────────────────────────────────────

    #[tokio::test]
    async fn config_update_validates_then_applies() {
        let app = test_app(Vec::new());
        let path = app.dir.path().join("config.yaml");

        let (status, body) = send(&app.router, Method::GET, "/api/config", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["config"].as_str().unwrap().contains("scheduling"));

        let (status, body) = send(
            &app.router,
            Method::POST,
            "/api/config",
            Some(json!({ "config": "scheduling: [" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");

        let (status, _) = send(
            &app.router,
            Method::POST,
            "/api/config",
            Some(json!({ "config": "scheduling:\n  enabled: true\n  interval_hours: 0\n" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!path.exists(), "rejected settings must not be written");
        assert_eq!(app.fetcher.reloads.load(Ordering::SeqCst), 0);

        let raw = "scheduling:\n  enabled: true\n  interval_hours: 4\n  pull_limit: 15\n\
                   feeds:\n  - name: wire\n    url: https://example.com/rss\n";
        let (status, body) =
            send(&app.router, Method::POST, "/api/config", Some(json!({ "config": raw }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(app.fetcher.reloads.load(Ordering::SeqCst), 1);
        assert_eq!(app.analyzer.reloads.load(Ordering::SeqCst), 1);

        let (_, status_body) = send(&app.router, Method::GET, "/api/ingest/status", None).await;
        assert_eq!(status_body["job"]["name"], "scheduled_ingest");
        assert_eq!(status_body["job"]["interval"], 4.0 * 3600.0);
        assert_eq!(status_body["scheduler_state"], "unstarted");

        let (_, body) = send(&app.router, Method::GET, "/api/config", None).await;
        assert_eq!(body["config"], raw);

        let disabled = "scheduling:\n  enabled: false\n";
        send(&app.router, Method::POST, "/api/config", Some(json!({ "config": disabled }))).await;
        let (_, status_body) = send(&app.router, Method::GET, "/api/ingest/status", None).await;
        assert!(status_body["job"].is_null());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_config_updates_keep_job_and_file_in_step() {
        let app = test_app(Vec::new());

        let posts: Vec<_> = (1..=6)
            .map(|hours| {
                let router = app.router.clone();
                let raw = format!("scheduling:\n  enabled: true\n  interval_hours: {hours}\n");
                tokio::spawn(async move {
                    send(&router, Method::POST, "/api/config", Some(json!({ "config": raw }))).await
                })
            })
            .collect();
        for post in posts {
            assert_eq!(post.await.unwrap().0, StatusCode::OK);
        }

        let (_, body) = send(&app.router, Method::GET, "/api/config", None).await;
        let stored = AppSettings::parse(body["config"].as_str().unwrap()).unwrap();
        let (_, status_body) = send(&app.router, Method::GET, "/api/ingest/status", None).await;
        assert_eq!(
            status_body["job"]["interval"],
            stored.scheduling.interval_hours * 3600.0
        );
    }

    #[tokio::test]
    async fn config_update_after_shutdown_is_refused() {
        let app = test_app(Vec::new());
        app.scheduler.shutdown(false).await;

        let raw = "scheduling:\n  enabled: true\n  interval_hours: 2\n";
        let (status, body) =
            send(&app.router, Method::POST, "/api/config", Some(json!({ "config": raw }))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "error");
        assert!(!app.dir.path().join("config.yaml").exists());
        assert_eq!(app.fetcher.reloads.load(Ordering::SeqCst), 0);
    }

    // ── Chat ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn chat_lists_matches_without_provider() {
        let app = test_app(stories(2));
        ingest(&app).await;

        let (status, body) = send(
            &app.router,
            Method::POST,
            "/api/chat",
            Some(json!({ "message": "what about chip exports?" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["articles"].as_array().unwrap().len(), 2);
        assert!(body["response"].as_str().unwrap().starts_with("Found 2 matching articles"));

        let (_, body) = send(
            &app.router,
            Method::POST,
            "/api/chat",
            Some(json!({ "message": "zebras" })),
        )
        .await;
        assert_eq!(body["response"], "No matching articles found.");
        assert!(body["articles"].as_array().unwrap().is_empty());

        let (status, _) =
            send(&app.router, Method::POST, "/api/chat", Some(json!({ "message": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_answers_with_provider() {
        let provider = Arc::new(ScriptedChat {
            prompts: Mutex::new(Vec::new()),
        });
        let app = test_app_with(
            StubFetcher {
                items: stories(1),
                ..StubFetcher::default()
            },
            Some(provider.clone()),
        );
        ingest(&app).await;

        let (_, body) = send(
            &app.router,
            Method::POST,
            "/api/chat",
            Some(json!({ "message": "chip" })),
        )
        .await;
        assert_eq!(body["response"], "Export rules tightened [1].");

        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("[1] Chip story 1"));
        assert!(prompts[0].contains("Question: chip"));
    }
}

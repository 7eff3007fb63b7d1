//! End-to-end routing against real local HTTP backends.
//!
//! Tests cover:
//! - probe semantics (2xx and 400 are live, 5xx and hangs are not)
//! - tier-specific request bodies
//! - one-shot fallback and aggregated failure
//! - single-healthy-tier routing
//! - cooldowns under concurrent routing calls

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{Json, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};

use routing::{
    ComplexityAnalyzer, CooldownStore, Dispatcher, EscalationEngine, HealthProber, HttpBackend,
    InMemoryJobStore, ItemStatus, JobStore, MetricsProvider, OverallStatus, ProbeConfig,
    RestJobStore, RollingMetrics, RouteRequest, StaticBlobStore, Tier, TieredRouter, WorkItem,
};

#[derive(Clone)]
struct BackendState {
    name: &'static str,
    probe_status: StatusCode,
    job_status: StatusCode,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    last_body: Arc<Mutex<Option<Value>>>,
}

struct TestBackend {
    url: String,
    calls: Arc<AtomicUsize>,
    last_body: Arc<Mutex<Option<Value>>>,
}

impl TestBackend {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_body(&self) -> Option<Value> {
        self.last_body.lock().unwrap().clone()
    }
}

async fn handle(State(state): State<BackendState>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    tokio::time::sleep(state.delay).await;
    if body.get("probe").is_some() {
        return (state.probe_status, Json(json!({ "error": "jobId is required" })));
    }
    state.calls.fetch_add(1, Ordering::SeqCst);
    *state.last_body.lock().unwrap() = Some(body.clone());
    if state.job_status.is_success() {
        (
            state.job_status,
            Json(json!({ "success": true, "servedBy": state.name, "jobId": body["jobId"] })),
        )
    } else {
        (state.job_status, Json(json!({ "error": "worker crashed" })))
    }
}

async fn spawn_backend(
    name: &'static str,
    probe_status: StatusCode,
    job_status: StatusCode,
    delay: Duration,
) -> TestBackend {
    let calls = Arc::new(AtomicUsize::new(0));
    let last_body = Arc::new(Mutex::new(None));
    let state = BackendState {
        name,
        probe_status,
        job_status,
        delay,
        calls: calls.clone(),
        last_body: last_body.clone(),
    };
    let app = Router::new().route("/", post(handle)).with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestBackend {
        url: format!("http://{}/", addr),
        calls,
        last_body,
    }
}

async fn healthy(name: &'static str) -> TestBackend {
    spawn_backend(name, StatusCode::BAD_REQUEST, StatusCode::OK, Duration::ZERO).await
}

/// Backend that rejects anything without the expected bearer token and apikey.
async fn spawn_auth_gated_backend(key: &'static str) -> String {
    let app = Router::new().route(
        "/",
        post(move |headers: HeaderMap| async move {
            let bearer = format!("Bearer {}", key);
            let authorized = headers.get("authorization").and_then(|v| v.to_str().ok())
                == Some(bearer.as_str())
                && headers.get("apikey").and_then(|v| v.to_str().ok()) == Some(key);
            if authorized {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": "jobId is required" })))
            } else {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": "missing authorization" })))
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/", addr)
}

fn item(job_id: &str, n: u32) -> WorkItem {
    WorkItem {
        id: format!("{}-{}", job_id, n),
        job_id: job_id.to_string(),
        size_bytes: 1024 * 1024,
        status: ItemStatus::Pending,
        retry_count: 0,
        error_message: None,
    }
}

fn build_router(
    fast: &TestBackend,
    comprehensive: &TestBackend,
    analysis: &TestBackend,
    store: Arc<InMemoryJobStore>,
    probe_timeout: Duration,
) -> TieredRouter {
    let prober = HealthProber::new(
        ProbeConfig {
            fast_url: fast.url.clone(),
            comprehensive_url: comprehensive.url.clone(),
            analysis_url: analysis.url.clone(),
            service_key: "test-key".into(),
            timeout: probe_timeout,
            mock_backends: false,
        },
        store.clone(),
        Arc::new(StaticBlobStore { accessible: true }),
    )
    .unwrap();
    let metrics: Arc<dyn MetricsProvider> =
        Arc::new(RollingMetrics::new(Duration::from_secs(60), 8));
    let dispatch_timeout = Duration::from_secs(5);
    let dispatcher = Dispatcher::new(
        Arc::new(HttpBackend::new(Tier::Fast, &fast.url, "test-key", dispatch_timeout).unwrap()),
        Arc::new(
            HttpBackend::new(
                Tier::Comprehensive,
                &comprehensive.url,
                "test-key",
                dispatch_timeout,
            )
            .unwrap(),
        ),
        metrics.clone(),
    );
    TieredRouter::new(
        prober,
        ComplexityAnalyzer::new(store),
        metrics,
        EscalationEngine::new(CooldownStore::new()),
        dispatcher,
    )
}

fn store_with_simple_job(job_id: &str) -> Arc<InMemoryJobStore> {
    let store = Arc::new(InMemoryJobStore::new());
    store.insert_job(job_id, vec![item(job_id, 1)], None);
    store
}

#[tokio::test]
async fn test_probe_accepts_bad_request_and_rejects_server_errors() {
    let fast = healthy("fast").await;
    let comprehensive =
        spawn_backend("comprehensive", StatusCode::OK, StatusCode::OK, Duration::ZERO).await;
    let analysis = spawn_backend(
        "analysis",
        StatusCode::INTERNAL_SERVER_ERROR,
        StatusCode::OK,
        Duration::ZERO,
    )
    .await;
    let router = build_router(
        &fast,
        &comprehensive,
        &analysis,
        Arc::new(InMemoryJobStore::new()),
        Duration::from_secs(2),
    );

    let report = router.prober().probe().await;
    assert!(report.health.fast_available);
    assert!(report.health.comprehensive_available);
    assert!(!report.health.analysis_service_online);
    assert_eq!(report.overall, OverallStatus::Degraded);
    assert!(report.details["analysis_service"].contains("500"));
    // Probes never count as jobs.
    assert_eq!(fast.calls(), 0);
}

#[tokio::test]
async fn test_probe_authenticates_against_gated_backends() {
    let url = spawn_auth_gated_backend("service-secret").await;
    let prober_with_key = |key: &str| {
        HealthProber::new(
            ProbeConfig {
                fast_url: url.clone(),
                comprehensive_url: url.clone(),
                analysis_url: url.clone(),
                service_key: key.to_string(),
                timeout: Duration::from_secs(2),
                mock_backends: false,
            },
            Arc::new(InMemoryJobStore::new()),
            Arc::new(StaticBlobStore { accessible: true }),
        )
        .unwrap()
    };

    let report = prober_with_key("service-secret").probe().await;
    assert!(report.health.fast_available);
    assert!(report.health.comprehensive_available);
    assert!(report.health.analysis_service_online);
    assert_eq!(report.overall, OverallStatus::Healthy);

    let report = prober_with_key("wrong-key").probe().await;
    assert!(!report.health.fast_available);
    assert!(report.details["fast_backend"].contains("401"));
}

#[tokio::test]
async fn test_hung_backend_bounded_by_probe_timeout() {
    let fast = spawn_backend(
        "fast",
        StatusCode::BAD_REQUEST,
        StatusCode::OK,
        Duration::from_secs(5),
    )
    .await;
    let comprehensive = healthy("comprehensive").await;
    let analysis = healthy("analysis").await;
    let router = build_router(
        &fast,
        &comprehensive,
        &analysis,
        Arc::new(InMemoryJobStore::new()),
        Duration::from_millis(200),
    );

    let start = Instant::now();
    let report = router.prober().probe().await;
    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(!report.health.fast_available);
    assert!(report.health.comprehensive_available);
    assert!(router.prober().counters().timeouts >= 1);
}

#[tokio::test]
async fn test_simple_job_served_by_fast_tier() {
    let fast = healthy("fast").await;
    let comprehensive = healthy("comprehensive").await;
    let analysis = healthy("analysis").await;
    let router = build_router(
        &fast,
        &comprehensive,
        &analysis,
        store_with_simple_job("order-1"),
        Duration::from_secs(2),
    );

    let outcome = router.route(&RouteRequest::new("order-1")).await.unwrap();
    assert_eq!(outcome.served_tier, Tier::Fast);
    assert_eq!(outcome.execution.result["servedBy"], "fast");
    assert_eq!(fast.calls(), 1);
    assert_eq!(comprehensive.calls(), 0);
    assert_eq!(
        fast.last_body(),
        Some(json!({ "jobId": "order-1", "analysisKind": "lifestyle" }))
    );
}

#[tokio::test]
async fn test_fast_failure_falls_back_to_comprehensive() {
    let fast = spawn_backend(
        "fast",
        StatusCode::BAD_REQUEST,
        StatusCode::INTERNAL_SERVER_ERROR,
        Duration::ZERO,
    )
    .await;
    let comprehensive = healthy("comprehensive").await;
    let analysis = healthy("analysis").await;
    let router = build_router(
        &fast,
        &comprehensive,
        &analysis,
        store_with_simple_job("order-2"),
        Duration::from_secs(2),
    );

    let outcome = router.route(&RouteRequest::new("order-2")).await.unwrap();
    assert_eq!(outcome.selected_tier, Tier::Fast);
    assert_eq!(outcome.served_tier, Tier::Comprehensive);
    assert_eq!(outcome.trace.attempts.len(), 2);
    assert_eq!(outcome.trace.attempts[0].status, Some(500));
    assert!(outcome.reason.contains("fell back"));

    let body = comprehensive.last_body().unwrap();
    assert_eq!(body["action"], "process");
    assert!(body["escalationReason"]
        .as_str()
        .unwrap()
        .starts_with("fallback:"));
}

#[tokio::test]
async fn test_double_failure_surfaces_once() {
    let fast = spawn_backend(
        "fast",
        StatusCode::BAD_REQUEST,
        StatusCode::BAD_GATEWAY,
        Duration::ZERO,
    )
    .await;
    let comprehensive = spawn_backend(
        "comprehensive",
        StatusCode::BAD_REQUEST,
        StatusCode::INTERNAL_SERVER_ERROR,
        Duration::ZERO,
    )
    .await;
    let analysis = healthy("analysis").await;
    let router = build_router(
        &fast,
        &comprehensive,
        &analysis,
        store_with_simple_job("order-3"),
        Duration::from_secs(2),
    );

    let failure = router.route(&RouteRequest::new("order-3")).await.unwrap_err();
    assert_eq!(failure.code(), "FALLBACK_EXHAUSTED");
    assert_eq!(failure.trace.attempts.len(), 2);
    assert!(failure.trace.decision.is_some());
    assert_eq!(fast.calls(), 1);
    assert_eq!(comprehensive.calls(), 1);
}

#[tokio::test]
async fn test_only_comprehensive_healthy() {
    let fast = spawn_backend(
        "fast",
        StatusCode::SERVICE_UNAVAILABLE,
        StatusCode::OK,
        Duration::ZERO,
    )
    .await;
    let comprehensive = healthy("comprehensive").await;
    let analysis = healthy("analysis").await;
    let router = build_router(
        &fast,
        &comprehensive,
        &analysis,
        store_with_simple_job("order-4"),
        Duration::from_secs(2),
    );

    let outcome = router.route(&RouteRequest::new("order-4")).await.unwrap();
    assert_eq!(outcome.served_tier, Tier::Comprehensive);
    assert_eq!(outcome.confidence, 0.7);
    assert_eq!(fast.calls(), 0);
}

#[tokio::test]
async fn test_concurrent_calls_share_cooldown() {
    let fast = healthy("fast").await;
    let comprehensive = healthy("comprehensive").await;
    let analysis = healthy("analysis").await;
    let router = build_router(
        &fast,
        &comprehensive,
        &analysis,
        store_with_simple_job("order-5"),
        Duration::from_secs(2),
    );

    let mut request = RouteRequest::new("order-5");
    request.elapsed_ms = 45_000;
    let outcomes = futures::future::join_all((0..8).map(|_| router.route(&request))).await;

    let escalated = outcomes
        .iter()
        .map(|o| o.as_ref().unwrap())
        .filter(|o| o.served_tier == Tier::Comprehensive)
        .count();
    assert_eq!(escalated, 1);
    assert_eq!(fast.calls() + comprehensive.calls(), 8);
}

type CapturedQueries = Arc<Mutex<Vec<(String, Vec<(String, String)>)>>>;

/// PostgREST stand-in that records the decoded query of every read.
async fn spawn_recording_store() -> (String, CapturedQueries) {
    let captured: CapturedQueries = Arc::new(Mutex::new(Vec::new()));
    let images = captured.clone();
    let orders = captured.clone();
    let app = Router::new()
        .route(
            "/images",
            get(move |Query(params): Query<Vec<(String, String)>>| async move {
                images.lock().unwrap().push(("images".to_string(), params));
                Json(json!([{ "id": "img-1", "order_id": "o1", "processing_status": "pending" }]))
            }),
        )
        .route(
            "/orders",
            get(move |Query(params): Query<Vec<(String, String)>>| async move {
                orders.lock().unwrap().push(("orders".to_string(), params));
                Json(json!([]))
            }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), captured)
}

#[tokio::test]
async fn test_job_id_cannot_add_store_filters() {
    let (url, captured) = spawn_recording_store().await;
    let store = RestJobStore::new(&url, "test-key", Duration::from_secs(2)).unwrap();
    let job_id = "o1&order_id=neq.o1&or=(id.neq.x)";

    let items = store.fetch_items(job_id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert!(store.fetch_metadata(job_id).await.unwrap().is_none());

    let captured = captured.lock().unwrap().clone();
    assert_eq!(captured.len(), 2);

    let (table, params) = &captured[0];
    assert_eq!(table, "images");
    assert_eq!(params.len(), 2);
    assert_eq!(
        params[0],
        ("order_id".to_string(), format!("eq.{}", job_id))
    );
    assert_eq!(params[1].0, "select");

    let (table, params) = &captured[1];
    assert_eq!(table, "orders");
    assert_eq!(
        params,
        &vec![
            ("id".to_string(), format!("eq.{}", job_id)),
            ("limit".to_string(), "1".to_string()),
        ]
    );
}

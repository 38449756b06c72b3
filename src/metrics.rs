use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

/// One-time metric descriptions (so series show up on /metrics with help text).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("bot_cycles_total", "Bot cycles run, labelled by content kind.");
        describe_counter!("bot_posts_total", "Posts delivered to the channel.");
        describe_counter!("bot_skipped_total", "Cycles that found nothing to post.");
        describe_counter!("bot_fallback_posts_total", "Posts that used the AI fallback text.");
        describe_counter!("bot_publish_errors_total", "Posts the channel API rejected.");
        describe_counter!("ingest_items_total", "Headlines returned by providers.");
        describe_counter!("ingest_provider_errors_total", "Provider fetch/parse errors.");
        describe_counter!("llm_errors_total", "Failed chat completion calls.");
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_histogram!("llm_request_ms", "Chat completion latency in milliseconds.");
    });
}

/// Last-cycle summary served on `/status`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BotStatus {
    pub started_at: Option<DateTime<Utc>>,
    pub cycles: u64,
    pub posts: u64,
    pub last_kind: Option<String>,
    pub last_outcome: Option<String>,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub next_post_at: Option<DateTime<Utc>>,
}

pub type SharedStatus = Arc<RwLock<BotStatus>>;

#[derive(Clone)]
struct StatusState {
    handle: Option<PrometheusHandle>,
    status: SharedStatus,
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. Only one recorder may exist per process.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        Ok(Self { handle })
    }
}

/// `/health`, `/status` and (when a recorder is installed) `/metrics`.
pub fn status_router(handle: Option<PrometheusHandle>, status: SharedStatus) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/status", get(get_status))
        .route("/metrics", get(get_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(StatusState { handle, status })
}

async fn get_status(State(st): State<StatusState>) -> Json<BotStatus> {
    Json(st.status.read().await.clone())
}

async fn get_metrics(State(st): State<StatusState>) -> String {
    st.handle.as_ref().map(|h| h.render()).unwrap_or_default()
}

/// Serve the status router until `shutdown` resolves.
pub async fn serve_status(
    addr: SocketAddr,
    router: Router,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding status server on {addr}"))?;
    tracing::info!(%addr, "status server listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("status server")
}

//! HTTP surface: one scrape per request to the telemetry path.
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `{telemetry_path}` | Prometheus exposition |
//! | GET | `/` | Landing page |

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use dbpulse_core::scrapers::PerfSchemaQueryLatency;
use dbpulse_core::{
    CollectorSet, MetaDescriptors, MetricDesc, QueryExecutor, ScrapeContext, ScrapeOrchestrator,
    ScrapeReport, TruncateAuthorization, truncate_statement_summary,
};
use dbpulse_metrics::{CONTENT_TYPE, render_prometheus};

use crate::config::{Config, ConfigError};

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: ScrapeOrchestrator,
    pub db: Arc<dyn QueryExecutor>,
    pub meta: MetaDescriptors,
    /// Collector descriptors followed by the exporter's own.
    pub descriptors: Arc<Vec<Arc<MetricDesc>>>,
    /// Parent of every scrape context; cancelled on shutdown.
    pub root: CancellationToken,
    pub timeout: Duration,
    pub channel_capacity: usize,
    pub truncate: Option<TruncateAuthorization>,
    pub telemetry_path: String,
}

impl AppState {
    pub fn new(
        collectors: CollectorSet,
        db: Arc<dyn QueryExecutor>,
        root: CancellationToken,
        config: &Config,
    ) -> Result<Self, ConfigError> {
        let meta = MetaDescriptors::new();
        let mut descriptors = collectors.descriptors();
        descriptors.extend(meta.all());

        Ok(Self {
            orchestrator: ScrapeOrchestrator::new(Arc::new(collectors)),
            db,
            meta,
            descriptors: Arc::new(descriptors),
            root,
            timeout: config.scrape.timeout()?,
            channel_capacity: config.scrape.channel_capacity,
            truncate: TruncateAuthorization::from_operator_flag(
                config.maintenance.truncate_statement_summary,
            ),
            telemetry_path: config.server.telemetry_path.clone(),
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let telemetry_path = state.telemetry_path.clone();
    Router::new()
        .route(&telemetry_path, get(metrics))
        .route("/", get(landing))
        .with_state(state)
}

/// GET {telemetry_path}
async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = scrape(&state).await;
    (StatusCode::OK, [("content-type", CONTENT_TYPE)], body)
}

/// GET /
async fn landing(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<html>\n<head><title>dbpulse MySQL exporter</title></head>\n<body>\n\
         <h1>dbpulse MySQL exporter</h1>\n\
         <p><a href=\"{path}\">Metrics</a></p>\n</body>\n</html>\n",
        path = state.telemetry_path
    ))
}

/// Run one scrape cycle and render it.
///
/// A server that cannot report its version yields only `mysql_up 0`.
pub async fn scrape(state: &AppState) -> String {
    let ctx = ScrapeContext::with_timeout(state.root.child_token(), state.timeout);

    let (mut samples, report) = match ctx.run(state.db.server_version()).await {
        Ok(Ok(version)) => {
            let (samples, report) = state
                .orchestrator
                .collect(&ctx, Arc::clone(&state.db), version, state.channel_capacity)
                .await;
            maybe_truncate(state, &ctx, &report).await;
            (samples, report)
        }
        Ok(Err(e)) => {
            warn!(error = %e, "server version query failed");
            (Vec::new(), ScrapeReport::unreachable())
        }
        Err(reason) => {
            warn!(%reason, "server version query interrupted");
            (Vec::new(), ScrapeReport::unreachable())
        }
    };

    samples.extend(report.meta_samples(&state.meta));
    debug!(
        samples = samples.len(),
        up = report.up(),
        failures = report.failures().count(),
        "scrape served"
    );
    render_prometheus(&state.descriptors, &samples)
}

async fn maybe_truncate(state: &AppState, ctx: &ScrapeContext, report: &ScrapeReport) {
    let Some(auth) = &state.truncate else {
        return;
    };
    let latency_ok = report
        .get(PerfSchemaQueryLatency::NAME)
        .is_some_and(|c| c.succeeded());
    if !latency_ok {
        return;
    }
    if let Err(e) = truncate_statement_summary(ctx, state.db.as_ref(), auth).await {
        warn!(error = %e, "statement summary truncate failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use dbpulse_core::scrapers::info_schema::REQUEST_RATE_QUERY;
    use dbpulse_core::scrapers::perf_schema::QUERY_LATENCY_QUERY;
    use dbpulse_core::testing::{FakeExecutor, Script};
    use dbpulse_core::{Descriptors, ServerVersion, Value};
    use tower::ServiceExt;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.database.dsn = "mysql://exporter@127.0.0.1:3306/".to_string();
        config
    }

    fn test_state(fake: &FakeExecutor, config: &Config) -> AppState {
        let collectors = CollectorSet::with_defaults(&Descriptors::new())
            .unwrap()
            .filter(&config.scrape.collectors)
            .unwrap();
        AppState::new(
            collectors,
            Arc::new(fake.clone()),
            CancellationToken::new(),
            config,
        )
        .unwrap()
    }

    async fn get_body(router: Router, uri: &str) -> (StatusCode, String, String) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = router.oneshot(req).await.unwrap();
        let status = resp.status();
        let content_type = resp
            .headers()
            .get("content-type")
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_default();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn metrics_endpoint_renders_samples() {
        let fake = FakeExecutor::new()
            .with_script(&REQUEST_RATE_QUERY, Script::column(vec![Value::Text("42".into())]));
        let router = build_router(test_state(&fake, &test_config()));

        let (status, content_type, body) = get_body(router, "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, CONTENT_TYPE);
        assert!(body.contains("# TYPE mysql_info_schema_global_status_request_rate counter\n"));
        assert!(body.contains("mysql_info_schema_global_status_request_rate 42\n"));
        assert!(body.contains("mysql_up 1\n"));
        assert!(body.contains(
            "mysql_exporter_collector_success{collector=\"global_status_request_rate\"} 1\n"
        ));
    }

    #[tokio::test]
    async fn failed_collector_is_reported_not_fatal() {
        let fake = FakeExecutor::new()
            .with_script(&QUERY_LATENCY_QUERY, Script::failing("Unknown table"))
            .with_script(&REQUEST_RATE_QUERY, Script::column(vec![Value::UInt(7)]));
        let router = build_router(test_state(&fake, &test_config()));

        let (status, _, body) = get_body(router, "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("mysql_info_schema_global_status_request_rate 7\n"));
        assert!(body.contains(
            "mysql_exporter_collector_success{collector=\"perf_schema_query_latency\"} 0\n"
        ));
    }

    #[tokio::test]
    async fn unreachable_server_reports_down_only() {
        let fake = FakeExecutor::new().with_version_error("connection refused");
        let router = build_router(test_state(&fake, &test_config()));

        let (status, _, body) = get_body(router, "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("mysql_up 0\n"));
        assert!(!body.contains("mysql_exporter_collector_success{"));
        assert!(fake.queries().is_empty());
    }

    #[tokio::test]
    async fn old_server_skips_perf_schema() {
        let fake = FakeExecutor::new().with_version(ServerVersion::new(5, 5));
        let state = test_state(&fake, &test_config());

        let body = scrape(&state).await;

        assert!(!fake.queries().iter().any(|q| q.contains("performance_schema")));
        assert!(!body.contains("collector=\"perf_schema_query_latency\""));
        assert!(body.contains("mysql_up 1\n"));
    }

    #[tokio::test]
    async fn truncate_runs_only_when_enabled() {
        let fake = FakeExecutor::new();
        let state = test_state(&fake, &test_config());
        scrape(&state).await;
        assert!(fake.executed().is_empty());

        let mut config = test_config();
        config.maintenance.truncate_statement_summary = true;
        let fake = FakeExecutor::new();
        let state = test_state(&fake, &config);
        scrape(&state).await;
        assert_eq!(fake.executed().len(), 1);
        assert!(fake.executed()[0].starts_with("TRUNCATE TABLE"));
    }

    #[tokio::test]
    async fn truncate_skipped_when_latency_fails() {
        let mut config = test_config();
        config.maintenance.truncate_statement_summary = true;
        let fake = FakeExecutor::new()
            .with_script(&QUERY_LATENCY_QUERY, Script::failing("Unknown table"));
        let state = test_state(&fake, &config);

        scrape(&state).await;

        assert!(fake.executed().is_empty());
    }

    #[tokio::test]
    async fn shutdown_cancels_scrapes() {
        let fake = FakeExecutor::new().with_fallback(Script::hanging());
        let state = test_state(&fake, &test_config());
        state.root.cancel();

        let body = scrape(&state).await;

        assert!(body.contains("mysql_up 0\n"));
        assert!(fake.queries().is_empty());
    }

    #[tokio::test]
    async fn collector_filter_limits_output() {
        let mut config = test_config();
        config.scrape.collectors = vec!["global_status_saturation".to_string()];
        let fake = FakeExecutor::new();
        let router = build_router(test_state(&fake, &config));

        let (_, _, body) = get_body(router, "/metrics").await;

        assert_eq!(fake.queries().len(), 1);
        assert!(body.contains("# HELP mysql_info_schema_global_status_saturation"));
        assert!(!body.contains("mysql_info_schema_global_status_request_rate"));
    }

    #[tokio::test]
    async fn custom_telemetry_path() {
        let mut config = test_config();
        config.server.telemetry_path = "/probe".to_string();
        let fake = FakeExecutor::new();
        let router = build_router(test_state(&fake, &config));

        let (status, _, _) = get_body(router.clone(), "/probe").await;
        assert_eq!(status, StatusCode::OK);
        let (status, _, _) = get_body(router, "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn landing_page_links_metrics() {
        let fake = FakeExecutor::new();
        let router = build_router(test_state(&fake, &test_config()));

        let (status, content_type, body) = get_body(router, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(content_type.starts_with("text/html"));
        assert!(body.contains("<a href=\"/metrics\">"));
    }
}

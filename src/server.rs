// HTTP server - scrape, health, readiness and version endpoints
//
// Every scrape runs one collection cycle synchronously for the request.
// Nothing is collected in the background.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::collector::system::{BUILD_DATE, COMMIT, VERSION};
use crate::collector::Registry;
use crate::config::{ServerConfig, VERSION_PATH};
use crate::metrics::encode_text;
use crate::runtime::RuntimeClient;

/// How long the readiness probe waits for the runtime to answer.
const READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
    pub client: Arc<dyn RuntimeClient>,
}

impl AppState {
    pub fn new(registry: Registry, client: Arc<dyn RuntimeClient>) -> Self {
        Self { registry, client }
    }
}

/// Runs one collection cycle and renders it as Prometheus text.
async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let measurements = state.registry.gather().await;

    match encode_text(&measurements) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to encode metrics: {e}"),
            )
                .into_response()
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

/// 200 when the container runtime answers a ping, 503 otherwise.
async fn ready(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    match tokio::time::timeout(READY_TIMEOUT, state.client.ping()).await {
        Ok(Ok(())) => (StatusCode::OK, "READY"),
        Ok(Err(e)) => {
            warn!(error = %e, "Readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
        Err(_) => {
            warn!("Readiness check timed out");
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }
}

async fn version() -> Json<serde_json::Value> {
    Json(json!({
        "version": VERSION,
        "commit": COMMIT,
        "build_date": BUILD_DATE,
    }))
}

/// Logs each request at debug level.
async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    debug!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "HTTP request"
    );

    response
}

/// Create the HTTP router
pub fn create_router(config: &ServerConfig, state: Arc<AppState>) -> Router {
    Router::new()
        .route(&config.metrics_path, get(metrics))
        .route(&config.health_path, get(health))
        .route(&config.ready_path, get(ready))
        .route(VERSION_PATH, get(version))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Binds the listener and serves until `shutdown` resolves.
pub async fn serve<F>(config: &ServerConfig, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(config, state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, metrics_path = %config.metrics_path, "Starting HTTP server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::StatsCache;
    use crate::collector::ContainerCollector;
    use crate::config::{ExporterConfig, FiltersConfig};
    use crate::filter::Filter;
    use crate::metrics::MetricCatalog;
    use crate::testing::{resource, MockRuntime};
    use axum::body::{to_bytes, Body};
    use tower::ServiceExt;

    fn server_config() -> ServerConfig {
        ServerConfig {
            port: "9200".to_string(),
            address: "127.0.0.1".to_string(),
            metrics_path: "/metrics".to_string(),
            health_path: "/health".to_string(),
            ready_path: "/ready".to_string(),
        }
    }

    fn router(mock: MockRuntime) -> Router {
        let client: Arc<dyn RuntimeClient> = Arc::new(mock);
        let collector = ContainerCollector::new(
            client.clone(),
            Arc::new(Filter::compile(&FiltersConfig::default()).unwrap()),
            Arc::new(StatsCache::new(Duration::from_secs(30), true)),
            Arc::new(MetricCatalog::new()),
            Duration::from_secs(5),
            4,
        );
        let mut registry = Registry::new();
        registry.register(Arc::new(collector));

        create_router(&server_config(), Arc::new(AppState::new(registry, client)))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let app = router(MockRuntime::new().with_running(
            resource("c1", "web", "nginx:latest", "running"),
            100,
            200,
        ));

        let (status, body) = get(app, "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("# TYPE container_memory_usage_bytes gauge"));
        assert!(body.contains(
            r#"container_memory_usage_bytes{container_name="web",compose_service="",compose_project="",image="nginx:latest"} 100"#
        ));
        assert!(body.contains("exporter_scrape_errors_total"));
    }

    #[tokio::test]
    async fn test_metrics_endpoint_survives_runtime_outage() {
        let mut mock = MockRuntime::new();
        mock.list_fails = true;

        let (status, body) = get(router(mock), "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"exporter_scrape_errors_total{collector="container"} 1"#));
        assert!(!body.contains("container_memory_usage_bytes"));
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get(router(MockRuntime::new()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn test_ready_reflects_ping() {
        let (status, body) = get(router(MockRuntime::new()), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "READY");

        let mut down = MockRuntime::new();
        down.ping_fails = true;
        let (status, body) = get(router(down), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, "NOT READY");
    }

    #[tokio::test]
    async fn test_version() {
        let (status, body) = get(router(MockRuntime::new()), "/version").await;
        assert_eq!(status, StatusCode::OK);

        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["version"], VERSION);
    }

    #[tokio::test]
    async fn test_router_builds_from_loaded_config() {
        let overrides = [("server.metrics_path", "/stats".to_string())];
        let config = ExporterConfig::load_with_env(None, &overrides, |_: &str| None).unwrap();
        let client: Arc<dyn RuntimeClient> = Arc::new(MockRuntime::new());
        let app = create_router(
            &config.server,
            Arc::new(AppState::new(Registry::new(), client)),
        );

        let (status, _) = get(app.clone(), "/stats").await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = get(app, VERSION_PATH).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let (status, _) = get(router(MockRuntime::new()), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

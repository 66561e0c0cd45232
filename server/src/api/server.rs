//! API server initialization

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use super::middleware;
use super::routes::{health, remote_write, telemetry};
use crate::core::CoreApp;
use crate::core::config::ServerConfig;
use crate::core::constants::{DEFAULT_BODY_LIMIT, HEALTH_PATH};
use crate::domain::IngestPipeline;

/// Assemble every route behind the shared middleware stack
pub fn router(
    config: &ServerConfig,
    pipeline: IngestPipeline,
    metrics_handle: PrometheusHandle,
) -> Router {
    let write_routes = remote_write::routes(
        &config.write_path,
        pipeline,
        config.max_body_bytes,
        config.max_decompressed_bytes,
    );

    let telemetry_routes = Router::new()
        .route(&config.telemetry_path, get(telemetry::render))
        .with_state(metrics_handle);

    Router::new()
        .route(HEALTH_PATH, get(health::health))
        .merge(telemetry_routes)
        .merge(write_routes)
        .fallback(middleware::handle_404)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn(
                    middleware::record_request_duration,
                ))
                .layer(CompressionLayer::new())
                .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT)),
        )
}

pub struct ApiServer {
    app: CoreApp,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        Self { app }
    }

    /// Returns CoreApp for graceful shutdown
    pub async fn start(self) -> Result<CoreApp> {
        let app = self.app;
        let shutdown = app.shutdown.clone();
        let server = &app.config.server;

        let router = router(server, app.pipeline.clone(), app.metrics.clone());

        let listener = TcpListener::bind((server.host.as_str(), server.port))
            .await
            .with_context(|| format!("Failed to bind {}:{}", server.host, server.port))?;
        tracing::info!(
            address = %listener.local_addr()?,
            write_path = %server.write_path,
            telemetry_path = %server.telemetry_path,
            "Listening for remote-write requests"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use prost::Message;
    use sqlx::sqlite::SqlitePoolOptions;
    use tower::ServiceExt;

    use crate::core::ShutdownService;
    use crate::core::config::{FailurePolicyConfig, FailurePolicyKind, SelectorConfig};
    use crate::data::{
        DataError, ExtractedRow, InsertOutcome, SampleRepository, SqliteService, StoreService,
    };
    use crate::domain::samples::{RowWriter, Selector};
    use crate::utils::prompb::{Label, Sample, TimeSeries, WriteRequest};

    struct Harness {
        router: Router,
        store: Arc<StoreService>,
        shutdown: ShutdownService,
    }

    fn server_config() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 9201,
            telemetry_path: "/metrics".to_string(),
            write_path: "/write".to_string(),
            max_body_bytes: 1024 * 1024,
            max_decompressed_bytes: 4 * 1024 * 1024,
        }
    }

    async fn harness_with(
        repository: Option<Arc<dyn SampleRepository>>,
        kind: FailurePolicyKind,
        handle: PrometheusHandle,
    ) -> Harness {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = Arc::new(StoreService::Sqlite(Arc::new(SqliteService::from_pool(
            pool,
            "monitoring",
        ))));
        store.repository().ensure_schema().await.unwrap();

        let shutdown = ShutdownService::new(store.clone());
        let policy = FailurePolicyConfig {
            kind,
            max_attempts: 1,
            base_delay_ms: 1,
        };
        let pipeline = IngestPipeline::new(
            Selector::new(SelectorConfig::default()),
            RowWriter::new(repository.unwrap_or_else(|| store.repository()), policy),
            shutdown.clone(),
        );

        Harness {
            router: router(&server_config(), pipeline, handle),
            store,
            shutdown,
        }
    }

    async fn harness() -> Harness {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        harness_with(None, FailurePolicyKind::Halt, handle).await
    }

    fn simba_payload(value: f64) -> Vec<u8> {
        let request = WriteRequest {
            timeseries: vec![TimeSeries {
                labels: vec![
                    Label::new("__name__", "simba_metric_x"),
                    Label::new("date_time", "2024-01-01"),
                    Label::new("column_name", "cpu"),
                ],
                samples: vec![Sample {
                    value,
                    timestamp: 1_700_000_000_000,
                }],
            }],
        };
        snap::raw::Encoder::new()
            .compress_vec(&request.encode_to_vec())
            .unwrap()
    }

    fn post_write(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/write")
            .header(header::CONTENT_ENCODING, "snappy")
            .header(header::CONTENT_TYPE, "application/x-protobuf")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    struct DownRepository {
        calls: AtomicU32,
    }

    #[async_trait]
    impl SampleRepository for DownRepository {
        async fn ensure_schema(&self) -> Result<(), DataError> {
            Ok(())
        }

        async fn insert_if_absent(&self, _row: &ExtractedRow) -> Result<InsertOutcome, DataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(DataError::from_mysql(sqlx::Error::PoolTimedOut))
        }

        async fn count_rows(&self) -> Result<u64, DataError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_valid_write_returns_200_and_stores_row() {
        let h = harness().await;
        let response = h
            .router
            .clone()
            .oneshot(post_write(simba_payload(42.0)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(h.store.repository().count_rows().await.unwrap(), 1);

        // Resubmission is accepted and stores nothing new
        let response = h
            .router
            .oneshot(post_write(simba_payload(42.0)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(h.store.repository().count_rows().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_non_positive_value_returns_200_without_row() {
        let h = harness().await;
        let response = h
            .router
            .oneshot(post_write(simba_payload(0.0)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(h.store.repository().count_rows().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_garbage_body_returns_400_with_reason() {
        let h = harness().await;
        let response = h
            .router
            .oneshot(post_write(b"definitely not snappy".to_vec()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.starts_with("snappy: "));
    }

    #[tokio::test]
    async fn test_valid_snappy_invalid_protobuf_returns_400() {
        let h = harness().await;
        let body = snap::raw::Encoder::new()
            .compress_vec(&[0xff, 0xff, 0xff])
            .unwrap();
        let response = h.router.oneshot(post_write(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.starts_with("proto: "));
    }

    #[tokio::test]
    async fn test_store_failure_returns_500_and_halts() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let down = Arc::new(DownRepository {
            calls: AtomicU32::new(0),
        });
        let h = harness_with(Some(down.clone()), FailurePolicyKind::Halt, handle).await;

        let response = h
            .router
            .clone()
            .oneshot(post_write(simba_payload(1.0)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(h.shutdown.is_triggered());

        // In-flight requests after the failure never reach the store
        let response = h
            .router
            .oneshot(post_write(simba_payload(1.0)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(down.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reject_policy_keeps_serving() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let down = Arc::new(DownRepository {
            calls: AtomicU32::new(0),
        });
        let h = harness_with(Some(down.clone()), FailurePolicyKind::Reject, handle).await;

        let response = h
            .router
            .oneshot(post_write(simba_payload(1.0)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!h.shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let h = harness().await;
        let response = h
            .router
            .oneshot(post_write(vec![0u8; 2 * 1024 * 1024]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_get_on_write_path_is_not_allowed() {
        let h = harness().await;
        let response = h
            .router
            .oneshot(Request::get("/write").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_unknown_path_returns_404() {
        let h = harness().await;
        let response = h
            .router
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness().await;
        let response = h
            .router
            .oneshot(Request::get(HEALTH_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_telemetry_renders_recorded_metrics() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!("promsql_test_events_total").increment(3);
        });
        let h = harness_with(None, FailurePolicyKind::Halt, handle).await;

        let response = h
            .router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            telemetry::EXPOSITION_CONTENT_TYPE
        );
        assert!(
            body_text(response)
                .await
                .contains("promsql_test_events_total 3")
        );
    }
}

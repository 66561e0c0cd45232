//! HTTP middleware (request timing, 404 handler)

use std::time::Instant;

use axum::body::to_bytes;
use axum::extract::{MatchedPath, Request};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::core::constants::METRIC_HTTP_REQUEST_DURATION;

/// Record request latency under the matched route template
///
/// Unmatched requests share the `unmatched` label so probes against random
/// paths cannot grow the series count.
pub async fn record_request_duration(req: Request, next: Next) -> Response {
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let method = req.method().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    metrics::histogram!(
        METRIC_HTTP_REQUEST_DURATION,
        "path" => path,
        "method" => method,
        "status" => response.status().as_u16().to_string()
    )
    .record(start.elapsed().as_secs_f64());

    response
}

const MAX_404_BODY_LOG: usize = 64 * 1024;

/// Handle 404 Not Found with logging
pub async fn handle_404(req: Request) -> impl IntoResponse {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return StatusCode::NOT_FOUND;
    }

    let method = req.method().clone();
    let uri = req.uri().clone();
    let headers = req.headers().clone();

    let body_bytes = match to_bytes(req.into_body(), MAX_404_BODY_LOG).await {
        Ok(bytes) => bytes,
        Err(_) => {
            tracing::debug!(%method, %uri, "Unknown route (body too large to log)");
            return StatusCode::NOT_FOUND;
        }
    };

    let headers_map: serde_json::Map<String, serde_json::Value> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.to_string(), serde_json::Value::String(v.to_string())))
        })
        .collect();

    // Remote-write bodies are snappy frames; only text is worth printing
    let body = match std::str::from_utf8(&body_bytes) {
        _ if body_bytes.is_empty() => serde_json::Value::Null,
        Ok(text) => serde_json::Value::String(text.to_string()),
        Err(_) => serde_json::Value::String(format!("<binary {} bytes>", body_bytes.len())),
    };

    let entry = serde_json::json!({
        "method": method.to_string(),
        "url": uri.to_string(),
        "headers": headers_map,
        "body": body,
    });
    tracing::debug!(request = %entry, "Unknown route");

    StatusCode::NOT_FOUND
}

//! Prometheus remote-write receiver

mod encoding;
mod write;

pub use encoding::{DecodeError, decode_write_request};

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::post;

use crate::domain::IngestPipeline;

#[derive(Clone)]
pub struct RemoteWriteState {
    pub pipeline: IngestPipeline,
    pub max_decompressed_bytes: usize,
}

/// Route for the write path, with its own body limit
pub fn routes(
    path: &str,
    pipeline: IngestPipeline,
    max_body_bytes: usize,
    max_decompressed_bytes: usize,
) -> Router {
    let state = RemoteWriteState {
        pipeline,
        max_decompressed_bytes,
    };

    Router::new()
        .route(path, post(write::write))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

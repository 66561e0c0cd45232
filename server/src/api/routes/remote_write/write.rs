//! Remote-write endpoint

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use super::RemoteWriteState;
use super::encoding::decode_write_request;
use crate::core::constants::METRIC_WRITE_REQUESTS;

pub async fn write(State(state): State<RemoteWriteState>, body: Bytes) -> Response {
    let request = match decode_write_request(&body, state.max_decompressed_bytes) {
        Ok(req) => req,
        Err(e) => {
            metrics::counter!(METRIC_WRITE_REQUESTS, "outcome" => "bad_request").increment(1);
            return e.into_response();
        }
    };

    match state.pipeline.ingest(&request).await {
        Ok(_) => {
            metrics::counter!(METRIC_WRITE_REQUESTS, "outcome" => "ok").increment(1);
            StatusCode::OK.into_response()
        }
        Err(e) => {
            metrics::counter!(METRIC_WRITE_REQUESTS, "outcome" => "store_error").increment(1);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                e.to_string(),
            )
                .into_response()
        }
    }
}

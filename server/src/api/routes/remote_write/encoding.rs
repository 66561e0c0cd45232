//! Remote-write body decoding
//!
//! Bodies are Snappy block-compressed (not framed) protobuf `WriteRequest`s.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use prost::Message;
use thiserror::Error;

use crate::utils::prompb::WriteRequest;

/// Error returned when a body cannot be turned into a `WriteRequest`
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("snappy: {0}")]
    Decompression(String),

    #[error("proto: {0}")]
    MalformedPayload(String),
}

/// Decompress and decode a remote-write body.
///
/// The length announced in the Snappy header is checked against
/// `max_decompressed_bytes` before anything is allocated.
pub fn decode_write_request(
    body: &[u8],
    max_decompressed_bytes: usize,
) -> Result<WriteRequest, DecodeError> {
    let announced = snap::raw::decompress_len(body)
        .map_err(|e| DecodeError::Decompression(e.to_string()))?;
    if announced > max_decompressed_bytes {
        return Err(DecodeError::Decompression(format!(
            "decompressed size {} exceeds limit of {} bytes",
            announced, max_decompressed_bytes
        )));
    }

    let raw = snap::raw::Decoder::new()
        .decompress_vec(body)
        .map_err(|e| DecodeError::Decompression(e.to_string()))?;

    WriteRequest::decode(raw.as_slice()).map_err(|e| DecodeError::MalformedPayload(e.to_string()))
}

/// 400 with the error text as a plain-text body
impl IntoResponse for DecodeError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self, "Failed to decode remote-write request");

        (
            StatusCode::BAD_REQUEST,
            [(header::CONTENT_TYPE, "text/plain")],
            self.to_string(),
        )
            .into_response()
    }
}

//! Per-request error types.
//!
//! Every error here is confined to one request/response pair; none of them
//! stops the server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response as HttpResponse};
use thiserror::Error;

use crate::http::content_type::ContentType;

/// Errors raised by [`Response`](crate::http::Response) operations.
#[derive(Debug, Error)]
pub enum ResponseError {
    /// The response is complete; nothing can be written anymore.
    #[error("Response already sent")]
    AlreadySent,

    /// Status, headers and cookies are locked once the head is sent.
    #[error("Response head already sent")]
    HeadAlreadySent,

    /// A payload's content type differs from the one locked by the first send.
    #[error("Invalid data type: {found} is not {expected}")]
    TypeMismatch {
        expected: ContentType,
        found: ContentType,
    },

    /// Header name or value is not valid HTTP.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

impl ResponseError {
    /// True for the "already sent" family of contract violations.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, ResponseError::AlreadySent | ResponseError::HeadAlreadySent)
    }
}

/// Errors raised while building a [`Request`](crate::http::Request).
#[derive(Debug, Error)]
pub enum RequestError {
    /// The body could not be read (connection dropped, size limit exceeded).
    #[error("Failed to read request body: {0}")]
    Body(#[source] axum::Error),

    /// The content type promised JSON but the bytes do not decode.
    #[error("Malformed JSON body: {0}")]
    MalformedBody(#[from] serde_json::Error),
}

impl IntoResponse for RequestError {
    fn into_response(self) -> HttpResponse {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_state_family() {
        assert!(ResponseError::AlreadySent.is_invalid_state());
        assert!(ResponseError::HeadAlreadySent.is_invalid_state());
        let mismatch = ResponseError::TypeMismatch {
            expected: ContentType::Text,
            found: ContentType::OctetStream,
        };
        assert!(!mismatch.is_invalid_state());
        assert_eq!(
            mismatch.to_string(),
            "Invalid data type: application/octet-stream is not text/plain; charset=utf-8"
        );
    }

    #[test]
    fn test_malformed_body_is_bad_request() {
        let err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let response = RequestError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

//! Payload content-type detection.

use std::fmt;

use axum::http::HeaderMap;

/// Content types a response body can be locked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Text,
    Json,
    OctetStream,
}

impl ContentType {
    /// Header value for this content type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text/plain; charset=utf-8",
            ContentType::Json => "application/json",
            ContentType::OctetStream => "application/octet-stream",
        }
    }

    /// Classify a textual payload: JSON objects and arrays are JSON,
    /// everything else is plain text.
    pub fn detect_text(text: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(value) if value.is_object() || value.is_array() => ContentType::Json,
            _ => ContentType::Text,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns true if the declared `Content-Type` is JSON (parameters ignored).
pub fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_detect_text() {
        let json = r#"{"object":{"with":["nested",{"properties":true}]},"and":{"numbers":10}}"#;
        assert_eq!(ContentType::detect_text(json), ContentType::Json);
        assert_eq!(ContentType::detect_text("[1, 2]"), ContentType::Json);
        assert_eq!(ContentType::detect_text("not json"), ContentType::Text);
        // Bare scalars are valid JSON but stay plain text
        assert_eq!(ContentType::detect_text("42"), ContentType::Text);
        assert_eq!(ContentType::detect_text("null"), ContentType::Text);
    }

    #[test]
    fn test_is_json_header() {
        let mut headers = HeaderMap::new();
        assert!(!is_json(&headers));

        headers.insert("content-type", HeaderValue::from_static("application/json; charset=utf-8"));
        assert!(is_json(&headers));

        headers.insert("content-type", HeaderValue::from_static("text/plain"));
        assert!(!is_json(&headers));
    }
}

//! Outbound response state machine.
//!
//! # States
//! ```text
//! Open ──send()──▶ HeadSent ──end()──▶ Complete
//!   └───────────────end()──────────────────┘
//! ```
//!
//! # Design Decisions
//! - Status, headers and cookies are mutable only while `Open`
//! - The first `send` locks the content type detected from its payload;
//!   later payloads must match while checking is enabled
//! - Cookies are serialized into `Set-Cookie` lines when the head locks
//! - A response completes at most once: a second `end` is an error
//! - Body writes are buffered and handed to the transport on completion

use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use axum::body::{Body, Bytes};
use axum::http::header::{HeaderName, HeaderValue, CONTENT_TYPE, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use serde_json::Value;

use crate::http::content_type::ContentType;
use crate::http::cookie::{Cookie, CookieAttributes};
use crate::http::error::ResponseError;
use crate::http::request::RequestBody;

/// Lifecycle state of a [`Response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    /// Nothing sent; status and headers may change.
    Open,
    /// Head locked; body may still be written.
    HeadSent,
    /// Terminal; no further writes.
    Complete,
}

/// A body chunk handed to [`Response::send`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Binary(Bytes),
    Json(Value),
    /// JSON already encoded, written verbatim.
    JsonBytes(Bytes),
}

impl Payload {
    /// Content type this payload would lock the response to.
    pub fn content_type(&self) -> ContentType {
        match self {
            Payload::Text(text) => ContentType::detect_text(text),
            Payload::Binary(_) => ContentType::OctetStream,
            Payload::Json(_) | Payload::JsonBytes(_) => ContentType::Json,
        }
    }

    fn into_bytes(self) -> Bytes {
        match self {
            Payload::Text(text) => Bytes::from(text),
            Payload::Binary(bytes) | Payload::JsonBytes(bytes) => bytes,
            Payload::Json(value) => Bytes::from(value.to_string()),
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Payload::Binary(Bytes::copy_from_slice(bytes))
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Binary(Bytes::from(bytes))
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Binary(bytes)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl From<RequestBody> for Payload {
    fn from(body: RequestBody) -> Self {
        match body {
            RequestBody::Raw(bytes) => Payload::Binary(bytes),
            RequestBody::Json { raw, .. } => Payload::JsonBytes(raw),
        }
    }
}

impl From<&RequestBody> for Payload {
    fn from(body: &RequestBody) -> Self {
        Payload::from(body.clone())
    }
}

type OnSent = Box<dyn FnOnce() + Send>;

/// Per-request, single-use output accumulator.
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    cookies: BTreeMap<String, Cookie>,
    state: ResponseState,
    content_type: Option<ContentType>,
    check_content_type: bool,
    body: Vec<u8>,
    sent_at: Option<SystemTime>,
    on_sent: Vec<OnSent>,
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            cookies: BTreeMap::new(),
            state: ResponseState::Open,
            content_type: None,
            check_content_type: true,
            body: Vec::new(),
            sent_at: None,
            on_sent: Vec::new(),
        }
    }

    fn ensure_open(&self) -> Result<(), ResponseError> {
        match self.state {
            ResponseState::Open => Ok(()),
            ResponseState::HeadSent => Err(ResponseError::HeadAlreadySent),
            ResponseState::Complete => Err(ResponseError::AlreadySent),
        }
    }

    pub fn set_status(&mut self, status: StatusCode) -> Result<(), ResponseError> {
        self.ensure_open()?;
        self.status = status;
        Ok(())
    }

    /// Set a header, replacing any previous value.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), ResponseError> {
        self.ensure_open()?;
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ResponseError::InvalidHeader(e.to_string()))?;
        let value =
            HeaderValue::from_str(value).map_err(|e| ResponseError::InvalidHeader(e.to_string()))?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Queue a cookie for the `Set-Cookie` header. Setting the same name
    /// twice keeps the last value.
    pub fn set_cookie(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        attributes: CookieAttributes,
    ) -> Result<(), ResponseError> {
        self.ensure_open()?;
        let name = name.into();
        let cookie = Cookie::new(value, attributes);
        HeaderValue::from_str(&cookie.to_header_value(&name))
            .map_err(|e| ResponseError::InvalidHeader(e.to_string()))?;
        self.cookies.insert(name, cookie);
        Ok(())
    }

    /// Enable or disable the content-type consistency check (on by default).
    pub fn set_content_type_check(&mut self, enabled: bool) {
        self.check_content_type = enabled;
    }

    /// Write a body chunk, locking the head on the first call.
    pub fn send(&mut self, data: impl Into<Payload>) -> Result<(), ResponseError> {
        if self.state == ResponseState::Complete {
            return Err(ResponseError::AlreadySent);
        }

        let payload = data.into();
        let found = payload.content_type();

        if self.state == ResponseState::Open {
            self.content_type = Some(found);
            if !self.headers.contains_key(CONTENT_TYPE) {
                self.headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static(found.as_str()));
            }
            self.write_head();
        }

        if self.check_content_type {
            if let Some(expected) = self.content_type {
                if expected != found {
                    return Err(ResponseError::TypeMismatch { expected, found });
                }
            }
        }

        self.body.extend_from_slice(&payload.into_bytes());
        Ok(())
    }

    /// Complete the response and run the `on_sent` callbacks.
    pub fn end(&mut self) -> Result<(), ResponseError> {
        if self.state == ResponseState::Complete {
            return Err(ResponseError::AlreadySent);
        }
        if self.state == ResponseState::Open {
            self.write_head();
        }

        self.state = ResponseState::Complete;
        self.sent_at = Some(SystemTime::now());
        for callback in self.on_sent.drain(..) {
            callback();
        }
        Ok(())
    }

    /// Send a final payload, then complete.
    pub fn end_with(&mut self, data: impl Into<Payload>) -> Result<(), ResponseError> {
        self.send(data)?;
        self.end()
    }

    /// Register a callback to run when the response completes.
    pub fn on_sent(&mut self, callback: impl FnOnce() + Send + 'static) {
        self.on_sent.push(Box::new(callback));
    }

    fn write_head(&mut self) {
        for (name, cookie) in &self.cookies {
            if let Ok(value) = HeaderValue::from_str(&cookie.to_header_value(name)) {
                self.headers.append(SET_COOKIE, value);
            }
        }
        self.state = ResponseState::HeadSent;
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn cookies(&self) -> &BTreeMap<String, Cookie> {
        &self.cookies
    }

    pub fn state(&self) -> ResponseState {
        self.state
    }

    pub fn is_head_sent(&self) -> bool {
        self.state != ResponseState::Open
    }

    pub fn is_complete(&self) -> bool {
        self.state == ResponseState::Complete
    }

    /// Content type locked by the first `send`.
    pub fn content_type(&self) -> Option<ContentType> {
        self.content_type
    }

    /// Body bytes written so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// When the response completed.
    pub fn sent_at(&self) -> Option<SystemTime> {
        self.sent_at
    }

    /// Complete the response if no handler did, keeping its current state.
    pub(crate) fn finalize(&mut self) {
        if !self.is_complete() {
            let _ = self.end();
        }
    }

    /// Finalize and hand the response to the transport.
    pub fn into_http(mut self) -> axum::response::Response {
        self.finalize();
        let mut response = axum::response::Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("state", &self.state)
            .field("content_type", &self.content_type)
            .field("body_len", &self.body.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_defaults() {
        let res = Response::new();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.state(), ResponseState::Open);
        assert!(res.body().is_empty());
        assert!(res.sent_at().is_none());
    }

    #[test]
    fn test_send_locks_head() {
        let mut res = Response::new();
        res.set_status(StatusCode::CREATED).unwrap();
        res.send("hello").unwrap();

        assert_eq!(res.state(), ResponseState::HeadSent);
        assert_eq!(res.content_type(), Some(ContentType::Text));
        assert_eq!(res.headers()["content-type"], "text/plain; charset=utf-8");

        let err = res.set_header("x-late", "1").unwrap_err();
        assert!(matches!(err, ResponseError::HeadAlreadySent));
        assert!(res.set_status(StatusCode::OK).unwrap_err().is_invalid_state());
        assert!(res
            .set_cookie("a", "b", CookieAttributes::default())
            .unwrap_err()
            .is_invalid_state());
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    #[test]
    fn test_detected_content_types() {
        let mut json = Response::new();
        json.send(r#"{"a":1}"#).unwrap();
        assert_eq!(json.content_type(), Some(ContentType::Json));

        let mut binary = Response::new();
        binary.send(vec![0u8, 159, 146, 150]).unwrap();
        assert_eq!(binary.headers()["content-type"], "application/octet-stream");

        let mut value = Response::new();
        value.send(serde_json::json!({"b": [1, 2]})).unwrap();
        assert_eq!(value.body(), br#"{"b":[1,2]}"#);
    }

    #[test]
    fn test_json_request_body_is_sent_verbatim() {
        let raw = Bytes::from_static(b"{\"a\": 1, \"b\": 1.50}");
        let body = RequestBody::Json {
            value: serde_json::from_slice(&raw).unwrap(),
            raw: raw.clone(),
        };

        let mut res = Response::new();
        res.end_with(&body).unwrap();
        assert_eq!(res.content_type(), Some(ContentType::Json));
        assert_eq!(res.body(), &raw[..]);
    }

    #[test]
    fn test_type_mismatch() {
        let mut res = Response::new();
        res.send("text first").unwrap();
        let err = res.send(Bytes::from_static(b"\x00\x01")).unwrap_err();
        assert!(matches!(
            err,
            ResponseError::TypeMismatch {
                expected: ContentType::Text,
                found: ContentType::OctetStream,
            }
        ));
        assert_eq!(res.body(), b"text first");
    }

    #[test]
    fn test_type_check_can_be_disabled() {
        let mut res = Response::new();
        res.set_content_type_check(false);
        res.send("Here is the body of your request : \n").unwrap();
        res.send(r#"{"a":1}"#).unwrap();
        assert_eq!(res.content_type(), Some(ContentType::Text));
    }

    #[test]
    fn test_explicit_content_type_is_kept() {
        let mut res = Response::new();
        res.set_header("Content-Type", "text/html").unwrap();
        res.send("<p>hi</p>").unwrap();
        assert_eq!(res.headers()["content-type"], "text/html");
        assert_eq!(res.content_type(), Some(ContentType::Text));
    }

    #[test]
    fn test_end_completes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut res = Response::new();
        res.on_sent(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        res.end_with("bye").unwrap();

        assert!(res.is_complete());
        assert!(res.sent_at().is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(matches!(res.end(), Err(ResponseError::AlreadySent)));
        assert!(matches!(res.send("more"), Err(ResponseError::AlreadySent)));
        assert!(matches!(
            res.set_header("x", "y"),
            Err(ResponseError::AlreadySent)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cookies_serialized_on_head() {
        let mut res = Response::new();
        res.set_cookie(
            "token",
            "s3cret",
            CookieAttributes {
                secure: true,
                http_only: true,
                max_age: Some(10000),
            },
        )
        .unwrap();
        res.set_cookie("theme", "dark", CookieAttributes::default())
            .unwrap();
        res.end().unwrap();

        let set_cookie: Vec<_> = res
            .headers()
            .get_all("set-cookie")
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(
            set_cookie,
            vec![
                "theme=dark".to_string(),
                "token=s3cret; Secure; Http-Only; Max-Age=10000".to_string(),
            ]
        );
    }

    #[test]
    fn test_invalid_header_rejected() {
        let mut res = Response::new();
        assert!(matches!(
            res.set_header("bad header", "x"),
            Err(ResponseError::InvalidHeader(_))
        ));
        assert!(matches!(
            res.set_cookie("c", "line\nbreak", CookieAttributes::default()),
            Err(ResponseError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_into_http_finalizes() {
        let mut res = Response::new();
        res.set_status(StatusCode::ACCEPTED).unwrap();
        res.set_header("x-trace", "abc").unwrap();

        let http = res.into_http();
        assert_eq!(http.status(), StatusCode::ACCEPTED);
        assert_eq!(http.headers()["x-trace"], "abc");
    }
}

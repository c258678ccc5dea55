//! Inbound request state.
//!
//! # Responsibilities
//! - Parse method, URI, headers, query and cookies eagerly
//! - Read and decode the body on demand (the only suspension point)
//! - Carry path parameters and a typed side channel through dispatch
//!
//! # Design Decisions
//! - Body construction is idempotent
//! - A JSON content type decodes the body into a `serde_json::Value`;
//!   anything else stays raw bytes
//! - Middleware communicates through `http::Extensions` (keyed by type)

use std::collections::HashMap;

use axum::body::{Body, Bytes};
use axum::http::{header, Extensions, HeaderMap, Method, Uri};
use serde_json::Value;

use crate::http::content_type;
use crate::http::cookie::parse_cookie_header;
use crate::http::error::RequestError;

/// Header carrying the per-request id assigned by the server.
pub const X_REQUEST_ID: &str = "x-request-id";

/// A request body after it has been received.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Raw(Bytes),
    /// Decoded JSON plus the bytes it was decoded from.
    Json { value: Value, raw: Bytes },
}

impl RequestBody {
    /// Body bytes exactly as received.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            RequestBody::Raw(bytes) | RequestBody::Json { raw: bytes, .. } => bytes.clone(),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            RequestBody::Json { value, .. } => Some(value),
            RequestBody::Raw(_) => None,
        }
    }

    /// The raw body as UTF-8 text, if it is raw and valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        match self {
            RequestBody::Raw(bytes) => std::str::from_utf8(bytes).ok(),
            RequestBody::Json { .. } => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RequestBody::Raw(bytes) if bytes.is_empty())
    }
}

impl Default for RequestBody {
    fn default() -> Self {
        RequestBody::Raw(Bytes::new())
    }
}

/// Per-request, single-use input to dispatch.
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    cookies: HashMap<String, String>,
    params: HashMap<String, String>,
    extensions: Extensions,
    body: RequestBody,
    pending_body: Option<Body>,
    body_built: bool,
}

impl Request {
    /// Parse the head of an incoming request. The body stays unread until
    /// [`Request::build_body`] is called.
    pub fn new(request: axum::http::Request<Body>) -> Self {
        let (parts, body) = request.into_parts();

        let cookies = parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(parse_cookie_header)
            .collect();

        let query = parts
            .uri
            .query()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            query,
            cookies,
            params: HashMap::new(),
            extensions: parts.extensions,
            body: RequestBody::default(),
            pending_body: Some(body),
            body_built: false,
        }
    }

    /// Receive the full body (at most `limit` bytes) and decode it.
    ///
    /// A second call is a no-op. Fails without hanging if the connection
    /// closes mid-body.
    pub async fn build_body(&mut self, limit: usize) -> Result<(), RequestError> {
        if self.body_built {
            return Ok(());
        }

        let bytes = match self.pending_body.take() {
            Some(body) => axum::body::to_bytes(body, limit)
                .await
                .map_err(RequestError::Body)?,
            None => Bytes::new(),
        };

        self.body = if content_type::is_json(&self.headers) && !bytes.is_empty() {
            RequestBody::Json {
                value: serde_json::from_slice(&bytes)?,
                raw: bytes,
            }
        } else {
            RequestBody::Raw(bytes)
        };
        self.body_built = true;
        Ok(())
    }

    pub fn is_body_built(&self) -> bool {
        self.body_built
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Path component of the URI (still percent-encoded).
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Request id assigned by the server's request-id layer.
    pub fn id(&self) -> Option<&str> {
        self.header(X_REQUEST_ID)
    }

    /// First value of a query parameter.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Parameters bound by the route currently running.
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    /// Typed values stashed by earlier middleware.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(builder: axum::http::request::Builder, body: &'static str) -> Request {
        Request::new(builder.body(Body::from(body)).unwrap())
    }

    #[test]
    fn test_head_is_parsed_eagerly() {
        let req = request(
            axum::http::Request::builder()
                .method("PATCH")
                .uri("/api/users/7?sort=desc&tag=a%20b&tag=c")
                .header("cookie", "name=value; token=12345"),
            "",
        );

        assert_eq!(req.method(), Method::PATCH);
        assert_eq!(req.path(), "/api/users/7");
        assert_eq!(req.query("sort"), Some("desc"));
        assert_eq!(req.query("tag"), Some("a b"));
        assert_eq!(req.query_pairs().len(), 3);
        assert_eq!(req.cookie("token"), Some("12345"));
        assert_eq!(req.cookie("name"), Some("value"));
        assert!(!req.is_body_built());
        assert!(req.params().is_empty());
    }

    #[test]
    fn test_missing_cookie_header() {
        let req = request(axum::http::Request::builder().uri("/"), "");
        assert!(req.cookies().is_empty());
        assert_eq!(req.id(), None);
    }

    #[tokio::test]
    async fn test_json_body_is_decoded() {
        let mut req = request(
            axum::http::Request::builder()
                .method("POST")
                .uri("/echo")
                .header("content-type", "application/json"),
            r#"{"some":"test","data":123}"#,
        );

        req.build_body(1024).await.unwrap();
        let json = req.body().as_json().unwrap();
        assert_eq!(json["some"], "test");
        assert_eq!(json["data"], 123);
        assert_eq!(&req.body().to_bytes()[..], br#"{"some":"test","data":123}"#);
    }

    #[tokio::test]
    async fn test_json_body_keeps_received_bytes() {
        let mut req = request(
            axum::http::Request::builder()
                .method("POST")
                .header("content-type", "application/json; charset=utf-8"),
            "{\n  \"a\": 1,\n  \"b\": 1.50\n}",
        );

        req.build_body(1024).await.unwrap();
        assert_eq!(req.body().as_json().unwrap()["a"], 1);
        assert_eq!(&req.body().to_bytes()[..], b"{\n  \"a\": 1,\n  \"b\": 1.50\n}");
    }

    #[tokio::test]
    async fn test_other_bodies_stay_raw() {
        let mut req = request(
            axum::http::Request::builder().method("POST").uri("/body"),
            r#"{"looks":"like json"}"#,
        );

        req.build_body(1024).await.unwrap();
        assert_eq!(req.body().text(), Some(r#"{"looks":"like json"}"#));
        assert!(req.body().as_json().is_none());
    }

    #[tokio::test]
    async fn test_build_body_is_idempotent() {
        let mut req = request(axum::http::Request::builder().method("POST"), "hello");
        req.build_body(1024).await.unwrap();
        req.build_body(1024).await.unwrap();
        assert_eq!(req.body().text(), Some("hello"));
    }

    #[tokio::test]
    async fn test_malformed_json_fails() {
        let mut req = request(
            axum::http::Request::builder()
                .method("POST")
                .header("content-type", "application/json"),
            "{not json",
        );

        let err = req.build_body(1024).await.unwrap_err();
        assert!(matches!(err, RequestError::MalformedBody(_)));
    }

    #[tokio::test]
    async fn test_body_limit() {
        let mut req = request(axum::http::Request::builder().method("POST"), "0123456789");
        let err = req.build_body(4).await.unwrap_err();
        assert!(matches!(err, RequestError::Body(_)));
    }

    #[test]
    fn test_extensions_side_channel() {
        #[derive(Clone, Debug, PartialEq)]
        struct ReceivedAt(u64);

        let mut req = request(axum::http::Request::builder(), "");
        req.extensions_mut().insert(ReceivedAt(42));
        assert_eq!(req.extensions().get::<ReceivedAt>(), Some(&ReceivedAt(42)));
    }
}

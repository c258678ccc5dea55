//! A single (method, pattern, handler) binding.

use std::fmt;
use std::sync::Arc;

use axum::http::Method;

use crate::http::{Request, Response, ResponseError};
use crate::routing::matcher::PathPattern;

/// Method a route or router is registered for.
///
/// `Any` is a pattern-side wildcard; requests always carry a concrete
/// method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
    Any,
}

impl HttpMethod {
    /// Returns true if a route registered for `self` serves `method`.
    pub fn accepts(&self, method: &Method) -> bool {
        match self {
            HttpMethod::Get => method == Method::GET,
            HttpMethod::Post => method == Method::POST,
            HttpMethod::Patch => method == Method::PATCH,
            HttpMethod::Delete => method == Method::DELETE,
            HttpMethod::Any => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Any => "ANY",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Control signal returned by every handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// Continue with the next matching route or router.
    Next,
    /// The response is final; stop dispatch.
    Done,
    /// Unrecoverable handler failure; stops dispatch like `Done`.
    Error,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Next)
    }
}

/// Result of running a handler. `Err` means a response contract violation.
pub type HandlerResult = Result<RequestStatus, ResponseError>;

/// Shared handler function.
pub type Handler = Arc<dyn Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync>;

/// A registered route. Immutable once registered.
#[derive(Clone)]
pub struct Route {
    pattern: PathPattern,
    method: HttpMethod,
    handler: Handler,
}

impl Route {
    pub fn new<F>(method: HttpMethod, pattern: &str, handler: F) -> Self
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        Self::from_handler(method, pattern, Arc::new(handler))
    }

    pub fn from_handler(method: HttpMethod, pattern: &str, handler: Handler) -> Self {
        Self {
            pattern: PathPattern::parse(pattern),
            method,
            handler,
        }
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Path and method both match.
    pub fn matches(&self, path: &str, method: &Method) -> bool {
        self.method.accepts(method) && self.pattern.matches(path)
    }

    pub fn call(&self, request: &mut Request, response: &mut Response) -> HandlerResult {
        (self.handler)(request, response)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

//! Minimal HTTP routing server library.
//!
//! Handlers are synchronous functions over a mutable request/response pair
//! that return a [`RequestStatus`]. Routers nest by path prefix, and
//! dispatch walks the tree in registration order.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::ServerConfig;
pub use http::{
    ContentType, CookieAttributes, Payload, Request, RequestBody, Response, ResponseError, Server,
    ServerError, ServerHandle,
};
pub use lifecycle::Shutdown;
pub use routing::{HandlerResult, HttpMethod, RequestStatus, Router};

//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net::listener)
//!     → server.rs (hyper connection, axum service, tower-http layers)
//!     → request.rs (parse head, read and decode body)
//!     → [routing::RouteTable::dispatch runs handlers]
//!     → response.rs (state machine, cookies, content type lock)
//!     → Send to client
//! ```

pub mod content_type;
pub mod cookie;
pub mod error;
pub mod request;
pub mod response;
pub mod server;

pub use content_type::ContentType;
pub use cookie::{Cookie, CookieAttributes};
pub use error::{RequestError, ResponseError};
pub use request::{Request, RequestBody, X_REQUEST_ID};
pub use response::{Payload, Response, ResponseState};
pub use server::{Server, ServerError, ServerHandle};

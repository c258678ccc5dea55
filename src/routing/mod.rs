//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route registration (at startup):
//!     Router::get/post/patch/delete/any/mount
//!     → matcher.rs (parse patterns once)
//!     → router.rs (RouteTable::compile freezes the tree into an arena)
//!
//! Incoming request (path, method):
//!     → router.rs (walk nodes, run matching routes in order)
//!     → matcher.rs (match, bind params, strip consumed prefix)
//!     → Return: Next / Done / Error, or a 404 written to the response
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in the hot path (segment comparison only)
//! - Deterministic: registration order decides
//! - Control flow is an explicit `RequestStatus` return value

pub mod matcher;
pub mod route;
pub mod router;

pub use matcher::PathPattern;
pub use route::{Handler, HandlerResult, HttpMethod, RequestStatus, Route};
pub use router::{RouteTable, Router, NOT_FOUND_BODY};

//! Router construction and dispatch.
//!
//! # Responsibilities
//! - Collect routes and nested routers at startup (`Router`)
//! - Freeze the tree into an index-addressed arena (`RouteTable`)
//! - Walk the arena for each request, running matched handlers in order
//!
//! # Design Decisions
//! - Immutable after compilation (shared across requests without locks)
//! - Routers are mounted by value, so the tree can never contain a cycle
//! - Registration order is authoritative; the first `Done`/`Error` wins
//! - Every unmatched path ends in a 404, at any depth
//! - Handlers inside a mounted router see paths relative to the mount point

use axum::http::{Method, StatusCode};
use tracing::{debug, info, trace};

use crate::http::{Request, Response};
use crate::routing::matcher::{normalize_path, PathPattern};
use crate::routing::route::{HandlerResult, HttpMethod, RequestStatus, Route};

/// Body of the automatic 404 response.
pub const NOT_FOUND_BODY: &str = "404 Not Found: the requested page could not be found";

/// A composable collection of routes and nested routers.
#[derive(Debug)]
pub struct Router {
    method: HttpMethod,
    routes: Vec<Route>,
    children: Vec<(PathPattern, Router)>,
}

impl Router {
    /// Create a router reachable with any request method.
    pub fn new() -> Self {
        Self::with_method(HttpMethod::Any)
    }

    /// Create a router that is only entered for requests of `method`.
    pub fn with_method(method: HttpMethod) -> Self {
        Self {
            method,
            routes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Register a handler for `method` and `pattern`.
    pub fn route<F>(&mut self, method: HttpMethod, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.routes.push(Route::new(method, pattern, handler));
        self
    }

    pub fn get<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.route(HttpMethod::Get, pattern, handler)
    }

    pub fn post<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.route(HttpMethod::Post, pattern, handler)
    }

    pub fn patch<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.route(HttpMethod::Patch, pattern, handler)
    }

    pub fn delete<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.route(HttpMethod::Delete, pattern, handler)
    }

    /// Register a handler for every method. Returning `Next` makes it
    /// middleware; returning `Done`/`Error` makes it terminal.
    pub fn any<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.route(HttpMethod::Any, pattern, handler)
    }

    /// Mount `router` under `prefix`. The router is moved in, so it can only
    /// ever have one parent.
    pub fn mount(&mut self, prefix: &str, router: Router) -> &mut Self {
        self.children.push((PathPattern::parse(prefix), router));
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Number of routes in this router and all mounted routers.
    pub fn route_count(&self) -> usize {
        self.routes.len()
            + self
                .children
                .iter()
                .map(|(_, child)| child.route_count())
                .sum::<usize>()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// Index of a node in a [`RouteTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

#[derive(Debug)]
struct Node {
    /// Mount prefix; `None` for the root.
    prefix: Option<PathPattern>,
    method: HttpMethod,
    routes: Vec<Route>,
    children: Vec<NodeId>,
}

/// Compiled, read-only routing tree.
#[derive(Debug)]
pub struct RouteTable {
    nodes: Vec<Node>,
}

impl RouteTable {
    pub const ROOT: NodeId = NodeId(0);

    /// Freeze a router tree into an arena.
    pub fn compile(root: Router) -> Self {
        let route_count = root.route_count();
        let mut nodes = Vec::new();
        Self::push_node(&mut nodes, None, root);

        info!(
            routers = nodes.len(),
            routes = route_count,
            "Routing table compiled"
        );
        Self { nodes }
    }

    fn push_node(nodes: &mut Vec<Node>, prefix: Option<PathPattern>, router: Router) -> NodeId {
        let id = NodeId(nodes.len());
        nodes.push(Node {
            prefix,
            method: router.method,
            routes: router.routes,
            children: Vec::new(),
        });

        let children = router
            .children
            .into_iter()
            .map(|(prefix, child)| Self::push_node(nodes, Some(prefix), child))
            .collect();
        nodes[id.0].children = children;
        id
    }

    /// Number of routers in the tree, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Run the handlers matching `path` against `request`, starting at the root.
    ///
    /// At each level the matching routes run in registration order with
    /// their own parameters bound. A terminal status returns immediately.
    /// Otherwise dispatch descends into the first child router whose prefix
    /// matches; if there is none, a 404 is written. When routes ran, the
    /// child sees the path minus the last matching route's pattern (its own
    /// prefix stays in place); when none ran, it sees the path minus its
    /// mount prefix.
    pub fn dispatch(&self, path: &str, request: &mut Request, response: &mut Response) -> HandlerResult {
        let method = request.method().clone();
        let mut current = normalize_path(path).into_owned();
        let mut node_id = Self::ROOT;

        loop {
            let node = &self.nodes[node_id.0];
            let mut last_matched: Option<&Route> = None;

            for route in node.routes.iter().filter(|r| r.matches(&current, &method)) {
                request.set_params(route.pattern().params(&current));
                let status = route.call(request, response)?;
                trace!(
                    method = %route.method(),
                    pattern = %route.pattern(),
                    path = %current,
                    status = ?status,
                    "Route handled"
                );
                if status.is_terminal() {
                    return Ok(status);
                }
                last_matched = Some(route);
            }

            if let Some(route) = last_matched {
                current = route.pattern().strip(&current);
            }

            let Some(child_id) = self.find_child(node, &current, &method) else {
                return Self::not_found(&current, response);
            };
            // Only a level where no route ran hands the child its mount-relative path.
            if last_matched.is_none() {
                if let Some(prefix) = &self.nodes[child_id.0].prefix {
                    current = prefix.strip(&current);
                }
            }
            node_id = child_id;
        }
    }

    fn find_child(&self, node: &Node, path: &str, method: &Method) -> Option<NodeId> {
        node.children.iter().copied().find(|id| {
            let child = &self.nodes[id.0];
            child.method.accepts(method)
                && child
                    .prefix
                    .as_ref()
                    .map(|prefix| prefix.matches(path))
                    .unwrap_or(false)
        })
    }

    fn not_found(path: &str, response: &mut Response) -> HandlerResult {
        debug!(path = %path, "No route matched");
        response.set_status(StatusCode::NOT_FOUND)?;
        response.end_with(NOT_FOUND_BODY)?;
        Ok(RequestStatus::Done)
    }
}

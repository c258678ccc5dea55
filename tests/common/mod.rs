//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use http_box::{Request, RequestStatus, Response, Router, Server, ServerConfig, ServerHandle};
use http_box::routing::HandlerResult;

/// Config bound to an ephemeral local port.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config
}

/// Start `server` and return its handle.
pub async fn spawn(server: Server) -> ServerHandle {
    server.start(|_| {}).await.unwrap()
}

/// Client without connection pooling or system proxies.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{}{}", addr, path)
}

/// Milliseconds since the epoch, stashed by [`stamp`].
#[derive(Debug, Clone, Copy)]
pub struct ReceivedAt(pub u128);

#[allow(dead_code)]
pub fn stamp(req: &mut Request, _res: &mut Response) -> HandlerResult {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis();
    req.extensions_mut().insert(ReceivedAt(millis));
    Ok(RequestStatus::Next)
}

/// The demo tree: an api router with timestamp middleware, a welcome
/// page and a JSON echo.
#[allow(dead_code)]
pub fn demo_server() -> Server {
    let mut api = Router::new();
    api.any("/time", stamp);
    api.get("/time/:id", |req, res| {
        let at = req.extensions().get::<ReceivedAt>().map(|r| r.0).unwrap_or(0);
        res.end_with(format!("{} received at {}", req.param("id").unwrap_or("?"), at))?;
        Ok(RequestStatus::Done)
    });
    api.get("/", |_, res| {
        res.end_with("This is the root of the api")?;
        Ok(RequestStatus::Done)
    });
    api.post("/body", |req, res| {
        // The echoed body may be any shape; the text intro locks the type.
        res.set_content_type_check(false);
        res.send("Here is the body of your request : \n")?;
        res.end_with(req.body())?;
        Ok(RequestStatus::Done)
    });

    let mut server = Server::new(test_config());
    server.mount("/api", api);
    server.get("/", |_, res| {
        res.end_with("Welcome on website")?;
        Ok(RequestStatus::Done)
    });
    server.post("/echo", |req, res| {
        res.end_with(req.body())?;
        Ok(RequestStatus::Done)
    });
    server
}

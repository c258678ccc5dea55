//! http-box demo server.
//!
//! ```text
//! GET  /              welcome page
//! POST /echo          echoes the request body
//! GET  /api/          api root
//! GET  /api/time/:id  arrival time stamped by middleware
//! POST /api/body      describes the request body
//! ```

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use http_box::config::{load_config, validate_config, ConfigError, ServerConfig};
use http_box::lifecycle::signals::shutdown_signal;
use http_box::observability::{logging, metrics};
use http_box::{Request, RequestStatus, Response, Router, Server};
use http_box::routing::HandlerResult;

#[derive(Parser, Debug)]
#[command(name = "http-box", version, about = "Minimal HTTP routing server")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

/// Arrival time stashed by the timestamp middleware.
#[derive(Debug, Clone, Copy)]
struct ReceivedAt(SystemTime);

fn stamp_arrival(req: &mut Request, _res: &mut Response) -> HandlerResult {
    req.extensions_mut().insert(ReceivedAt(SystemTime::now()));
    Ok(RequestStatus::Next)
}

fn api_router() -> Router {
    let mut api = Router::new();

    api.any("/time", stamp_arrival);

    api.get("/time/:id", |req, res| {
        let millis = req
            .extensions()
            .get::<ReceivedAt>()
            .and_then(|at| at.0.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis())
            .unwrap_or_default();
        tracing::info!(id = req.param("id").unwrap_or_default(), "Time requested");
        res.end_with(format!("Received at {millis}"))?;
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

    api
}

fn load(cli: &Cli) -> Result<ServerConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
        validate_config(&config).map_err(ConfigError::Validation)?;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load(&cli)?;

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "http-box starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut server = Server::new(config);
    server.mount("/api", api_router());
    server.get("/", |_, res| {
        res.end_with("Welcome on website")?;
        Ok(RequestStatus::Done)
    });
    server.post("/echo", |req, res| {
        res.end_with(req.body())?;
        Ok(RequestStatus::Done)
    });

    let handle = server
        .start(|addr| tracing::info!(address = %addr, "Server started"))
        .await?;

    shutdown_signal().await;
    handle.close().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

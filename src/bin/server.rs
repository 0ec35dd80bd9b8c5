//! sysmcp server binary.
//!
//! Builds the capability registry and starts the configured transport:
//! stdio (default; the MCP client spawns and owns this process) or SSE
//! (standalone service; clients connect to it).
//!
//! # Environment Variables
//!
//! - `SYSMCP_CONFIG` — Path to a YAML configuration file (optional)
//! - `SYSMCP_TRANSPORT` — "stdio" (default) or "sse"
//! - `SYSMCP_HOST` — Bind host for the SSE transport (default: 127.0.0.1)
//! - `PORT` — Bind port for the SSE transport (default: 8000)
//! - `RUST_LOG` — Tracing filter (default: "info")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin server
//! # or as a standalone SSE service:
//! SYSMCP_TRANSPORT=sse PORT=8000 cargo run --bin server
//! ```

use std::path::PathBuf;

use sysmcp::protocol::ServerIdentity;
use sysmcp::transport::{SseServer, StdioServer};
use sysmcp::{system, Dispatcher, ServerConfig, TransportKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing. Everything goes to stderr: on the stdio
    // transport, stdout carries protocol frames and nothing else.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sysmcp=debug".into()),
        )
        .init();

    let config_path = std::env::var("SYSMCP_CONFIG").ok().map(PathBuf::from);
    let config = ServerConfig::load(config_path.as_deref())?;

    // Registration-time failures are programming errors; abort startup.
    let registry = system::build_registry(&config)
        .map_err(|e| anyhow::anyhow!("capability registration failed: {}", e))?;
    tracing::info!("registered {} capabilities", registry.len());

    let dispatcher = Dispatcher::new(std::sync::Arc::new(registry));
    let identity = ServerIdentity {
        name: config.name.clone(),
        version: sysmcp::VERSION.to_string(),
    };

    match config.transport {
        TransportKind::Stdio => {
            tracing::info!("starting stdio transport");
            StdioServer::new(dispatcher, identity).serve().await
        }
        TransportKind::Sse => {
            let bind_addr = config.bind_addr();
            tracing::info!("starting sse transport on {}", bind_addr);
            tracing::info!("Endpoints:");
            tracing::info!("  GET  /health            — liveness probe");
            tracing::info!("  GET  /sse               — open a session event stream");
            tracing::info!("  POST /messages/:session — send a request to a session");
            SseServer::new(dispatcher, identity, bind_addr).serve().await
        }
    }
}

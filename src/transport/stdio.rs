//! Stdio transport — a single duplex stream over stdin/stdout.
//!
//! The client owns this process: it spawns the server, writes one
//! newline-delimited JSON-RPC frame at a time to stdin, and reads response
//! frames from stdout. There is exactly one session, created at startup
//! and ended by EOF; requests are dispatched strictly in arrival order, so
//! responses can never be reordered within the session.
//!
//! stdout is the wire. All logging goes through `log`, whose backend is
//! configured to write to stderr.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::dispatch::Dispatcher;
use crate::protocol::{self, RpcRequest, ServerIdentity};
use crate::session::Session;
use crate::transport::TransportKind;

/// The duplex-stream binding.
pub struct StdioServer {
    dispatcher: Dispatcher,
    identity: ServerIdentity,
}

impl StdioServer {
    pub fn new(dispatcher: Dispatcher, identity: ServerIdentity) -> Self {
        Self {
            dispatcher,
            identity,
        }
    }

    /// Serve until stdin reaches EOF.
    pub async fn serve(self) -> Result<(), anyhow::Error> {
        let session = Session::new(TransportKind::Stdio);
        log::info!("stdio transport ready (session {})", session.id);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        while let Some(line) = lines.next_line().await? {
            if let Some(frame) = self.handle_line(&session, &line).await {
                stdout.write_all(frame.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }

        log::info!("stdin closed, ending session {}", session.id);
        Ok(())
    }

    /// Process one inbound line; returns the serialized response frame, or
    /// `None` for blank lines and notifications.
    async fn handle_line(&self, session: &Session, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let value: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("unparseable frame: {}", e);
                return Some(protocol::parse_error_frame().to_string());
            }
        };

        let rpc: RpcRequest = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("malformed request frame: {}", e);
                return Some(
                    protocol::error_frame(&serde_json::Value::Null, -32600, "Invalid Request")
                        .to_string(),
                );
            }
        };

        protocol::handle_rpc(&self.dispatcher, session, &self.identity, rpc)
            .await
            .map(|frame| frame.to_string())
    }
}

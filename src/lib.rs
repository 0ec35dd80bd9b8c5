//! # sysmcp
//!
//! An MCP (Model Context Protocol) server that exposes local-machine
//! capabilities to AI agent clients: callable **tools**, readable
//! **resources**, and parameterized **prompts**. The agent process never
//! touches the machine directly — it sends protocol requests here, and
//! this server performs the privileged operations (guarded subprocess
//! calls, file reads) and returns structured, validated results.
//!
//! Two transport bindings share one dispatcher: a stdio duplex stream
//! (the client owns the process) and an SSE service (the server outlives
//! its clients, one session per connection).

pub mod capability;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod exec;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod system;
pub mod transport;
pub mod uri;
pub mod validate;

pub use capability::{CapabilityDescriptor, CapabilityKind, Message, Role};
pub use config::ServerConfig;
pub use dispatch::{Dispatcher, Request, Response};
pub use error::ServerError;
pub use exec::{CommandRunner, ExitPolicy};
pub use registry::{CapabilityRegistry, RegistryBuilder};
pub use session::Session;
pub use transport::{SseServer, StdioServer, TransportKind};

/// Crate version reported in the protocol handshake.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

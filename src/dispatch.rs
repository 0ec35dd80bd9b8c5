//! Request dispatcher — resolves, validates, executes, and encodes every
//! protocol request, independent of the transport that carried it.
//!
//! Each request moves through Resolving (registry lookup or URI match),
//! Validating (schema check, then capability rules), Executing (handler
//! invocation, panic-isolated), and Encoding (typed response). Failures at
//! any stage become a typed [`ServerError`]; nothing a handler does can
//! terminate the session or the process.
//!
//! The dispatcher holds no per-request state, so one instance serves any
//! number of concurrent sessions over the shared immutable registry.

use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;

use crate::capability::{Arguments, CapabilityKind, CapabilityOutput, Message};
use crate::error::ServerError;
use crate::registry::CapabilityRegistry;
use crate::session::Session;
use crate::validate::{check_arguments, ValidationRule};

// ---------------------------------------------------------------------------
// Request / Response
// ---------------------------------------------------------------------------

/// One decoded protocol request.
#[derive(Debug, Clone)]
pub struct Request {
    pub kind: RequestKind,
    pub arguments: Arguments,
}

/// The operations a client can ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// List capabilities of one kind.
    ListCapabilities(CapabilityKind),
    /// Invoke a tool by exact name.
    CallTool { name: String },
    /// Read a resource by URI.
    ReadResource { uri: String },
    /// Expand a prompt by exact name.
    GetPrompt { name: String },
}

impl Request {
    pub fn list(kind: CapabilityKind) -> Self {
        Self {
            kind: RequestKind::ListCapabilities(kind),
            arguments: Arguments::new(),
        }
    }

    pub fn call_tool(name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            kind: RequestKind::CallTool { name: name.into() },
            arguments,
        }
    }

    pub fn read_resource(uri: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::ReadResource { uri: uri.into() },
            arguments: Arguments::new(),
        }
    }

    pub fn get_prompt(name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            kind: RequestKind::GetPrompt { name: name.into() },
            arguments,
        }
    }
}

/// One entry in a capability listing.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityListing {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// Successful dispatch result, shaped by the request.
#[derive(Debug, Clone)]
pub enum Response {
    /// Ordered capability listing for a `ListCapabilities` request.
    Capabilities(Vec<CapabilityListing>),
    /// Text payload from a tool call or resource read.
    Payload(String),
    /// Expanded conversation from a prompt request.
    Messages(Vec<Message>),
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Transport-agnostic request dispatcher over a frozen registry.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<CapabilityRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Dispatch one request for a session.
    ///
    /// # Errors
    ///
    /// Every failure is one of the request-time [`ServerError`] variants;
    /// the caller encodes it as an error response and keeps the session
    /// alive.
    pub async fn dispatch(
        &self,
        session: &Session,
        request: Request,
    ) -> Result<Response, ServerError> {
        match request.kind {
            RequestKind::ListCapabilities(kind) => Ok(self.list(kind)),
            RequestKind::CallTool { name } => {
                self.invoke(session, CapabilityKind::Tool, &name, request.arguments)
                    .await
            }
            RequestKind::GetPrompt { name } => {
                self.invoke(session, CapabilityKind::Prompt, &name, request.arguments)
                    .await
            }
            RequestKind::ReadResource { uri } => self.read_resource(session, &uri).await,
        }
    }

    fn list(&self, kind: CapabilityKind) -> Response {
        let listings = self
            .registry
            .list(kind)
            .map(|d| CapabilityListing {
                name: d.name.clone(),
                description: d.description.clone(),
                input_schema: d.input_schema(),
                uri: d.uri.clone(),
            })
            .collect();
        Response::Capabilities(listings)
    }

    /// Resolve by exact name, validate, and execute a tool or prompt.
    async fn invoke(
        &self,
        session: &Session,
        kind: CapabilityKind,
        name: &str,
        arguments: Arguments,
    ) -> Result<Response, ServerError> {
        // Resolving
        let descriptor = self.registry.lookup(kind, name)?;

        // Validating
        check_arguments(&descriptor.params, &arguments)?;
        if let Some(rules) = &descriptor.rules {
            rules.check(&arguments)?;
        }

        // Executing + Encoding
        log::debug!("session {}: invoking {} '{}'", session.id, kind, name);
        let output = run_handler(descriptor.handler.clone(), arguments).await?;
        encode(kind, name, output)
    }

    /// Resolve a resource URI, bind extracted parameters, and execute.
    async fn read_resource(&self, session: &Session, uri: &str) -> Result<Response, ServerError> {
        // Resolving
        let (descriptor, resolved) = self.registry.resolve_uri(uri)?;

        // Validating: URI-extracted bindings are the resource's arguments.
        let mut arguments = Arguments::new();
        for (name, value) in resolved.params {
            arguments.insert(name, Value::String(value));
        }
        check_arguments(&descriptor.params, &arguments)?;
        if let Some(rules) = &descriptor.rules {
            rules.check(&arguments)?;
        }

        // Executing + Encoding
        log::debug!(
            "session {}: reading resource '{}' via {}",
            session.id,
            descriptor.name,
            uri
        );
        let output = run_handler(descriptor.handler.clone(), arguments).await?;
        encode(CapabilityKind::Resource, &descriptor.name, output)
    }
}

/// Run a handler with panic isolation: an unwinding handler becomes an
/// `Internal` error instead of tearing down the session.
async fn run_handler(
    handler: Arc<dyn crate::capability::CapabilityHandler>,
    arguments: Arguments,
) -> Result<CapabilityOutput, ServerError> {
    match std::panic::AssertUnwindSafe(handler.invoke(arguments))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "handler panicked".to_string());
            log::error!("handler panicked: {}", message);
            Err(ServerError::internal(message))
        }
    }
}

/// Check the handler's output shape against the capability kind.
fn encode(
    kind: CapabilityKind,
    name: &str,
    output: CapabilityOutput,
) -> Result<Response, ServerError> {
    match (kind, output) {
        (CapabilityKind::Tool | CapabilityKind::Resource, CapabilityOutput::Text(payload)) => {
            Ok(Response::Payload(payload))
        }
        (CapabilityKind::Prompt, CapabilityOutput::Messages(messages)) => {
            Ok(Response::Messages(messages))
        }
        (kind, _) => Err(ServerError::internal(format!(
            "{} '{}' produced an output of the wrong shape",
            kind, name
        ))),
    }
}

//! JSON-RPC 2.0 framing for the MCP wire protocol.
//!
//! Both transport bindings funnel every decoded frame through
//! [`handle_rpc`], so the method table, the handshake, and the error
//! encoding live in exactly one place. Transports own only the bytes:
//! stdio reads newline-delimited frames, SSE reads HTTP bodies, and both
//! hand the parsed [`RpcRequest`] here.
//!
//! Domain failures are encoded as JSON-RPC error objects carrying the
//! error kind in `data.kind`; the client always receives a well-formed
//! response, never a broken connection.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::capability::{Arguments, CapabilityKind};
use crate::dispatch::{Dispatcher, Request, Response};
use crate::error::ServerError;
use crate::session::Session;

/// JSON-RPC protocol version sent on every response.
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revision implemented by this server.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// One decoded JSON-RPC request frame.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    /// Absent or null for notifications.
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl RpcRequest {
    /// Whether this frame is a notification (expects no response).
    pub fn is_notification(&self) -> bool {
        self.id.is_null()
    }
}

/// Identity reported during the `initialize` handshake.
#[derive(Debug, Clone)]
pub struct ServerIdentity {
    pub name: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// Response encoding
// ---------------------------------------------------------------------------

/// Encode a successful result frame.
pub fn result_frame(id: &Value, result: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "result": result,
    })
}

/// Encode an error frame from a raw code/message pair.
pub fn error_frame(id: &Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": { "code": code, "message": message },
    })
}

/// Encode a domain error, carrying its kind for programmatic callers.
pub fn domain_error_frame(id: &Value, error: &ServerError) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": {
            "code": error.code(),
            "message": error.to_string(),
            "data": { "kind": error.kind() },
        },
    })
}

/// Response to a frame that could not be parsed as JSON at all.
pub fn parse_error_frame() -> Value {
    error_frame(&Value::Null, -32700, "Parse error")
}

// ---------------------------------------------------------------------------
// Method dispatch
// ---------------------------------------------------------------------------

/// Handle one decoded frame; returns the response frame, or `None` for
/// notifications.
pub async fn handle_rpc(
    dispatcher: &Dispatcher,
    session: &Session,
    identity: &ServerIdentity,
    rpc: RpcRequest,
) -> Option<Value> {
    if rpc.method.starts_with("notifications/") {
        return None;
    }

    let id = rpc.id.clone();
    let frame = match rpc.method.as_str() {
        "initialize" => result_frame(
            &id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {},
                    "resources": {},
                    "prompts": {},
                },
                "serverInfo": {
                    "name": identity.name,
                    "version": identity.version,
                },
            }),
        ),
        "ping" => result_frame(&id, json!({})),
        "tools/list" | "tools/call" | "resources/list" | "resources/read" | "prompts/list"
        | "prompts/get" => match decode_request(&rpc) {
            Ok(request) => match dispatcher.dispatch(session, request).await {
                Ok(response) => result_frame(&id, encode_response(&rpc.method, response)),
                Err(error) => domain_error_frame(&id, &error),
            },
            Err(error) => domain_error_frame(&id, &error),
        },
        other => error_frame(&id, -32601, &format!("Unknown method: {}", other)),
    };

    if rpc.is_notification() {
        None
    } else {
        Some(frame)
    }
}

/// Map a protocol method and its params onto a dispatcher request.
fn decode_request(rpc: &RpcRequest) -> Result<Request, ServerError> {
    match rpc.method.as_str() {
        "tools/list" => Ok(Request::list(CapabilityKind::Tool)),
        "resources/list" => Ok(Request::list(CapabilityKind::Resource)),
        "prompts/list" => Ok(Request::list(CapabilityKind::Prompt)),
        "tools/call" => {
            let name = required_str(&rpc.params, "name")?;
            Ok(Request::call_tool(name, decode_arguments(&rpc.params)))
        }
        "prompts/get" => {
            let name = required_str(&rpc.params, "name")?;
            Ok(Request::get_prompt(name, decode_arguments(&rpc.params)))
        }
        "resources/read" => {
            let uri = required_str(&rpc.params, "uri")?;
            Ok(Request::read_resource(uri))
        }
        other => Err(ServerError::internal(format!(
            "no request mapping for method '{}'",
            other
        ))),
    }
}

fn required_str(params: &Value, field: &str) -> Result<String, ServerError> {
    params
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ServerError::validation(format!("missing required field '{}'", field)))
}

fn decode_arguments(params: &Value) -> Arguments {
    params
        .get("arguments")
        .and_then(Value::as_object)
        .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

/// Encode a dispatch response into the method's result shape.
fn encode_response(method: &str, response: Response) -> Value {
    match (method, response) {
        ("tools/list", Response::Capabilities(listings)) => json!({
            "tools": listings
                .iter()
                .map(|l| json!({
                    "name": l.name,
                    "description": l.description,
                    "inputSchema": l.input_schema,
                }))
                .collect::<Vec<_>>(),
        }),
        ("resources/list", Response::Capabilities(listings)) => json!({
            "resources": listings
                .iter()
                .map(|l| json!({
                    "uri": l.uri,
                    "name": l.name,
                    "description": l.description,
                }))
                .collect::<Vec<_>>(),
        }),
        ("prompts/list", Response::Capabilities(listings)) => json!({
            "prompts": listings
                .iter()
                .map(|l| {
                    let arguments: Vec<Value> = l.input_schema["required"]
                        .as_array()
                        .cloned()
                        .unwrap_or_default()
                        .iter()
                        .filter_map(Value::as_str)
                        .map(|name| json!({ "name": name, "required": true }))
                        .collect();
                    json!({
                        "name": l.name,
                        "description": l.description,
                        "arguments": arguments,
                    })
                })
                .collect::<Vec<_>>(),
        }),
        ("tools/call", Response::Payload(payload)) => json!({
            "content": [{ "type": "text", "text": payload }],
            "isError": false,
        }),
        ("resources/read", Response::Payload(payload)) => json!({
            "contents": [{ "text": payload }],
        }),
        ("prompts/get", Response::Messages(messages)) => json!({
            "messages": messages
                .iter()
                .map(|m| json!({
                    "role": m.role,
                    "content": { "type": "text", "text": m.content },
                }))
                .collect::<Vec<_>>(),
        }),
        // Shape mismatches are caught by the dispatcher before this point.
        (_, _) => json!({}),
    }
}

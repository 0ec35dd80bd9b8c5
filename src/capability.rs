//! Core capability model: descriptors, parameter schemas, handlers, and
//! the role-tagged messages produced by prompts.
//!
//! A capability is one of three kinds — a callable **tool**, a readable
//! **resource**, or a parameterized **prompt** — described uniformly by a
//! [`CapabilityDescriptor`]. Descriptors are created during registry
//! construction and never mutated afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ServerError;
use crate::validate::RuleSet;

/// Arguments passed to a capability handler, keyed by parameter name.
///
/// Resolver-extracted URI parameters are merged into the same map before
/// the handler runs.
pub type Arguments = HashMap<String, Value>;

// ---------------------------------------------------------------------------
// CapabilityKind
// ---------------------------------------------------------------------------

/// The three capability kinds the server exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityKind {
    /// A named, callable capability with typed arguments and a single result.
    Tool,
    /// A named or templated readable data source addressed by URI.
    Resource,
    /// A named, parameterized generator of a multi-turn message sequence.
    Prompt,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityKind::Tool => write!(f, "tool"),
            CapabilityKind::Resource => write!(f, "resource"),
            CapabilityKind::Prompt => write!(f, "prompt"),
        }
    }
}

// ---------------------------------------------------------------------------
// Parameter schema
// ---------------------------------------------------------------------------

/// Accepted value types for declared parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    /// A JSON array of strings.
    StringList,
}

impl ParamType {
    /// The JSON Schema `type` fragment for this parameter type.
    pub fn json_schema(&self) -> Value {
        match self {
            ParamType::String => serde_json::json!({ "type": "string" }),
            ParamType::Number => serde_json::json!({ "type": "number" }),
            ParamType::Boolean => serde_json::json!({ "type": "boolean" }),
            ParamType::StringList => serde_json::json!({
                "type": "array",
                "items": { "type": "string" },
            }),
        }
    }

    /// Check whether a JSON value inhabits this type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::StringList => value
                .as_array()
                .map(|items| items.iter().all(Value::is_string))
                .unwrap_or(false),
        }
    }

    /// Human-readable name used in validation messages.
    pub fn name(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::StringList => "list of strings",
        }
    }
}

/// One declared parameter of a capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

impl ParamSpec {
    /// A required parameter.
    pub fn required(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            description: String::new(),
        }
    }

    /// An optional parameter.
    pub fn optional(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            description: String::new(),
        }
    }

    /// Builder: attach a description shown in capability listings.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Speaker role in a prompt's expanded conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn in a prompt's expanded output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Handler output
// ---------------------------------------------------------------------------

/// Successful handler result, tagged by shape.
///
/// Tools and resources produce `Text`; prompts produce `Messages`. The
/// dispatcher enforces the pairing so a handler cannot smuggle the wrong
/// shape past its declared kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityOutput {
    Text(String),
    Messages(Vec<Message>),
}

// ---------------------------------------------------------------------------
// CapabilityHandler
// ---------------------------------------------------------------------------

/// The callable seam behind every capability.
///
/// Handlers receive validated arguments (declared parameters plus any
/// URI-extracted ones) and may call the execution guard zero or more times.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    async fn invoke(&self, args: Arguments) -> Result<CapabilityOutput, ServerError>;
}

/// Boxed async handler function.
pub type HandlerFn = Arc<
    dyn Fn(Arguments) -> BoxFuture<'static, Result<CapabilityOutput, ServerError>> + Send + Sync,
>;

/// Handler wrapping a plain async closure; the common case for capabilities
/// that do not need their own state.
#[derive(Clone)]
pub struct FnHandler {
    func: HandlerFn,
}

impl FnHandler {
    pub fn new(func: HandlerFn) -> Self {
        Self { func }
    }
}

impl fmt::Debug for FnHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

#[async_trait]
impl CapabilityHandler for FnHandler {
    async fn invoke(&self, args: Arguments) -> Result<CapabilityOutput, ServerError> {
        (self.func)(args).await
    }
}

// ---------------------------------------------------------------------------
// CapabilityDescriptor
// ---------------------------------------------------------------------------

/// Immutable description of one registered capability.
///
/// Owned exclusively by the registry; handlers are shared via `Arc` so
/// concurrent sessions can invoke them without copying.
#[derive(Clone)]
pub struct CapabilityDescriptor {
    pub kind: CapabilityKind,
    /// Unique within `kind` for the registry's lifetime.
    pub name: String,
    pub description: String,
    /// Declared parameters, in declaration order.
    pub params: Vec<ParamSpec>,
    /// Declared URI template; `Some` for resources only.
    pub uri: Option<String>,
    /// Capability-specific validation rules, applied by the dispatcher
    /// after the schema check and before the handler runs.
    pub rules: Option<Arc<RuleSet>>,
    pub handler: Arc<dyn CapabilityHandler>,
}

impl fmt::Debug for CapabilityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityDescriptor")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("params", &self.params)
            .field("uri", &self.uri)
            .finish_non_exhaustive()
    }
}

impl CapabilityDescriptor {
    /// Describe a callable tool.
    pub fn tool(
        name: impl Into<String>,
        description: impl Into<String>,
        params: Vec<ParamSpec>,
        handler: Arc<dyn CapabilityHandler>,
    ) -> Self {
        Self {
            kind: CapabilityKind::Tool,
            name: name.into(),
            description: description.into(),
            params,
            uri: None,
            rules: None,
            handler,
        }
    }

    /// Describe a readable resource addressed by `uri` (static or templated).
    pub fn resource(
        name: impl Into<String>,
        uri: impl Into<String>,
        description: impl Into<String>,
        handler: Arc<dyn CapabilityHandler>,
    ) -> Self {
        Self {
            kind: CapabilityKind::Resource,
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
            uri: Some(uri.into()),
            rules: None,
            handler,
        }
    }

    /// Describe a parameterized prompt.
    pub fn prompt(
        name: impl Into<String>,
        description: impl Into<String>,
        params: Vec<ParamSpec>,
        handler: Arc<dyn CapabilityHandler>,
    ) -> Self {
        Self {
            kind: CapabilityKind::Prompt,
            name: name.into(),
            description: description.into(),
            params,
            uri: None,
            rules: None,
            handler,
        }
    }

    /// Builder: attach validation rules enforced before the handler runs.
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = Some(Arc::new(rules));
        self
    }

    /// JSON Schema object describing this capability's arguments, exposed
    /// through capability listings so clients can form correct calls.
    pub fn input_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for param in &self.params {
            let mut schema = param.ty.json_schema();
            if !param.description.is_empty() {
                schema["description"] = Value::String(param.description.clone());
            }
            properties.insert(param.name.clone(), schema);
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

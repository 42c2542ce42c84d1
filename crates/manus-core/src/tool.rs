//! Tool System
//!
//! Tools advertise a capability descriptor to the model and execute the
//! invocations it requests. The registry owns the tools of one agent and is
//! the only place invocations are dispatched, so every fault a tool raises is
//! contained there.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{AgentError, Result};

/// Named arguments passed to a tool
pub type ToolArgs = serde_json::Map<String, Value>;

/// Declaration of one tool parameter
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// JSON Schema type (string, number, integer, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Default value; a parameter without one is required
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Allowed values
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

impl ParameterSpec {
    pub fn new(param_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            param_type: param_type.into(),
            description: description.into(),
            default: None,
            enum_values: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// Static description of a tool
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool identifier, also the model-facing function name
    pub name: String,

    /// Capability summary shown to the model
    pub description: String,

    /// Parameter declarations keyed by name
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterSpec>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, spec: ParameterSpec) -> Self {
        self.parameters.insert(name.into(), spec);
        self
    }

    /// Names of parameters without a default, in schema order
    pub fn required(&self) -> Vec<String> {
        self.parameters
            .iter()
            .filter(|(_, p)| p.is_required())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn describe(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: ParametersObject {
                schema_type: "object".into(),
                properties: self.parameters.clone(),
                required: self.required(),
            },
        }
    }

    /// Check argument names against the declaration
    pub fn validate(&self, args: &ToolArgs) -> Result<()> {
        for (name, param) in &self.parameters {
            if param.is_required() && !args.contains_key(name) {
                return Err(AgentError::invalid_arguments(
                    &self.name,
                    format!("missing required parameter '{name}'"),
                ));
            }
        }

        if let Some(unexpected) = args.keys().find(|k| !self.parameters.contains_key(*k)) {
            return Err(AgentError::invalid_arguments(
                &self.name,
                format!("unexpected parameter '{unexpected}'"),
            ));
        }

        Ok(())
    }
}

/// Capability descriptor handed to the model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: ParametersObject,
}

/// JSON-schema object wrapper around the parameter declarations
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParametersObject {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: BTreeMap<String, ParameterSpec>,
    pub required: Vec<String>,
}

/// Tool trait - implement to add new capabilities
///
/// Expected domain failures should be returned as `Ok(json!({"error": ...}))`.
/// An `Err` or a panic is still contained by [`ToolRegistry::dispatch`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// Static declaration of the tool
    fn spec(&self) -> ToolSpec;

    /// Descriptor advertised to the model
    fn describe(&self) -> CapabilityDescriptor {
        self.spec().describe()
    }

    /// Execute the tool with named arguments
    async fn execute(&self, args: &ToolArgs) -> Result<Value>;
}

/// Outcome of one dispatched invocation, as folded into the transcript
#[derive(Clone, Debug, PartialEq)]
pub enum ToolOutcome {
    Success(Value),
    Failure(String),
}

impl ToolOutcome {
    /// Classify a tool's return value; an object with an `error` key is a failure
    pub fn from_value(value: Value) -> Self {
        match failure_reason(&value) {
            Some(reason) => Self::Failure(reason),
            None => Self::Success(value),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Payload embedded as the tool's response part
    pub fn response_payload(&self) -> Value {
        match self {
            Self::Success(value) => value.clone(),
            Self::Failure(reason) => json!({ "error": reason }),
        }
    }
}

impl From<Result<Value>> for ToolOutcome {
    fn from(result: Result<Value>) -> Self {
        match result {
            Ok(value) => Self::from_value(value),
            Err(e) => Self::Failure(e.to_string()),
        }
    }
}

fn failure_reason(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => Some(
            obj.get("message")
                .and_then(Value::as_str)
                .map_or_else(|| Value::Object(obj.clone()).to_string(), str::to_string),
        ),
        other => Some(other.to_string()),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic with non-string payload".into())
}

/// Registry for available tools
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; an existing tool with the same name is replaced
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    /// Register a shared tool
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.spec().name;
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::debug!(tool = %name, "Replaced previously registered tool");
        } else {
            tracing::info!(tool = %name, "Tool registered");
        }
    }

    /// Register tools in sequence
    pub fn register_many(&mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) {
        for tool in tools {
            self.register_arc(tool);
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Capability descriptors in registry order
    pub fn describe_all(&self) -> Vec<CapabilityDescriptor> {
        self.tools.values().map(|t| t.describe()).collect()
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run one invocation whose arguments arrived as raw JSON. Anything but an
    /// object is an argument-shape mismatch reported like other invalid input.
    pub async fn dispatch_value(&self, name: &str, args: &Value) -> Result<Value> {
        if let Some(map) = args.as_object() {
            return self.dispatch(name, map).await;
        }
        if self.get(name).is_none() {
            return Err(AgentError::UnknownTool(name.to_string()));
        }
        let e = AgentError::invalid_arguments(
            name,
            format!("arguments must be a JSON object, got {}", json_kind(args)),
        );
        tracing::warn!(tool = %name, error = %e, "Rejected tool arguments");
        Ok(json!({ "error": e.to_string() }))
    }

    /// Run one invocation.
    ///
    /// Only an unregistered name is an `Err`. Argument mismatches, tool errors
    /// and panics come back as `{"error": message}`.
    pub async fn dispatch(&self, name: &str, args: &ToolArgs) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))?;

        if let Err(e) = tool.spec().validate(args) {
            tracing::warn!(tool = %name, error = %e, "Rejected tool arguments");
            return Ok(json!({ "error": e.to_string() }));
        }

        tracing::debug!(tool = %name, args = ?args, "Executing tool");
        let started = Instant::now();
        let result = AssertUnwindSafe(tool.execute(args)).catch_unwind().await;
        let elapsed = started.elapsed();

        match result {
            Ok(Ok(value)) => {
                tracing::info!(tool = %name, elapsed_ms = elapsed.as_millis(), "Tool finished");
                Ok(value)
            }
            Ok(Err(e)) => {
                tracing::warn!(tool = %name, elapsed_ms = elapsed.as_millis(), error = %e, "Tool returned an error");
                let message = match e {
                    AgentError::InvalidArguments { .. } | AgentError::ToolExecution { .. } => {
                        e.to_string()
                    }
                    other => AgentError::tool_execution(name, other.to_string()).to_string(),
                };
                Ok(json!({ "error": message }))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(tool = %name, elapsed_ms = elapsed.as_millis(), panic = %message, "Tool panicked");
                Ok(json!({ "error": AgentError::tool_execution(name, message).to_string() }))
            }
        }
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Fetch a required string argument
pub fn arg_str<'a>(tool: &str, args: &'a ToolArgs, name: &str) -> Result<&'a str> {
    match args.get(name) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(AgentError::invalid_arguments(
            tool,
            format!("parameter '{name}' must be a string, got {other}"),
        )),
        None => Err(AgentError::invalid_arguments(
            tool,
            format!("missing required parameter '{name}'"),
        )),
    }
}

/// Fetch an optional string argument with a fallback
pub fn arg_str_or<'a>(tool: &str, args: &'a ToolArgs, name: &str, default: &'a str) -> Result<&'a str> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(_) => arg_str(tool, args, name),
    }
}

/// Fetch an optional numeric argument with a fallback; numeric strings are accepted
pub fn arg_f64_or(tool: &str, args: &ToolArgs, name: &str, default: f64) -> Result<f64> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| {
            AgentError::invalid_arguments(tool, format!("parameter '{name}' is out of range"))
        }),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| {
            AgentError::invalid_arguments(tool, format!("parameter '{name}' must be a number, got '{s}'"))
        }),
        Some(other) => Err(AgentError::invalid_arguments(
            tool,
            format!("parameter '{name}' must be a number, got {other}"),
        )),
    }
}

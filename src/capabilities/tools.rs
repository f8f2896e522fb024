//! Tool registry exposed through `tools/list` and `tools/call`.
//!
//! Tools describe themselves declaratively with a [`ToolDescriptor`]; the
//! JSON Schema advertised to clients is derived from its parameter list, and
//! the same list is used to validate call arguments before the tool runs.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::McpError;
use crate::mcp::capability::Capability;
use crate::mcp::protocol::JsonRpcMessage;

/// JSON type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    /// A JSON string.
    String,
    /// Any JSON number.
    Number,
    /// A JSON number without a fractional part.
    Integer,
    /// `true` or `false`.
    Boolean,
    /// A JSON object.
    Object,
    /// A JSON array.
    Array,
}

impl ParameterType {
    /// Returns `true` if `value` has this type.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

/// Declarative description of one tool parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDescriptor {
    /// Argument name.
    pub name: String,
    /// Expected JSON type.
    pub kind: ParameterType,
    /// Human-readable description.
    pub description: String,
    /// Whether the argument must be present.
    pub required: bool,
    /// Accepted string values; empty means unrestricted.
    pub allowed_values: Vec<String>,
}

impl ParameterDescriptor {
    /// Creates a required parameter.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ParameterType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
            allowed_values: Vec::new(),
        }
    }

    /// Marks the parameter optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Restricts a string parameter to the given values.
    #[must_use]
    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = values.into_iter().map(Into::into).collect();
        self
    }

    fn schema(&self) -> Value {
        let mut schema = json!({
            "type": self.kind,
            "description": self.description,
        });
        if !self.allowed_values.is_empty() {
            schema["enum"] = json!(self.allowed_values);
        }
        schema
    }

    /// Checks one argument value against this descriptor.
    fn check(&self, value: &Value) -> Result<(), McpError> {
        if !self.kind.matches(value) {
            return Err(McpError::invalid_params(format!(
                "Parameter '{}' must be of type {}",
                self.name,
                self.kind.as_str()
            )));
        }
        if let Some(text) = value.as_str() {
            if !self.allowed_values.is_empty()
                && !self.allowed_values.iter().any(|allowed| allowed == text)
            {
                return Err(McpError::invalid_params(format!(
                    "Parameter '{}' must be one of: {}",
                    self.name,
                    self.allowed_values.join(", ")
                )));
            }
        }
        Ok(())
    }
}

/// Declarative description of a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDescriptor {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Parameters in declaration order.
    pub parameters: Vec<ParameterDescriptor>,
}

impl ToolDescriptor {
    /// Creates a descriptor without parameters.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    /// Appends a parameter.
    #[must_use]
    pub fn parameter(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Derives the JSON Schema for the tool's input.
    #[must_use]
    pub fn input_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|parameter| (parameter.name.clone(), parameter.schema()))
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|parameter| parameter.required)
            .map(|parameter| parameter.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Returns the `tools/list` entry for this tool.
    #[must_use]
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: Some(self.description.clone()).filter(|d| !d.is_empty()),
            input_schema: self.input_schema(),
        }
    }

    /// Validates call arguments against the parameter list.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::InvalidParams`] for a missing required argument or
    /// an argument of the wrong type.
    pub fn validate(&self, arguments: &Map<String, Value>) -> Result<(), McpError> {
        for parameter in &self.parameters {
            match arguments.get(&parameter.name) {
                Some(Value::Null) | None if parameter.required => {
                    return Err(McpError::invalid_params(format!(
                        "Missing required parameter: {}",
                        parameter.name
                    )));
                }
                Some(Value::Null) | None => {}
                Some(value) => parameter.check(value)?,
            }
        }
        Ok(())
    }
}

/// A tool definition for the `tools/list` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

/// Parameters for a `tools/call` request.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments for the tool.
    #[serde(default)]
    pub arguments: Value,
}

/// Content item in a tool call response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

/// Result of a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
    /// Whether the tool call resulted in an error.
    #[serde(skip_serializing_if = "is_false")]
    pub is_error: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(value: &bool) -> bool {
    !*value
}

impl ToolCallResult {
    /// Creates a successful text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Creates an error text result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }
}

/// A callable tool.
pub trait Tool: Send {
    /// Static metadata: name, description and parameters.
    fn descriptor(&self) -> &ToolDescriptor;

    /// Runs the tool with arguments already validated against
    /// [`Self::descriptor`].
    ///
    /// Execution failures are reported in-band with
    /// [`ToolCallResult::error`].
    fn call(&mut self, arguments: &Map<String, Value>) -> ToolCallResult;
}

/// Capability serving `tools/list` and `tools/call`.
#[derive(Default)]
pub struct ToolsCapability {
    tools: IndexMap<String, Box<dyn Tool>>,
}

impl ToolsCapability {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, replacing any tool with the same name in place.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.descriptor().name.clone();
        if self.tools.insert(name.clone(), Box::new(tool)).is_some() {
            tracing::warn!(tool = %name, "tool registered twice; keeping the latest");
        }
    }

    /// Builder-style [`Self::register`].
    #[must_use]
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Returns tool definitions in registration order.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|tool| tool.descriptor().definition())
            .collect()
    }

    /// Looks up, validates and runs a tool.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::InvalidParams`] for an unknown tool or invalid
    /// arguments.
    pub fn call(&mut self, name: &str, arguments: &Value) -> Result<ToolCallResult, McpError> {
        let tool = self
            .tools
            .get_mut(name)
            .ok_or_else(|| McpError::invalid_params(format!("Unknown tool: {name}")))?;

        let empty = Map::new();
        let arguments = match arguments {
            Value::Null => &empty,
            Value::Object(map) => map,
            _ => return Err(McpError::invalid_params("Tool arguments must be an object")),
        };

        tool.descriptor().validate(arguments)?;
        tracing::debug!(tool = name, "calling tool");
        let result = tool.call(arguments);
        if result.is_error {
            tracing::info!(tool = name, "tool reported an error");
        }
        Ok(result)
    }

    fn handle_call(&mut self, message: &JsonRpcMessage) -> Result<Value, McpError> {
        let params: ToolCallParams = message
            .params()
            .map(|params| serde_json::from_value(params.clone()))
            .transpose()
            .map_err(|e| McpError::invalid_params(format!("Invalid tool call params: {e}")))?
            .ok_or_else(|| McpError::invalid_params("Missing tool call params"))?;

        let result = self.call(&params.name, &params.arguments)?;
        Ok(serde_json::to_value(result)?)
    }
}

impl Capability for ToolsCapability {
    fn name(&self) -> &str {
        "tools"
    }

    fn capabilities(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("tools".to_string(), json!({"listChanged": false}));
        map
    }

    fn can_handle_message(&self, message: &JsonRpcMessage) -> bool {
        matches!(message.method(), Some("tools/list" | "tools/call"))
    }

    fn handle_message(
        &mut self,
        message: &JsonRpcMessage,
    ) -> Result<Option<JsonRpcMessage>, McpError> {
        let Some(id) = message.id().cloned() else {
            return Ok(None);
        };

        let result = match message.method() {
            Some("tools/list") => json!({ "tools": self.definitions() }),
            Some("tools/call") => self.handle_call(message)?,
            other => return Err(McpError::method_not_found(other.unwrap_or_default())),
        };
        Ok(Some(JsonRpcMessage::result(id, result)))
    }
}

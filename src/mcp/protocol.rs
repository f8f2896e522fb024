//! JSON-RPC 2.0 message types for the MCP protocol.
//!
//! Every wire unit is a [`JsonRpcMessage`]: a request, a notification, a
//! successful result or an error response. Messages are immutable once
//! built, either by parsing inbound JSON or through the factory functions.
//!
//! # Classification
//!
//! - **Request**: `method` and `id` are set
//! - **Notification**: `method` is set, `id` is absent (never answered)
//! - **Response**: no `method`, exactly one of `result` / `error`
//!
//! # MCP-Specific Constraints
//!
//! - Request IDs must be strings or integers; a `null` id is treated as absent
//! - `params`, when present, must be an object or an array

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

/// The JSON-RPC version literal carried by every message.
pub const JSONRPC_VERSION: &str = "2.0";

/// The MCP protocol version this server reports during `initialize`.
pub const MCP_PROTOCOL_VERSION: &str = "2025-03-26";

/// Default server name for capability negotiation.
pub const SERVER_NAME: &str = "mcp-core-server";

/// Error code returned when authorization is required but no token was supplied.
pub const AUTHORIZATION_REQUIRED: i32 = -32000;

/// Error code returned when the supplied token does not match.
pub const AUTHORIZATION_FAILED: i32 = -32001;

/// A JSON-RPC 2.0 request ID.
///
/// Per the MCP specification, IDs must be strings or integers, never `null`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric request ID.
    Number(i64),
    /// String request ID.
    String(String),
}

impl RequestId {
    /// Converts a raw JSON value into a request ID.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::Invalid`] for anything other than a string or
    /// an integer that fits in `i64`.
    pub fn from_value(value: Value) -> Result<Self, MessageError> {
        match value {
            Value::String(s) => Ok(Self::String(s)),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Number)
                .ok_or_else(|| MessageError::invalid("id must be a string or integer", None)),
            _ => Err(MessageError::invalid(
                "id must be a string or integer",
                None,
            )),
        }
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// Standard JSON-RPC 2.0 error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid JSON was received by the server.
    ParseError,
    /// The JSON sent is not a valid Request object.
    InvalidRequest,
    /// The method does not exist or is not available.
    MethodNotFound,
    /// Invalid method parameters.
    InvalidParams,
    /// Internal JSON-RPC error.
    InternalError,
    /// Server-defined error.
    ServerError(i32),
}

impl ErrorCode {
    /// Returns the numeric code for this error.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ServerError(code) => code,
        }
    }

    /// Maps a numeric code back to its variant.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            -32700 => Self::ParseError,
            -32600 => Self::InvalidRequest,
            -32601 => Self::MethodNotFound,
            -32602 => Self::InvalidParams,
            -32603 => Self::InternalError,
            other => Self::ServerError(other),
        }
    }

    /// Returns the default message for this error code.
    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::ServerError(_) => "Server error",
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// The error code.
    pub code: i32,

    /// A short description of the error.
    pub message: String,

    /// Additional information about the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    /// Creates a new error from an error code.
    #[must_use]
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code: code.code(),
            message: code.default_message().to_string(),
            data: None,
        }
    }

    /// Creates a new error with a custom message.
    #[must_use]
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    /// Adds additional data to the error.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Returns the typed error code.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        ErrorCode::from_code(self.code)
    }
}

/// Failure to turn raw bytes into a well-formed message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    /// The payload is not syntactically valid JSON.
    #[error("Parse error: {message}")]
    Parse {
        /// Parser diagnostic.
        message: String,
    },

    /// The payload is valid JSON but not a valid message.
    #[error("Invalid Request: {message}")]
    Invalid {
        /// What is wrong with the message.
        message: String,
        /// The request ID, when one could be recovered.
        id: Option<RequestId>,
    },
}

impl MessageError {
    /// Creates an invalid-request error.
    #[must_use]
    pub fn invalid(message: impl Into<String>, id: Option<RequestId>) -> Self {
        Self::Invalid {
            message: message.into(),
            id,
        }
    }

    /// Returns the JSON-RPC code for this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Parse { .. } => ErrorCode::ParseError,
            Self::Invalid { .. } => ErrorCode::InvalidRequest,
        }
    }

    /// Returns the request ID recovered from the failing unit, if any.
    #[must_use]
    pub const fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Parse { .. } => None,
            Self::Invalid { id, .. } => id.as_ref(),
        }
    }

    /// Builds the error response for this failure.
    #[must_use]
    pub fn to_response(&self) -> JsonRpcMessage {
        JsonRpcMessage::error(self.id().cloned(), self.code(), self.to_string())
    }
}

impl From<serde_json::Error> for MessageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse {
            message: err.to_string(),
        }
    }
}

/// A single JSON-RPC 2.0 message.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonRpcMessage {
    /// A call that expects a response.
    Request {
        /// Unique request identifier.
        id: RequestId,
        /// The method to invoke.
        method: String,
        /// Optional parameters (object or array).
        params: Option<Value>,
    },
    /// A one-way message; never answered.
    Notification {
        /// The notification method.
        method: String,
        /// Optional parameters (object or array).
        params: Option<Value>,
    },
    /// A successful response.
    Result {
        /// The request ID this response corresponds to.
        id: RequestId,
        /// The result of the method call.
        result: Value,
    },
    /// An error response.
    Error {
        /// The request ID, absent only when it could not be determined.
        id: Option<RequestId>,
        /// The error details.
        error: ErrorObject,
    },
}

impl JsonRpcMessage {
    /// Creates a request.
    #[must_use]
    pub fn request(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self::Request {
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    /// Creates a notification.
    #[must_use]
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self::Notification {
            method: method.into(),
            params,
        }
    }

    /// Creates a success response.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Value is not const-compatible
    pub fn result(id: RequestId, result: Value) -> Self {
        Self::Result { id, result }
    }

    /// Creates an error response with a custom message.
    #[must_use]
    pub fn error(id: Option<RequestId>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            id,
            error: ErrorObject::with_message(code, message),
        }
    }

    /// Creates an error response from a prepared error object.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // ErrorObject contains String
    pub fn error_object(id: Option<RequestId>, error: ErrorObject) -> Self {
        Self::Error { id, error }
    }

    /// Returns `true` for a message with both `method` and `id`.
    #[must_use]
    pub const fn is_request(&self) -> bool {
        matches!(self, Self::Request { .. })
    }

    /// Returns `true` for a message with `method` but no `id`.
    #[must_use]
    pub const fn is_notification(&self) -> bool {
        matches!(self, Self::Notification { .. })
    }

    /// Returns `true` for a result or error response.
    #[must_use]
    pub const fn is_response(&self) -> bool {
        matches!(self, Self::Result { .. } | Self::Error { .. })
    }

    /// Returns the method name for requests and notifications.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request { method, .. } | Self::Notification { method, .. } => Some(method),
            Self::Result { .. } | Self::Error { .. } => None,
        }
    }

    /// Returns the parameters for requests and notifications.
    #[must_use]
    pub const fn params(&self) -> Option<&Value> {
        match self {
            Self::Request { params, .. } | Self::Notification { params, .. } => params.as_ref(),
            Self::Result { .. } | Self::Error { .. } => None,
        }
    }

    /// Returns the message ID, if it has one.
    #[must_use]
    pub const fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request { id, .. } | Self::Result { id, .. } => Some(id),
            Self::Error { id, .. } => id.as_ref(),
            Self::Notification { .. } => None,
        }
    }

    /// Returns a parameter from an object-shaped `params`.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params().and_then(Value::as_object)?.get(name)
    }

    /// Parses one message of any kind from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::Parse`] for malformed JSON and
    /// [`MessageError::Invalid`] for valid JSON with the wrong shape.
    pub fn parse(json: &str) -> Result<Self, MessageError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parses one client-to-server message, which must carry a method.
    ///
    /// # Errors
    ///
    /// As [`Self::parse`], plus [`MessageError::Invalid`] when the message
    /// is a response rather than a request or notification.
    pub fn parse_inbound(json: &str) -> Result<Self, MessageError> {
        let value: Value = serde_json::from_str(json)?;
        Self::inbound_from_value(value)
    }

    /// Converts an already-decoded JSON value into an inbound message.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::Invalid`] when the value is not a request or
    /// notification.
    pub fn inbound_from_value(value: Value) -> Result<Self, MessageError> {
        let message = Self::from_value(value)?;
        if message.is_response() {
            return Err(MessageError::invalid(
                "missing method",
                message.id().cloned(),
            ));
        }
        Ok(message)
    }

    /// Converts an already-decoded JSON value into a message.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::Invalid`] if the value violates the
    /// JSON-RPC 2.0 message shape.
    pub fn from_value(value: Value) -> Result<Self, MessageError> {
        let Value::Object(mut obj) = value else {
            return Err(MessageError::invalid("message must be a JSON object", None));
        };

        let id = match obj.remove("id") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(RequestId::from_value(raw)?),
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Err(MessageError::invalid("jsonrpc field must be \"2.0\"", id));
        }

        let method = match obj.remove("method") {
            None => None,
            Some(Value::String(m)) if !m.trim().is_empty() => Some(m),
            Some(_) => {
                return Err(MessageError::invalid(
                    "method must be a non-empty string",
                    id,
                ))
            }
        };

        let params = match obj.remove("params") {
            None | Some(Value::Null) => None,
            Some(p @ (Value::Object(_) | Value::Array(_))) => Some(p),
            Some(_) => {
                return Err(MessageError::invalid(
                    "params must be an object or array",
                    id,
                ))
            }
        };

        let result = obj.remove("result");
        let error = obj.remove("error");

        match (method, result, error) {
            (Some(method), None, None) => Ok(match id {
                Some(id) => Self::Request { id, method, params },
                None => Self::Notification { method, params },
            }),
            (Some(_), _, _) => Err(MessageError::invalid(
                "a message with a method cannot carry result or error",
                id,
            )),
            (None, Some(_), Some(_)) => Err(MessageError::invalid(
                "a response cannot carry both result and error",
                id,
            )),
            (None, Some(result), None) => match id {
                Some(id) => Ok(Self::Result { id, result }),
                None => Err(MessageError::invalid("a result response requires an id", None)),
            },
            (None, None, Some(error)) => {
                let error: ErrorObject = serde_json::from_value(error).map_err(|_| {
                    MessageError::invalid(
                        "error must be an object with an integer code and a string message",
                        id.clone(),
                    )
                })?;
                Ok(Self::Error { id, error })
            }
            (None, None, None) => Err(MessageError::invalid("missing method", id)),
        }
    }

    /// Serialises the message as single-line JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Serialize for JsonRpcMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("jsonrpc", JSONRPC_VERSION)?;
        match self {
            Self::Request { id, method, params } => {
                map.serialize_entry("id", id)?;
                map.serialize_entry("method", method)?;
                if let Some(params) = params {
                    map.serialize_entry("params", params)?;
                }
            }
            Self::Notification { method, params } => {
                map.serialize_entry("method", method)?;
                if let Some(params) = params {
                    map.serialize_entry("params", params)?;
                }
            }
            Self::Result { id, result } => {
                map.serialize_entry("id", id)?;
                map.serialize_entry("result", result)?;
            }
            // JSON-RPC requires `"id": null` when the id could not be determined.
            Self::Error { id, error } => {
                map.serialize_entry("id", id)?;
                map.serialize_entry("error", error)?;
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for JsonRpcMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

/// One wire unit: a single message or a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// A lone JSON object.
    Single(JsonRpcMessage),
    /// A JSON array of messages.
    Batch(Vec<JsonRpcMessage>),
}

impl Payload {
    /// Returns the carried messages in wire order.
    #[must_use]
    pub fn messages(&self) -> &[JsonRpcMessage] {
        match self {
            Self::Single(message) => std::slice::from_ref(message),
            Self::Batch(messages) => messages,
        }
    }

    /// Consumes the payload, returning its messages in wire order.
    #[must_use]
    pub fn into_messages(self) -> Vec<JsonRpcMessage> {
        match self {
            Self::Single(message) => vec![message],
            Self::Batch(messages) => messages,
        }
    }

    /// Returns `true` if the payload arrived as a JSON array.
    #[must_use]
    pub const fn is_batch(&self) -> bool {
        matches!(self, Self::Batch(_))
    }

    /// Returns `true` if every carried message is a notification.
    #[must_use]
    pub fn is_notifications_only(&self) -> bool {
        self.messages().iter().all(JsonRpcMessage::is_notification)
    }
}

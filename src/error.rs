//! Error types for mcp-core-server.
//!
//! # Security Note
//!
//! Authorization errors NEVER echo the expected or the supplied token.

use std::path::PathBuf;

use thiserror::Error;

use crate::mcp::protocol::{
    ErrorCode, ErrorObject, JsonRpcMessage, RequestId, AUTHORIZATION_FAILED,
    AUTHORIZATION_REQUIRED,
};

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Errors raised while dispatching a message.
///
/// Capabilities return these from their hooks; the server turns them into
/// JSON-RPC error responses for requests and drops them for notifications.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum McpError {
    /// No handler claims the method.
    #[error("Method not found: {method}")]
    MethodNotFound {
        /// The unclaimed method.
        method: String,
    },

    /// The message is not acceptable in the current state or shape.
    #[error("{message}")]
    InvalidRequest {
        /// Description of the problem.
        message: String,
    },

    /// The parameters are missing or malformed.
    #[error("{message}")]
    InvalidParams {
        /// Description of the problem.
        message: String,
    },

    /// Any other failure.
    #[error("{message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },

    /// Authorization is configured but no client token was supplied.
    #[error("Authorization required: MCP_AUTHORIZATION_TOKEN environment variable not set.")]
    AuthorizationRequired,

    /// The client token does not match the configured secret.
    #[error("Authorization failed: Invalid token.")]
    AuthorizationFailed,
}

impl McpError {
    /// Creates a method-not-found error.
    #[must_use]
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::MethodNotFound {
            method: method.into(),
        }
    }

    /// Creates an invalid-request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates an invalid-params error.
    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the JSON-RPC code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MethodNotFound { .. } => ErrorCode::MethodNotFound,
            Self::InvalidRequest { .. } => ErrorCode::InvalidRequest,
            Self::InvalidParams { .. } => ErrorCode::InvalidParams,
            Self::Internal { .. } => ErrorCode::InternalError,
            Self::AuthorizationRequired => ErrorCode::ServerError(AUTHORIZATION_REQUIRED),
            Self::AuthorizationFailed => ErrorCode::ServerError(AUTHORIZATION_FAILED),
        }
    }

    /// Builds the JSON-RPC error object for this error.
    #[must_use]
    pub fn to_error_object(&self) -> ErrorObject {
        ErrorObject::with_message(self.code(), self.to_string())
    }

    /// Builds the error response for the request with the given ID.
    #[must_use]
    pub fn into_response(self, id: RequestId) -> JsonRpcMessage {
        JsonRpcMessage::error_object(Some(id), self.to_error_object())
    }
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("Internal error: {err}"))
    }
}

//! Client-visible logging levels and the `notifications/message` payload.
//!
//! MCP uses the syslog severities (RFC 5424). A lower priority number is
//! more severe; a client threshold of `warning` admits `warning` and every
//! level with a smaller priority.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::mcp::protocol::JsonRpcMessage;

/// Method name of the server-to-client log notification.
pub const LOG_NOTIFICATION_METHOD: &str = "notifications/message";

/// Syslog severity levels, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// System is unusable.
    Emergency,
    /// Action must be taken immediately.
    Alert,
    /// Critical conditions.
    Critical,
    /// Error conditions.
    Error,
    /// Warning conditions.
    Warning,
    /// Normal but significant events.
    Notice,
    /// Informational messages.
    Info,
    /// Debug-level messages.
    Debug,
}

impl LogLevel {
    /// All levels, most severe first.
    pub const ALL: [Self; 8] = [
        Self::Emergency,
        Self::Alert,
        Self::Critical,
        Self::Error,
        Self::Warning,
        Self::Notice,
        Self::Info,
        Self::Debug,
    ];

    /// Returns the syslog priority (0 = emergency, 7 = debug).
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::Emergency => 0,
            Self::Alert => 1,
            Self::Critical => 2,
            Self::Error => 3,
            Self::Warning => 4,
            Self::Notice => 5,
            Self::Info => 6,
            Self::Debug => 7,
        }
    }

    /// Returns the wire name of the level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Emergency => "emergency",
            Self::Alert => "alert",
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Notice => "notice",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }

    /// Returns `true` if a message at this level passes `threshold`.
    #[must_use]
    pub const fn passes(self, threshold: Self) -> bool {
        self.priority() <= threshold.priority()
    }

    /// Comma-separated list of valid level names.
    #[must_use]
    pub fn valid_names() -> String {
        Self::ALL
            .iter()
            .map(|level| level.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown level name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level: {0}")]
pub struct UnknownLogLevel(pub String);

impl FromStr for LogLevel {
    type Err = UnknownLogLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| UnknownLogLevel(s.to_string()))
    }
}

/// Builds a `notifications/message` notification.
#[must_use]
pub fn log_notification(
    level: LogLevel,
    message: &str,
    logger: Option<&str>,
    data: Option<Value>,
) -> JsonRpcMessage {
    let mut params = json!({
        "level": level,
        "message": message,
    });
    if let Some(data) = data {
        params["data"] = data;
    }
    if let Some(logger) = logger {
        params["logger"] = Value::String(logger.to_string());
    }
    JsonRpcMessage::notification(LOG_NOTIFICATION_METHOD, Some(params))
}

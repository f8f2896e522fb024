//! Transport abstraction for the MCP server.
//!
//! A transport frames wire units and turns them into [`Incoming`] units.
//! Every binding shares one decoding rule:
//!
//! - a JSON object is a single message
//! - a JSON array is a batch; `[]` is an empty batch, not a closed channel
//! - a batch with a non-object element, or any other JSON value, is an
//!   invalid request
//! - a malformed object inside a batch fails on its own and is answered in
//!   place
//!
//! Bindings:
//!
//! - [`stdio`]: newline-delimited JSON over a reader/writer pair
//! - [`http`]: one buffered HTTP request/response exchange

pub mod http;
pub mod stdio;

use std::io;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::mcp::protocol::{ErrorCode, JsonRpcMessage, MessageError, Payload};

pub use http::{Exchange, HttpRequest, HttpResponse, HttpTransport};
pub use stdio::StdioTransport;

/// Default upper bound for one wire unit (10 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// One decoded batch element.
pub type BatchEntry = Result<JsonRpcMessage, MessageError>;

/// One decoded inbound wire unit.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// A lone, well-formed message.
    Single(JsonRpcMessage),
    /// A JSON array; each element decoded independently, in wire order.
    Batch(Vec<BatchEntry>),
}

impl Incoming {
    /// Returns `true` if the unit arrived as a JSON array.
    #[must_use]
    pub const fn is_batch(&self) -> bool {
        matches!(self, Self::Batch(_))
    }

    /// Returns the number of elements in the unit.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Batch(entries) => entries.len(),
        }
    }

    /// Returns `true` for an empty batch.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consumes the unit, returning its elements in wire order.
    #[must_use]
    pub fn into_entries(self) -> Vec<BatchEntry> {
        match self {
            Self::Single(message) => vec![Ok(message)],
            Self::Batch(entries) => entries,
        }
    }
}

impl From<Payload> for Incoming {
    fn from(payload: Payload) -> Self {
        match payload {
            Payload::Single(message) => Self::Single(message),
            Payload::Batch(messages) => Self::Batch(messages.into_iter().map(Ok).collect()),
        }
    }
}

/// Outcome of one [`Transport::receive`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// One wire unit: a single message or a (possibly empty) batch.
    Messages(Incoming),
    /// The transport is open but has nothing to process right now.
    Idle,
    /// No further input will arrive.
    Closed,
}

/// Errors raised by a transport binding.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The unit could not be decoded into messages.
    #[error(transparent)]
    Message(#[from] MessageError),

    /// The unit exceeds the configured size limit.
    #[error("message too large: {size} bytes exceeds the {max} byte limit")]
    MessageTooLarge {
        /// Observed size in bytes (a lower bound when reading was cut off).
        size: usize,
        /// Configured maximum in bytes.
        max: usize,
    },

    /// Reading from the underlying channel failed.
    #[error("failed to read from transport")]
    Read {
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Writing to the underlying channel failed or was incomplete.
    #[error("failed to write to transport")]
    Write {
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The serialised payload would break newline framing.
    #[error("serialised payload contains an embedded newline")]
    EmbeddedNewline,

    /// The payload could not be serialised.
    #[error("failed to serialise payload")]
    Serialize {
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// HTTP exchange used a method other than `POST`.
    #[error("HTTP method not allowed: {method}")]
    MethodNotAllowed {
        /// The rejected method.
        method: String,
    },

    /// HTTP exchange carried an unsupported content type.
    #[error("unsupported content type: {content_type}")]
    UnsupportedMediaType {
        /// The rejected content type (empty when missing).
        content_type: String,
    },

    /// The server has no transport bound.
    #[error("no transport connected")]
    NotConnected,
}

impl TransportError {
    /// Returns `true` if the session cannot continue after this error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MessageTooLarge { .. }
                | Self::Read { .. }
                | Self::Write { .. }
                | Self::EmbeddedNewline
                | Self::NotConnected
        )
    }

    /// Returns the JSON-RPC code that describes this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Message(err) => err.code(),
            Self::MessageTooLarge { .. }
            | Self::MethodNotAllowed { .. }
            | Self::UnsupportedMediaType { .. } => ErrorCode::InvalidRequest,
            Self::Read { .. }
            | Self::Write { .. }
            | Self::EmbeddedNewline
            | Self::Serialize { .. }
            | Self::NotConnected => ErrorCode::InternalError,
        }
    }

    /// Returns the error response to send back for this failure.
    ///
    /// Only message-level failures with a recoverable request ID produce
    /// one; everything else is answered by logging.
    #[must_use]
    pub fn reply(&self) -> Option<JsonRpcMessage> {
        match self {
            Self::Message(err) if err.id().is_some() => Some(err.to_response()),
            _ => None,
        }
    }
}

/// A bidirectional message channel bound to one server session.
#[async_trait]
pub trait Transport: Send {
    /// Waits for the next wire unit.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`]; see [`TransportError::is_fatal`] for
    /// which errors end the session.
    async fn receive(&mut self) -> Result<Inbound, TransportError>;

    /// Serialises and transmits one message or a batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialised or written.
    async fn send(&mut self, payload: Payload) -> Result<(), TransportError>;

    /// Returns `true` once no further input will arrive.
    fn is_closed(&self) -> bool;
}

/// Decodes one raw wire unit.
///
/// Returns `Ok(None)` for an empty or whitespace-only unit.
///
/// # Errors
///
/// - [`TransportError::MessageTooLarge`] when `raw` exceeds `max_size`
/// - [`MessageError::Parse`] for invalid JSON
/// - [`MessageError::Invalid`] for a scalar payload, a non-object batch
///   element (naming its index) or a malformed single message
///
/// A malformed object inside a batch does not fail the unit; its error is
/// kept in place as that element's [`BatchEntry`].
pub fn decode_payload(raw: &[u8], max_size: usize) -> Result<Option<Incoming>, TransportError> {
    if raw.len() > max_size {
        return Err(TransportError::MessageTooLarge {
            size: raw.len(),
            max: max_size,
        });
    }

    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let value: Value = serde_json::from_slice(raw).map_err(MessageError::from)?;

    match value {
        Value::Array(items) => {
            if let Some(index) = items.iter().position(|item| !item.is_object()) {
                return Err(MessageError::invalid(
                    format!("batch element {index} is not a JSON object"),
                    None,
                )
                .into());
            }

            let entries = items
                .into_iter()
                .enumerate()
                .map(|(index, item)| {
                    JsonRpcMessage::inbound_from_value(item).map_err(|err| match err {
                        MessageError::Invalid { message, id } => MessageError::Invalid {
                            message: format!("batch element {index}: {message}"),
                            id,
                        },
                        other @ MessageError::Parse { .. } => other,
                    })
                })
                .collect();
            Ok(Some(Incoming::Batch(entries)))
        }
        Value::Object(_) => Ok(Some(Incoming::Single(JsonRpcMessage::inbound_from_value(
            value,
        )?))),
        _ => Err(MessageError::invalid("payload must be a JSON object or array", None).into()),
    }
}

/// Serialises a payload as compact single-line JSON.
///
/// # Errors
///
/// Returns [`TransportError::Serialize`] if serialisation fails.
pub fn encode_payload(payload: &Payload) -> Result<String, TransportError> {
    serde_json::to_string(payload).map_err(|source| TransportError::Serialize { source })
}

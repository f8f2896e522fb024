//! The pluggable capability interface consumed by the server core.
//!
//! A capability advertises what it supports during `initialize`, claims the
//! methods it understands and answers them. Registration order matters:
//! it is the order of `initialize`/`shutdown` calls, of capability-map
//! merging, and of dispatch priority (first claim wins).

use serde_json::{Map, Value};

use crate::error::McpError;
use crate::mcp::protocol::JsonRpcMessage;

/// A protocol feature provider (tools, resources, prompts, ...).
///
/// Methods are synchronous: dispatch never yields, so one slow capability
/// stalls the whole session.
pub trait Capability: Send {
    /// Short name used for diagnostics and name lookup.
    fn name(&self) -> &str;

    /// Entries merged into the `capabilities` object returned by `initialize`.
    fn capabilities(&self) -> Map<String, Value>;

    /// Returns `true` if this capability handles `message`.
    fn can_handle_message(&self, message: &JsonRpcMessage) -> bool;

    /// Handles a claimed message.
    ///
    /// Returns `Ok(None)` for notifications.
    ///
    /// # Errors
    ///
    /// Named [`McpError`] kinds map to their JSON-RPC codes; anything else
    /// should be [`McpError::Internal`].
    fn handle_message(&mut self, message: &JsonRpcMessage)
        -> Result<Option<JsonRpcMessage>, McpError>;

    /// Called once during the `initialize` handshake.
    ///
    /// # Errors
    ///
    /// A failure aborts the handshake.
    fn initialize(&mut self) -> Result<(), McpError> {
        Ok(())
    }

    /// Called once when the session shuts down.
    ///
    /// # Errors
    ///
    /// A failure stops the remaining capabilities from being shut down.
    fn shutdown(&mut self) -> Result<(), McpError> {
        Ok(())
    }
}

//! `ping` liveness check.

use serde_json::{json, Map, Value};

use crate::error::McpError;
use crate::mcp::capability::Capability;
use crate::mcp::protocol::JsonRpcMessage;

/// Answers `ping` with an empty result.
#[derive(Debug, Default, Clone, Copy)]
pub struct PingCapability;

impl Capability for PingCapability {
    fn name(&self) -> &str {
        "ping"
    }

    fn capabilities(&self) -> Map<String, Value> {
        Map::new()
    }

    fn can_handle_message(&self, message: &JsonRpcMessage) -> bool {
        message.method() == Some("ping")
    }

    fn handle_message(
        &mut self,
        message: &JsonRpcMessage,
    ) -> Result<Option<JsonRpcMessage>, McpError> {
        Ok(message
            .id()
            .map(|id| JsonRpcMessage::result(id.clone(), json!({}))))
    }
}

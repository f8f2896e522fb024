//! Model Context Protocol (MCP) server core.
//!
//! This module implements the JSON-RPC 2.0 message model, the transport
//! abstraction with stdio and HTTP bindings, and a server that drives the
//! MCP lifecycle and routes methods to pluggable capabilities.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         MCP Server                          │
//! │                                                             │
//! │   ┌─────────────┐    ┌─────────────┐    ┌──────────────┐   │
//! │   │  Transport  │───▶│   Server    │───▶│ Capabilities │   │
//! │   │ (stdio/http)│    │ (lifecycle) │    │  (handlers)  │   │
//! │   └─────────────┘    └─────────────┘    └──────────────┘   │
//! │          │                  │                  │            │
//! │          ▼                  ▼                  ▼            │
//! │   ┌─────────────────────────────────────────────────┐      │
//! │   │              JSON-RPC Messages                  │      │
//! │   └─────────────────────────────────────────────────┘      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! This implementation reports MCP protocol version 2025-03-26.

pub mod auth;
pub mod capability;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod transport;

pub use capability::Capability;
pub use logging::LogLevel;
pub use protocol::{
    ErrorCode, ErrorObject, JsonRpcMessage, MessageError, Payload, RequestId, MCP_PROTOCOL_VERSION,
};
pub use server::{Flow, McpServer, ServerState};
pub use transport::{
    BatchEntry, HttpTransport, Inbound, Incoming, StdioTransport, Transport, TransportError,
};

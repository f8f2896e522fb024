//! mcp-core-server: a Model Context Protocol server core
//!
//! This library implements the JSON-RPC 2.0 message model, a transport
//! abstraction with stdio and HTTP bindings, and a server that drives the
//! MCP lifecycle and dispatches methods to pluggable capabilities.
//!
//! # Architecture
//!
//! The server core knows only three methods:
//!
//! - **`initialize`**: optional authorization and capability start-up
//! - **`shutdown`**: capability tear-down
//! - **`logging/setLevel`**: the client's log forwarding threshold
//!
//! Everything else is routed to the first registered [`mcp::Capability`]
//! that claims it.
//!
//! # Modules
//!
//! - [`capabilities`]: Bundled capabilities (ping, tools)
//! - [`config`]: Configuration loading and validation
//! - [`error`]: Error types
//! - [`http`]: Axum HTTP binding
//! - [`mcp`]: MCP protocol implementation

pub mod capabilities;
pub mod config;
pub mod error;
pub mod http;
pub mod mcp;

//! Capabilities bundled with the server binary.
//!
//! - [`PingCapability`]: liveness check
//! - [`ToolsCapability`]: `tools/list` and `tools/call` over a tool registry
//! - [`CalculatorTool`]: a sample tool

pub mod calculator;
pub mod ping;
pub mod tools;

pub use calculator::CalculatorTool;
pub use ping::PingCapability;
pub use tools::{
    ParameterDescriptor, ParameterType, Tool, ToolCallResult, ToolContent, ToolDescriptor,
    ToolsCapability,
};

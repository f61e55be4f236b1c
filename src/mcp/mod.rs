//! MCP (Model Context Protocol) server implementation
//!
//! JSON-RPC over stdio for AI tool integration.

pub mod protocol;
pub mod tools;

pub use protocol::{
    methods, InitializeResult, McpError, McpHandler, McpRequest, McpResponse, McpServer,
    ResourceContent, ToolCallResult, ToolContent, ToolDefinition,
};
pub use tools::{get_tool_definitions, TOOL_DEFINITIONS, TOOL_NAMES};

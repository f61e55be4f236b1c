//! kintone MCP gateway
//!
//! Serves kintone apps, records, comments and attachments as MCP tools
//! over a stdio JSON-RPC connection.

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod kintone;
pub mod mcp;

pub use config::{ConfigOverrides, Configuration, GatewayConfig};
pub use error::{GatewayError, Result};
pub use gateway::Gateway;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

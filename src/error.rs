//! Error types for the kintone gateway

use serde_json::{json, Value};
use thiserror::Error;

use crate::mcp::protocol::McpError;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

// JSON-RPC 2.0 standard error codes.
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// Main error type for the gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("{0}")]
    InvalidParams(String),

    #[error("Unknown tool name: {0}")]
    UnknownTool(String),

    #[error("{message}")]
    PermissionDenied { app_id: String, message: String },

    #[error("kintone server returned an error")]
    Backend { status: u16, body: String },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("File error ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Shorthand for a parameter error
    pub fn params(message: impl Into<String>) -> Self {
        GatewayError::InvalidParams(message.into())
    }

    /// Wrap an I/O failure together with the path it concerned
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        GatewayError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the caller is at fault (bad arguments or denied access)
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            GatewayError::InvalidParams(_)
                | GatewayError::UnknownTool(_)
                | GatewayError::PermissionDenied { .. }
        )
    }

    /// Get error code for MCP protocol
    pub fn code(&self) -> i64 {
        match self {
            GatewayError::Parse(_) => PARSE_ERROR,
            GatewayError::InvalidRequest(_) => INVALID_REQUEST,
            GatewayError::MethodNotFound(_) => METHOD_NOT_FOUND,
            GatewayError::InvalidParams(_)
            | GatewayError::UnknownTool(_)
            | GatewayError::PermissionDenied { .. } => INVALID_PARAMS,
            _ => INTERNAL_ERROR,
        }
    }

    /// Diagnostic payload carried in the error envelope's `data` member
    pub fn data(&self) -> Option<Value> {
        match self {
            GatewayError::Backend { status, body } => Some(json!({
                "statusCode": status,
                "message": body,
            })),
            GatewayError::PermissionDenied { app_id, .. } => Some(json!({ "appID": app_id })),
            GatewayError::Io { path, .. } => Some(json!({ "path": path })),
            _ => None,
        }
    }

    /// Convert to the JSON-RPC error object sent on the wire
    pub fn to_rpc_error(&self) -> McpError {
        McpError {
            code: self.code(),
            message: self.to_string(),
            data: self.data(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_fault_codes() {
        assert_eq!(GatewayError::params("bad").code(), INVALID_PARAMS);
        assert_eq!(
            GatewayError::UnknownTool("nope".into()).code(),
            INVALID_PARAMS
        );
        let denied = GatewayError::PermissionDenied {
            app_id: "7".into(),
            message: "denied".into(),
        };
        assert_eq!(denied.code(), INVALID_PARAMS);
        assert!(denied.is_client_fault());
        assert_eq!(denied.data().unwrap()["appID"], "7");
    }

    #[test]
    fn test_backend_error_carries_status_and_body() {
        let err = GatewayError::Backend {
            status: 520,
            body: r#"{"code":"GAIA_AP01"}"#.into(),
        };
        let rpc = err.to_rpc_error();
        assert_eq!(rpc.code, INTERNAL_ERROR);
        assert_eq!(rpc.message, "kintone server returned an error");
        let data = rpc.data.unwrap();
        assert_eq!(data["statusCode"], 520);
        assert_eq!(data["message"], r#"{"code":"GAIA_AP01"}"#);
        assert!(!err.is_client_fault());
    }

    #[test]
    fn test_io_error_names_path() {
        let err = GatewayError::io(
            "/tmp/missing.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        assert_eq!(err.code(), INTERNAL_ERROR);
        assert_eq!(err.data().unwrap()["path"], "/tmp/missing.txt");
        assert!(err.to_string().contains("/tmp/missing.txt"));
    }

    #[test]
    fn test_protocol_codes() {
        assert_eq!(GatewayError::Parse("x".into()).code(), PARSE_ERROR);
        assert_eq!(
            GatewayError::InvalidRequest("x".into()).code(),
            INVALID_REQUEST
        );
        assert_eq!(
            GatewayError::MethodNotFound("x".into()).code(),
            METHOD_NOT_FOUND
        );
    }
}

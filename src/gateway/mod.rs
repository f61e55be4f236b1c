//! MCP handler translating tool calls into kintone requests

mod apps;
pub mod args;
mod comments;
mod files;
mod records;

use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::{Access, AccessPolicy, AppOverride};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::kintone::{AppDetail, KintoneClient};
use crate::mcp::tools;
use crate::mcp::{get_tool_definitions, methods, InitializeResult, McpHandler, ToolCallResult};

/// `tools/call` parameters
#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// The gateway: one kintone client plus the access policy in force
pub struct Gateway {
    client: KintoneClient,
    policy: Arc<dyn AccessPolicy>,
    download_dir: PathBuf,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = KintoneClient::new(config.base_url, &config.credentials)?;
        tracing::info!(
            url = %client.base_url(),
            policy = config.policy.name(),
            "kintone gateway ready"
        );
        Ok(Self {
            client,
            policy: config.policy,
            download_dir: config.download_dir,
        })
    }

    pub fn policy(&self) -> &dyn AccessPolicy {
        self.policy.as_ref()
    }

    /// Run one tool by name
    pub fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult> {
        tracing::debug!(tool = name, "tool call");
        match name {
            tools::LIST_APPS => self.list_apps(arguments),
            tools::READ_APP_INFO => self.read_app_info(arguments),
            tools::CREATE_RECORD => self.create_record(arguments),
            tools::READ_RECORDS => self.read_records(arguments),
            tools::UPDATE_RECORD => self.update_record(arguments),
            tools::DELETE_RECORD => self.delete_record(arguments),
            tools::DOWNLOAD_ATTACHMENT_FILE => self.download_attachment_file(arguments),
            tools::UPLOAD_ATTACHMENT_FILE => self.upload_attachment_file(arguments),
            tools::READ_RECORD_COMMENTS => self.read_record_comments(arguments),
            tools::CREATE_RECORD_COMMENT => self.create_record_comment(arguments),
            other => Err(GatewayError::UnknownTool(other.to_string())),
        }
    }

    /// Policy check that logs denials
    fn check(&self, app_id: &str, access: Access) -> Result<()> {
        self.policy.check_access(app_id, access).map_err(|e| {
            tracing::warn!(app_id, ?access, "access denied");
            e
        })
    }

    /// Merge locally configured description and permissions into app info
    fn annotate(&self, mut app: AppDetail) -> AppDetail {
        let AppOverride {
            description,
            permissions,
        } = self.policy.app_override(&app.app_id);
        app.description_for_ai = description;
        app.permissions = permissions;
        app
    }
}

impl McpHandler for Gateway {
    fn handle_method(&self, method: &str, params: Value) -> Result<Option<Value>> {
        match method {
            methods::INITIALIZE => Ok(Some(serde_json::to_value(InitializeResult::default())?)),
            methods::INITIALIZED => Ok(None),
            methods::PING => Ok(Some(json!({}))),
            methods::LIST_TOOLS => Ok(Some(json!({ "tools": get_tool_definitions() }))),
            methods::CALL_TOOL => {
                let call: ToolCallParams = serde_json::from_value(params).map_err(|e| {
                    GatewayError::params(format!("Failed to parse parameters: {}", e))
                })?;
                let result = self.call_tool(&call.name, call.arguments)?;
                Ok(Some(serde_json::to_value(result)?))
            }
            other => Err(GatewayError::MethodNotFound(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AllowDenyPolicy;
    use crate::kintone::Credentials;
    use reqwest::Url;

    /// Points at a port nothing listens on; tests here must not reach it
    fn gateway() -> Gateway {
        Gateway::new(GatewayConfig {
            base_url: Url::parse("http://127.0.0.1:9").unwrap(),
            credentials: Credentials::new(None, None, Some("t")),
            policy: Arc::new(AllowDenyPolicy::new(vec![], vec!["13".to_string()])),
            download_dir: std::env::temp_dir(),
        })
        .unwrap()
    }

    #[test]
    fn test_lifecycle_methods() {
        let g = gateway();
        let init = g.handle_method(methods::INITIALIZE, json!({})).unwrap().unwrap();
        assert_eq!(init["protocolVersion"], "2024-11-05");
        assert_eq!(init["serverInfo"]["name"], "kintone");
        assert!(init["capabilities"]["tools"].is_object());

        assert_eq!(g.handle_method(methods::INITIALIZED, Value::Null).unwrap(), None);
        assert_eq!(g.handle_method(methods::PING, Value::Null).unwrap(), Some(json!({})));
    }

    #[test]
    fn test_tools_list_serves_catalog() {
        let listed = gateway()
            .handle_method(methods::LIST_TOOLS, json!({}))
            .unwrap()
            .unwrap();
        let names: Vec<&str> = listed["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, tools::TOOL_NAMES);
        assert!(listed["tools"][0]["inputSchema"].is_object());
    }

    #[test]
    fn test_unknown_method_and_tool() {
        let g = gateway();
        let err = g.handle_method("resources/list", json!({})).unwrap_err();
        assert_eq!(err.code(), crate::error::METHOD_NOT_FOUND);

        let err = g
            .handle_method(methods::CALL_TOOL, json!({"name": "dropTable", "arguments": {}}))
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown tool name: dropTable");
        assert_eq!(err.code(), crate::error::INVALID_PARAMS);
    }

    #[test]
    fn test_denied_before_any_request() {
        let err = gateway()
            .call_tool(tools::READ_RECORDS, json!({"appID": "13"}))
            .unwrap_err();
        assert!(matches!(err, GatewayError::PermissionDenied { .. }));
    }

    #[test]
    fn test_call_without_name_is_a_parameter_error() {
        let err = gateway()
            .handle_method(methods::CALL_TOOL, json!({"arguments": {}}))
            .unwrap_err();
        assert!(err.is_client_fault());
    }
}

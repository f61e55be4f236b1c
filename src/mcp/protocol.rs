//! MCP JSON-RPC protocol implementation

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{BufRead, BufReader, Write};

use crate::error::{GatewayError, Result};

/// MCP JSON-RPC request
///
/// A missing `id` marks the message as a notification; `"id": null` is
/// still a call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    pub jsonrpc: String,
    #[serde(
        default,
        deserialize_with = "present_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

fn present_id<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl McpRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// MCP JSON-RPC response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

/// MCP error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl McpResponse {
    /// Create a success response
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create error from GatewayError
    pub fn from_error(id: Value, err: &GatewayError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(err.to_rpc_error()),
        }
    }
}

/// Trait for handling MCP methods
///
/// `Ok(None)` means the method produced nothing to send back.
pub trait McpHandler: Send + Sync {
    fn handle_method(&self, method: &str, params: Value) -> Result<Option<Value>>;
}

/// Outcome of decoding one inbound frame
#[derive(Debug)]
pub enum Frame {
    Request(McpRequest),
    /// Unusable frame; `notification` is set when it looked like one
    Invalid {
        id: Value,
        notification: bool,
        error: GatewayError,
    },
}

/// Decode a single line into a request
pub fn parse_frame(line: &[u8]) -> Frame {
    let value: Value = match serde_json::from_slice(line) {
        Ok(v) => v,
        Err(e) => {
            return Frame::Invalid {
                id: Value::Null,
                notification: false,
                error: GatewayError::Parse(e.to_string()),
            }
        }
    };

    let Some(object) = value.as_object() else {
        return Frame::Invalid {
            id: Value::Null,
            notification: false,
            error: GatewayError::InvalidRequest("message must be a JSON object".to_string()),
        };
    };
    let notification =
        !object.contains_key("id") && object.get("method").is_some_and(Value::is_string);
    let id = object.get("id").cloned().unwrap_or(Value::Null);

    match serde_json::from_value::<McpRequest>(value) {
        Ok(request) if request.jsonrpc == "2.0" => Frame::Request(request),
        Ok(request) => Frame::Invalid {
            id,
            notification,
            error: GatewayError::InvalidRequest(format!(
                "expected jsonrpc version \"2.0\", got \"{}\"",
                request.jsonrpc
            )),
        },
        Err(e) => Frame::Invalid {
            id,
            notification,
            error: GatewayError::InvalidRequest(e.to_string()),
        },
    }
}

/// MCP Server handling one stdio-style connection
pub struct McpServer<H>
where
    H: McpHandler,
{
    handler: H,
}

impl<H: McpHandler> McpServer<H> {
    /// Create a new MCP server
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Run the server, reading from stdin and writing to stdout
    pub fn run(&self) -> Result<()> {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        self.serve(BufReader::new(stdin.lock()), stdout.lock())
    }

    /// Serve newline-delimited frames until end of stream.
    ///
    /// Each frame is fully handled before the next one is read. Only
    /// failures of the stream itself end the loop with an error.
    pub fn serve<R: BufRead, W: Write>(&self, mut reader: R, mut writer: W) -> Result<()> {
        let mut line = Vec::new();

        loop {
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .map_err(|e| GatewayError::io("<stdin>", e))?;
            if read == 0 {
                tracing::info!("Input stream closed, shutting down");
                return Ok(());
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let response = match parse_frame(&line) {
                Frame::Request(request) => self.dispatch(request),
                Frame::Invalid {
                    notification: true,
                    error,
                    ..
                } => {
                    tracing::debug!("Dropping malformed notification: {}", error);
                    None
                }
                Frame::Invalid { id, error, .. } => {
                    tracing::debug!("Rejecting malformed frame: {}", error);
                    Some(McpResponse::from_error(id, &error))
                }
            };

            if let Some(response) = response {
                let response_json = serde_json::to_string(&response)?;
                writeln!(writer, "{}", response_json)
                    .and_then(|_| writer.flush())
                    .map_err(|e| GatewayError::io("<stdout>", e))?;
            }
        }
    }

    /// Route one request to the handler and build the reply, if any
    pub fn dispatch(&self, request: McpRequest) -> Option<McpResponse> {
        tracing::debug!(method = %request.method, "dispatching");
        let outcome = self.handler.handle_method(&request.method, request.params);

        let Some(id) = request.id else {
            if let Err(e) = outcome {
                tracing::debug!("Notification {} failed: {}", request.method, e);
            }
            return None;
        };

        match outcome {
            Ok(Some(result)) => Some(McpResponse::success(id, result)),
            Ok(None) => None,
            Err(e) => {
                if e.is_client_fault() {
                    tracing::debug!("{} rejected: {}", request.method, e);
                } else {
                    tracing::warn!("{} failed: {}", request.method, e);
                }
                Some(McpResponse::from_error(id, &e))
            }
        }
    }
}

/// Standard MCP methods
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const PING: &str = "ping";
    pub const LIST_TOOLS: &str = "tools/list";
    pub const CALL_TOOL: &str = "tools/call";
}

/// MCP tool definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// MCP initialize result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
    pub instructions: String,
}

/// Server capabilities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCapabilities {
    pub tools: ToolsCapability,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsCapability {
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Server info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl Default for InitializeResult {
    fn default() -> Self {
        Self {
            protocol_version: "2024-11-05".to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: false,
                },
            },
            server_info: ServerInfo {
                name: "kintone".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: "kintone is a database service to store and manage enterprise data. \
                           You can use this server to interact with kintone."
                .to_string(),
        }
    }
}

/// Tool call result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "resource")]
    Resource { resource: ResourceContent },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceContent {
    pub uri: String,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Base64 payload for non-textual content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}

impl ToolCallResult {
    /// Create a text result
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Create a JSON result, pretty-printed into a single text item
    pub fn json(value: &impl Serialize) -> Result<Self> {
        let text = serde_json::to_string_pretty(value)?;
        Ok(Self::text(text))
    }

    /// Append a resource item
    pub fn with_resource(mut self, resource: ResourceContent) -> Self {
        self.content.push(ToolContent::Resource { resource });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct Echo {
        seen: Mutex<Vec<String>>,
    }

    impl McpHandler for Echo {
        fn handle_method(&self, method: &str, params: Value) -> Result<Option<Value>> {
            self.seen.lock().unwrap().push(method.to_string());
            match method {
                "echo" => Ok(Some(params)),
                "quiet" => Ok(None),
                "boom" => Err(GatewayError::Internal("exploded".into())),
                other => Err(GatewayError::MethodNotFound(other.to_string())),
            }
        }
    }

    fn serve(input: &str) -> (Vec<Value>, Vec<String>) {
        let server = McpServer::new(Echo {
            seen: Mutex::new(Vec::new()),
        });
        let mut out = Vec::new();
        server.serve(input.as_bytes(), &mut out).unwrap();
        let frames = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        let seen = server.handler().seen.lock().unwrap().clone();
        (frames, seen)
    }

    #[test]
    fn test_call_gets_result_with_same_id() {
        let (frames, _) =
            serve("{\"jsonrpc\":\"2.0\",\"id\":\"a-1\",\"method\":\"echo\",\"params\":{\"x\":1}}\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["id"], "a-1");
        assert_eq!(frames[0]["result"], json!({"x": 1}));
        assert!(frames[0].get("error").is_none());
    }

    #[test]
    fn test_unknown_method_returns_method_not_found() {
        let (frames, _) = serve("{\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"nope\"}\n");
        assert_eq!(frames[0]["id"], 3);
        assert_eq!(frames[0]["error"]["code"], -32601);
    }

    #[test]
    fn test_notifications_are_never_answered() {
        let input = concat!(
            "{\"jsonrpc\":\"2.0\",\"method\":\"echo\"}\n",
            "{\"jsonrpc\":\"2.0\",\"method\":\"boom\"}\n",
            "{\"jsonrpc\":\"2.0\",\"method\":\"missing\"}\n",
            "{\"jsonrpc\":\"1.0\",\"method\":\"echo\"}\n",
        );
        let (frames, seen) = serve(input);
        assert!(frames.is_empty());
        assert_eq!(seen, vec!["echo", "boom", "missing"]);
    }

    #[test]
    fn test_null_id_is_still_a_call() {
        let input = concat!(
            "{\"jsonrpc\":\"2.0\",\"id\":null,\"method\":\"echo\",\"params\":7}\n",
            "{\"jsonrpc\":\"2.0\",\"id\":null,\"method\":\"missing\"}\n",
            "{\"jsonrpc\":\"1.0\",\"id\":null,\"method\":\"echo\"}\n",
        );
        let (frames, seen) = serve(input);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0]["id"], Value::Null);
        assert_eq!(frames[0]["result"], 7);
        assert_eq!(frames[1]["error"]["code"], -32601);
        assert_eq!(frames[2]["error"]["code"], -32600);
        assert_eq!(seen, vec!["echo", "missing"]);
    }

    #[test]
    fn test_empty_result_writes_nothing() {
        let (frames, seen) = serve("{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"quiet\"}\n");
        assert!(frames.is_empty());
        assert_eq!(seen, vec!["quiet"]);
    }

    #[test]
    fn test_malformed_frames_do_not_stop_the_loop() {
        let input = concat!(
            "not json\n",
            "\n",
            "[1,2]\n",
            "{\"jsonrpc\":\"2.0\",\"id\":9}\n",
            "{\"jsonrpc\":\"2.0\",\"id\":10,\"method\":\"echo\",\"params\":true}\n",
        );
        let (frames, _) = serve(input);
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0]["error"]["code"], -32700);
        assert_eq!(frames[0]["id"], Value::Null);
        assert_eq!(frames[1]["error"]["code"], -32600);
        assert_eq!(frames[2]["error"]["code"], -32600);
        assert_eq!(frames[2]["id"], 9);
        assert_eq!(frames[3]["result"], true);
    }

    #[test]
    fn test_handler_error_carries_code_and_message() {
        let (frames, _) = serve("{\"jsonrpc\":\"2.0\",\"id\":5,\"method\":\"boom\"}\n");
        assert_eq!(frames[0]["error"]["code"], -32603);
        assert_eq!(frames[0]["error"]["message"], "Internal error: exploded");
    }

    #[test]
    fn test_last_line_without_newline_is_served() {
        let (frames, _) = serve("{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"echo\",\"params\":2}");
        assert_eq!(frames[0]["result"], 2);
    }

    #[test]
    fn test_tool_content_wire_shape() {
        let result = ToolCallResult::text("hi").with_resource(ResourceContent {
            uri: "file:///tmp/a.png".into(),
            mime_type: Some("image/png".into()),
            text: None,
            blob: Some("AAEC".into()),
        });
        let wire = serde_json::to_value(&result).unwrap();
        assert_eq!(
            wire,
            json!({
                "content": [
                    {"type": "text", "text": "hi"},
                    {"type": "resource", "resource": {
                        "uri": "file:///tmp/a.png",
                        "mimeType": "image/png",
                        "blob": "AAEC"
                    }}
                ],
                "isError": false
            })
        );
    }
}

//! MCP tool definitions for the kintone gateway
//!
//! The catalog is built once on first use and never changes afterwards.
//! Every name listed here has an executor in [`crate::gateway`].

use once_cell::sync::Lazy;
use serde_json::{json, Value};

use super::protocol::ToolDefinition;

pub const LIST_APPS: &str = "listApps";
pub const READ_APP_INFO: &str = "readAppInfo";
pub const CREATE_RECORD: &str = "createRecord";
pub const READ_RECORDS: &str = "readRecords";
pub const UPDATE_RECORD: &str = "updateRecord";
pub const DELETE_RECORD: &str = "deleteRecord";
pub const DOWNLOAD_ATTACHMENT_FILE: &str = "downloadAttachmentFile";
pub const UPLOAD_ATTACHMENT_FILE: &str = "uploadAttachmentFile";
pub const READ_RECORD_COMMENTS: &str = "readRecordComments";
pub const CREATE_RECORD_COMMENT: &str = "createRecordComment";

/// Names of every tool, in catalog order
pub const TOOL_NAMES: &[&str] = &[
    LIST_APPS,
    READ_APP_INFO,
    CREATE_RECORD,
    READ_RECORDS,
    UPDATE_RECORD,
    DELETE_RECORD,
    DOWNLOAD_ATTACHMENT_FILE,
    UPLOAD_ATTACHMENT_FILE,
    READ_RECORD_COMMENTS,
    CREATE_RECORD_COMMENT,
];

/// All tool definitions, constructed once
pub static TOOL_DEFINITIONS: Lazy<Vec<ToolDefinition>> = Lazy::new(build_catalog);

/// Get all tool definitions as ToolDefinition structs
pub fn get_tool_definitions() -> &'static [ToolDefinition] {
    &TOOL_DEFINITIONS
}

fn tool(name: &str, description: &str, input_schema: Value) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

/// Schema of a `{value: ...}` field wrapper inside a table row
fn row_field_schema() -> Value {
    json!({
        "type": "object",
        "required": ["value"],
        "properties": {
            "value": {
                "anyOf": [
                    {"type": "string"},
                    {"type": "array", "items": {"type": "string"}},
                    {"type": "array", "items": {"type": "object", "required": ["fileKey"], "properties": {"fileKey": {"type": "string"}}}},
                    {"type": "array", "items": {"type": "object", "required": ["code"], "properties": {"code": {"type": "string"}}}}
                ]
            }
        }
    })
}

/// Schema of a record payload: field code -> `{value: ...}`
fn record_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "description": description,
        "additionalProperties": {
            "type": "object",
            "required": ["value"],
            "properties": {
                "value": {
                    "anyOf": [
                        {
                            "type": "string",
                            "description": "Usual values for text, number, date, etc."
                        },
                        {
                            "type": "array",
                            "description": "Values for checkbox, multi-select, and category.",
                            "items": {"type": "string"}
                        },
                        {
                            "type": "array",
                            "description": "Values for user, group, and organization selection, identified by code.",
                            "items": {
                                "type": "object",
                                "required": ["code"],
                                "properties": {
                                    "code": {"type": "string"},
                                    "name": {"type": "string"}
                                }
                            }
                        },
                        {
                            "type": "object",
                            "description": "Value for creator and modifier.",
                            "required": ["code"],
                            "properties": {
                                "code": {"type": "string"},
                                "name": {"type": "string"}
                            }
                        },
                        {
                            "type": "array",
                            "description": "Values for attachment. Use the fileKey returned by 'uploadAttachmentFile'.",
                            "items": {
                                "type": "object",
                                "required": ["fileKey"],
                                "properties": {
                                    "fileKey": {"type": "string"},
                                    "name": {"type": "string"},
                                    "contentType": {"type": "string"}
                                }
                            }
                        },
                        {
                            "type": "array",
                            "description": "Values for table. Each row wraps its own fields.",
                            "items": {
                                "type": "object",
                                "required": ["value"],
                                "properties": {
                                    "id": {"type": "string"},
                                    "value": {
                                        "type": "object",
                                        "additionalProperties": row_field_schema()
                                    }
                                }
                            }
                        }
                    ]
                }
            }
        }
    })
}

fn app_id_schema(description: &str) -> Value {
    json!({"type": "string", "description": description})
}

fn record_id_schema(description: &str) -> Value {
    json!({"type": ["string", "integer"], "description": description})
}

fn build_catalog() -> Vec<ToolDefinition> {
    vec![
        tool(
            LIST_APPS,
            "List applications made on kintone that this server may access. Response includes the app ID, name, description, and whether more apps exist after this page.",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Part of the app name to search for. Default is no filter."},
                    "offset": {"type": "integer", "minimum": 0, "default": 0, "description": "The offset of apps to read."},
                    "limit": {"type": "integer", "minimum": 1, "maximum": 100, "default": 100, "description": "The maximum number of apps to read. Default and maximum is 100."}
                }
            }),
        ),
        tool(
            READ_APP_INFO,
            "Get information about the specified app. Response includes the app ID, name, description, and schema.",
            json!({
                "type": "object",
                "required": ["appID"],
                "properties": {
                    "appID": app_id_schema("The app ID to get information from.")
                }
            }),
        ),
        tool(
            CREATE_RECORD,
            "Create a new record in the specified app. Before use this tool, you better to know the schema of the app by using 'readAppInfo' tool.",
            json!({
                "type": "object",
                "required": ["appID", "record"],
                "properties": {
                    "appID": app_id_schema("The app ID to create a record in."),
                    "record": record_schema(r#"The record data to create. Record data format is the same as kintone's record data format. For example, {"field1": {"value": "value1"}, "field2": {"value": ["a", "b"]}}."#)
                }
            }),
        ),
        tool(
            READ_RECORDS,
            "Read records from the specified app. Response includes the record ID, record data, and total count. Before search records using this tool, you better to know the schema of the app by using 'readAppInfo' tool.",
            json!({
                "type": "object",
                "required": ["appID"],
                "properties": {
                    "appID": app_id_schema("The app ID to read records from."),
                    "query": {
                        "type": "string",
                        "description": "The query to filter records. Query format is the same as kintone's query format. For example, 'field1 = \"value1\" and (field2 like \"value2\" or field3 not in (\"value3.1\",\"value3.2\")) and date > \"2006-01-02\"'."
                    },
                    "fields": {
                        "type": "array",
                        "description": "The field codes to include in the response. Default is all fields.",
                        "items": {"type": "string"}
                    },
                    "limit": {"type": "integer", "minimum": 0, "maximum": 500, "default": 10, "description": "The maximum number of records to read. Default is 10, maximum is 500."},
                    "offset": {"type": "integer", "minimum": 0, "maximum": 10000, "default": 0, "description": "The offset of records to read. Default is 0, maximum is 10,000."}
                }
            }),
        ),
        tool(
            UPDATE_RECORD,
            "Update the specified record in the specified app. Before use this tool, you better to know the schema of the app by using 'readAppInfo' tool and check which record to update by using 'readRecords' tool.",
            json!({
                "type": "object",
                "required": ["appID", "recordID", "record"],
                "properties": {
                    "appID": app_id_schema("The app ID to update a record in."),
                    "recordID": record_id_schema("The record ID to update."),
                    "record": record_schema("The fields to update. Fields not included are left unchanged.")
                }
            }),
        ),
        tool(
            DELETE_RECORD,
            "Delete the specified record in the specified app. Before use this tool, you should check which record to delete by using 'readRecords' tool. This operation is unrecoverable, so make sure that the user really want to delete the record.",
            json!({
                "type": "object",
                "required": ["appID", "recordID"],
                "properties": {
                    "appID": app_id_schema("The app ID to delete a record from."),
                    "recordID": record_id_schema("The record ID to delete.")
                }
            }),
        ),
        tool(
            DOWNLOAD_ATTACHMENT_FILE,
            "Download an attachment file of a record and save it to the local disk. The fileKey can be found in attachment fields of records read by 'readRecords'. Response includes the saved path and size.",
            json!({
                "type": "object",
                "required": ["fileKey"],
                "properties": {
                    "fileKey": {"type": "string", "description": "The fileKey of the attachment to download."},
                    "directory": {"type": "string", "description": "The directory to save the file in. Default is the directory configured for this server."}
                }
            }),
        ),
        tool(
            UPLOAD_ATTACHMENT_FILE,
            "Upload a file to kintone so it can be attached to a record. Give either a local file path or the content itself. The returned fileKey can be used as a value of an attachment field with 'createRecord' or 'updateRecord'.",
            json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "The local path of the file to upload. Cannot be used with 'content'."},
                    "content": {"type": "string", "description": "The content of the file to upload. Cannot be used with 'path'."},
                    "filename": {"type": "string", "description": "The file name to give the uploaded file. Required with 'content'. Default is the name of 'path'."},
                    "base64": {"type": "boolean", "default": false, "description": "Whether 'content' is base64-encoded binary data."}
                }
            }),
        ),
        tool(
            READ_RECORD_COMMENTS,
            "Read comments on the specified record in the specified app.",
            json!({
                "type": "object",
                "required": ["appID", "recordID"],
                "properties": {
                    "appID": app_id_schema("The app ID to read comments from."),
                    "recordID": record_id_schema("The record ID to read comments from."),
                    "order": {"type": "string", "enum": ["asc", "desc"], "default": "desc", "description": "The order of comments. Default is 'desc'."},
                    "offset": {"type": "integer", "minimum": 0, "default": 0, "description": "The offset of comments to read. Default is 0."},
                    "limit": {"type": "integer", "minimum": 0, "maximum": 10, "default": 10, "description": "The maximum number of comments to read. Default is 10, maximum is 10."}
                }
            }),
        ),
        tool(
            CREATE_RECORD_COMMENT,
            "Create a new comment on the specified record in the specified app.",
            json!({
                "type": "object",
                "required": ["appID", "recordID", "comment"],
                "properties": {
                    "appID": app_id_schema("The app ID to create a comment in."),
                    "recordID": record_id_schema("The record ID to create a comment on."),
                    "comment": {
                        "type": "object",
                        "required": ["text"],
                        "properties": {
                            "text": {"type": "string", "description": "The text of the comment."},
                            "mentions": {
                                "type": "array",
                                "description": "The mention targets of the comment. The target can be a user, a group, or a organization.",
                                "items": {
                                    "type": "object",
                                    "required": ["code"],
                                    "properties": {
                                        "code": {"type": "string", "description": "The code of the mention target. You can get the code by other records or comments."},
                                        "type": {"type": "string", "enum": ["USER", "GROUP", "ORGANIZATION"], "default": "USER", "description": "The type of the mention target. Default is 'USER'."}
                                    }
                                }
                            }
                        }
                    }
                }
            }),
        ),
    ]
}

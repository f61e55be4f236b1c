//! Record tools: create, read, update, delete

use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::args::{self, RecordId};
use super::Gateway;
use crate::auth::Access;
use crate::error::{GatewayError, Result};
use crate::kintone::types::{CreatedRecord, SingleRecord, UpdatedRecord};
use crate::kintone::{Query, Record};
use crate::mcp::ToolCallResult;

#[derive(Debug, Deserialize)]
struct CreateArgs {
    #[serde(rename = "appID", default)]
    app_id: String,
    #[serde(default)]
    record: Option<Record>,
}

#[derive(Debug, Deserialize)]
struct ReadArgs {
    #[serde(rename = "appID", default)]
    app_id: String,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    fields: Vec<String>,
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct UpdateArgs {
    #[serde(rename = "appID", default)]
    app_id: String,
    #[serde(rename = "recordID", default)]
    record_id: RecordId,
    #[serde(default)]
    record: Option<Record>,
}

#[derive(Debug, Deserialize)]
struct DeleteArgs {
    #[serde(rename = "appID", default)]
    app_id: String,
    #[serde(rename = "recordID", default)]
    record_id: RecordId,
}

impl Gateway {
    pub(super) fn create_record(&self, arguments: Value) -> Result<ToolCallResult> {
        let args: CreateArgs = args::parse(arguments)?;
        let record = match args.record {
            Some(record) if !args.app_id.trim().is_empty() => record,
            _ => return Err(GatewayError::params("Arguments 'appID' and 'record' are required")),
        };
        self.check(&args.app_id, Access::Write)?;

        let created: CreatedRecord = self.client.send_json(
            Method::POST,
            "/k/v1/record.json",
            &json!({"app": args.app_id, "record": record}),
        )?;

        ToolCallResult::json(&json!({
            "success": true,
            "recordID": created.id,
            "revision": created.revision,
        }))
    }

    pub(super) fn read_records(&self, arguments: Value) -> Result<ToolCallResult> {
        let args: ReadArgs = args::parse(arguments)?;
        args::require(&[&args.app_id], "Argument 'appID' is required")?;
        let limit = args::limit(args.limit, 10, 500, "Limit must be between 1 and 500")?;
        let offset = args::offset(args.offset, Some(10000), "Offset must be between 0 and 10000")?;
        self.check(&args.app_id, Access::Read)?;

        let query = Query::new()
            .set("app", &args.app_id)
            .set_opt("query", args.query.filter(|q| !q.is_empty()))
            .set_list("fields", &args.fields)
            .set("limit", limit)
            .set("offset", offset)
            .set("totalCount", true);
        let records: Value = self.client.get("/k/v1/records.json", &query)?;

        ToolCallResult::json(&records)
    }

    pub(super) fn update_record(&self, arguments: Value) -> Result<ToolCallResult> {
        let args: UpdateArgs = args::parse(arguments)?;
        let message = "Arguments 'appID', 'recordID', and 'record' are required";
        args::require(&[&args.app_id, args.record_id.as_str()], message)?;
        let Some(record) = args.record else {
            return Err(GatewayError::params(message));
        };
        self.check(&args.app_id, Access::Write)?;

        let updated: UpdatedRecord = self.client.send_json(
            Method::PUT,
            "/k/v1/record.json",
            &json!({
                "app": args.app_id,
                "id": args.record_id.as_str(),
                "record": record,
            }),
        )?;

        ToolCallResult::json(&json!({
            "success": true,
            "revision": updated.revision,
        }))
    }

    pub(super) fn delete_record(&self, arguments: Value) -> Result<ToolCallResult> {
        let args: DeleteArgs = args::parse(arguments)?;
        args::require(
            &[&args.app_id, args.record_id.as_str()],
            "Arguments 'appID' and 'recordID' are required",
        )?;
        self.check(&args.app_id, Access::Delete)?;

        // Keep a copy for the caller when they may read it; a failed read
        // aborts before anything is deleted
        let deleted_record = if self.policy.check_access(&args.app_id, Access::Read).is_ok() {
            let single: SingleRecord = self.client.get(
                "/k/v1/record.json",
                &Query::new()
                    .set("app", &args.app_id)
                    .set("id", &args.record_id),
            )?;
            Some(single.record)
        } else {
            None
        };

        let _: Value = self.client.send_json(
            Method::DELETE,
            "/k/v1/records.json",
            &json!({"app": args.app_id, "ids": [args.record_id.as_str()]}),
        )?;
        tracing::info!(app_id = %args.app_id, record_id = %args.record_id, "record deleted");

        let mut result = Map::new();
        result.insert("success".to_string(), Value::Bool(true));
        if let Some(record) = deleted_record {
            result.insert("deletedRecord".to_string(), record);
        }
        ToolCallResult::json(&result)
    }
}

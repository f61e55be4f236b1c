//! listApps / readAppInfo

use serde::Deserialize;
use serde_json::{json, Value};

use super::{args, Gateway};
use crate::auth::Access;
use crate::error::Result;
use crate::kintone::types::{AppsResponse, FieldsResponse};
use crate::kintone::{AppDetail, Query};
use crate::mcp::ToolCallResult;

const MAX_APPS: i64 = 100;
/// kintone rejects more `ids` than this in one request
const MAX_IDS_PER_REQUEST: usize = 100;

#[derive(Debug, Deserialize)]
struct ListAppsArgs {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    offset: Option<i64>,
    #[serde(default)]
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct AppArgs {
    #[serde(rename = "appID", default)]
    app_id: String,
}

impl Gateway {
    pub(super) fn list_apps(&self, arguments: Value) -> Result<ToolCallResult> {
        let args: ListAppsArgs = args::parse(arguments)?;
        let limit = args::limit(
            args.limit,
            MAX_APPS,
            MAX_APPS,
            "Limit must be between 1 and 100",
        )?;
        let offset = args::offset(
            args.offset,
            None,
            "Offset must be greater than or equal to 0",
        )?;

        let ids = self.policy.listed_app_ids();
        if ids.as_ref().is_some_and(Vec::is_empty) {
            return ToolCallResult::json(&json!({"apps": [], "hasNext": false}));
        }
        if let Some(ids) = ids.as_ref().filter(|ids| ids.len() > MAX_IDS_PER_REQUEST) {
            return self.list_many_apps(ids, args.name, offset, limit);
        }

        let filter = Query::new()
            .set_list("ids", ids.as_deref().unwrap_or_default())
            .set_opt("name", args.name.filter(|n| !n.is_empty()));

        let page: AppsResponse = self.client.get(
            "/k/v1/apps.json",
            &filter.clone().set("offset", offset).set("limit", limit),
        )?;

        // Only a full page can have a successor
        let has_next = if page.apps.len() as i64 >= limit {
            let probe: AppsResponse = self.client.get(
                "/k/v1/apps.json",
                &filter.set("offset", offset + limit).set("limit", 1),
            )?;
            !probe.apps.is_empty()
        } else {
            false
        };

        self.app_page(page.apps, has_next)
    }

    /// Fetch every listed app in chunks, then page locally by app ID
    fn list_many_apps(
        &self,
        ids: &[String],
        name: Option<String>,
        offset: i64,
        limit: i64,
    ) -> Result<ToolCallResult> {
        let name = name.filter(|n| !n.is_empty());
        let mut found = Vec::new();
        for chunk in ids.chunks(MAX_IDS_PER_REQUEST) {
            let page: AppsResponse = self.client.get(
                "/k/v1/apps.json",
                &Query::new()
                    .set_list("ids", chunk)
                    .set_opt("name", name.as_deref())
                    .set("limit", MAX_APPS),
            )?;
            found.extend(page.apps);
        }
        found.sort_by_key(|app| app.app_id.parse::<u64>().unwrap_or(u64::MAX));

        let start = (offset as usize).min(found.len());
        let end = start.saturating_add(limit as usize).min(found.len());
        let has_next = end < found.len();
        let page: Vec<AppDetail> = found.drain(start..end).collect();
        self.app_page(page, has_next)
    }

    fn app_page(&self, apps: Vec<AppDetail>, has_next: bool) -> Result<ToolCallResult> {
        let apps: Vec<AppDetail> = apps
            .into_iter()
            .filter(|app| self.policy.check_access(&app.app_id, Access::Any).is_ok())
            .map(|app| self.annotate(app))
            .collect();

        ToolCallResult::json(&json!({
            "apps": apps,
            "hasNext": has_next,
        }))
    }

    pub(super) fn read_app_info(&self, arguments: Value) -> Result<ToolCallResult> {
        let args: AppArgs = args::parse(arguments)?;
        args::require(&[&args.app_id], "Argument 'appID' is required")?;
        self.check(&args.app_id, Access::Any)?;

        let app: AppDetail = self
            .client
            .get("/k/v1/app.json", &Query::new().set("id", &args.app_id))?;
        let fields: FieldsResponse = self
            .client
            .get("/k/v1/app/form/fields.json", &Query::new().set("app", &args.app_id))?;

        let mut app = self.annotate(app);
        app.properties = fields.properties;
        ToolCallResult::json(&app)
    }
}

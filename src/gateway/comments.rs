//! Record comments

use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};

use super::args::{self, RecordId};
use super::Gateway;
use crate::auth::Access;
use crate::error::{GatewayError, Result};
use crate::kintone::types::{CommentsResponse, CreatedComment};
use crate::kintone::{CommentInput, Mention, MentionType, Query};
use crate::mcp::ToolCallResult;

#[derive(Debug, Deserialize)]
struct ReadCommentsArgs {
    #[serde(rename = "appID", default)]
    app_id: String,
    #[serde(rename = "recordID", default)]
    record_id: RecordId,
    #[serde(default)]
    order: Option<String>,
    #[serde(default)]
    offset: Option<i64>,
    #[serde(default)]
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CreateCommentArgs {
    #[serde(rename = "appID", default)]
    app_id: String,
    #[serde(rename = "recordID", default)]
    record_id: RecordId,
    #[serde(default)]
    comment: CommentArgs,
}

#[derive(Debug, Default, Deserialize)]
struct CommentArgs {
    #[serde(default)]
    text: String,
    #[serde(default)]
    mentions: Vec<MentionArgs>,
}

#[derive(Debug, Deserialize)]
struct MentionArgs {
    #[serde(default)]
    code: String,
    #[serde(rename = "type", default)]
    mention_type: Option<String>,
}

impl MentionArgs {
    fn normalize(self) -> Result<Mention> {
        if self.code.trim().is_empty() {
            return Err(GatewayError::params("Mention code is required"));
        }
        let mention_type = match self.mention_type.as_deref() {
            None | Some("") | Some("USER") => MentionType::User,
            Some("GROUP") => MentionType::Group,
            Some("ORGANIZATION") => MentionType::Organization,
            Some(_) => {
                return Err(GatewayError::params(
                    "Mention type must be 'USER', 'GROUP', or 'ORGANIZATION'",
                ))
            }
        };
        Ok(Mention {
            code: self.code,
            mention_type,
        })
    }
}

/// Comment order accepted by kintone
fn order(value: Option<String>) -> Result<String> {
    match value.as_deref().unwrap_or_default() {
        "" => Ok("desc".to_string()),
        o @ ("asc" | "desc") => Ok(o.to_string()),
        _ => Err(GatewayError::params("Order must be 'asc' or 'desc'")),
    }
}

impl Gateway {
    pub(super) fn read_record_comments(&self, arguments: Value) -> Result<ToolCallResult> {
        let args: ReadCommentsArgs = args::parse(arguments)?;
        args::require(
            &[&args.app_id, args.record_id.as_str()],
            "Arguments 'appID' and 'recordID' are required",
        )?;
        let order = order(args.order)?;
        let offset = args::offset(args.offset, None, "Offset must be greater than or equal to 0")?;
        let limit = args::limit(args.limit, 10, 10, "Limit must be between 1 and 10")?;
        self.check(&args.app_id, Access::Read)?;

        let query = Query::new()
            .set("app", &args.app_id)
            .set("record", &args.record_id)
            .set("order", order)
            .set("offset", offset)
            .set("limit", limit);
        let page: CommentsResponse = self.client.get("/k/v1/record/comments.json", &query)?;

        ToolCallResult::json(&json!({
            "comments": page.comments,
            "existsOlderComments": page.older,
            "existsNewerComments": page.newer,
        }))
    }

    pub(super) fn create_record_comment(&self, arguments: Value) -> Result<ToolCallResult> {
        let args: CreateCommentArgs = args::parse(arguments)?;
        args::require(
            &[&args.app_id, args.record_id.as_str(), &args.comment.text],
            "Arguments 'appID', 'recordID', and 'comment.text' are required",
        )?;
        let mentions = args
            .comment
            .mentions
            .into_iter()
            .map(MentionArgs::normalize)
            .collect::<Result<Vec<_>>>()?;
        self.check(&args.app_id, Access::ReadWrite)?;

        let comment = CommentInput {
            text: args.comment.text,
            mentions,
        };
        let created: CreatedComment = self.client.send_json(
            Method::POST,
            "/k/v1/record/comment.json",
            &json!({
                "app": args.app_id,
                "record": args.record_id.as_str(),
                "comment": comment,
            }),
        )?;

        ToolCallResult::json(&json!({
            "success": true,
            "commentID": created.id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mention(code: &str, kind: Option<&str>) -> MentionArgs {
        MentionArgs {
            code: code.to_string(),
            mention_type: kind.map(str::to_string),
        }
    }

    #[test]
    fn test_mention_type_defaults_to_user() {
        let m = mention("sato", None).normalize().unwrap();
        assert_eq!(m.mention_type, MentionType::User);
        let m = mention("sales", Some("GROUP")).normalize().unwrap();
        assert_eq!(m.mention_type, MentionType::Group);
    }

    #[test]
    fn test_bad_mentions_rejected() {
        assert_eq!(
            mention("", None).normalize().unwrap_err().to_string(),
            "Mention code is required"
        );
        assert!(mention("x", Some("user")).normalize().is_err());
        assert!(mention("x", Some("TEAM")).normalize().is_err());
    }

    #[test]
    fn test_order() {
        assert_eq!(order(None).unwrap(), "desc");
        assert_eq!(order(Some("asc".into())).unwrap(), "asc");
        assert!(order(Some("newest".into())).is_err());
    }
}

//! kintone wire types
//!
//! Record payloads keep kintone's `{"value": ...}` wrapping intact so that
//! what a client sends is exactly what reaches the backend.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::auth::Permissions;

/// Record payload: field code -> wrapped field value
pub type Record = BTreeMap<String, Field>;

/// A `{value: ...}` wrapper around one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    pub value: FieldValue,
}

/// Value of a top-level field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Text, number, date, dropdown, ...
    Text(String),
    /// Checkbox, multi-select, category
    Multi(Vec<String>),
    /// Attachment references
    Files(Vec<FileRef>),
    /// User, group, organization selection and status assignees
    Entities(Vec<Entity>),
    /// Creator, modifier
    Entity(Entity),
    /// Subtable rows
    Table(Vec<TableRow>),
}

/// Value of a field inside a subtable row; tables do not nest
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RowValue {
    Text(String),
    Multi(Vec<String>),
    Files(Vec<FileRef>),
    Entities(Vec<Entity>),
}

/// A `{value: ...}` wrapper inside a subtable row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowField {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    pub value: RowValue,
}

/// One subtable row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub value: BTreeMap<String, RowField>,
}

/// Reference to an uploaded or stored attachment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub file_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

/// A user, group or organization as kintone identifies it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Anything else kintone attached, passed through untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Shape of a JSON array used as a field value
enum ArrayShape {
    Strings,
    Files,
    Entities,
    Rows,
}

fn array_shape(items: &[Value]) -> Option<ArrayShape> {
    if items.iter().all(Value::is_string) {
        return Some(ArrayShape::Strings);
    }
    let objects: Option<Vec<_>> = items.iter().map(Value::as_object).collect();
    let objects = objects?;
    if objects.iter().all(|o| o.contains_key("fileKey")) {
        Some(ArrayShape::Files)
    } else if objects.iter().all(|o| o.contains_key("code")) {
        Some(ArrayShape::Entities)
    } else if objects.iter().all(|o| o.contains_key("value")) {
        Some(ArrayShape::Rows)
    } else {
        None
    }
}

const SHAPE_HINT: &str = "a string, an array of strings, an array of {fileKey} objects, \
    an array of {code} objects, a {code} object, or an array of table rows";

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::String(s) => Ok(FieldValue::Text(s)),
            Value::Array(items) => match array_shape(&items) {
                Some(ArrayShape::Strings) => {
                    serde_json::from_value(Value::Array(items)).map(FieldValue::Multi)
                }
                Some(ArrayShape::Files) => {
                    serde_json::from_value(Value::Array(items)).map(FieldValue::Files)
                }
                Some(ArrayShape::Entities) => {
                    serde_json::from_value(Value::Array(items)).map(FieldValue::Entities)
                }
                Some(ArrayShape::Rows) => {
                    serde_json::from_value(Value::Array(items)).map(FieldValue::Table)
                }
                None => Err(de::Error::custom(format!(
                    "field value must be {}",
                    SHAPE_HINT
                ))),
            }
            .map_err(de::Error::custom),
            Value::Object(entity) if entity.contains_key("code") => {
                serde_json::from_value(Value::Object(entity))
                    .map(FieldValue::Entity)
                    .map_err(de::Error::custom)
            }
            other => Err(de::Error::custom(format!(
                "field value must be {}, got {}",
                SHAPE_HINT, other
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for RowValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::String(s) => Ok(RowValue::Text(s)),
            Value::Array(items) => match array_shape(&items) {
                Some(ArrayShape::Strings) => {
                    serde_json::from_value(Value::Array(items)).map(RowValue::Multi)
                }
                Some(ArrayShape::Files) => {
                    serde_json::from_value(Value::Array(items)).map(RowValue::Files)
                }
                Some(ArrayShape::Entities) => {
                    serde_json::from_value(Value::Array(items)).map(RowValue::Entities)
                }
                Some(ArrayShape::Rows) => {
                    return Err(de::Error::custom("tables cannot be nested inside a table row"))
                }
                None => Err(de::Error::custom(
                    "table cell value must be a string, an array of strings, \
                     an array of {fileKey} objects, or an array of {code} objects",
                )),
            }
            .map_err(de::Error::custom),
            other => Err(de::Error::custom(format!(
                "table cell value must be a string or an array, got {}",
                other
            ))),
        }
    }
}

/// App metadata as reported to the client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppDetail {
    #[serde(rename = "appID", alias = "appId")]
    pub app_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_for_ai: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
    #[serde(rename = "createdAt", default)]
    pub created_at: String,
    #[serde(rename = "modifiedAt", default)]
    pub modified_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Permissions>,
}

/// Response of `GET /k/v1/apps.json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppsResponse {
    #[serde(default)]
    pub apps: Vec<AppDetail>,
}

/// Response of `GET /k/v1/app/form/fields.json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldsResponse {
    #[serde(default)]
    pub properties: Option<Value>,
}

/// Response of `POST /k/v1/record.json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatedRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub revision: String,
}

/// Response of `PUT /k/v1/record.json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatedRecord {
    #[serde(default)]
    pub revision: String,
}

/// Response of `GET /k/v1/record.json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SingleRecord {
    #[serde(default)]
    pub record: Value,
}

/// Response of `GET /k/v1/record/comments.json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentsResponse {
    #[serde(default)]
    pub comments: Vec<Value>,
    #[serde(default)]
    pub older: bool,
    #[serde(default)]
    pub newer: bool,
}

/// Response of `POST /k/v1/record/comment.json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatedComment {
    #[serde(default)]
    pub id: String,
}

/// Response of `POST /k/v1/file.json`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub file_key: String,
}

/// Mention target kinds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MentionType {
    #[default]
    User,
    Group,
    Organization,
}

/// Mention as sent to kintone
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mention {
    pub code: String,
    #[serde(rename = "type")]
    pub mention_type: MentionType,
}

/// Comment body as sent to kintone
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentInput {
    pub text: String,
    pub mentions: Vec<Mention>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_value_shapes() {
        let record: Record = serde_json::from_value(json!({
            "title": {"value": "hello"},
            "tags": {"value": ["a", "b"]},
            "empty": {"value": []},
            "files": {"value": [{"fileKey": "abc", "name": "a.txt"}]},
            "items": {"value": [
                {"id": "10", "value": {"qty": {"value": "3"}, "who": {"value": ["u1"]}}}
            ]}
        }))
        .unwrap();

        assert_eq!(record["title"].value, FieldValue::Text("hello".into()));
        assert_eq!(
            record["tags"].value,
            FieldValue::Multi(vec!["a".into(), "b".into()])
        );
        assert_eq!(record["empty"].value, FieldValue::Multi(vec![]));
        assert!(matches!(&record["files"].value, FieldValue::Files(f) if f[0].file_key == "abc"));
        let FieldValue::Table(rows) = &record["items"].value else {
            panic!("expected table");
        };
        assert_eq!(rows[0].id.as_deref(), Some("10"));
        assert_eq!(rows[0].value["qty"].value, RowValue::Text("3".into()));
    }

    #[test]
    fn test_wrapping_is_preserved() {
        let input = json!({
            "items": {"type": "SUBTABLE", "value": [
                {"value": {"qty": {"value": "3"}, "doc": {"value": [{"fileKey": "k"}]}}}
            ]},
            "title": {"value": "x"}
        });
        let record: Record = serde_json::from_value(input.clone()).unwrap();
        assert_eq!(serde_json::to_value(&record).unwrap(), input);
    }

    #[test]
    fn test_unwrapped_value_rejected() {
        assert!(serde_json::from_value::<Record>(json!({"title": "hello"})).is_err());
        assert!(serde_json::from_value::<Record>(json!({"n": {"value": 5}})).is_err());
        assert!(serde_json::from_value::<Record>(json!({"m": {"value": ["a", 1]}})).is_err());
    }

    #[test]
    fn test_entity_values_round_trip() {
        let input = json!({
            "owner": {"type": "USER_SELECT", "value": [{"code": "sato", "name": "Sato"}]},
            "teams": {"value": [{"code": "sales"}]},
            "creator": {"type": "CREATOR", "value": {"code": "sato", "name": "Sato"}},
            "assignees": {"type": "STATUS_ASSIGNEE", "value": [
                {"code": "kato", "name": "Kato", "type": "USER"}
            ]},
            "lines": {"value": [
                {"id": "3", "value": {"reviewer": {"value": [{"code": "ito"}]}}}
            ]}
        });
        let record: Record = serde_json::from_value(input.clone()).unwrap();

        let FieldValue::Entities(owners) = &record["owner"].value else {
            panic!("expected entities");
        };
        assert_eq!(owners[0].code, "sato");
        assert_eq!(owners[0].name.as_deref(), Some("Sato"));
        assert!(matches!(&record["creator"].value, FieldValue::Entity(e) if e.code == "sato"));
        let FieldValue::Table(rows) = &record["lines"].value else {
            panic!("expected table");
        };
        assert!(matches!(
            &rows[0].value["reviewer"].value,
            RowValue::Entities(e) if e[0].code == "ito"
        ));

        assert_eq!(serde_json::to_value(&record).unwrap(), input);
    }

    #[test]
    fn test_object_without_code_rejected() {
        let single = json!({"x": {"value": {"name": "Sato"}}});
        let list = json!({"x": {"value": [{"name": "Sato"}]}});
        assert!(serde_json::from_value::<Record>(single).is_err());
        assert!(serde_json::from_value::<Record>(list).is_err());
    }

    #[test]
    fn test_nested_tables_rejected() {
        let nested = json!({"t": {"value": [
            {"value": {"inner": {"value": [{"value": {}}]}}}
        ]}});
        let err = serde_json::from_value::<Record>(nested).unwrap_err();
        assert!(err.to_string().contains("nested"));
    }

    #[test]
    fn test_app_detail_accepts_backend_casing() {
        let app: AppDetail = serde_json::from_value(json!({
            "appId": "5",
            "name": "Orders",
            "description": "",
            "createdAt": "2024-01-01T00:00:00Z",
            "modifiedAt": "2024-01-02T00:00:00Z",
            "spaceId": null
        }))
        .unwrap();
        let out = serde_json::to_value(&app).unwrap();
        assert_eq!(out["appID"], "5");
        assert!(out.get("description").is_none());
        assert!(out.get("permissions").is_none());
    }

    #[test]
    fn test_mention_type_wire_names() {
        assert_eq!(
            serde_json::to_value(MentionType::Organization).unwrap(),
            json!("ORGANIZATION")
        );
        assert_eq!(MentionType::default(), MentionType::User);
        assert!(serde_json::from_value::<MentionType>(json!("TEAM")).is_err());
    }
}

//! Gateway configuration
//!
//! Settings come from a JSON file and may be overridden field by field from
//! the command line or the environment. [`Configuration::validate`] turns
//! the merged settings into a [`GatewayConfig`], reporting every problem at
//! once.

use reqwest::Url;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::auth::{AccessPolicy, AllowDenyPolicy, AppConfig, AppPermissionPolicy};
use crate::error::{GatewayError, Result};
use crate::kintone::Credentials;

/// Settings as written in the configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Per-app permission entries, kept raw until validation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apps: Option<Vec<Value>>,
    #[serde(
        default,
        deserialize_with = "app_id_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub allow: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "app_id_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub deny: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<String>,
}

/// Values given on the command line or through the environment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub allow: Option<Vec<String>>,
    pub deny: Option<Vec<String>>,
    pub download_dir: Option<String>,
}

/// Validated, ready-to-use settings
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: Url,
    pub credentials: Credentials,
    pub policy: Arc<dyn AccessPolicy>,
    pub download_dir: PathBuf,
}

/// App IDs may be written as strings or integers
fn app_id_list<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error> {
    let raw: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    raw.map(|items| {
        items
            .into_iter()
            .map(|item| {
                app_id_string(&item).ok_or_else(|| {
                    serde::de::Error::custom(format!("app ID must be a string or an integer, got {}", item))
                })
            })
            .collect()
    })
    .transpose()
}

fn app_id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) if n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

/// Split a comma-separated list, dropping blanks
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl Configuration {
    /// Load from a JSON file; `~` in the path is expanded
    pub fn from_file(path: &str) -> Result<Self> {
        let expanded = shellexpand::tilde(path).to_string();
        let content = std::fs::read_to_string(&expanded)
            .map_err(|e| GatewayError::Config(format!("cannot read {}: {}", expanded, e)))?;
        Self::from_json(&content)
            .map_err(|e| GatewayError::Config(format!("{}: {}", expanded, e)))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| GatewayError::Config(format!("invalid configuration file: {}", e)))
    }

    /// Apply overrides; only values that are set replace file values
    pub fn merge(mut self, overrides: ConfigOverrides) -> Self {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }
        take(&mut self.url, overrides.url);
        take(&mut self.username, overrides.username);
        take(&mut self.password, overrides.password);
        take(&mut self.token, overrides.token);
        take(&mut self.allow, overrides.allow);
        take(&mut self.deny, overrides.deny);
        take(&mut self.download_dir, overrides.download_dir);
        self
    }

    fn has_list_strategy(&self) -> bool {
        let non_empty = |l: &Option<Vec<String>>| l.as_ref().is_some_and(|l| !l.is_empty());
        non_empty(&self.allow) || non_empty(&self.deny)
    }

    /// Check everything and build the runtime configuration
    pub fn validate(&self) -> Result<GatewayConfig> {
        let mut problems = Vec::new();

        let base_url = match present(&self.url) {
            None => {
                problems.push("kintone URL is not set (\"url\" or KINTONE_BASE_URL)".to_string());
                None
            }
            Some(raw) => match Url::parse(raw) {
                Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Some(url),
                Ok(url) => {
                    problems.push(format!(
                        "kintone URL must be an http or https URL, got \"{}\"",
                        url
                    ));
                    None
                }
                Err(e) => {
                    problems.push(format!("kintone URL \"{}\" is invalid: {}", raw, e));
                    None
                }
            },
        };

        let credentials = Credentials::new(
            present(&self.username),
            present(&self.password),
            present(&self.token),
        );
        if !credentials.is_usable() {
            problems.push(
                "no usable credential: set both username and password, or an API token".to_string(),
            );
        }

        let policy = self.build_policy(&mut problems);

        if !problems.is_empty() {
            let mut message = String::from("the configuration has problems:");
            for p in &problems {
                message.push_str("\n  - ");
                message.push_str(p);
            }
            return Err(GatewayError::Config(message));
        }

        // Every problem pushed above made one of these None
        match (base_url, policy) {
            (Some(base_url), Some(policy)) => Ok(GatewayConfig {
                base_url,
                credentials,
                policy,
                download_dir: self.download_dir(),
            }),
            _ => Err(GatewayError::Internal(
                "configuration validated without a URL or policy".to_string(),
            )),
        }
    }

    fn build_policy(&self, problems: &mut Vec<String>) -> Option<Arc<dyn AccessPolicy>> {
        let Some(raw_apps) = &self.apps else {
            let policy = AllowDenyPolicy::new(
                self.allow.clone().unwrap_or_default(),
                self.deny.clone().unwrap_or_default(),
            );
            return Some(Arc::new(policy));
        };

        if self.has_list_strategy() {
            problems.push(
                "\"apps\" cannot be combined with \"allow\"/\"deny\"; configure only one of them"
                    .to_string(),
            );
            return None;
        }
        if raw_apps.is_empty() {
            problems.push("\"apps\" is empty; no app would be accessible".to_string());
            return None;
        }

        let mut apps = Vec::with_capacity(raw_apps.len());
        let mut seen = BTreeSet::new();
        let before = problems.len();
        for (i, raw) in raw_apps.iter().enumerate() {
            let mut raw = raw.clone();
            if let Some(id) = raw.get("id").and_then(app_id_string) {
                raw["id"] = Value::String(id);
            }
            match serde_json::from_value::<AppConfig>(raw) {
                Ok(app) if app.id.is_empty() => {
                    problems.push(format!("apps[{}]: \"id\" is empty", i));
                }
                Ok(app) => {
                    if !seen.insert(app.id.clone()) {
                        problems.push(format!("apps[{}]: app ID {} is listed twice", i, app.id));
                    }
                    apps.push(app);
                }
                Err(e) => problems.push(format!("apps[{}]: {}", i, e)),
            }
        }

        (problems.len() == before).then(|| Arc::new(AppPermissionPolicy::new(apps)) as Arc<dyn AccessPolicy>)
    }

    /// Download directory with `~` expanded; falls back to the user's
    /// download folder, then the working directory
    pub fn download_dir(&self) -> PathBuf {
        if let Some(dir) = present(&self.download_dir) {
            return PathBuf::from(shellexpand::tilde(dir).to_string());
        }
        dirs::download_dir()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| Path::new(".").to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Access;
    use tempfile::NamedTempFile;

    fn base() -> Configuration {
        Configuration {
            url: Some("https://example.cybozu.com".into()),
            token: Some("tok".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_file_format() {
        let config = Configuration::from_json(
            r#"{
                "url": "https://example.cybozu.com",
                "username": "alice",
                "password": "pw",
                "apps": [
                    {"id": "1", "description": "Orders", "permissions": {"write": true}},
                    {"id": 2}
                ],
                "downloadDir": "/tmp/kintone"
            }"#,
        )
        .unwrap();
        let validated = config.validate().unwrap();
        assert_eq!(validated.policy.name(), "per-app permissions");
        assert!(validated.policy.check_access("1", Access::Write).is_ok());
        assert!(validated.policy.check_access("2", Access::Read).is_ok());
        assert!(validated.policy.check_access("2", Access::Write).is_err());
        assert_eq!(validated.download_dir, PathBuf::from("/tmp/kintone"));
    }

    #[test]
    fn test_no_strategy_allows_everything() {
        let validated = base().validate().unwrap();
        assert_eq!(validated.policy.name(), "allow/deny lists");
        assert!(validated.policy.check_access("12345", Access::Delete).is_ok());
    }

    #[test]
    fn test_all_problems_reported_together() {
        let config = Configuration {
            url: Some("ftp://example.com".into()),
            username: Some("only-user".into()),
            apps: Some(vec![serde_json::json!({"id": "1"})]),
            allow: Some(vec!["1".into()]),
            ..Default::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("http or https"), "{}", err);
        assert!(err.contains("no usable credential"), "{}", err);
        assert!(err.contains("cannot be combined"), "{}", err);
        assert!(err.lines().count() >= 4);
    }

    #[test]
    fn test_unparsable_url() {
        let config = Configuration {
            url: Some("not a url".into()),
            ..base()
        };
        assert!(config.validate().unwrap_err().to_string().contains("is invalid"));
    }

    #[test]
    fn test_bad_app_entries() {
        let config = Configuration {
            apps: Some(vec![
                serde_json::json!({"id": "1"}),
                serde_json::json!({"id": "1"}),
                serde_json::json!({"id": "3", "permissions": {"read": "yes"}}),
            ]),
            ..base()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("apps[1]: app ID 1 is listed twice"), "{}", err);
        assert!(err.contains("apps[2]"), "{}", err);
    }

    #[test]
    fn test_empty_apps_rejected() {
        let config = Configuration {
            apps: Some(vec![]),
            ..base()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides_replace_only_set_values() {
        let merged = base().merge(ConfigOverrides {
            url: Some("https://other.cybozu.com".into()),
            deny: Some(split_list("3, 4,,")),
            ..Default::default()
        });
        assert_eq!(merged.url.as_deref(), Some("https://other.cybozu.com"));
        assert_eq!(merged.token.as_deref(), Some("tok"));
        assert_eq!(merged.deny, Some(vec!["3".to_string(), "4".to_string()]));

        let validated = merged.validate().unwrap();
        assert!(validated.policy.check_access("3", Access::Read).is_err());
        assert!(validated.policy.check_access("5", Access::Read).is_ok());
    }

    #[test]
    fn test_numeric_ids_in_lists() {
        let config = Configuration::from_json(r#"{"allow": [1, "2"], "deny": [2]}"#).unwrap();
        assert_eq!(config.allow, Some(vec!["1".to_string(), "2".to_string()]));
        assert!(Configuration::from_json(r#"{"allow": [true]}"#).is_err());
    }

    #[test]
    fn test_from_file() {
        use std::io::Write;
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"url": "http://localhost:8080", "token": "t"}}"#).unwrap();
        let config = Configuration::from_file(file.path().to_str().unwrap()).unwrap();
        assert!(config.validate().is_ok());

        let err = Configuration::from_file("/nonexistent/kintone.json").unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }
}

//! Per-app permission sets

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Access, AccessPolicy, AppOverride, Capability, SETTINGS_HINT};
use crate::error::{GatewayError, Result};

fn default_true() -> bool {
    true
}

/// `{read, write, delete}` granted on one app.
///
/// Keys left out of the configuration default to read-only access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default = "default_true")]
    pub read: bool,
    #[serde(default)]
    pub write: bool,
    #[serde(default)]
    pub delete: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            read: true,
            write: false,
            delete: false,
        }
    }
}

impl Permissions {
    /// Everything allowed
    pub fn all() -> Self {
        Self {
            read: true,
            write: true,
            delete: true,
        }
    }

    /// Check if a capability is granted
    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Read => self.read,
            Capability::Write => self.write,
            Capability::Delete => self.delete,
        }
    }
}

/// One entry of the `apps` configuration list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub permissions: Permissions,
}

/// Policy granting access only to configured apps, per capability
#[derive(Debug, Clone, Default)]
pub struct AppPermissionPolicy {
    apps: BTreeMap<String, AppConfig>,
    /// Configuration order, used for listing
    order: Vec<String>,
}

impl AppPermissionPolicy {
    pub fn new(apps: Vec<AppConfig>) -> Self {
        let order = apps.iter().map(|a| a.id.clone()).collect();
        let apps = apps.into_iter().map(|a| (a.id.clone(), a)).collect();
        Self { apps, order }
    }

    pub fn get(&self, app_id: &str) -> Option<&AppConfig> {
        self.apps.get(app_id)
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

impl AccessPolicy for AppPermissionPolicy {
    fn check_access(&self, app_id: &str, access: Access) -> Result<()> {
        let Some(app) = self.apps.get(app_id) else {
            return Err(GatewayError::PermissionDenied {
                app_id: app_id.to_string(),
                message: format!(
                    "App ID {} is not found or not allowed to access. {}",
                    app_id,
                    SETTINGS_HINT
                ),
            });
        };

        let missing: Vec<String> = access
            .capabilities()
            .iter()
            .filter(|c| !app.permissions.has(**c))
            .map(|c| c.to_string())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        Err(GatewayError::PermissionDenied {
            app_id: app_id.to_string(),
            message: format!(
                "Permission denied to {} records in app ID {}. {}",
                missing.join(", "),
                app_id,
                SETTINGS_HINT
            ),
        })
    }

    fn listed_app_ids(&self) -> Option<Vec<String>> {
        Some(self.order.clone())
    }

    fn app_override(&self, app_id: &str) -> AppOverride {
        match self.apps.get(app_id) {
            Some(app) => AppOverride {
                description: Some(app.description.clone()).filter(|d| !d.is_empty()),
                permissions: Some(app.permissions),
            },
            None => AppOverride::default(),
        }
    }

    fn name(&self) -> &'static str {
        "per-app permissions"
    }
}

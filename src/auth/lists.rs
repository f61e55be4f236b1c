//! Global allow/deny lists

use std::collections::BTreeSet;

use super::{Access, AccessPolicy, AppOverride, Permissions, SETTINGS_HINT};
use crate::error::{GatewayError, Result};

/// Policy driven by two global sets of app IDs.
///
/// The deny list is consulted first and always wins. An empty allow list
/// permits every app that is not denied. No capability distinction is made.
#[derive(Debug, Clone, Default)]
pub struct AllowDenyPolicy {
    allow: BTreeSet<String>,
    deny: BTreeSet<String>,
}

impl AllowDenyPolicy {
    pub fn new<A, D>(allow: A, deny: D) -> Self
    where
        A: IntoIterator<Item = String>,
        D: IntoIterator<Item = String>,
    {
        Self {
            allow: allow.into_iter().collect(),
            deny: deny.into_iter().collect(),
        }
    }

    /// Policy that lets everything through
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn is_permitted(&self, app_id: &str) -> bool {
        !self.deny.contains(app_id) && (self.allow.is_empty() || self.allow.contains(app_id))
    }
}

impl AccessPolicy for AllowDenyPolicy {
    fn check_access(&self, app_id: &str, _access: Access) -> Result<()> {
        if self.deny.contains(app_id) {
            return Err(GatewayError::PermissionDenied {
                app_id: app_id.to_string(),
                message: format!(
                    "App ID {} is explicitly denied by the deny list. {}",
                    app_id,
                    SETTINGS_HINT
                ),
            });
        }
        if !self.allow.is_empty() && !self.allow.contains(app_id) {
            return Err(GatewayError::PermissionDenied {
                app_id: app_id.to_string(),
                message: format!(
                    "App ID {} is not in the allow list. {}",
                    app_id,
                    SETTINGS_HINT
                ),
            });
        }
        Ok(())
    }

    fn listed_app_ids(&self) -> Option<Vec<String>> {
        if self.allow.is_empty() {
            None
        } else {
            Some(
                self.allow
                    .iter()
                    .filter(|id| !self.deny.contains(*id))
                    .cloned()
                    .collect(),
            )
        }
    }

    fn app_override(&self, app_id: &str) -> AppOverride {
        AppOverride {
            description: None,
            permissions: self.is_permitted(app_id).then(Permissions::all),
        }
    }

    fn name(&self) -> &'static str {
        "allow/deny lists"
    }
}

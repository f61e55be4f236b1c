//! Access control for kintone apps
//!
//! Two interchangeable strategies sit behind [`AccessPolicy`]:
//! - [`AppPermissionPolicy`]: a `{read, write, delete}` triple per configured app
//! - [`AllowDenyPolicy`]: global allow/deny lists of app IDs
//!
//! Exactly one is chosen when the configuration is validated.

mod lists;
mod permissions;

pub use lists::AllowDenyPolicy;
pub use permissions::{AppConfig, AppPermissionPolicy, Permissions};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Capability classes checked by a policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Read,
    Write,
    Delete,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Read => f.write_str("read"),
            Capability::Write => f.write_str("write"),
            Capability::Delete => f.write_str("delete"),
        }
    }
}

/// What an operation needs from an app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Any configured access at all
    Any,
    Read,
    Write,
    Delete,
    /// Both read and write
    ReadWrite,
}

impl Access {
    /// Capabilities that must all be granted
    pub fn capabilities(self) -> &'static [Capability] {
        match self {
            Access::Any => &[],
            Access::Read => &[Capability::Read],
            Access::Write => &[Capability::Write],
            Access::Delete => &[Capability::Delete],
            Access::ReadWrite => &[Capability::Read, Capability::Write],
        }
    }
}

/// Locally configured metadata merged into app info
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppOverride {
    pub description: Option<String>,
    pub permissions: Option<Permissions>,
}

/// Decides whether an invocation may touch an app
pub trait AccessPolicy: Send + Sync + fmt::Debug {
    /// `Ok(())` when `access` is permitted on `app_id`, otherwise a
    /// `PermissionDenied` error describing why
    fn check_access(&self, app_id: &str, access: Access) -> Result<()>;

    /// App IDs to narrow a backend app listing to; `None` lists everything
    fn listed_app_ids(&self) -> Option<Vec<String>>;

    /// Description and permissions to report for an app
    fn app_override(&self, app_id: &str) -> AppOverride;

    /// Short label for logs
    fn name(&self) -> &'static str;
}

/// Appended to every denial so the user knows where to look
pub(crate) const SETTINGS_HINT: &str =
    "Please check the MCP server settings and/or ask to the administrator.";

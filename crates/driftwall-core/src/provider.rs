use crate::error::DriftwallResult;
use crate::model::{DesiredShare, LiveShare, LiveState, ResourceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Read-only view of the host, queried at call time.
///
/// Implementations must reflect the system as it is right now; the diff and
/// apply engines rely on that when deciding whether a deletion is safe.
pub trait LiveQuery: Send + Sync {
    /// Snapshot pools, datasets and shares.
    fn read_live_state(&self) -> DriftwallResult<LiveState>;

    /// Bytes referenced by `dataset`, including children and snapshots.
    fn dataset_used_bytes(&self, dataset: &str) -> DriftwallResult<u64>;

    /// Whether any client currently has `share` open. Implementations that
    /// cannot tell (no smbstatus, samba down) answer `false`.
    fn has_active_connections(&self, share: &str) -> bool;
}

/// External tools the engine shells out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Zfs,
    Zpool,
    Smbcontrol,
    Smbstatus,
}

impl Tool {
    pub fn binary_name(&self) -> &'static str {
        match self {
            Tool::Zfs => "zfs",
            Tool::Zpool => "zpool",
            Tool::Smbcontrol => "smbcontrol",
            Tool::Smbstatus => "smbstatus",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

/// Timeout class for a command invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Status queries and service reloads.
    Fast,
    /// Property changes, `zpool add`, `zfs destroy`.
    Medium,
    /// Listings that walk every dataset.
    Zfs,
    /// Pool creation and destruction.
    Slow,
}

/// Tiered-timeout command execution.
pub trait CommandExec: Send + Sync {
    /// Run `tool` with `args`, returning its stdout. Stderr only feeds the
    /// error message. Non-zero exit and timeouts are errors.
    fn run(&self, tool: Tool, tier: Tier, args: &[&str]) -> DriftwallResult<String>;
}

/// Persistence for SMB share definitions rendered into `smb.conf`.
pub trait ShareStore: Send + Sync {
    fn list_shares(&self) -> DriftwallResult<Vec<LiveShare>>;

    /// Insert or replace `share`, marking it enabled.
    fn upsert_share(&self, share: &DesiredShare) -> DriftwallResult<()>;

    fn delete_share(&self, name: &str) -> DriftwallResult<()>;
}

/// One operator override for a BLOCKED plan item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub kind: ResourceKind,
    pub name: String,
    pub reason: String,
    pub approved_at: DateTime<Utc>,
}

/// Ledger of operator approvals, stamped onto plans before apply.
pub trait ApprovalStore: Send + Sync {
    fn approve(&self, kind: ResourceKind, name: &str, reason: &str) -> DriftwallResult<()>;

    fn approvals(&self) -> DriftwallResult<Vec<Approval>>;

    fn clear(&self) -> DriftwallResult<()>;
}

/// Severity attached to a broadcast notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyLevel {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for NotifyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NotifyLevel::Info => "info",
            NotifyLevel::Warning => "warning",
            NotifyLevel::Critical => "critical",
        };
        f.write_str(label)
    }
}

/// Fan-out for drift notifications.
pub trait DriftBroadcaster: Send + Sync {
    fn broadcast(&self, event: &str, data: serde_json::Value, level: NotifyLevel);
}

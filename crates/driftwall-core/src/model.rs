//! Desired and live resource records shared by the parser, diff engine, apply
//! engine and drift detector.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Category of a managed resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Pool,
    Dataset,
    Share,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Pool => "pool",
            ResourceKind::Dataset => "dataset",
            ResourceKind::Share => "share",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pool" => Ok(ResourceKind::Pool),
            "dataset" => Ok(ResourceKind::Dataset),
            "share" => Ok(ResourceKind::Share),
            other => Err(format!(
                "unknown resource kind {other:?} (expected pool, dataset or share)"
            )),
        }
    }
}

/// What the reconciler must do for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiffAction {
    Nop,
    Create,
    Modify,
    Delete,
    Blocked,
}

impl fmt::Display for DiffAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DiffAction::Nop => "NOP",
            DiffAction::Create => "CREATE",
            DiffAction::Modify => "MODIFY",
            DiffAction::Delete => "DELETE",
            DiffAction::Blocked => "BLOCKED",
        };
        f.write_str(label)
    }
}

/// Severity of a reconciliation step. Ordered so the worst of a set is `max()`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        f.write_str(label)
    }
}

/// Pool topology. `Stripe` is written as an empty string in documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VdevType {
    #[default]
    #[serde(rename = "")]
    Stripe,
    Mirror,
    Raidz,
    Raidz1,
    Raidz2,
    Raidz3,
}

impl VdevType {
    /// Keyword passed to `zpool create`; stripes have none.
    pub fn as_str(&self) -> &'static str {
        match self {
            VdevType::Stripe => "",
            VdevType::Mirror => "mirror",
            VdevType::Raidz => "raidz",
            VdevType::Raidz1 => "raidz1",
            VdevType::Raidz2 => "raidz2",
            VdevType::Raidz3 => "raidz3",
        }
    }
}

impl FromStr for VdevType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(VdevType::Stripe),
            "mirror" => Ok(VdevType::Mirror),
            "raidz" => Ok(VdevType::Raidz),
            "raidz1" => Ok(VdevType::Raidz1),
            "raidz2" => Ok(VdevType::Raidz2),
            "raidz3" => Ok(VdevType::Raidz3),
            other => Err(format!(
                "unknown vdev_type {other:?} (valid: \"\", mirror, raidz, raidz1, raidz2, raidz3)"
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredPool {
    pub name: String,
    #[serde(default)]
    pub vdev_type: VdevType,
    pub disks: Vec<String>,
    /// 0 means "let ZFS decide".
    #[serde(default)]
    pub ashift: u8,
    /// Extra `-O key=value` filesystem properties passed at creation.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// A ZFS filesystem. Empty string fields are unmanaged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredDataset {
    pub name: String,
    #[serde(default)]
    pub quota: String,
    #[serde(default)]
    pub compression: String,
    #[serde(default)]
    pub atime: String,
    #[serde(default)]
    pub mountpoint: String,
    #[serde(default)]
    pub encrypted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredShare {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub valid_users: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub guest_ok: bool,
}

/// Parsed desired-state document. Never mutated after a successful parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredState {
    pub version: String,
    #[serde(default)]
    pub pools: Vec<DesiredPool>,
    #[serde(default)]
    pub datasets: Vec<DesiredDataset>,
    #[serde(default)]
    pub shares: Vec<DesiredShare>,
}

/// Copy of the desired record carried by a plan item so apply never has to
/// re-resolve the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesiredResource {
    Pool(DesiredPool),
    Dataset(DesiredDataset),
    Share(DesiredShare),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivePool {
    pub name: String,
    pub health: String,
    pub disks: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveDataset {
    pub name: String,
    pub used: u64,
    pub available: u64,
    pub compression: String,
    pub atime: String,
    pub mountpoint: String,
    /// Raw quota as reported by `zfs get -p` (bytes, or `0`/`none`).
    pub quota: String,
    pub encrypted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveShare {
    pub name: String,
    pub path: String,
    pub read_only: bool,
    pub valid_users: String,
    pub comment: String,
    pub guest_ok: bool,
    pub enabled: bool,
}

/// Snapshot of what the host currently runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveState {
    pub pools: Vec<LivePool>,
    pub datasets: Vec<LiveDataset>,
    pub shares: Vec<LiveShare>,
}

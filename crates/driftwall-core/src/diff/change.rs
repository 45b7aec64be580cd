use crate::model::RiskLevel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One property difference inside a MODIFY item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
    /// Pool is not ONLINE. Reported only; nothing can set health.
    PoolHealth { health: String },
    /// Disk listed in the document but missing from the pool.
    DiskAdd { disk: String },
    /// Disk in the pool but absent from the document. Never executed.
    DiskRemove { disk: String },
    DatasetProperty {
        property: String,
        from: String,
        to: String,
    },
    ShareField {
        field: String,
        from: String,
        to: String,
    },
}

impl Change {
    pub fn dataset(property: &str, from: impl Into<String>, to: impl Into<String>) -> Self {
        Change::DatasetProperty {
            property: property.to_string(),
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn share(field: &str, from: impl Into<String>, to: impl Into<String>) -> Self {
        Change::ShareField {
            field: field.to_string(),
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn risk(&self) -> RiskLevel {
        match self {
            Change::PoolHealth { .. } | Change::DiskRemove { .. } => RiskLevel::Critical,
            Change::DiskAdd { .. } => RiskLevel::Medium,
            // Services hold paths under the old mountpoint open.
            Change::DatasetProperty { property, .. } if property == "mountpoint" => {
                RiskLevel::Medium
            }
            Change::DatasetProperty { .. } | Change::ShareField { .. } => RiskLevel::Low,
        }
    }

    /// Whether applying the item would act on this change. Health and disk
    /// removal need a human.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, Change::PoolHealth { .. } | Change::DiskRemove { .. })
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::PoolHealth { health } => {
                write!(f, "health: {} (not ONLINE, check zpool status)", health)
            }
            Change::DiskAdd { disk } => write!(f, "disk-add: {} (will run zpool add)", disk),
            Change::DiskRemove { disk } => write!(
                f,
                "disk-remove: {} (removing disks from a live pool needs manual intervention)",
                disk
            ),
            Change::DatasetProperty { property, from, to } => {
                write!(f, "{}: {} → {}", property, from, to)
            }
            Change::ShareField { field, from, to } => write!(f, "{}: {} → {}", field, from, to),
        }
    }
}

/// Highest risk among `changes`, `Low` when empty.
pub fn worst_risk(changes: &[Change]) -> RiskLevel {
    changes
        .iter()
        .map(Change::risk)
        .max()
        .unwrap_or(RiskLevel::Low)
}

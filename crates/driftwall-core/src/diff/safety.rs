//! Deletion classification. Every live resource missing from the document
//! passes through here before it can become a DELETE.

use super::plan::DiffItem;
use crate::model::{DiffAction, LiveDataset, LivePool, LiveShare, ResourceKind, RiskLevel};
use crate::provider::LiveQuery;
use crate::units::humanise_bytes;
use log::warn;

/// Pools are never destroyed automatically.
pub(crate) fn classify_pool_removal(pool: &LivePool) -> DiffItem {
    DiffItem::blocked(
        ResourceKind::Pool,
        &pool.name,
        RiskLevel::Critical,
        format!(
            "Pool {name:?} exists on the host but not in the desired state. Pool destruction is \
             never automatic because it destroys ALL datasets and snapshots inside it. To remove \
             this pool, verify all data has been migrated, then run `zpool export {name}` or \
             `zpool destroy {name}` manually.",
            name = pool.name
        ),
    )
}

/// Datasets holding any data are blocked; usage is queried now, not taken from
/// the live snapshot.
pub(crate) fn classify_dataset_removal(dataset: &LiveDataset, probe: &dyn LiveQuery) -> DiffItem {
    match probe.dataset_used_bytes(&dataset.name) {
        Ok(0) => DiffItem::new(
            ResourceKind::Dataset,
            &dataset.name,
            DiffAction::Delete,
            RiskLevel::Medium,
        ),
        Ok(used) => DiffItem::blocked(
            ResourceKind::Dataset,
            &dataset.name,
            RiskLevel::Critical,
            format!(
                "Dataset {name:?} holds {used} of data and cannot be destroyed automatically. \
                 To resolve: (1) confirm the data is no longer needed, (2) take a snapshot if you \
                 want a recovery point, (3) run `zfs destroy {name}` manually, (4) re-apply this plan.",
                name = dataset.name,
                used = humanise_bytes(used)
            ),
        ),
        Err(err) => {
            warn!(
                "usage query for dataset {} failed, treating it as non-empty: {}",
                dataset.name, err
            );
            DiffItem::blocked(
                ResourceKind::Dataset,
                &dataset.name,
                RiskLevel::Critical,
                format!(
                    "Dataset {name:?} could not be checked for data ({err}). It is treated as \
                     non-empty. Check `zfs get used {name}`, then re-evaluate the plan or destroy \
                     it manually.",
                    name = dataset.name
                ),
            )
        }
    }
}

/// Shares with connected clients are blocked.
pub(crate) fn classify_share_removal(share: &LiveShare, probe: &dyn LiveQuery) -> DiffItem {
    if probe.has_active_connections(&share.name) {
        return DiffItem::blocked(
            ResourceKind::Share,
            &share.name,
            RiskLevel::High,
            format!(
                "Share {name:?} has connected clients and cannot be removed while in use. \
                 Dropping them without warning can lose unsaved work in files they hold open. \
                 Wait for clients to disconnect or notify users first, then re-evaluate the plan.",
                name = share.name
            ),
        );
    }

    DiffItem::new(
        ResourceKind::Share,
        &share.name,
        DiffAction::Delete,
        RiskLevel::Low,
    )
}

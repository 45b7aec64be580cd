//! Diff engine: compares desired against live and classifies each resource.
//!
//! Plans are ordered in three phases. Creates come first so new resources
//! exist before anything references them, modifications and no-ops next, and
//! deletions last so pending work stays visible even when a removal is blocked.

mod change;
mod plan;
mod safety;

pub use change::{worst_risk, Change};
pub use plan::{stamp_approvals, DiffItem, Plan};

use crate::model::{
    DesiredDataset, DesiredPool, DesiredResource, DesiredShare, DesiredState, DiffAction,
    LiveDataset, LivePool, LiveShare, LiveState, ResourceKind, RiskLevel,
};
use crate::provider::LiveQuery;
use crate::units::parse_quota;
use std::collections::{HashMap, HashSet};

/// Compute the reconciliation plan. `probe` answers the usage and connection
/// questions deletions depend on, at evaluation time.
pub fn compute_diff(desired: &DesiredState, live: &LiveState, probe: &dyn LiveQuery) -> Plan {
    let live_pools: HashMap<&str, &LivePool> =
        live.pools.iter().map(|p| (p.name.as_str(), p)).collect();
    let live_datasets: HashMap<&str, &LiveDataset> =
        live.datasets.iter().map(|d| (d.name.as_str(), d)).collect();
    let live_shares: HashMap<&str, &LiveShare> =
        live.shares.iter().map(|s| (s.name.as_str(), s)).collect();

    let desired_pools: HashSet<&str> = desired.pools.iter().map(|p| p.name.as_str()).collect();
    let desired_datasets: HashSet<&str> =
        desired.datasets.iter().map(|d| d.name.as_str()).collect();
    let desired_shares: HashSet<&str> = desired.shares.iter().map(|s| s.name.as_str()).collect();

    let mut items = Vec::new();

    // Phase 1: create.
    for pool in desired.pools.iter().filter(|p| !live_pools.contains_key(p.name.as_str())) {
        items.push(create_item(ResourceKind::Pool, &pool.name, DesiredResource::Pool(pool.clone())));
    }
    for dataset in desired
        .datasets
        .iter()
        .filter(|d| !live_datasets.contains_key(d.name.as_str()))
    {
        items.push(create_item(
            ResourceKind::Dataset,
            &dataset.name,
            DesiredResource::Dataset(dataset.clone()),
        ));
    }
    for share in desired
        .shares
        .iter()
        .filter(|s| !live_shares.contains_key(s.name.as_str()))
    {
        items.push(create_item(
            ResourceKind::Share,
            &share.name,
            DesiredResource::Share(share.clone()),
        ));
    }

    // Phase 2: modify or no-op.
    for pool in &desired.pools {
        if let Some(current) = live_pools.get(pool.name.as_str()) {
            items.push(modify_item(
                ResourceKind::Pool,
                &pool.name,
                diff_pool(pool, current),
                DesiredResource::Pool(pool.clone()),
            ));
        }
    }
    for dataset in &desired.datasets {
        if let Some(current) = live_datasets.get(dataset.name.as_str()) {
            items.push(modify_item(
                ResourceKind::Dataset,
                &dataset.name,
                diff_dataset(dataset, current),
                DesiredResource::Dataset(dataset.clone()),
            ));
        }
    }
    for share in &desired.shares {
        if let Some(current) = live_shares.get(share.name.as_str()) {
            items.push(modify_item(
                ResourceKind::Share,
                &share.name,
                diff_share(share, current),
                DesiredResource::Share(share.clone()),
            ));
        }
    }

    // Phase 3: delete or block. A pool's root dataset goes with its pool and
    // is never removed on its own.
    for pool in live.pools.iter().filter(|p| !desired_pools.contains(p.name.as_str())) {
        items.push(safety::classify_pool_removal(pool));
    }
    for dataset in live.datasets.iter().filter(|d| {
        !desired_datasets.contains(d.name.as_str()) && !live_pools.contains_key(d.name.as_str())
    }) {
        items.push(safety::classify_dataset_removal(dataset, probe));
    }
    for share in live.shares.iter().filter(|s| !desired_shares.contains(s.name.as_str())) {
        items.push(safety::classify_share_removal(share, probe));
    }

    Plan::from_items(items)
}

fn create_item(kind: ResourceKind, name: &str, desired: DesiredResource) -> DiffItem {
    DiffItem::new(kind, name, DiffAction::Create, RiskLevel::Low).with_desired(desired)
}

fn modify_item(
    kind: ResourceKind,
    name: &str,
    changes: Vec<Change>,
    desired: DesiredResource,
) -> DiffItem {
    if changes.is_empty() {
        return DiffItem::new(kind, name, DiffAction::Nop, RiskLevel::Low);
    }
    let mut item = DiffItem::new(kind, name, DiffAction::Modify, worst_risk(&changes))
        .with_desired(desired);
    item.changes = changes;
    item
}

fn diff_pool(desired: &DesiredPool, live: &LivePool) -> Vec<Change> {
    let mut changes = Vec::new();

    if live.health != "ONLINE" {
        changes.push(Change::PoolHealth {
            health: live.health.clone(),
        });
    }

    let live_disks: HashSet<&str> = live.disks.iter().map(String::as_str).collect();
    let desired_disks: HashSet<&str> = desired.disks.iter().map(String::as_str).collect();

    for disk in desired.disks.iter().filter(|d| !live_disks.contains(d.as_str())) {
        changes.push(Change::DiskAdd { disk: disk.clone() });
    }
    for disk in live.disks.iter().filter(|d| !desired_disks.contains(d.as_str())) {
        changes.push(Change::DiskRemove { disk: disk.clone() });
    }

    changes
}

/// Empty desired fields are unmanaged and never produce a change.
fn diff_dataset(desired: &DesiredDataset, live: &LiveDataset) -> Vec<Change> {
    let mut changes = Vec::new();

    let managed = [
        ("compression", &desired.compression, &live.compression),
        ("atime", &desired.atime, &live.atime),
        ("mountpoint", &desired.mountpoint, &live.mountpoint),
    ];
    for (property, want, have) in managed {
        if !want.is_empty() && want != have {
            changes.push(Change::dataset(property, have.as_str(), want.as_str()));
        }
    }

    if !desired.quota.is_empty() && parse_quota(&desired.quota) != parse_quota(&live.quota) {
        changes.push(Change::dataset("quota", live.quota.as_str(), desired.quota.as_str()));
    }

    changes
}

fn diff_share(desired: &DesiredShare, live: &LiveShare) -> Vec<Change> {
    let mut changes = Vec::new();

    if desired.path != live.path {
        changes.push(Change::share("path", live.path.as_str(), desired.path.as_str()));
    }
    if desired.read_only != live.read_only {
        changes.push(Change::share(
            "read_only",
            live.read_only.to_string(),
            desired.read_only.to_string(),
        ));
    }
    if desired.valid_users != live.valid_users {
        changes.push(Change::share(
            "valid_users",
            format!("{:?}", live.valid_users),
            format!("{:?}", desired.valid_users),
        ));
    }
    if desired.comment != live.comment {
        changes.push(Change::share(
            "comment",
            format!("{:?}", live.comment),
            format!("{:?}", desired.comment),
        ));
    }
    if desired.guest_ok != live.guest_ok {
        changes.push(Change::share(
            "guest_ok",
            live.guest_ok.to_string(),
            desired.guest_ok.to_string(),
        ));
    }
    if !live.enabled {
        changes.push(Change::share("enabled", "false", "true"));
    }

    changes
}

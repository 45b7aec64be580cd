//! `LiveQuery` backed by the real tools: pools and datasets come from
//! `zpool`/`zfs`, shares from the share store, connections from `smbstatus`.

use crate::parse::{
    parse_names, parse_property_table, parse_tabular_pairs, parse_zpool_status_paths,
    smbstatus_lists_share,
};
use driftwall_core::{
    CommandExec, DriftwallError, DriftwallResult, LiveDataset, LivePool, LiveQuery, LiveShare,
    LiveState, ShareStore, Tier, Tool,
};
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

const DATASET_PROPERTIES: &str = "used,avail,compression,atime,mountpoint,quota,encryption";

pub struct SystemLiveState {
    exec: Arc<dyn CommandExec>,
    store: Arc<dyn ShareStore>,
}

impl SystemLiveState {
    pub fn new(exec: Arc<dyn CommandExec>, store: Arc<dyn ShareStore>) -> Self {
        Self { exec, store }
    }

    fn read_pools(&self) -> DriftwallResult<Vec<LivePool>> {
        let listing = self
            .exec
            .run(Tool::Zpool, Tier::Zfs, &["list", "-H", "-o", "name,health"])
            .map_err(|err| context("zpool list", err))?;

        let mut pools: Vec<LivePool> = parse_tabular_pairs(&listing)
            .into_iter()
            .map(|(name, health)| LivePool {
                name,
                health,
                disks: Vec::new(),
            })
            .collect();

        // Membership is best effort; a pool without by-id disks simply
        // reports none.
        match self.exec.run(Tool::Zpool, Tier::Zfs, &["status", "-P"]) {
            Ok(status) => {
                let mut disks = parse_zpool_status_paths(&status);
                for pool in &mut pools {
                    if let Some(found) = disks.remove(&pool.name) {
                        pool.disks = found;
                    }
                }
            }
            Err(err) => debug!("zpool status unavailable, pool disks left empty: {}", err),
        }

        Ok(pools)
    }

    fn read_datasets(&self) -> DriftwallResult<Vec<LiveDataset>> {
        let listing = self
            .exec
            .run(
                Tool::Zfs,
                Tier::Zfs,
                &["list", "-H", "-t", "filesystem", "-o", "name"],
            )
            .map_err(|err| context("zfs list", err))?;
        let names = parse_names(&listing);
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let mut args = vec!["get", "-H", "-p", "-o", "name,property,value", DATASET_PROPERTIES];
        args.extend(names.iter().map(String::as_str));
        let properties = self
            .exec
            .run(Tool::Zfs, Tier::Zfs, &args)
            .map_err(|err| context("zfs get", err))?;
        let table = parse_property_table(&properties);

        let empty = HashMap::new();
        Ok(names
            .into_iter()
            .map(|name| {
                let props = table.get(&name).unwrap_or(&empty);
                let text = |key: &str| props.get(key).cloned().unwrap_or_default();
                let bytes = |key: &str| {
                    props
                        .get(key)
                        .and_then(|value| value.parse::<u64>().ok())
                        .unwrap_or(0)
                };
                let encryption = text("encryption");
                LiveDataset {
                    used: bytes("used"),
                    available: bytes("avail"),
                    compression: text("compression"),
                    atime: text("atime"),
                    mountpoint: text("mountpoint"),
                    quota: text("quota"),
                    encrypted: !matches!(encryption.as_str(), "" | "-" | "off"),
                    name,
                }
            })
            .collect())
    }
}

fn context(step: &str, err: DriftwallError) -> DriftwallError {
    DriftwallError::Provider(format!("reading live state: {}: {}", step, err))
}

impl LiveQuery for SystemLiveState {
    fn read_live_state(&self) -> DriftwallResult<LiveState> {
        let pools = self.read_pools()?;
        let datasets = self.read_datasets()?;
        let shares: Vec<LiveShare> = self
            .store
            .list_shares()
            .map_err(|err| context("share store", err))?;
        debug!(
            "live state: {} pool(s), {} dataset(s), {} share(s)",
            pools.len(),
            datasets.len(),
            shares.len()
        );
        Ok(LiveState {
            pools,
            datasets,
            shares,
        })
    }

    fn dataset_used_bytes(&self, dataset: &str) -> DriftwallResult<u64> {
        let out = self.exec.run(
            Tool::Zfs,
            Tier::Zfs,
            &["get", "-H", "-p", "-o", "value", "used", dataset],
        )?;
        let value = out.trim();
        value.parse::<u64>().map_err(|_| {
            DriftwallError::Provider(format!(
                "zfs reported unparsable usage {:?} for {}",
                value, dataset
            ))
        })
    }

    fn has_active_connections(&self, share: &str) -> bool {
        match self.exec.run(Tool::Smbstatus, Tier::Fast, &["-S", "-n"]) {
            Ok(out) => smbstatus_lists_share(&out, share),
            Err(err) => {
                debug!("smbstatus unavailable, treating {} as idle: {}", share, err);
                false
            }
        }
    }
}

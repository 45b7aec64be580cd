#![allow(dead_code)]

use driftwall_core::{
    CommandExec, DesiredShare, DriftBroadcaster, DriftwallError, DriftwallResult, LiveDataset,
    LivePool, LiveQuery, LiveShare, LiveState, NotifyLevel, ShareStore, Tier, Tool,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// In-memory host: live state, usage, connections, share rows, and a record
/// of every command run against it.
#[derive(Default)]
pub struct MockHost {
    pub live: Mutex<LiveState>,
    pub used: Mutex<HashMap<String, u64>>,
    pub usage_errors: Mutex<HashSet<String>>,
    pub connected: Mutex<HashSet<String>>,
    pub shares: Mutex<Vec<LiveShare>>,
    pub commands: Mutex<Vec<(Tool, Tier, String)>>,
    /// Any command line containing one of these fails.
    pub fail_on: Mutex<Vec<String>>,
    pub live_error: Mutex<bool>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pool(self, name: &str, health: &str, disks: &[&str]) -> Self {
        self.live.lock().unwrap().pools.push(LivePool {
            name: name.to_string(),
            health: health.to_string(),
            disks: disks.iter().map(|d| d.to_string()).collect(),
        });
        self
    }

    pub fn with_dataset(self, dataset: LiveDataset) -> Self {
        self.used
            .lock()
            .unwrap()
            .insert(dataset.name.clone(), dataset.used);
        self.live.lock().unwrap().datasets.push(dataset);
        self
    }

    pub fn with_share(self, share: LiveShare) -> Self {
        self.live.lock().unwrap().shares.push(share.clone());
        self.shares.lock().unwrap().push(share);
        self
    }

    pub fn set_used(&self, dataset: &str, bytes: u64) {
        self.used.lock().unwrap().insert(dataset.to_string(), bytes);
    }

    pub fn connect(&self, share: &str) {
        self.connected.lock().unwrap().insert(share.to_string());
    }

    pub fn fail_on(&self, pattern: &str) {
        self.fail_on.lock().unwrap().push(pattern.to_string());
    }

    /// Command lines as `"tool arg arg"`.
    pub fn command_lines(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, line)| line.clone())
            .collect()
    }

    pub fn ran(&self, prefix: &str) -> bool {
        self.command_lines().iter().any(|line| line.starts_with(prefix))
    }
}

pub fn dataset(name: &str, used: u64) -> LiveDataset {
    LiveDataset {
        name: name.to_string(),
        used,
        compression: "lz4".to_string(),
        atime: "off".to_string(),
        mountpoint: format!("/{name}"),
        quota: "0".to_string(),
        ..Default::default()
    }
}

pub fn share(name: &str, path: &str) -> LiveShare {
    LiveShare {
        name: name.to_string(),
        path: path.to_string(),
        enabled: true,
        ..Default::default()
    }
}

impl LiveQuery for MockHost {
    fn read_live_state(&self) -> DriftwallResult<LiveState> {
        if *self.live_error.lock().unwrap() {
            return Err(DriftwallError::Provider("zpool not responding".into()));
        }
        Ok(self.live.lock().unwrap().clone())
    }

    fn dataset_used_bytes(&self, dataset: &str) -> DriftwallResult<u64> {
        if self.usage_errors.lock().unwrap().contains(dataset) {
            return Err(DriftwallError::Provider(format!(
                "cannot open '{dataset}'"
            )));
        }
        Ok(self.used.lock().unwrap().get(dataset).copied().unwrap_or(0))
    }

    fn has_active_connections(&self, share: &str) -> bool {
        self.connected.lock().unwrap().contains(share)
    }
}

impl CommandExec for MockHost {
    fn run(&self, tool: Tool, tier: Tier, args: &[&str]) -> DriftwallResult<String> {
        let line = format!("{} {}", tool, args.join(" "));
        self.commands.lock().unwrap().push((tool, tier, line.clone()));

        if self
            .fail_on
            .lock()
            .unwrap()
            .iter()
            .any(|pattern| line.contains(pattern.as_str()))
        {
            return Err(DriftwallError::Provider(format!("{line}: simulated failure")));
        }

        let live = self.live.lock().unwrap();
        match (tool, args) {
            (Tool::Zfs, ["list", "-H", "-o", "name", name]) => {
                if live.datasets.iter().any(|d| d.name == *name) {
                    Ok(format!("{name}\n"))
                } else {
                    Err(DriftwallError::Provider(format!(
                        "cannot open '{name}': dataset does not exist"
                    )))
                }
            }
            (Tool::Zfs, ["list", "-H", "-o", "name", "-r", pool]) => {
                let prefix = format!("{pool}/");
                let mut out = format!("{pool}\n");
                for d in live.datasets.iter().filter(|d| d.name.starts_with(&prefix)) {
                    out.push_str(&d.name);
                    out.push('\n');
                }
                Ok(out)
            }
            _ => Ok(String::new()),
        }
    }
}

impl ShareStore for MockHost {
    fn list_shares(&self) -> DriftwallResult<Vec<LiveShare>> {
        Ok(self.shares.lock().unwrap().clone())
    }

    fn upsert_share(&self, share: &DesiredShare) -> DriftwallResult<()> {
        let row = LiveShare {
            name: share.name.clone(),
            path: share.path.clone(),
            read_only: share.read_only,
            valid_users: share.valid_users.clone(),
            comment: share.comment.clone(),
            guest_ok: share.guest_ok,
            enabled: true,
        };
        let mut shares = self.shares.lock().unwrap();
        shares.retain(|s| s.name != share.name);
        shares.push(row);
        Ok(())
    }

    fn delete_share(&self, name: &str) -> DriftwallResult<()> {
        self.shares.lock().unwrap().retain(|s| s.name != name);
        Ok(())
    }
}

/// Broadcaster that remembers what it was asked to send.
#[derive(Default)]
pub struct RecordingHub {
    pub events: Mutex<Vec<(String, serde_json::Value, NotifyLevel)>>,
}

impl RecordingHub {
    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<(String, serde_json::Value, NotifyLevel)> {
        self.events.lock().unwrap().last().cloned()
    }
}

impl DriftBroadcaster for RecordingHub {
    fn broadcast(&self, event: &str, data: serde_json::Value, level: NotifyLevel) {
        self.events
            .lock()
            .unwrap()
            .push((event.to_string(), data, level));
    }
}

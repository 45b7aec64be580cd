use super::{desired_record, ResourceExecutor};
use crate::diff::{Change, DiffItem};
use crate::document::{is_safe_disk_path, BY_ID_PREFIX};
use crate::error::{DriftwallError, DriftwallResult};
use crate::model::DesiredResource;
use crate::provider::{CommandExec, LiveQuery, Tier, Tool};
use crate::units::humanise_bytes;
use log::{info, warn};
use std::sync::Arc;

/// Runs `zpool` for pool items.
pub struct PoolExecutor {
    exec: Arc<dyn CommandExec>,
    live: Arc<dyn LiveQuery>,
}

impl PoolExecutor {
    pub fn new(exec: Arc<dyn CommandExec>, live: Arc<dyn LiveQuery>) -> Self {
        Self { exec, live }
    }
}

fn refuse_unstable_disk(pool: &str, disk: &str, action: &str) -> DriftwallResult<()> {
    if is_safe_disk_path(disk) {
        return Ok(());
    }
    Err(DriftwallError::SafetyAbort(format!(
        "disk {:?} is not a safe {} path; refusing to {} pool {:?}",
        disk, BY_ID_PREFIX, action, pool
    )))
}

impl ResourceExecutor for PoolExecutor {
    fn create(&self, item: &DiffItem) -> DriftwallResult<()> {
        let DesiredResource::Pool(pool) = desired_record(item)? else {
            return Err(DriftwallError::Provider(format!(
                "plan item for pool {:?} carries a non-pool record",
                item.name
            )));
        };

        for disk in &pool.disks {
            refuse_unstable_disk(&pool.name, disk, "create")?;
        }

        let ashift = format!("ashift={}", pool.ashift);
        let options: Vec<String> = pool
            .options
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();

        let mut args: Vec<&str> = vec!["create"];
        if pool.ashift != 0 {
            args.extend(["-o", ashift.as_str()]);
        }
        for option in &options {
            args.extend(["-O", option.as_str()]);
        }
        args.push(pool.name.as_str());
        if !pool.vdev_type.as_str().is_empty() {
            args.push(pool.vdev_type.as_str());
        }
        args.extend(pool.disks.iter().map(String::as_str));

        self.exec.run(Tool::Zpool, Tier::Slow, &args)?;
        info!("created pool {} with {} disk(s)", pool.name, pool.disks.len());
        Ok(())
    }

    fn modify(&self, item: &DiffItem) -> DriftwallResult<()> {
        for change in &item.changes {
            match change {
                Change::DiskAdd { disk } => {
                    refuse_unstable_disk(&item.name, disk, "grow")?;
                    self.exec
                        .run(Tool::Zpool, Tier::Medium, &["add", item.name.as_str(), disk.as_str()])?;
                    info!("added disk {} to pool {}", disk, item.name);
                }
                other => warn!(
                    "pool {}: skipping `{}`; this needs manual intervention",
                    item.name, other
                ),
            }
        }
        Ok(())
    }

    fn delete(&self, item: &DiffItem) -> DriftwallResult<()> {
        let listing = self.exec.run(
            Tool::Zfs,
            Tier::Zfs,
            &["list", "-H", "-o", "name", "-r", item.name.as_str()],
        )?;

        for child in listing
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && *line != item.name)
        {
            let used = self.live.dataset_used_bytes(child)?;
            if used > 0 {
                return Err(DriftwallError::SafetyAbort(format!(
                    "pool {:?} contains dataset {:?} with {} of data; destroy cancelled even \
                     though BLOCKED was approved. Destroy the dataset manually first.",
                    item.name,
                    child,
                    humanise_bytes(used)
                )));
            }
        }

        self.exec
            .run(Tool::Zpool, Tier::Slow, &["destroy", item.name.as_str()])?;
        warn!("destroyed pool {} (approved override)", item.name);
        Ok(())
    }
}

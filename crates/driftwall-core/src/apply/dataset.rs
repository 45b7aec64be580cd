use super::{desired_record, ResourceExecutor};
use crate::diff::{Change, DiffItem};
use crate::error::{DriftwallError, DriftwallResult};
use crate::model::DesiredResource;
use crate::provider::{CommandExec, LiveQuery, Tier, Tool};
use crate::units::humanise_bytes;
use log::{info, warn};
use std::sync::Arc;

/// Runs `zfs` for dataset items.
pub struct DatasetExecutor {
    exec: Arc<dyn CommandExec>,
    live: Arc<dyn LiveQuery>,
}

impl DatasetExecutor {
    pub fn new(exec: Arc<dyn CommandExec>, live: Arc<dyn LiveQuery>) -> Self {
        Self { exec, live }
    }

    fn exists(&self, name: &str) -> bool {
        self.exec
            .run(Tool::Zfs, Tier::Zfs, &["list", "-H", "-o", "name", name])
            .is_ok()
    }
}

/// ZFS property behind a managed document field.
fn zfs_property(field: &str) -> Option<&'static str> {
    match field {
        "compression" => Some("compression"),
        "atime" => Some("atime"),
        "mountpoint" => Some("mountpoint"),
        "quota" => Some("quota"),
        _ => None,
    }
}

impl ResourceExecutor for DatasetExecutor {
    fn create(&self, item: &DiffItem) -> DriftwallResult<()> {
        let DesiredResource::Dataset(dataset) = desired_record(item)? else {
            return Err(DriftwallError::Provider(format!(
                "plan item for dataset {:?} carries a non-dataset record",
                item.name
            )));
        };

        if self.exists(&dataset.name) {
            info!("dataset {} already exists, skipping create", dataset.name);
            return Ok(());
        }

        if dataset.encrypted {
            return Err(DriftwallError::Provider(format!(
                "dataset {:?} is marked encrypted; key material is never generated automatically. \
                 Create it by hand with `zfs create -o encryption=on -o keyformat=... -o keylocation=... {}`, \
                 then re-apply this plan",
                dataset.name, dataset.name
            )));
        }

        let properties: Vec<String> = [
            ("compression", &dataset.compression),
            ("atime", &dataset.atime),
            ("mountpoint", &dataset.mountpoint),
            ("quota", &dataset.quota),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();

        let mut args: Vec<&str> = vec!["create"];
        for property in &properties {
            args.extend(["-o", property.as_str()]);
        }
        args.push(dataset.name.as_str());

        self.exec.run(Tool::Zfs, Tier::Medium, &args)?;
        info!("created dataset {}", dataset.name);
        Ok(())
    }

    fn modify(&self, item: &DiffItem) -> DriftwallResult<()> {
        for change in &item.changes {
            let Change::DatasetProperty { property, to, .. } = change else {
                warn!("dataset {}: ignoring non-property change `{}`", item.name, change);
                continue;
            };
            let Some(zfs_prop) = zfs_property(property) else {
                warn!("dataset {}: unknown property {:?}, skipping", item.name, property);
                continue;
            };

            let assignment = format!("{}={}", zfs_prop, to);
            self.exec.run(
                Tool::Zfs,
                Tier::Medium,
                &["set", assignment.as_str(), item.name.as_str()],
            )?;
            info!("set {} on dataset {}", assignment, item.name);
        }
        Ok(())
    }

    fn delete(&self, item: &DiffItem) -> DriftwallResult<()> {
        let used = self.live.dataset_used_bytes(&item.name)?;
        if used > 0 {
            let detail = if item.approved {
                "destroy cancelled even though BLOCKED was approved. Snapshot and destroy it manually"
            } else {
                "destroy cancelled. This should have been BLOCKED; please report it as a bug"
            };
            return Err(DriftwallError::SafetyAbort(format!(
                "dataset {:?} has {} of data; {}",
                item.name,
                humanise_bytes(used),
                detail
            )));
        }

        self.exec
            .run(Tool::Zfs, Tier::Medium, &["destroy", item.name.as_str()])?;
        info!("destroyed empty dataset {}", item.name);
        Ok(())
    }
}

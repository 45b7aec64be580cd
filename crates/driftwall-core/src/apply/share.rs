use super::samba::{render_smb_conf, write_atomically, SambaSettings};
use super::{desired_record, ResourceExecutor};
use crate::diff::DiffItem;
use crate::error::{DriftwallError, DriftwallResult};
use crate::model::DesiredResource;
use crate::provider::{CommandExec, LiveQuery, ShareStore, Tier, Tool};
use log::{info, warn};
use std::sync::Arc;

/// Keeps the share store and the rendered `smb.conf` in step.
pub struct ShareExecutor {
    store: Arc<dyn ShareStore>,
    exec: Arc<dyn CommandExec>,
    live: Arc<dyn LiveQuery>,
    samba: SambaSettings,
}

impl ShareExecutor {
    pub fn new(
        store: Arc<dyn ShareStore>,
        exec: Arc<dyn CommandExec>,
        live: Arc<dyn LiveQuery>,
        samba: SambaSettings,
    ) -> Self {
        Self {
            store,
            exec,
            live,
            samba,
        }
    }

    fn upsert(&self, item: &DiffItem) -> DriftwallResult<()> {
        let DesiredResource::Share(share) = desired_record(item)? else {
            return Err(DriftwallError::Provider(format!(
                "plan item for share {:?} carries a non-share record",
                item.name
            )));
        };
        self.store.upsert_share(share)?;
        info!("stored share {} -> {}", share.name, share.path);
        self.publish()
    }

    /// Regenerate `smb.conf` from the store and ask smbd to reload it. A
    /// failed reload is logged only; the file on disk is already correct.
    pub fn publish(&self) -> DriftwallResult<()> {
        let shares = self.store.list_shares()?;
        let rendered = render_smb_conf(&self.samba, &shares);
        write_atomically(&self.samba.conf_path, &rendered)?;

        if let Err(err) = self
            .exec
            .run(Tool::Smbcontrol, Tier::Fast, &["smbd", "reload-config"])
        {
            warn!("smbd reload failed (config written): {}", err);
        }
        Ok(())
    }
}

impl ResourceExecutor for ShareExecutor {
    fn create(&self, item: &DiffItem) -> DriftwallResult<()> {
        self.upsert(item)
    }

    fn modify(&self, item: &DiffItem) -> DriftwallResult<()> {
        self.upsert(item)
    }

    fn delete(&self, item: &DiffItem) -> DriftwallResult<()> {
        if self.live.has_active_connections(&item.name) {
            return Err(DriftwallError::SafetyAbort(format!(
                "share {:?} gained client connections after the plan was evaluated; delete cancelled",
                item.name
            )));
        }
        self.store.delete_share(&item.name)?;
        info!("removed share {}", item.name);
        self.publish()
    }
}

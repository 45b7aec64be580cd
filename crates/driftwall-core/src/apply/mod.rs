//! Apply engine: executes a plan item by item and halts on the first failure
//! or unapproved BLOCKED item. Completed steps are never rolled back; plans
//! are built so re-running after a fix picks up where the last run stopped.

mod dataset;
mod lock;
mod pool;
mod samba;
mod share;

pub use dataset::DatasetExecutor;
pub use lock::ApplyLock;
pub use pool::PoolExecutor;
pub use samba::{render_smb_conf, write_atomically, SambaSettings};
pub use share::ShareExecutor;

use crate::diff::{DiffItem, Plan};
use crate::error::{DriftwallError, DriftwallResult};
use crate::model::{DesiredResource, DiffAction, ResourceKind};
use crate::provider::{CommandExec, LiveQuery, ShareStore};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Per-kind operations the engine dispatches to.
pub trait ResourceExecutor: Send + Sync {
    fn create(&self, item: &DiffItem) -> DriftwallResult<()>;

    fn modify(&self, item: &DiffItem) -> DriftwallResult<()>;

    /// Remove the resource. Runs for plain DELETE items and approved BLOCKED
    /// ones; `item.approved` tells them apart.
    fn delete(&self, item: &DiffItem) -> DriftwallResult<()>;
}

pub(crate) fn desired_record(item: &DiffItem) -> DriftwallResult<&DesiredResource> {
    item.desired.as_ref().ok_or_else(|| {
        DriftwallError::Provider(format!(
            "plan item {} {:?} carries no desired record",
            item.kind, item.name
        ))
    })
}

/// Outcome of one apply run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyResult {
    /// `"ACTION kind name"` for every completed step, in order.
    pub applied: Vec<String>,
    /// `"kind name"` of the item that stopped the run.
    pub failed: Option<String>,
    pub error: Option<String>,
    pub duration: Duration,
}

/// A halted run: what completed before the stop, and why it stopped.
#[derive(Debug, Error)]
#[error("apply halted after {} step(s): {error}", .result.applied.len())]
pub struct ApplyFailure {
    pub result: ApplyResult,
    #[source]
    pub error: DriftwallError,
}

/// Executes plans against the host. One apply at a time per engine.
pub struct ApplyEngine {
    pools: Box<dyn ResourceExecutor>,
    datasets: Box<dyn ResourceExecutor>,
    shares: Box<dyn ResourceExecutor>,
    running: AtomicBool,
}

struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunningGuard(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ApplyEngine {
    /// Wire the standard pool, dataset and share executors.
    pub fn new(
        exec: Arc<dyn CommandExec>,
        live: Arc<dyn LiveQuery>,
        store: Arc<dyn ShareStore>,
        samba: SambaSettings,
    ) -> Self {
        Self::with_executors(
            Box::new(PoolExecutor::new(exec.clone(), live.clone())),
            Box::new(DatasetExecutor::new(exec.clone(), live.clone())),
            Box::new(ShareExecutor::new(store, exec, live, samba)),
        )
    }

    pub fn with_executors(
        pools: Box<dyn ResourceExecutor>,
        datasets: Box<dyn ResourceExecutor>,
        shares: Box<dyn ResourceExecutor>,
    ) -> Self {
        Self {
            pools,
            datasets,
            shares,
            running: AtomicBool::new(false),
        }
    }

    fn executor(&self, kind: ResourceKind) -> &dyn ResourceExecutor {
        match kind {
            ResourceKind::Pool => self.pools.as_ref(),
            ResourceKind::Dataset => self.datasets.as_ref(),
            ResourceKind::Share => self.shares.as_ref(),
        }
    }

    /// Execute `plan` in order. Stops at the first error or unapproved BLOCKED
    /// item and reports what already ran.
    pub fn apply_plan(&self, plan: &Plan) -> Result<ApplyResult, ApplyFailure> {
        let started = Instant::now();
        let Some(_guard) = RunningGuard::acquire(&self.running) else {
            return Err(ApplyFailure {
                result: ApplyResult::default(),
                error: DriftwallError::ApplyInProgress,
            });
        };

        let mut result = ApplyResult::default();
        for item in &plan.items {
            match self.apply_item(item) {
                Ok(Some(step)) => {
                    info!("applied: {}", step);
                    result.applied.push(step);
                }
                Ok(None) => {}
                Err(err) => {
                    if err.is_safety_abort() {
                        error!("{} {}: {}", item.kind, item.name, err);
                    } else {
                        warn!("apply stopped at {} {}: {}", item.kind, item.name, err);
                    }
                    result.failed = Some(format!("{} {}", item.kind, item.name));
                    result.error = Some(err.to_string());
                    result.duration = started.elapsed();
                    return Err(ApplyFailure { result, error: err });
                }
            }
        }

        result.duration = started.elapsed();
        info!(
            "apply complete: {} step(s) in {:?}",
            result.applied.len(),
            result.duration
        );
        Ok(result)
    }

    fn apply_item(&self, item: &DiffItem) -> DriftwallResult<Option<String>> {
        let executor = self.executor(item.kind);
        let wrap = |action: &'static str| {
            move |err: DriftwallError| DriftwallError::Operation {
                action,
                kind: item.kind,
                name: item.name.clone(),
                source: Box::new(err),
            }
        };

        match item.action {
            DiffAction::Nop => Ok(None),
            DiffAction::Blocked if !item.approved => Err(DriftwallError::HasBlocked {
                kind: item.kind,
                name: item.name.clone(),
                reason: item.block_reason.clone().unwrap_or_default(),
            }),
            DiffAction::Blocked => {
                warn!(
                    "executing approved override: DELETE {} {}",
                    item.kind, item.name
                );
                executor.delete(item).map_err(wrap("deleting"))?;
                Ok(Some(format!("[APPROVED] DELETE {} {}", item.kind, item.name)))
            }
            DiffAction::Create => {
                executor.create(item).map_err(wrap("creating"))?;
                Ok(Some(format!("CREATE {} {}", item.kind, item.name)))
            }
            DiffAction::Modify => {
                executor.modify(item).map_err(wrap("modifying"))?;
                Ok(Some(format!("MODIFY {} {}", item.kind, item.name)))
            }
            DiffAction::Delete => {
                executor.delete(item).map_err(wrap("deleting"))?;
                Ok(Some(format!("DELETE {} {}", item.kind, item.name)))
            }
        }
    }
}

//! Background drift detection.
//!
//! The detector re-reads the document, reads the host and diffs them on a
//! fixed interval, keeping only the latest result. It reports; it never
//! applies.

use crate::diff::{compute_diff, Plan};
use crate::document::load_document;
use crate::error::DriftwallResult;
use crate::provider::{DriftBroadcaster, LiveQuery, NotifyLevel};
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Event name used for drift notifications.
pub const DRIFT_EVENT: &str = "gitops.drift";

/// Shortest polling period; a zero interval is raised to this.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of one detection cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftResult {
    pub checked_at: DateTime<Utc>,
    pub drifted: bool,
    pub plan: Option<Plan>,
    pub error: Option<String>,
    pub document_path: PathBuf,
}

impl DriftResult {
    /// Severity of the worst finding.
    pub fn level(&self) -> NotifyLevel {
        match &self.plan {
            _ if self.error.is_some() => NotifyLevel::Warning,
            Some(plan) if plan.blocked_count > 0 => NotifyLevel::Critical,
            _ if self.drifted => NotifyLevel::Warning,
            _ => NotifyLevel::Info,
        }
    }

    /// Summary pushed to the broadcaster. A cycle without a plan is never
    /// safe to apply.
    pub fn summary(&self) -> serde_json::Value {
        let counts = self.plan.as_ref().map_or((0, 0, 0, 0, false), |plan| {
            (
                plan.create_count,
                plan.modify_count,
                plan.delete_count,
                plan.blocked_count,
                plan.safe_to_apply,
            )
        });
        json!({
            "drifted": self.drifted,
            "error": self.error,
            "checked_at": self.checked_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            "create_count": counts.0,
            "modify_count": counts.1,
            "delete_count": counts.2,
            "blocked_count": counts.3,
            "safe_to_apply": counts.4,
        })
    }
}

struct Shared {
    document_path: PathBuf,
    live: Arc<dyn LiveQuery>,
    hub: Arc<dyn DriftBroadcaster>,
    last: Mutex<Option<DriftResult>>,
}

impl Shared {
    fn evaluate(&self) -> DriftwallResult<Plan> {
        let desired = load_document(&self.document_path)?;
        let live = self.live.read_live_state()?;
        Ok(compute_diff(&desired, &live, self.live.as_ref()))
    }

    fn cycle(&self) -> DriftResult {
        let checked_at = Utc::now();
        let result = match self.evaluate() {
            Ok(plan) => DriftResult {
                checked_at,
                drifted: plan.is_drifted(),
                plan: Some(plan),
                error: None,
                document_path: self.document_path.clone(),
            },
            Err(err) => DriftResult {
                checked_at,
                drifted: false,
                plan: None,
                error: Some(err.to_string()),
                document_path: self.document_path.clone(),
            },
        };

        if let Some(err) = &result.error {
            warn!("drift check of {} failed: {}", self.document_path.display(), err);
        } else if result.drifted {
            info!(
                "drift detected in {}: {} pending item(s)",
                self.document_path.display(),
                result.plan.as_ref().map_or(0, Plan::pending)
            );
        } else {
            debug!("no drift in {}", self.document_path.display());
        }

        *self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(result.clone());

        if result.drifted || result.error.is_some() {
            self.hub
                .broadcast(DRIFT_EVENT, result.summary(), result.level());
        }
        result
    }
}

struct Running {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Periodic drift checker with a stopped/running lifecycle.
pub struct DriftDetector {
    shared: Arc<Shared>,
    interval: Duration,
    running: Mutex<Option<Running>>,
}

impl DriftDetector {
    pub fn new(
        document_path: impl Into<PathBuf>,
        interval: Duration,
        live: Arc<dyn LiveQuery>,
        hub: Arc<dyn DriftBroadcaster>,
    ) -> Self {
        let interval = if interval.is_zero() {
            warn!("drift interval of zero raised to {:?}", MIN_INTERVAL);
            MIN_INTERVAL
        } else {
            interval
        };
        Self {
            shared: Arc::new(Shared {
                document_path: document_path.into(),
                live,
                hub,
                last: Mutex::new(None),
            }),
            interval,
            running: Mutex::new(None),
        }
    }

    /// Spawn the polling task on the current tokio runtime. The first check
    /// runs immediately. Calling `start` while running does nothing.
    pub fn start(&self) {
        let mut running = self
            .running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if running.is_some() {
            warn!("drift detector already running");
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(poll_loop(self.shared.clone(), self.interval, stop_rx));
        info!(
            "drift detector started for {} (every {:?})",
            self.shared.document_path.display(),
            self.interval
        );
        *running = Some(Running { stop_tx, handle });
    }

    /// Signal the loop to exit after any in-flight cycle. Returns the task
    /// handle so callers can wait for it; `None` when not running.
    pub fn stop(&self) -> Option<JoinHandle<()>> {
        let running = self
            .running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()?;
        let _ = running.stop_tx.send(true);
        info!("drift detector stopping");
        Some(running.handle)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .map(|running| running.is_some())
            .unwrap_or(false)
    }

    /// Run one cycle off the async executor and record it.
    pub async fn check_now(&self) -> DriftResult {
        let shared = self.shared.clone();
        match tokio::task::spawn_blocking(move || shared.cycle()).await {
            Ok(result) => result,
            Err(err) => {
                let result = DriftResult {
                    checked_at: Utc::now(),
                    drifted: false,
                    plan: None,
                    error: Some(format!("drift check task failed: {}", err)),
                    document_path: self.shared.document_path.clone(),
                };
                *self
                    .shared
                    .last
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(result.clone());
                result
            }
        }
    }

    /// Run one cycle on the calling thread. For callers without a runtime.
    pub fn check_blocking(&self) -> DriftResult {
        self.shared.cycle()
    }

    pub fn last_result(&self) -> Option<DriftResult> {
        self.shared
            .last
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

async fn poll_loop(shared: Arc<Shared>, period: Duration, mut stop_rx: watch::Receiver<bool>) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let cycle_shared = shared.clone();
                if let Err(err) = tokio::task::spawn_blocking(move || cycle_shared.cycle()).await {
                    warn!("drift check task failed: {}", err);
                }
            }
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
        }
    }

    debug!("drift loop for {} exited", shared.document_path.display());
}

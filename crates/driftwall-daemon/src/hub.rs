use driftwall_core::{DriftBroadcaster, DriftResult, NotifyLevel};
use log::{error, info, warn};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::watch;

/// Most recent notification pushed by the detector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftEvent {
    pub event: String,
    pub level: NotifyLevel,
    pub data: Value,
}

/// Logs each notification and keeps the latest one on a watch channel for
/// the status endpoint.
pub struct ChannelBroadcaster {
    tx: watch::Sender<Option<DriftEvent>>,
}

impl ChannelBroadcaster {
    pub fn new() -> (Self, watch::Receiver<Option<DriftEvent>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }
}

impl DriftBroadcaster for ChannelBroadcaster {
    fn broadcast(&self, event: &str, data: Value, level: NotifyLevel) {
        match level {
            NotifyLevel::Critical => error!("{event} [{level}]: {data}"),
            NotifyLevel::Warning => warn!("{event} [{level}]: {data}"),
            NotifyLevel::Info => info!("{event} [{level}]: {data}"),
        }
        let _ = self.tx.send(Some(DriftEvent {
            event: event.to_string(),
            level,
            data,
        }));
    }
}

/// One-word state for probes.
pub fn status_word(last: Option<&DriftResult>) -> &'static str {
    match last {
        None => "STARTING",
        Some(result) if result.error.is_some() => "DEGRADED",
        Some(result) if result.drifted => "DRIFTED",
        Some(_) => "OK",
    }
}

/// JSON served by the status endpoint.
pub fn status_body(last: Option<&DriftResult>, event: Option<&DriftEvent>) -> Value {
    json!({
        "status": status_word(last),
        "last_check": last.map(DriftResult::summary),
        "last_event": event,
    })
}

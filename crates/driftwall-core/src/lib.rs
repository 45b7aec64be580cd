pub mod apply;
pub mod config;
pub mod diff;
pub mod document;
pub mod drift;
pub mod error;
pub mod logging;
pub mod model;
pub mod provider;
pub mod units;

pub use apply::{ApplyEngine, ApplyFailure, ApplyLock, ApplyResult, ResourceExecutor, SambaSettings};
pub use config::DriftwallConfig;
pub use diff::{compute_diff, stamp_approvals, Change, DiffItem, Plan};
pub use document::{parse_document, store_document, STARTER_DOCUMENT};
pub use drift::{DriftDetector, DriftResult};
pub use error::{DriftwallError, DriftwallResult};
pub use model::{
    DesiredDataset, DesiredPool, DesiredResource, DesiredShare, DesiredState, DiffAction,
    LiveDataset, LivePool, LiveShare, LiveState, ResourceKind, RiskLevel, VdevType,
};
pub use provider::{
    Approval, ApprovalStore, CommandExec, DriftBroadcaster, LiveQuery, NotifyLevel, ShareStore,
    Tier, Tool,
};

//! Host-side collaborators for the Driftwall engine. `system` runs the
//! storage and samba tools, `live` turns their output into a `LiveState`, and
//! `store` keeps share rows and approvals in SQLite.

mod command;
mod live;
mod parse;
mod store;
mod system;

pub use command::{CommandRunner, Output};
pub use live::SystemLiveState;
pub use store::SqliteStore;
pub use system::{
    SystemTools, Timeouts, DEFAULT_SMBCONTROL_PATHS, DEFAULT_SMBSTATUS_PATHS, DEFAULT_ZFS_PATHS,
    DEFAULT_ZPOOL_PATHS,
};

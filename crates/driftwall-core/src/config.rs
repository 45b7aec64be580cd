use crate::error::{DriftwallError, DriftwallResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StateCfg {
    /// Desired-state document checked by `plan`, `apply` and the drift loop.
    #[serde(default = "default_document_path")]
    pub document_path: String,
}

fn default_document_path() -> String {
    "/etc/driftwall/state.yaml".to_string()
}

impl Default for StateCfg {
    fn default() -> Self {
        Self {
            document_path: default_document_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DriftCfg {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_interval_secs() -> u64 {
    300
}

impl Default for DriftCfg {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ZfsCfg {
    #[serde(default)]
    pub zfs_path: Option<String>,

    #[serde(default)]
    pub zpool_path: Option<String>,
}

/// Timeout tiers for external commands, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CommandsCfg {
    #[serde(default = "default_fast_secs")]
    pub fast_secs: u64,

    #[serde(default = "default_medium_secs")]
    pub medium_secs: u64,

    #[serde(default = "default_zfs_secs")]
    pub zfs_secs: u64,

    #[serde(default = "default_slow_secs")]
    pub slow_secs: u64,
}

fn default_fast_secs() -> u64 {
    10
}

fn default_medium_secs() -> u64 {
    60
}

fn default_zfs_secs() -> u64 {
    120
}

fn default_slow_secs() -> u64 {
    300
}

impl Default for CommandsCfg {
    fn default() -> Self {
        Self {
            fast_secs: default_fast_secs(),
            medium_secs: default_medium_secs(),
            zfs_secs: default_zfs_secs(),
            slow_secs: default_slow_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SambaCfg {
    #[serde(default = "default_conf_path")]
    pub conf_path: String,

    /// SQLite database holding share rows and the approval ledger.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    #[serde(default)]
    pub smbcontrol_path: Option<String>,

    #[serde(default)]
    pub smbstatus_path: Option<String>,

    #[serde(default = "default_workgroup")]
    pub workgroup: String,

    #[serde(default = "default_server_string")]
    pub server_string: String,
}

fn default_conf_path() -> String {
    "/etc/samba/smb.conf".to_string()
}

fn default_database_path() -> String {
    "/var/lib/driftwall/driftwall.db".to_string()
}

fn default_workgroup() -> String {
    "WORKGROUP".to_string()
}

fn default_server_string() -> String {
    "Driftwall NAS".to_string()
}

impl Default for SambaCfg {
    fn default() -> Self {
        Self {
            conf_path: default_conf_path(),
            database_path: default_database_path(),
            smbcontrol_path: None,
            smbstatus_path: None,
            workgroup: default_workgroup(),
            server_string: default_server_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DaemonCfg {
    #[serde(default = "default_status_addr")]
    pub status_addr: String,
}

fn default_status_addr() -> String {
    "127.0.0.1:8787".to_string()
}

impl Default for DaemonCfg {
    fn default() -> Self {
        Self {
            status_addr: default_status_addr(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DriftwallConfig {
    #[serde(default)]
    pub state: StateCfg,

    #[serde(default)]
    pub drift: DriftCfg,

    #[serde(default)]
    pub zfs: ZfsCfg,

    #[serde(default)]
    pub commands: CommandsCfg,

    #[serde(default)]
    pub samba: SambaCfg,

    #[serde(default)]
    pub daemon: DaemonCfg,

    #[serde(skip)]
    pub path: PathBuf,
}

impl DriftwallConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> DriftwallResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let mut cfg = if matches!(path.extension().and_then(|ext| ext.to_str()), Some(ext) if ext.eq_ignore_ascii_case("toml"))
        {
            toml::from_str::<Self>(&contents)?
        } else {
            serde_yaml::from_str::<Self>(&contents)?
        };

        cfg.path = path.to_path_buf();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> DriftwallResult<()> {
        if self.drift.interval_secs == 0 {
            return Err(DriftwallError::InvalidConfig(
                "drift.interval_secs must be greater than zero".to_string(),
            ));
        }
        if !self.state.document_path.starts_with('/') {
            return Err(DriftwallError::InvalidConfig(format!(
                "state.document_path must be absolute, got {:?}",
                self.state.document_path
            )));
        }
        Ok(())
    }

    pub fn document_path(&self) -> PathBuf {
        PathBuf::from(&self.state.document_path)
    }

    pub fn drift_interval(&self) -> Duration {
        Duration::from_secs(self.drift.interval_secs)
    }

    pub fn zfs_binary_path(&self) -> Option<PathBuf> {
        self.zfs.zfs_path.as_ref().map(PathBuf::from)
    }

    pub fn zpool_binary_path(&self) -> Option<PathBuf> {
        self.zfs.zpool_path.as_ref().map(PathBuf::from)
    }

    pub fn samba_conf_path(&self) -> PathBuf {
        PathBuf::from(&self.samba.conf_path)
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.samba.database_path)
    }

    /// Lock file serialising applies across processes, kept beside the database.
    pub fn apply_lock_path(&self) -> PathBuf {
        self.database_path().with_file_name("apply.lock")
    }
}

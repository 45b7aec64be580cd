//! System-backed `CommandExec`. Locates the host binaries, picks the timeout
//! for each call from its tier, and turns non-zero exits into provider
//! errors carrying the tool's own diagnostic.

use crate::command::{CommandRunner, Output};
use driftwall_core::config::CommandsCfg;
use driftwall_core::{CommandExec, DriftwallConfig, DriftwallError, DriftwallResult, Tier, Tool};
use log::debug;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default locations probed for a `zfs` binary.
pub const DEFAULT_ZFS_PATHS: &[&str] = &[
    "/sbin/zfs",
    "/usr/sbin/zfs",
    "/usr/local/sbin/zfs",
    "/bin/zfs",
];

/// Default locations probed for a `zpool` binary.
pub const DEFAULT_ZPOOL_PATHS: &[&str] = &[
    "/sbin/zpool",
    "/usr/sbin/zpool",
    "/usr/local/sbin/zpool",
    "/bin/zpool",
];

pub const DEFAULT_SMBCONTROL_PATHS: &[&str] = &[
    "/usr/bin/smbcontrol",
    "/usr/sbin/smbcontrol",
    "/usr/local/bin/smbcontrol",
];

pub const DEFAULT_SMBSTATUS_PATHS: &[&str] = &[
    "/usr/bin/smbstatus",
    "/usr/sbin/smbstatus",
    "/usr/local/bin/smbstatus",
];

/// Tier timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub fast: Duration,
    pub medium: Duration,
    pub zfs: Duration,
    pub slow: Duration,
}

impl Timeouts {
    pub fn for_tier(&self, tier: Tier) -> Duration {
        match tier {
            Tier::Fast => self.fast,
            Tier::Medium => self.medium,
            Tier::Zfs => self.zfs,
            Tier::Slow => self.slow,
        }
    }
}

impl From<&CommandsCfg> for Timeouts {
    fn from(cfg: &CommandsCfg) -> Self {
        Self {
            fast: Duration::from_secs(cfg.fast_secs),
            medium: Duration::from_secs(cfg.medium_secs),
            zfs: Duration::from_secs(cfg.zfs_secs),
            slow: Duration::from_secs(cfg.slow_secs),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::from(&CommandsCfg::default())
    }
}

/// Shells out to the native storage and samba tools.
///
/// `zfs` and `zpool` are required. The samba tools are optional: without
/// `smbcontrol` reloads fail (and are reported as warnings by the share
/// executor), without `smbstatus` no share is ever considered connected.
#[derive(Debug, Clone)]
pub struct SystemTools {
    zfs: CommandRunner,
    zpool: CommandRunner,
    smbcontrol: Option<CommandRunner>,
    smbstatus: Option<CommandRunner>,
    timeouts: Timeouts,
}

impl SystemTools {
    /// Build from configuration, falling back to discovery for any path that
    /// is not set.
    pub fn from_config(config: &DriftwallConfig) -> DriftwallResult<Self> {
        let zfs = match config.zfs_binary_path() {
            Some(path) => runner_with_path(path)?,
            None => discover("zfs", DEFAULT_ZFS_PATHS)?,
        };
        let zpool = match config.zpool_binary_path() {
            Some(path) => runner_with_path(path)?,
            None => discover("zpool", DEFAULT_ZPOOL_PATHS)?,
        };
        let smbcontrol = match &config.samba.smbcontrol_path {
            Some(path) => Some(runner_with_path(PathBuf::from(path))?),
            None => discover_optional(DEFAULT_SMBCONTROL_PATHS),
        };
        let smbstatus = match &config.samba.smbstatus_path {
            Some(path) => Some(runner_with_path(PathBuf::from(path))?),
            None => discover_optional(DEFAULT_SMBSTATUS_PATHS),
        };

        Ok(Self {
            zfs,
            zpool,
            smbcontrol,
            smbstatus,
            timeouts: Timeouts::from(&config.commands),
        })
    }

    /// Explicit `zfs` and `zpool` binaries, no samba tools.
    pub fn with_paths(zfs_path: PathBuf, zpool_path: PathBuf) -> DriftwallResult<Self> {
        Ok(Self {
            zfs: runner_with_path(zfs_path)?,
            zpool: runner_with_path(zpool_path)?,
            smbcontrol: None,
            smbstatus: None,
            timeouts: Timeouts::default(),
        })
    }

    pub fn with_samba_tools(
        mut self,
        smbcontrol: Option<PathBuf>,
        smbstatus: Option<PathBuf>,
    ) -> DriftwallResult<Self> {
        self.smbcontrol = smbcontrol.map(runner_with_path).transpose()?;
        self.smbstatus = smbstatus.map(runner_with_path).transpose()?;
        Ok(self)
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    fn runner(&self, tool: Tool) -> DriftwallResult<&CommandRunner> {
        match tool {
            Tool::Zfs => Some(&self.zfs),
            Tool::Zpool => Some(&self.zpool),
            Tool::Smbcontrol => self.smbcontrol.as_ref(),
            Tool::Smbstatus => self.smbstatus.as_ref(),
        }
        .ok_or_else(|| {
            DriftwallError::Provider(format!(
                "{} is not installed or not configured",
                tool.binary_name()
            ))
        })
    }
}

fn runner_with_path(path: PathBuf) -> DriftwallResult<CommandRunner> {
    if !path.exists() {
        return Err(DriftwallError::InvalidConfig(format!(
            "binary not found at {}",
            path.display()
        )));
    }
    Ok(CommandRunner::new(path))
}

fn discover(name: &str, candidates: &[&str]) -> DriftwallResult<CommandRunner> {
    discover_optional(candidates).ok_or_else(|| {
        DriftwallError::InvalidConfig(format!(
            "unable to locate {} binary; tried {:?}",
            name, candidates
        ))
    })
}

fn discover_optional(candidates: &[&str]) -> Option<CommandRunner> {
    candidates
        .iter()
        .map(Path::new)
        .find(|path| path.exists())
        .map(|path| CommandRunner::new(path.to_path_buf()))
}

/// Describe a failed invocation using whatever the tool printed.
fn classify_cli_error(binary: &Path, args: &[&str], output: &Output) -> DriftwallError {
    let diagnostic = output.diagnostic();
    let lower = diagnostic.to_ascii_lowercase();
    let what = if lower.contains("dataset does not exist") {
        "reported missing dataset"
    } else if lower.contains("no such pool") || lower.contains("pool does not exist") {
        "reported missing pool"
    } else {
        "failed"
    };

    DriftwallError::Provider(format!(
        "{} {} {} (exit code {}): {}",
        binary.display(),
        args.join(" "),
        what,
        output.status,
        if diagnostic.is_empty() {
            "no additional output"
        } else {
            diagnostic
        }
    ))
}

impl CommandExec for SystemTools {
    fn run(&self, tool: Tool, tier: Tier, args: &[&str]) -> DriftwallResult<String> {
        let runner = self.runner(tool)?;
        let timeout = self.timeouts.for_tier(tier);
        debug!("running {} {} (timeout {:?})", tool, args.join(" "), timeout);

        let out = runner.run(args, timeout)?;
        if out.status != 0 {
            return Err(classify_cli_error(runner.binary(), args, &out));
        }
        Ok(out.stdout)
    }
}

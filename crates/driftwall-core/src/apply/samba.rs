//! `smb.conf` generation from the share store.

use crate::config::SambaCfg;
use crate::error::DriftwallResult;
use crate::model::LiveShare;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Where and how the share configuration is rendered.
#[derive(Debug, Clone)]
pub struct SambaSettings {
    pub conf_path: PathBuf,
    pub workgroup: String,
    pub server_string: String,
}

impl From<&SambaCfg> for SambaSettings {
    fn from(cfg: &SambaCfg) -> Self {
        Self {
            conf_path: PathBuf::from(&cfg.conf_path),
            workgroup: cfg.workgroup.clone(),
            server_string: cfg.server_string.clone(),
        }
    }
}

/// Render the full configuration. Disabled shares are left out.
pub fn render_smb_conf(settings: &SambaSettings, shares: &[LiveShare]) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "[global]\n   workgroup = {}\n   server string = {}\n\n",
        settings.workgroup, settings.server_string
    );

    for share in shares.iter().filter(|s| s.enabled) {
        let _ = writeln!(out, "[{}]", share.name);
        let _ = writeln!(out, "   path = {}", share.path);
        if share.read_only {
            out.push_str("   read only = yes\n");
        }
        if !share.valid_users.is_empty() {
            let _ = writeln!(out, "   valid users = {}", share.valid_users);
        }
        if !share.comment.is_empty() {
            let _ = writeln!(out, "   comment = {}", share.comment);
        }
        if share.guest_ok {
            out.push_str("   guest ok = yes\n");
        }
        out.push('\n');
    }

    out
}

/// Replace `path` with `contents` via a sibling temp file and rename, so
/// readers never see a half-written file.
pub fn write_atomically(path: &Path, contents: &str) -> DriftwallResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".driftwall.tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents)?;
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }
    Ok(())
}

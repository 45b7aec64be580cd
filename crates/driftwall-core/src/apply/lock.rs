use crate::error::{DriftwallError, DriftwallResult};
use log::{debug, warn};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Lock file held for the duration of one apply. Creation is exclusive, so a
/// second process fails instead of interleaving host changes. The file is
/// removed on drop; a crashed holder leaves it behind for the operator.
#[derive(Debug)]
pub struct ApplyLock {
    path: PathBuf,
}

impl ApplyLock {
    pub fn acquire(path: &Path) -> DriftwallResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                writeln!(file, "pid {}", std::process::id())?;
                debug!("apply lock {} acquired", path.display());
                Ok(Self {
                    path: path.to_path_buf(),
                })
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                let holder = fs::read_to_string(path)
                    .map(|text| text.trim().to_string())
                    .unwrap_or_default();
                Err(DriftwallError::ApplyLocked {
                    path: path.display().to_string(),
                    holder: if holder.is_empty() {
                        "an unknown process".to_string()
                    } else {
                        holder
                    },
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ApplyLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!("failed to release apply lock {}: {}", self.path.display(), err);
        }
    }
}

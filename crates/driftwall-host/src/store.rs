//! SQLite-backed share rows and the approval ledger.
//!
//! `smb_shares` is the authority for what samba serves; `smb.conf` is
//! regenerated from it. `gitops_approvals` records operator overrides for
//! BLOCKED plan items until the next successful apply clears them.

use chrono::{DateTime, SecondsFormat, Utc};
use driftwall_core::{
    Approval, ApprovalStore, DesiredShare, DriftwallError, DriftwallResult, LiveShare,
    ResourceKind, ShareStore,
};
use log::{debug, info};
use rusqlite::{params, Connection};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS smb_shares (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE,
    path        TEXT NOT NULL,
    read_only   INTEGER NOT NULL DEFAULT 0,
    valid_users TEXT NOT NULL DEFAULT '',
    comment     TEXT NOT NULL DEFAULT '',
    guest_ok    INTEGER NOT NULL DEFAULT 0,
    enabled     INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at  TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE IF NOT EXISTS gitops_approvals (
    kind        TEXT NOT NULL,
    name        TEXT NOT NULL,
    reason      TEXT NOT NULL DEFAULT '',
    approved_at TEXT NOT NULL,
    PRIMARY KEY (kind, name)
);
";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn db_err(err: rusqlite::Error) -> DriftwallError {
    DriftwallError::Provider(format!("database: {}", err))
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> DriftwallResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        debug!("opened share database {}", path.display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> DriftwallResult<Self> {
        Self::with_connection(Connection::open_in_memory().map_err(db_err)?)
    }

    fn with_connection(conn: Connection) -> DriftwallResult<Self> {
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mark a share as served or not without touching its other fields.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> DriftwallResult<bool> {
        let changed = self
            .conn()
            .execute(
                "UPDATE smb_shares SET enabled = ?1, updated_at = CURRENT_TIMESTAMP WHERE name = ?2",
                params![enabled, name],
            )
            .map_err(db_err)?;
        Ok(changed > 0)
    }
}

impl ShareStore for SqliteStore {
    fn list_shares(&self) -> DriftwallResult<Vec<LiveShare>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT name, path, read_only, valid_users, comment, guest_ok, enabled \
                 FROM smb_shares ORDER BY name",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(LiveShare {
                    name: row.get(0)?,
                    path: row.get(1)?,
                    read_only: row.get(2)?,
                    valid_users: row.get(3)?,
                    comment: row.get(4)?,
                    guest_ok: row.get(5)?,
                    enabled: row.get(6)?,
                })
            })
            .map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    fn upsert_share(&self, share: &DesiredShare) -> DriftwallResult<()> {
        self.conn()
            .execute(
                "INSERT INTO smb_shares (name, path, read_only, valid_users, comment, guest_ok, enabled)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)
                 ON CONFLICT(name) DO UPDATE SET
                     path = excluded.path,
                     read_only = excluded.read_only,
                     valid_users = excluded.valid_users,
                     comment = excluded.comment,
                     guest_ok = excluded.guest_ok,
                     enabled = 1,
                     updated_at = CURRENT_TIMESTAMP",
                params![
                    share.name,
                    share.path,
                    share.read_only,
                    share.valid_users,
                    share.comment,
                    share.guest_ok
                ],
            )
            .map_err(db_err)?;
        info!("stored share {} -> {}", share.name, share.path);
        Ok(())
    }

    fn delete_share(&self, name: &str) -> DriftwallResult<()> {
        self.conn()
            .execute("DELETE FROM smb_shares WHERE name = ?1", [name])
            .map_err(db_err)?;
        info!("removed share {}", name);
        Ok(())
    }
}

impl ApprovalStore for SqliteStore {
    fn approve(&self, kind: ResourceKind, name: &str, reason: &str) -> DriftwallResult<()> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        self.conn()
            .execute(
                "INSERT INTO gitops_approvals (kind, name, reason, approved_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(kind, name) DO UPDATE SET
                     reason = excluded.reason,
                     approved_at = excluded.approved_at",
                params![kind.as_str(), name, reason, now],
            )
            .map_err(db_err)?;
        info!("approved override for {} {}", kind, name);
        Ok(())
    }

    fn approvals(&self) -> DriftwallResult<Vec<Approval>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT kind, name, reason, approved_at FROM gitops_approvals \
                 ORDER BY approved_at, kind, name",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        rows.into_iter()
            .map(|(kind, name, reason, approved_at)| {
                let kind = kind.parse::<ResourceKind>().map_err(DriftwallError::Provider)?;
                let approved_at = DateTime::parse_from_rfc3339(&approved_at)
                    .map_err(|err| {
                        DriftwallError::Provider(format!(
                            "approval for {} {} has bad timestamp {:?}: {}",
                            kind, name, approved_at, err
                        ))
                    })?
                    .with_timezone(&Utc);
                Ok(Approval {
                    kind,
                    name,
                    reason,
                    approved_at,
                })
            })
            .collect()
    }

    fn clear(&self) -> DriftwallResult<()> {
        let removed = self
            .conn()
            .execute("DELETE FROM gitops_approvals", [])
            .map_err(db_err)?;
        if removed > 0 {
            info!("cleared {} approval(s)", removed);
        }
        Ok(())
    }
}

//! Desired-state document handling: scan, parse, convert, validate.
//!
//! The accepted grammar is a strict block-style subset of YAML. Parsing fails
//! closed: a document with any problem yields an error listing all of them,
//! never a partially filled state.

mod parser;
mod scanner;
mod schema;
mod template;
mod validate;

pub use template::STARTER_DOCUMENT;
pub use validate::{is_safe_disk_path, validate_state, BY_ID_PREFIX, SUPPORTED_VERSION};

use crate::apply::write_atomically;
use crate::error::{DriftwallError, DriftwallResult};
use crate::model::DesiredState;
use log::info;
use std::fs;
use std::path::Path;

/// Parse and validate a desired-state document.
pub fn parse_document(text: &str) -> DriftwallResult<DesiredState> {
    let lines = scanner::scan(text)?;
    let root = parser::parse_lines(lines)?;
    let state = schema::to_desired_state(&root).map_err(DriftwallError::Schema)?;

    let problems = validate_state(&state);
    if !problems.is_empty() {
        return Err(DriftwallError::Validation(problems));
    }
    Ok(state)
}

/// Read and parse the document at `path`.
pub fn load_document<P: AsRef<Path>>(path: P) -> DriftwallResult<DesiredState> {
    let text = fs::read_to_string(path)?;
    parse_document(&text)
}

/// Replace the document at `path` with `text` once it parses and validates.
/// An invalid document, or a dry run, leaves the existing file untouched.
pub fn store_document(path: &Path, text: &str, dry_run: bool) -> DriftwallResult<DesiredState> {
    let state = parse_document(text)?;
    if dry_run {
        info!("dry run: {} not written", path.display());
        return Ok(state);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    write_atomically(path, text)?;
    info!(
        "desired state written to {} ({} pools, {} datasets, {} shares)",
        path.display(),
        state.pools.len(),
        state.datasets.len(),
        state.shares.len()
    );
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VdevType;
    use tempfile::tempdir;

    #[test]
    fn starter_document_parses() {
        let state = parse_document(STARTER_DOCUMENT).unwrap();
        assert_eq!(state.pools[0].vdev_type, VdevType::Mirror);
        assert_eq!(state.pools[0].options.get("atime").map(String::as_str), Some("off"));
        assert_eq!(state.datasets[0].mountpoint, "/mnt/data");
        assert_eq!(state.shares[0].valid_users, "@users");
    }

    #[test]
    fn empty_document_fails_version_gate() {
        let err = parse_document("").unwrap_err();
        match err {
            DriftwallError::Validation(problems) => assert!(problems[0].contains("version")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn minimal_document_with_empty_lists() {
        let state = parse_document("version: \"1\"\npools: []\ndatasets: []\nshares: []\n").unwrap();
        assert_eq!(state, DesiredState {
            version: "1".into(),
            ..Default::default()
        });
    }

    #[test]
    fn stages_report_their_own_error_kind() {
        assert!(matches!(
            parse_document("version: \"1\"\n  bad: x\n"),
            Err(DriftwallError::Parse { line: 2, .. })
        ));
        assert!(matches!(
            parse_document("version: \"1\"\nvolumes: []\n"),
            Err(DriftwallError::Schema(_))
        ));
        assert!(matches!(
            parse_document("version: \"1\"\nshares:\n  - name: s\n    path: rel\n"),
            Err(DriftwallError::Validation(_))
        ));
    }

    #[test]
    fn invalid_document_leaves_existing_file_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.yaml");
        fs::write(&path, STARTER_DOCUMENT).unwrap();

        let err = store_document(&path, "version: \"2\"\n", false).unwrap_err();
        assert!(matches!(err, DriftwallError::Validation(_)));
        assert_eq!(fs::read_to_string(&path).unwrap(), STARTER_DOCUMENT);
    }

    #[test]
    fn valid_document_replaces_file_unless_dry_run() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gitops").join("state.yaml");
        let next = "version: \"1\"\ndatasets:\n  - name: tank/media\n";

        let state = store_document(&path, next, true).unwrap();
        assert_eq!(state.datasets[0].name, "tank/media");
        assert!(!path.exists());

        store_document(&path, STARTER_DOCUMENT, false).unwrap();
        store_document(&path, next, false).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), next);
        assert_eq!(load_document(&path).unwrap(), state);
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }
}

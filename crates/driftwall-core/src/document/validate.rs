//! Semantic validation of a converted document. Returns every problem found.

use crate::model::DesiredState;
use crate::units::parse_size;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

pub const SUPPORTED_VERSION: &str = "1";

/// Stable device path prefix every pool member must use.
pub const BY_ID_PREFIX: &str = "/dev/disk/by-id/";

const DISK_METACHARACTERS: &[char] = &[';', '|', '&', '$', '`', '\\', '"', '\'', ' ', '\t', '\n'];
const VALID_COMPRESSION: &[&str] = &["", "lz4", "zstd", "gzip", "off", "on"];
const VALID_ATIME: &[&str] = &["", "on", "off"];

fn matches(cell: &'static OnceLock<Option<Regex>>, pattern: &str, value: &str) -> bool {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .map_or(false, |re| re.is_match(value))
}

fn valid_name(name: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    matches(&RE, r"^[a-zA-Z0-9][a-zA-Z0-9_\-.]*$", name)
}

fn valid_dataset_name(name: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    matches(&RE, r"^[a-zA-Z0-9][a-zA-Z0-9/_\-.]*$", name)
}

/// Whether `disk` is a stable by-id path free of shell metacharacters.
pub fn is_safe_disk_path(disk: &str) -> bool {
    disk.starts_with(BY_ID_PREFIX) && !disk.contains(DISK_METACHARACTERS)
}

pub fn validate_state(state: &DesiredState) -> Vec<String> {
    let mut errors = Vec::new();

    if state.version != SUPPORTED_VERSION {
        errors.push(format!(
            "unsupported document version {:?} (only \"{}\" is supported)",
            state.version, SUPPORTED_VERSION
        ));
    }

    let mut pool_names = HashSet::new();
    for (idx, pool) in state.pools.iter().enumerate() {
        let pfx = format!("pools[{}] {:?}", idx, pool.name);

        if !valid_name(&pool.name) {
            errors.push(format!("{}: invalid pool name", pfx));
        }
        if !pool_names.insert(pool.name.as_str()) {
            errors.push(format!("{}: duplicate pool name", pfx));
        }
        if pool.disks.is_empty() {
            errors.push(format!("{}: disks list is empty", pfx));
        }
        for disk in &pool.disks {
            if !disk.starts_with(BY_ID_PREFIX) {
                errors.push(format!(
                    "{}: disk {:?} must use a {} path; kernel names like /dev/sdX change across reboots and are REJECTED",
                    pfx, disk, BY_ID_PREFIX
                ));
            }
            if disk.contains(DISK_METACHARACTERS) {
                errors.push(format!("{}: disk {:?} contains illegal characters", pfx, disk));
            }
        }
        if pool.ashift != 0 && !(9..=16).contains(&pool.ashift) {
            errors.push(format!("{}: ashift {} out of range [9,16]", pfx, pool.ashift));
        }
    }

    let mut dataset_names = HashSet::new();
    for (idx, dataset) in state.datasets.iter().enumerate() {
        let pfx = format!("datasets[{}] {:?}", idx, dataset.name);

        if !valid_dataset_name(&dataset.name) {
            errors.push(format!("{}: invalid dataset name", pfx));
        }
        if !dataset_names.insert(dataset.name.as_str()) {
            errors.push(format!("{}: duplicate dataset name", pfx));
        }
        if !VALID_COMPRESSION.contains(&dataset.compression.as_str()) {
            errors.push(format!("{}: unknown compression {}", pfx, dataset.compression));
        }
        if !VALID_ATIME.contains(&dataset.atime.as_str()) {
            errors.push(format!("{}: atime must be \"on\" or \"off\"", pfx));
        }
        if !dataset.mountpoint.is_empty() && !dataset.mountpoint.starts_with('/') {
            errors.push(format!("{}: mountpoint must be an absolute path", pfx));
        }
        if parse_size(&dataset.quota).is_none() {
            errors.push(format!(
                "{}: quota {:?} is not a size (use bytes, none, or a K/M/G/T/P suffix)",
                pfx, dataset.quota
            ));
        }
    }

    let mut share_names = HashSet::new();
    for (idx, share) in state.shares.iter().enumerate() {
        let pfx = format!("shares[{}] {:?}", idx, share.name);

        if !valid_name(&share.name) {
            errors.push(format!("{}: invalid share name", pfx));
        }
        if !share_names.insert(share.name.as_str()) {
            errors.push(format!("{}: duplicate share name", pfx));
        }
        if !share.path.starts_with('/') {
            errors.push(format!("{}: path must be a non-empty absolute path", pfx));
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DesiredDataset, DesiredPool, DesiredShare};

    fn pool(name: &str, disks: &[&str]) -> DesiredPool {
        DesiredPool {
            name: name.to_string(),
            disks: disks.iter().map(|d| d.to_string()).collect(),
            ..Default::default()
        }
    }

    fn state_with_pool(p: DesiredPool) -> DesiredState {
        DesiredState {
            version: "1".into(),
            pools: vec![p],
            ..Default::default()
        }
    }

    #[test]
    fn kernel_device_names_are_rejected() {
        for disk in ["/dev/sda", "/dev/sdb1", "/dev/nvme0n1", "sda", "/dev/disk/by-path/pci-0000"] {
            let errors = validate_state(&state_with_pool(pool("tank", &[disk])));
            assert!(
                errors.iter().any(|e| e.contains("by-id")),
                "{disk} accepted: {errors:?}"
            );
        }
    }

    #[test]
    fn by_id_paths_are_accepted() {
        for id in [
            "ata-WDC_WD140EDFZ-11A0VA0_1234567890",
            "wwn-0x5000cca2bc123456",
            "scsi-3600508b1001c5f9dc69c000001a00000",
        ] {
            let disk = format!("{}{}", BY_ID_PREFIX, id);
            assert!(validate_state(&state_with_pool(pool("tank", &[&disk]))).is_empty());
            assert!(is_safe_disk_path(&disk));
        }
    }

    #[test]
    fn metacharacters_in_disks_are_rejected() {
        let errors = validate_state(&state_with_pool(pool(
            "tank",
            &["/dev/disk/by-id/ata-x;rm -rf /"],
        )));
        assert!(errors.iter().any(|e| e.contains("illegal characters")));
        assert!(!is_safe_disk_path("/dev/disk/by-id/a$b"));
    }

    #[test]
    fn version_gate_names_the_field() {
        let state = DesiredState {
            version: "2".into(),
            ..Default::default()
        };
        let errors = validate_state(&state);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("version"));
    }

    #[test]
    fn ashift_range_allows_zero() {
        let mut p = pool("tank", &["/dev/disk/by-id/a"]);
        p.ashift = 0;
        assert!(validate_state(&state_with_pool(p.clone())).is_empty());
        p.ashift = 17;
        assert!(validate_state(&state_with_pool(p.clone()))[0].contains("ashift 17"));
        p.ashift = 8;
        assert_eq!(validate_state(&state_with_pool(p)).len(), 1);
    }

    #[test]
    fn duplicates_and_bad_fields_are_all_reported() {
        let state = DesiredState {
            version: "1".into(),
            datasets: vec![
                DesiredDataset {
                    name: "tank/a".into(),
                    compression: "brotli".into(),
                    atime: "sometimes".into(),
                    mountpoint: "relative".into(),
                    quota: "10X".into(),
                    ..Default::default()
                },
                DesiredDataset {
                    name: "tank/a".into(),
                    ..Default::default()
                },
            ],
            shares: vec![DesiredShare {
                name: "-bad".into(),
                path: String::new(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let errors = validate_state(&state);
        assert_eq!(errors.len(), 7, "{errors:?}");
        assert!(errors.iter().any(|e| e.contains("duplicate dataset name")));
        assert!(errors.iter().any(|e| e.contains("quota \"10X\"")));
        assert!(errors.iter().any(|e| e.contains("invalid share name")));
    }

    #[test]
    fn dataset_names_allow_slashes_but_pools_do_not() {
        let state = DesiredState {
            version: "1".into(),
            pools: vec![pool("tank/x", &["/dev/disk/by-id/a"])],
            datasets: vec![DesiredDataset {
                name: "tank/media/movies".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let errors = validate_state(&state);
        assert_eq!(errors, vec!["pools[0] \"tank/x\": invalid pool name".to_string()]);
    }
}

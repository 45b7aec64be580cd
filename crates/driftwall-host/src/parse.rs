//! Helpers for turning `zfs`, `zpool` and `smbstatus` output into data the
//! live-state reader can assemble.

use driftwall_core::document::BY_ID_PREFIX;
use std::collections::HashMap;

/// Turn `-H -o name,value` style output into name/value pairs.
pub(crate) fn parse_tabular_pairs(output: &str) -> Vec<(String, String)> {
    output.lines().filter_map(parse_pair_line).collect()
}

fn parse_pair_line(line: &str) -> Option<(String, String)> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some((left, right)) = trimmed.split_once('\t') {
        let name = left.trim();
        if name.is_empty() {
            return None;
        }
        return Some((name.to_string(), right.trim().to_string()));
    }

    let mut parts = trimmed.split_whitespace();
    let name = parts.next()?;
    let value = parts.collect::<Vec<_>>().join(" ");
    if value.is_empty() {
        return None;
    }
    Some((name.to_string(), value))
}

/// Non-empty trimmed lines, e.g. `zfs list -H -o name`.
pub(crate) fn parse_names(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Group `zfs get -H -p -o name,property,value` output by dataset.
pub(crate) fn parse_property_table(output: &str) -> HashMap<String, HashMap<String, String>> {
    let mut table: HashMap<String, HashMap<String, String>> = HashMap::new();
    for line in output.lines() {
        let fields: Vec<&str> = if line.contains('\t') {
            line.split('\t').map(str::trim).collect()
        } else {
            line.split_whitespace().collect()
        };
        let [name, property, value, ..] = fields.as_slice() else {
            continue;
        };
        if name.is_empty() || property.is_empty() {
            continue;
        }
        table
            .entry(name.to_string())
            .or_default()
            .insert(property.to_string(), value.to_string());
    }
    table
}

/// Per-pool device paths from `zpool status -P`. Only stable by-id device
/// lines are kept; vdev group headers, spares and cache rows are skipped.
pub(crate) fn parse_zpool_status_paths(output: &str) -> HashMap<String, Vec<String>> {
    let mut disks: HashMap<String, Vec<String>> = HashMap::new();
    let mut current: Option<String> = None;

    for line in output.lines() {
        let trimmed = line.trim();
        if let Some(pool) = trimmed.strip_prefix("pool:") {
            current = Some(pool.trim().to_string());
            continue;
        }
        let Some(pool) = &current else {
            continue;
        };
        if !trimmed.contains(BY_ID_PREFIX) {
            continue;
        }
        if let Some(device) = trimmed.split_whitespace().next() {
            disks.entry(pool.clone()).or_default().push(device.to_string());
        }
    }
    disks
}

/// Whether `smbstatus -S -n` lists a connection to `share`. The first column
/// of each service row is the share name.
pub(crate) fn smbstatus_lists_share(output: &str, share: &str) -> bool {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .any(|service| service == share)
}

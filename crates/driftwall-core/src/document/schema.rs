//! Typed conversion from the untyped tree into `DesiredState`.

use super::parser::Node;
use crate::model::{DesiredDataset, DesiredPool, DesiredShare, DesiredState, VdevType};
use std::collections::BTreeMap;

/// Convert `root` or return every shape problem found.
pub(crate) fn to_desired_state(root: &Node) -> Result<DesiredState, Vec<String>> {
    let mut errors = Vec::new();
    let mut state = DesiredState::default();

    let Node::Mapping(entries) = root else {
        return Err(vec![format!(
            "document root must be a mapping, got {}",
            root.shape()
        )]);
    };

    for (key, value) in entries {
        match key.as_str() {
            "version" => match value {
                Node::Scalar(v) => state.version = v.clone(),
                other => errors.push(format!("version must be a scalar, got {}", other.shape())),
            },
            "pools" => {
                state.pools = convert_items(value, "pools", &mut errors, pool_from_entries)
            }
            "datasets" => {
                state.datasets =
                    convert_items(value, "datasets", &mut errors, dataset_from_entries)
            }
            "shares" => {
                state.shares = convert_items(value, "shares", &mut errors, share_from_entries)
            }
            other => errors.push(format!("unknown top-level key {:?}", other)),
        }
    }

    if errors.is_empty() {
        Ok(state)
    } else {
        Err(errors)
    }
}

type EntryConverter<T> = fn(&[(String, Node)], &str, &mut Vec<String>) -> T;

fn convert_items<T>(
    value: &Node,
    field: &str,
    errors: &mut Vec<String>,
    convert: EntryConverter<T>,
) -> Vec<T> {
    let items = match value {
        Node::Sequence(items) => items,
        Node::Scalar(s) if s.is_empty() => return Vec::new(),
        other => {
            errors.push(format!("{} must be a sequence, got {}", field, other.shape()));
            return Vec::new();
        }
    };

    let mut out = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let pfx = format!("{}[{}]", field, idx);
        match item {
            Node::Mapping(entries) => out.push(convert(entries, &pfx, errors)),
            other => errors.push(format!("{}: expected a mapping, got {}", pfx, other.shape())),
        }
    }
    out
}

/// Map camelCase spellings onto the canonical snake_case field names.
fn canonical_key(key: &str) -> &str {
    match key {
        "vdevType" => "vdev_type",
        "readOnly" => "read_only",
        "validUsers" => "valid_users",
        "guestOk" | "guestOK" => "guest_ok",
        other => other,
    }
}

/// Walk `entries`, rejecting a field given twice under different spellings.
fn for_each_field<'a>(
    entries: &'a [(String, Node)],
    pfx: &str,
    errors: &mut Vec<String>,
    mut visit: impl FnMut(&str, &'a Node, &mut Vec<String>),
) {
    let mut seen: Vec<&str> = Vec::new();
    for (key, value) in entries {
        let canonical = canonical_key(key);
        if seen.contains(&canonical) {
            errors.push(format!("{}: {} specified more than once", pfx, canonical));
            continue;
        }
        seen.push(canonical);
        visit(canonical, value, errors);
    }
}

fn string_field(value: &Node, pfx: &str, field: &str, errors: &mut Vec<String>) -> String {
    match value {
        Node::Scalar(s) => s.clone(),
        other => {
            errors.push(format!("{}: {} must be a scalar, got {}", pfx, field, other.shape()));
            String::new()
        }
    }
}

fn bool_field(value: &Node, pfx: &str, field: &str, errors: &mut Vec<String>) -> bool {
    match value {
        Node::Scalar(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "yes" => true,
            "false" | "no" | "" => false,
            _ => {
                errors.push(format!("{}: {} must be true or false, got {:?}", pfx, field, s));
                false
            }
        },
        other => {
            errors.push(format!(
                "{}: {} must be true or false, got {}",
                pfx,
                field,
                other.shape()
            ));
            false
        }
    }
}

fn pool_from_entries(entries: &[(String, Node)], pfx: &str, errors: &mut Vec<String>) -> DesiredPool {
    let mut pool = DesiredPool::default();

    for_each_field(entries, pfx, errors, |key, value, errors| match key {
        "name" => pool.name = string_field(value, pfx, key, errors),
        "vdev_type" => {
            let raw = string_field(value, pfx, key, errors);
            match raw.parse::<VdevType>() {
                Ok(vdev) => pool.vdev_type = vdev,
                Err(message) => errors.push(format!("{}: {}", pfx, message)),
            }
        }
        "disks" => match value {
            Node::Sequence(items) => {
                for (idx, item) in items.iter().enumerate() {
                    match item {
                        Node::Scalar(disk) => pool.disks.push(disk.clone()),
                        other => errors.push(format!(
                            "{}: disks[{}] must be a scalar, got {}",
                            pfx,
                            idx,
                            other.shape()
                        )),
                    }
                }
            }
            Node::Scalar(s) if s.is_empty() => {}
            other => errors.push(format!("{}: disks must be a sequence, got {}", pfx, other.shape())),
        },
        "ashift" => {
            let raw = string_field(value, pfx, key, errors);
            if !raw.is_empty() {
                match raw.parse::<u8>() {
                    Ok(ashift) => pool.ashift = ashift,
                    Err(_) => errors.push(format!("{}: ashift must be an integer, got {:?}", pfx, raw)),
                }
            }
        }
        "options" => match value {
            Node::Mapping(options) => {
                let mut map = BTreeMap::new();
                for (opt, opt_value) in options {
                    match opt_value {
                        Node::Scalar(v) => {
                            map.insert(opt.clone(), v.clone());
                        }
                        other => errors.push(format!(
                            "{}: options.{} must be a scalar, got {}",
                            pfx,
                            opt,
                            other.shape()
                        )),
                    }
                }
                pool.options = map;
            }
            Node::Scalar(s) if s.is_empty() => {}
            other => errors.push(format!("{}: options must be a mapping, got {}", pfx, other.shape())),
        },
        other => errors.push(format!("{}: unknown key {:?}", pfx, other)),
    });

    pool
}

fn dataset_from_entries(
    entries: &[(String, Node)],
    pfx: &str,
    errors: &mut Vec<String>,
) -> DesiredDataset {
    let mut dataset = DesiredDataset::default();

    for_each_field(entries, pfx, errors, |key, value, errors| match key {
        "name" => dataset.name = string_field(value, pfx, key, errors),
        "quota" => dataset.quota = string_field(value, pfx, key, errors),
        "compression" => dataset.compression = string_field(value, pfx, key, errors),
        "atime" => dataset.atime = string_field(value, pfx, key, errors),
        "mountpoint" => dataset.mountpoint = string_field(value, pfx, key, errors),
        "encrypted" => dataset.encrypted = bool_field(value, pfx, key, errors),
        other => errors.push(format!("{}: unknown key {:?}", pfx, other)),
    });

    dataset
}

fn share_from_entries(entries: &[(String, Node)], pfx: &str, errors: &mut Vec<String>) -> DesiredShare {
    let mut share = DesiredShare::default();

    for_each_field(entries, pfx, errors, |key, value, errors| match key {
        "name" => share.name = string_field(value, pfx, key, errors),
        "path" => share.path = string_field(value, pfx, key, errors),
        "read_only" => share.read_only = bool_field(value, pfx, key, errors),
        "valid_users" => share.valid_users = string_field(value, pfx, key, errors),
        "comment" => share.comment = string_field(value, pfx, key, errors),
        "guest_ok" => share.guest_ok = bool_field(value, pfx, key, errors),
        other => errors.push(format!("{}: unknown key {:?}", pfx, other)),
    });

    share
}

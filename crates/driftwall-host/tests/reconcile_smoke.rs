use driftwall_core::apply::ShareExecutor;
use driftwall_core::{
    compute_diff, parse_document, ApplyEngine, DiffAction, DriftwallError, LiveQuery,
    ResourceKind, RiskLevel, SambaSettings, ShareStore,
};
use driftwall_host::{SqliteStore, SystemLiveState, SystemTools};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

const FAKE_STATE_HELPERS: &str = r#"#!/usr/bin/env python3
import json
import os
import sys

STATE = os.path.join(os.path.dirname(os.path.abspath(__file__)), "state.json")

def load():
    try:
        with open(STATE, "r", encoding="utf-8") as fh:
            return json.load(fh)
    except (FileNotFoundError, json.JSONDecodeError):
        return {"pools": {}, "datasets": {}}

def save(state):
    with open(STATE, "w", encoding="utf-8") as fh:
        json.dump(state, fh)

def to_bytes(value):
    value = value.strip()
    if value in ("", "none"):
        return 0
    units = "KMGTP"
    if value[-1].upper() in units:
        return int(float(value[:-1]) * 1024 ** (units.index(value[-1].upper()) + 1))
    return int(value)

def new_dataset(name):
    return {
        "used": 0,
        "avail": 1000000000,
        "compression": "off",
        "atime": "on",
        "mountpoint": "/" + name,
        "quota": 0,
        "encryption": "off",
    }

def fail(message, code=1):
    print(message, file=sys.stderr)
    sys.exit(code)

state = load()
args = sys.argv[1:]
"#;

const FAKE_ZPOOL_BODY: &str = r#"
if args == ["list", "-H", "-o", "name,health"]:
    for name, pool in sorted(state["pools"].items()):
        print(f"{name}\t{pool['health']}")
    sys.exit(0)

if args == ["status", "-P"]:
    for name, pool in sorted(state["pools"].items()):
        print(f"  pool: {name}")
        print(f" state: {pool['health']}")
        print("config:")
        print("")
        print(f"\t{name}\t{pool['health']}\t0\t0\t0")
        for disk in pool["disks"]:
            print(f"\t  {disk}\tONLINE\t0\t0\t0")
        print("")
    sys.exit(0)

if args and args[0] == "create":
    rest = args[1:]
    while rest and rest[0] in ("-o", "-O"):
        rest = rest[2:]
    name, rest = rest[0], rest[1:]
    if rest and rest[0] in ("mirror", "raidz", "raidz1", "raidz2", "raidz3"):
        rest = rest[1:]
    if name in state["pools"]:
        fail(f"cannot create '{name}': pool already exists")
    state["pools"][name] = {"health": "ONLINE", "disks": rest}
    state["datasets"][name] = new_dataset(name)
    save(state)
    sys.exit(0)

if len(args) == 3 and args[0] == "add":
    if args[1] not in state["pools"]:
        fail(f"cannot open '{args[1]}': no such pool")
    state["pools"][args[1]]["disks"].append(args[2])
    save(state)
    sys.exit(0)

if len(args) == 2 and args[0] == "destroy":
    name = args[1]
    if name not in state["pools"]:
        fail(f"cannot open '{name}': no such pool")
    del state["pools"][name]
    state["datasets"] = {
        ds: props for ds, props in state["datasets"].items()
        if ds != name and not ds.startswith(name + "/")
    }
    save(state)
    sys.exit(0)

fail("unexpected args: " + " ".join(args), 2)
"#;

const FAKE_ZFS_BODY: &str = r#"
def ensure(name):
    if name not in state["datasets"]:
        fail(f"cannot open '{name}': dataset does not exist")

if args == ["list", "-H", "-t", "filesystem", "-o", "name"]:
    for name in sorted(state["datasets"]):
        print(name)
    sys.exit(0)

if len(args) >= 7 and args[:5] == ["get", "-H", "-p", "-o", "name,property,value"]:
    for name in args[6:]:
        ensure(name)
        for prop in args[5].split(","):
            print(f"{name}\t{prop}\t{state['datasets'][name].get(prop, '-')}")
    sys.exit(0)

if len(args) == 7 and args[:6] == ["get", "-H", "-p", "-o", "value", "used"]:
    ensure(args[6])
    print(state["datasets"][args[6]]["used"])
    sys.exit(0)

if len(args) == 5 and args[:4] == ["list", "-H", "-o", "name"]:
    ensure(args[4])
    print(args[4])
    sys.exit(0)

if len(args) == 6 and args[:5] == ["list", "-H", "-o", "name", "-r"]:
    root = args[5]
    ensure(root)
    for name in sorted(state["datasets"]):
        if name == root or name.startswith(root + "/"):
            print(name)
    sys.exit(0)

if args and args[0] == "create":
    rest = args[1:]
    props = {}
    while rest and rest[0] == "-o":
        key, value = rest[1].split("=", 1)
        props[key] = to_bytes(value) if key == "quota" else value
        rest = rest[2:]
    name = rest[0]
    if name in state["datasets"]:
        fail(f"cannot create '{name}': dataset already exists")
    ensure(name.rsplit("/", 1)[0])
    dataset = new_dataset(name)
    dataset.update(props)
    state["datasets"][name] = dataset
    save(state)
    sys.exit(0)

if len(args) == 3 and args[0] == "set":
    ensure(args[2])
    key, value = args[1].split("=", 1)
    state["datasets"][args[2]][key] = to_bytes(value) if key == "quota" else value
    save(state)
    sys.exit(0)

if len(args) == 2 and args[0] == "destroy":
    ensure(args[1])
    del state["datasets"][args[1]]
    save(state)
    sys.exit(0)

fail("unexpected args: " + " ".join(args), 2)
"#;

const FAKE_SMBSTATUS_SCRIPT: &str = r#"#!/usr/bin/env python3
import os

CONNECTIONS = os.path.join(os.path.dirname(os.path.abspath(__file__)), "connections.txt")
print("")
print("Service      pid     Machine       Connected at")
print("-------------------------------------------------------")
if os.path.exists(CONNECTIONS):
    with open(CONNECTIONS, "r", encoding="utf-8") as fh:
        for share in fh.read().split():
            print(f"{share}         4242    10.0.0.9      Mon Oct 19 10:00:00 2026")
"#;

const FAKE_SMBCONTROL_SCRIPT: &str = r#"#!/usr/bin/env python3
import os
import sys

MARKER = os.path.join(os.path.dirname(os.path.abspath(__file__)), "reloads.log")
with open(MARKER, "a", encoding="utf-8") as fh:
    fh.write(" ".join(sys.argv[1:]) + "\n")
"#;

const DOCUMENT: &str = r#"
version: "1"
pools:
  - name: tank
    vdev_type: mirror
    ashift: 12
    disks:
      - /dev/disk/by-id/ata-DISK-A
      - /dev/disk/by-id/ata-DISK-B
    options:
      compression: lz4
datasets:
  - name: tank/media
    compression: lz4
    atime: "off"
    quota: 2T
shares:
  - name: media
    path: /tank/media
    valid_users: "@family"
    comment: Family media
"#;

struct Host {
    dir: TempDir,
    store: Arc<SqliteStore>,
    tools: Arc<SystemTools>,
    live: Arc<SystemLiveState>,
}

impl Host {
    fn new(initial_state: &str) -> Self {
        let dir = tempdir().unwrap();
        let zfs = write_script(dir.path(), "zfs", &format!("{FAKE_STATE_HELPERS}{FAKE_ZFS_BODY}"));
        let zpool = write_script(
            dir.path(),
            "zpool",
            &format!("{FAKE_STATE_HELPERS}{FAKE_ZPOOL_BODY}"),
        );
        let smbstatus = write_script(dir.path(), "smbstatus", FAKE_SMBSTATUS_SCRIPT);
        let smbcontrol = write_script(dir.path(), "smbcontrol", FAKE_SMBCONTROL_SCRIPT);
        fs::write(dir.path().join("state.json"), initial_state).unwrap();

        let tools = Arc::new(
            SystemTools::with_paths(zfs, zpool)
                .unwrap()
                .with_samba_tools(Some(smbcontrol), Some(smbstatus))
                .unwrap(),
        );
        let store = Arc::new(SqliteStore::open(&dir.path().join("driftwall.db")).unwrap());
        let live = Arc::new(SystemLiveState::new(tools.clone(), store.clone()));
        Self {
            dir,
            store,
            tools,
            live,
        }
    }

    fn samba(&self) -> SambaSettings {
        SambaSettings {
            conf_path: self.dir.path().join("smb.conf"),
            workgroup: "WORKGROUP".into(),
            server_string: "Smoke NAS".into(),
        }
    }

    fn engine(&self) -> ApplyEngine {
        ApplyEngine::new(
            self.tools.clone(),
            self.live.clone(),
            self.store.clone(),
            self.samba(),
        )
    }

    fn smb_conf(&self) -> String {
        fs::read_to_string(self.dir.path().join("smb.conf")).unwrap()
    }

    fn state_json(&self) -> String {
        fs::read_to_string(self.dir.path().join("state.json")).unwrap()
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    make_executable(&path).unwrap();
    path
}

fn make_executable(path: &Path) -> std::io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)
}

#[test]
fn document_converges_and_second_plan_is_clean() {
    let host = Host::new(r#"{"pools": {}, "datasets": {}}"#);
    let desired = parse_document(DOCUMENT).unwrap();

    let live = host.live.read_live_state().unwrap();
    let plan = compute_diff(&desired, &live, host.live.as_ref());
    assert_eq!(plan.create_count, 3);
    assert!(plan.safe_to_apply);

    let result = host.engine().apply_plan(&plan).unwrap();
    assert_eq!(
        result.applied,
        vec![
            "CREATE pool tank",
            "CREATE dataset tank/media",
            "CREATE share media"
        ]
    );

    let conf = fs::read_to_string(host.dir.path().join("smb.conf")).unwrap();
    assert!(conf.contains("[media]"));
    assert!(conf.contains("valid users = @family"));
    let reloads = fs::read_to_string(host.dir.path().join("reloads.log")).unwrap();
    assert_eq!(reloads.trim(), "smbd reload-config");

    let live = host.live.read_live_state().unwrap();
    assert_eq!(
        live.pools[0].disks,
        vec!["/dev/disk/by-id/ata-DISK-A", "/dev/disk/by-id/ata-DISK-B"]
    );
    let again = compute_diff(&desired, &live, host.live.as_ref());
    assert!(!again.is_drifted(), "unexpected drift: {:?}", again.items);
    assert_eq!(again.nop_count, 3);
}

#[test]
fn dataset_holding_data_is_blocked_and_survives_apply() {
    let host = Host::new(
        r#"{"pools": {"tank": {"health": "ONLINE", "disks": ["/dev/disk/by-id/ata-DISK-A", "/dev/disk/by-id/ata-DISK-B"]}},
            "datasets": {
              "tank": {"used": 9000, "avail": 1, "compression": "lz4", "atime": "on", "mountpoint": "/tank", "quota": 0, "encryption": "off"},
              "tank/media": {"used": 0, "avail": 1, "compression": "lz4", "atime": "off", "mountpoint": "/tank/media", "quota": 2199023255552, "encryption": "off"},
              "tank/archive": {"used": 5242880, "avail": 1, "compression": "lz4", "atime": "on", "mountpoint": "/tank/archive", "quota": 0, "encryption": "off"}
            }}"#,
    );
    let desired = parse_document(DOCUMENT).unwrap();

    let live = host.live.read_live_state().unwrap();
    let plan = compute_diff(&desired, &live, host.live.as_ref());
    let archive = plan.find(ResourceKind::Dataset, "tank/archive").unwrap();
    assert_eq!(archive.action, DiffAction::Blocked);
    assert!(archive.block_reason.as_deref().unwrap().contains("5.0 MiB"));
    assert!(plan.find(ResourceKind::Dataset, "tank").is_none());

    let failure = host.engine().apply_plan(&plan).unwrap_err();
    assert!(matches!(failure.error, DriftwallError::HasBlocked { .. }));
    assert_eq!(failure.result.applied, vec!["CREATE share media"]);
    assert!(host.state_json().contains("tank/archive"));
}

#[test]
fn connected_share_removal_is_blocked() {
    let host = Host::new(r#"{"pools": {}, "datasets": {}}"#);
    host.store
        .upsert_share(&driftwall_core::DesiredShare {
            name: "scratch".into(),
            path: "/tank/scratch".into(),
            ..Default::default()
        })
        .unwrap();
    fs::write(host.dir.path().join("connections.txt"), "scratch\n").unwrap();

    let desired = parse_document("version: \"1\"\n").unwrap();
    let live = host.live.read_live_state().unwrap();
    let plan = compute_diff(&desired, &live, host.live.as_ref());

    let item = plan.find(ResourceKind::Share, "scratch").unwrap();
    assert_eq!(item.action, DiffAction::Blocked);
    assert_eq!(item.risk_level, RiskLevel::High);

    fs::remove_file(host.dir.path().join("connections.txt")).unwrap();
    let plan = compute_diff(&desired, &live, host.live.as_ref());
    let item = plan.find(ResourceKind::Share, "scratch").unwrap();
    assert_eq!(item.action, DiffAction::Delete);
}

#[test]
fn disabled_share_is_unpublished_and_restored_by_apply() {
    let host = Host::new(r#"{"pools": {}, "datasets": {}}"#);
    let desired = parse_document(DOCUMENT).unwrap();
    let live = host.live.read_live_state().unwrap();
    host.engine()
        .apply_plan(&compute_diff(&desired, &live, host.live.as_ref()))
        .unwrap();
    assert!(host.smb_conf().contains("[media]"));

    assert!(host.store.set_enabled("media", false).unwrap());
    assert!(!host.store.set_enabled("missing", false).unwrap());
    ShareExecutor::new(
        host.store.clone(),
        host.tools.clone(),
        host.live.clone(),
        host.samba(),
    )
    .publish()
    .unwrap();
    assert!(!host.smb_conf().contains("[media]"));

    let live = host.live.read_live_state().unwrap();
    let plan = compute_diff(&desired, &live, host.live.as_ref());
    let item = plan.find(ResourceKind::Share, "media").unwrap();
    assert_eq!(item.action, DiffAction::Modify);
    assert_eq!(item.changes[0].to_string(), "enabled: false → true");

    let result = host.engine().apply_plan(&plan).unwrap();
    assert_eq!(result.applied, vec!["MODIFY share media"]);
    assert!(host.smb_conf().contains("[media]"));
    assert!(host.store.list_shares().unwrap()[0].enabled);
}

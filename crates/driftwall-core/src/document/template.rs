/// Annotated starter document written by `driftwall template`.
pub const STARTER_DOCUMENT: &str = r#"# Driftwall desired state: declarative NAS configuration.
# version must be "1"
version: "1"

# pools: ZFS pools.
# Disks MUST use /dev/disk/by-id/ paths; /dev/sdX names change across reboots
# and are rejected. Removing a pool from this file never destroys it.
pools:
  - name: tank
    vdev_type: mirror          # mirror, raidz, raidz1, raidz2, raidz3, or "" (stripe)
    disks:
      - /dev/disk/by-id/ata-REPLACE_WITH_REAL_ID_1
      - /dev/disk/by-id/ata-REPLACE_WITH_REAL_ID_2
    ashift: 12                 # 12 = 4096-byte sectors
    options:
      compression: lz4
      atime: "off"

# datasets: ZFS filesystems. Empty fields are left alone.
# Destroying a dataset that still holds data is BLOCKED until approved.
datasets:
  - name: tank/data
    quota: 2T
    compression: lz4
    atime: "off"
    mountpoint: /mnt/data

# shares: SMB shares.
# Removing a share with connected clients is BLOCKED.
shares:
  - name: data
    path: /mnt/data
    read_only: false
    valid_users: "@users"
    comment: "Main data share"
"#;

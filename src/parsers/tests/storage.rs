//! Partition and file-size probes.

use rstest::rstest;

use super::remote;
use crate::parsers::storage::{parse_lsblk_sizes, parse_partitions};
use crate::parsers::{ProbeError, get_ceph_partitions, get_file_size, get_mongo_partitions};
use crate::test_support::ScriptedRemote;

const PARTED: &str = "\
Model: ATA QEMU HARDDISK (scsi)
Disk /dev/vdb: 53.7GB
Number  Start   End     Size    File system  Name           Flags
 1      1049kB  26.2MB  25.2MB               primary        bios_grub
 2      26.2MB  10.7GB  10.7GB  xfs          ceph_data
 3      10.7GB  12.8GB  2097MB               ceph_journal
";

const LSBLK: &str = "\
NAME   MAJ:MIN RM  SIZE RO TYPE MOUNTPOINT
vda    252:0    0   50G  0 disk
vdc    252:32   0   20G  0 disk
`-vdc1 252:33   0   10G  0 part /var/lib/mongo
";

#[rstest]
fn partitions_are_filtered_by_filesystem() {
    let matching = parse_partitions(PARTED.lines(), "xfs");

    assert_eq!(matching.len(), 1);
    assert!(matching.iter().all(|line| line.contains("ceph_data")));
}

#[rstest]
fn lsblk_sizes_follow_device_rows() {
    assert_eq!(parse_lsblk_sizes(LSBLK.lines(), "vdc"), ["20G", "10G"]);
}

#[rstest]
fn ceph_partitions_probe_returns_matches(remote: ScriptedRemote) {
    remote.respond("parted /dev/vdb print", 0, PARTED);

    let partitions = get_ceph_partitions(&remote, "/dev/vdb", "xfs").expect("partitions");

    assert_eq!(partitions.len(), 1);
}

#[rstest]
fn absent_partition_is_an_error(remote: ScriptedRemote) {
    remote.respond("parted /dev/vdb print", 0, PARTED);

    let err = get_ceph_partitions(&remote, "/dev/vdb", "ext4").expect_err("no ext4");

    assert_eq!(
        err,
        ProbeError::PartitionMissing {
            device: String::from("/dev/vdb"),
            filter: String::from("ext4"),
        }
    );
}

#[rstest]
fn mongo_partitions_missing_device(remote: ScriptedRemote) {
    remote.respond("lsblk", 0, LSBLK);

    assert!(matches!(
        get_mongo_partitions(&remote, "vdz"),
        Err(ProbeError::PartitionMissing { .. })
    ));
}

#[rstest]
fn file_size_is_read_with_stat(remote: ScriptedRemote) {
    remote.respond(
        "stat -c \"%s\" '/var/www/nailgun/my file.iso'",
        0,
        "1048576\n",
    );

    assert_eq!(get_file_size(&remote, "/var/www/nailgun/my file.iso"), Ok(1_048_576));
}

//! Partition listings and remote file sizes.

use tracing::{debug, error};

use super::{ParseError, ProbeError, parse_number};
use crate::executor::check_call;
use crate::render::LogTree;
use crate::transport::{Remote, quote};

/// Lines of a `parted print` table mentioning `fs_type`.
#[must_use]
pub fn parse_partitions<'a, I>(lines: I, fs_type: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .filter(|line| line.contains(fs_type))
        .map(str::to_owned)
        .collect()
}

/// Size column of `lsblk` rows mentioning `device`.
#[must_use]
pub fn parse_lsblk_sizes<'a, I>(lines: I, device: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .filter(|line| line.contains(device))
        .filter_map(|line| line.split_whitespace().nth(3))
        .map(str::to_owned)
        .collect()
}

fn missing(remote_host: &str, device: &str, filter: &str, table: &[String]) -> ProbeError {
    error!(
        host = remote_host,
        device,
        filter,
        "Partition not present! Partitions:{}",
        LogTree::scalars(table).render(2)
    );
    ProbeError::PartitionMissing {
        device: device.to_owned(),
        filter: filter.to_owned(),
    }
}

/// Lists the partitions of `device` carrying `fs_type`, as printed by parted.
///
/// # Errors
///
/// Returns [`ProbeError::PartitionMissing`] when none match, after logging
/// the whole partition table.
pub fn get_ceph_partitions<R>(
    remote: &R,
    device: &str,
    fs_type: &str,
) -> Result<Vec<String>, ProbeError>
where
    R: Remote + ?Sized,
{
    let table = check_call(remote, &format!("parted {} print", quote(device)))?;
    let partitions = parse_partitions(table.stdout_lines(), fs_type);
    if partitions.is_empty() {
        let lines: Vec<String> = table.stdout_lines().map(str::to_owned).collect();
        return Err(missing(remote.host(), device, fs_type, &lines));
    }
    debug!(host = remote.host(), "Partitions:{}", LogTree::scalars(&partitions).render(2));
    Ok(partitions)
}

/// Lists `lsblk` sizes of the block devices whose rows mention `device`.
///
/// # Errors
///
/// Returns [`ProbeError::PartitionMissing`] when no row matches.
pub fn get_mongo_partitions<R>(remote: &R, device: &str) -> Result<Vec<String>, ProbeError>
where
    R: Remote + ?Sized,
{
    let table = check_call(remote, "lsblk")?;
    let sizes = parse_lsblk_sizes(table.stdout_lines(), device);
    if sizes.is_empty() {
        let lines: Vec<String> = table.stdout_lines().map(str::to_owned).collect();
        return Err(missing(remote.host(), device, device, &lines));
    }
    debug!(host = remote.host(), "Partitions:{}", LogTree::scalars(&sizes).render(2));
    Ok(sizes)
}

/// Size in bytes of the file at `path` on `remote`.
///
/// # Errors
///
/// Returns [`ProbeError`] when `stat` fails or prints no number.
pub fn get_file_size<R>(remote: &R, path: &str) -> Result<u64, ProbeError>
where
    R: Remote + ?Sized,
{
    let result = check_call(remote, &format!("stat -c \"%s\" {}", quote(path)))?;
    let size = result
        .stdout_lines()
        .next()
        .ok_or_else(|| ParseError::Empty {
            context: format!("size of {path}"),
        })?;
    Ok(parse_number(size, "file size")?)
}

//! NUMA node count from `lstopo`.

use tracing::debug;

use super::ProbeError;
use crate::executor::check_call;
use crate::transport::Remote;

const NUMA_MARKER: &str = "NUMANode";

/// Number of NUMA nodes as printed by `lstopo`.
///
/// Zero is a valid outcome on hosts without NUMA topology. Fuel reports such
/// hosts as having a single node; see [`NumaCount::as_reported_by_fuel`].
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
pub struct NumaCount {
    /// Lines mentioning a NUMA node.
    pub raw: usize,
}

impl NumaCount {
    /// Count the Fuel API is expected to show: no NUMA means one node.
    #[must_use]
    pub const fn as_reported_by_fuel(self) -> usize {
        if self.raw == 0 { 1 } else { self.raw }
    }
}

/// Counts lines mentioning a NUMA node.
#[must_use]
pub fn count_numa_nodes<'a, I>(lines: I) -> NumaCount
where
    I: IntoIterator<Item = &'a str>,
{
    NumaCount {
        raw: lines
            .into_iter()
            .filter(|line| line.contains(NUMA_MARKER))
            .count(),
    }
}

/// Runs `lstopo` on `remote` and counts its NUMA nodes.
///
/// # Errors
///
/// Returns [`ProbeError`] when `lstopo` fails.
pub fn get_quantity_of_numa<R>(remote: &R) -> Result<NumaCount, ProbeError>
where
    R: Remote + ?Sized,
{
    let result = check_call(remote, "lstopo")?;
    let count = count_numa_nodes(result.stdout_lines());
    if count.raw == 0 {
        debug!("There are no NUMA nodes on {}", remote.host());
    } else {
        debug!("There is {} NUMA node(s) on {}", count.raw, remote.host());
    }
    Ok(count)
}

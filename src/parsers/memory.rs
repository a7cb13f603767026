//! Memory and swap totals from `free -k`.

use serde::Serialize;
use tracing::debug;

use super::{ParseError, ProbeError, parse_number};
use crate::executor::check_call;
use crate::render::LogTree;
use crate::transport::Remote;

const MEM_LABEL: &str = "Mem:";
const SWAP_LABEL: &str = "Swap:";
const MEM_COLUMNS: usize = 6;
const SWAP_COLUMNS: usize = 3;

/// Unit the kilobyte figures are scaled to.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub enum MemoryUnit {
    /// Kilobytes, as reported by `free -k`.
    Kb,
    /// Megabytes.
    #[default]
    Mb,
    /// Gigabytes.
    Gb,
}

impl MemoryUnit {
    /// Parses `KB`, `MB` or `GB` case-insensitively; anything else is MB.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "KB" => Self::Kb,
            "GB" => Self::Gb,
            _ => Self::Mb,
        }
    }

    /// Number of kilobytes in one unit.
    #[must_use]
    pub const fn denominator(self) -> u64 {
        match self {
            Self::Kb => 1,
            Self::Mb => 1024,
            Self::Gb => 1024 * 1024,
        }
    }

    #[expect(
        clippy::integer_division,
        reason = "memory figures are reported in whole units, truncating like free(1)"
    )]
    const fn scale(self, kilobytes: u64) -> u64 {
        kilobytes / self.denominator()
    }
}

/// Physical memory figures.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct MemoryUsage {
    /// Installed memory.
    pub total: u64,
    /// Memory in use.
    pub used: u64,
    /// Unused memory.
    pub free: u64,
    /// Shared memory.
    pub shared: u64,
    /// Buffers (buff/cache on newer procps).
    pub buffers: u64,
    /// Page cache (available on newer procps).
    pub cached: u64,
}

/// Swap figures.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct SwapUsage {
    /// Configured swap.
    pub total: u64,
    /// Swap in use.
    pub used: u64,
    /// Unused swap.
    pub free: u64,
}

/// Memory and swap figures in a single unit.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct MemoryStats {
    /// Physical memory.
    pub mem: MemoryUsage,
    /// Swap space.
    pub swap: SwapUsage,
}

impl From<&MemoryStats> for LogTree {
    fn from(stats: &MemoryStats) -> Self {
        Self::mapping([
            (
                "mem",
                Self::mapping([
                    ("total", Self::scalar(stats.mem.total)),
                    ("used", Self::scalar(stats.mem.used)),
                    ("free", Self::scalar(stats.mem.free)),
                    ("shared", Self::scalar(stats.mem.shared)),
                    ("buffers", Self::scalar(stats.mem.buffers)),
                    ("cached", Self::scalar(stats.mem.cached)),
                ]),
            ),
            (
                "swap",
                Self::mapping([
                    ("total", Self::scalar(stats.swap.total)),
                    ("used", Self::scalar(stats.swap.used)),
                    ("free", Self::scalar(stats.swap.free)),
                ]),
            ),
        ])
    }
}

/// Parses the `Mem:` and `Swap:` lines of `free -k` output.
///
/// The figures are the trailing numeric columns of each line: six for memory
/// (total, used, free, shared, buffers, cached) and three for swap.
///
/// # Errors
///
/// Returns [`ParseError`] when either line is missing, short, or holds a
/// non-numeric figure.
///
/// # Examples
///
/// ```
/// use fuel_harness::parsers::{MemoryUnit, parse_free};
///
/// let output = [
///     "              total        used        free      shared  buff/cache   available",
///     "Mem:        2048000     1024000      512000        1024      510976     1000000",
///     "Swap:       1048576           0     1048576",
/// ];
/// let stats = parse_free(output, MemoryUnit::Mb).unwrap();
/// assert_eq!(stats.mem.total, 2000);
/// assert_eq!(stats.swap.free, 1024);
/// ```
pub fn parse_free<'a, I>(lines: I, unit: MemoryUnit) -> Result<MemoryStats, ParseError>
where
    I: IntoIterator<Item = &'a str>,
{
    let collected: Vec<&str> = lines.into_iter().collect();
    let mem = trailing_columns(&collected, MEM_LABEL, MEM_COLUMNS)?;
    let swap = trailing_columns(&collected, SWAP_LABEL, SWAP_COLUMNS)?;

    match (mem.as_slice(), swap.as_slice()) {
        (
            &[total, used, free, shared, buffers, cached],
            &[swap_total, swap_used, swap_free],
        ) => Ok(MemoryStats {
            mem: MemoryUsage {
                total: unit.scale(total),
                used: unit.scale(used),
                free: unit.scale(free),
                shared: unit.scale(shared),
                buffers: unit.scale(buffers),
                cached: unit.scale(cached),
            },
            swap: SwapUsage {
                total: unit.scale(swap_total),
                used: unit.scale(swap_used),
                free: unit.scale(swap_free),
            },
        }),
        _ => Err(ParseError::MissingColumns {
            label: String::from(MEM_LABEL),
            expected: MEM_COLUMNS,
            found: mem.len(),
        }),
    }
}

fn trailing_columns(lines: &[&str], label: &str, count: usize) -> Result<Vec<u64>, ParseError> {
    let line = lines
        .iter()
        .find(|line| line.split_whitespace().next() == Some(label))
        .ok_or_else(|| ParseError::MissingLine {
            label: label.to_owned(),
        })?;

    let fields: Vec<&str> = line.split_whitespace().skip(1).collect();
    let skip = fields
        .len()
        .checked_sub(count)
        .ok_or_else(|| ParseError::MissingColumns {
            label: label.to_owned(),
            expected: count,
            found: fields.len(),
        })?;

    fields
        .iter()
        .skip(skip)
        .map(|field| parse_number(field, label))
        .collect()
}

/// Reads memory and swap usage from `remote`.
///
/// # Errors
///
/// Returns [`ProbeError`] when `free` fails or its output cannot be parsed.
pub fn node_freemem<R>(remote: &R, unit: MemoryUnit) -> Result<MemoryStats, ProbeError>
where
    R: Remote + ?Sized,
{
    let result = check_call(remote, "free -k")?;
    let stats = parse_free(result.stdout_lines(), unit)?;
    debug!(host = remote.host(), "memory usage:{}", LogTree::from(&stats).render(2));
    Ok(stats)
}

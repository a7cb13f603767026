//! Parsers for the text output of standard Linux tools, plus thin probes
//! that run the matching command on a [`crate::transport::Remote`].
//!
//! Each `parse_*` function is pure: it takes raw output lines and returns a
//! structured record. Probes compose the executor with those parsers and
//! never reinterpret the output themselves.

use thiserror::Error;

use crate::executor::ExecError;

pub mod memory;
pub mod net;
pub mod numa;
pub mod packages;
pub mod process;
pub mod storage;
pub mod version;

pub use memory::{MemoryStats, MemoryUnit, MemoryUsage, SwapUsage, node_freemem, parse_free};
pub use net::{
    InterfaceKind, ListenProto, Membership, NetworkInterface, SkipPatterns, classify,
    get_ip_listen_stats, get_net_settings, parse_listening,
};
pub use numa::{NumaCount, count_numa_nodes, get_quantity_of_numa};
pub use packages::{
    InstalledPackage, PackageError, PackageManager, PackageSource, PackageVersion,
    PackageVersionError, check_upgrade, compare_packages_version, get_node_packages,
    get_package_version, install_pkg, parse_package_listing,
};
pub use process::{get_process_uptime, parse_elapsed};
pub use storage::{get_ceph_partitions, get_file_size, get_mongo_partitions};
pub use version::LooseVersion;

/// Errors raised while interpreting command output.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ParseError {
    /// No line carried the expected label.
    #[error("no `{label}` line in command output")]
    MissingLine {
        /// Label that was searched for.
        label: String,
    },
    /// A line carried fewer fields than the layout requires.
    #[error("`{label}` line has {found} numeric fields, expected at least {expected}")]
    MissingColumns {
        /// Label of the offending line.
        label: String,
        /// Fields required.
        expected: usize,
        /// Fields found.
        found: usize,
    },
    /// A field that should be numeric was not.
    #[error("invalid number `{value}` in {context}")]
    InvalidNumber {
        /// Offending text.
        value: String,
        /// What was being parsed.
        context: String,
    },
    /// The command produced no usable output.
    #[error("empty output while reading {context}")]
    Empty {
        /// What was being parsed.
        context: String,
    },
}

/// Errors raised by remote probes.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProbeError {
    /// Running the probe command failed.
    #[error(transparent)]
    Exec(#[from] ExecError),
    /// The probe output could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// No process matched the requested name.
    #[error("No such process with name {0}")]
    NoSuchProcess(String),
    /// The device carries no partition of the requested kind.
    #[error("Partition not present on {device} (filter: {filter})")]
    PartitionMissing {
        /// Block device that was inspected.
        device: String,
        /// Filesystem type or device name filtered on.
        filter: String,
    },
}

pub(crate) fn parse_number(value: &str, context: &str) -> Result<u64, ParseError> {
    value.trim().parse().map_err(|_| ParseError::InvalidNumber {
        value: value.trim().to_owned(),
        context: context.to_owned(),
    })
}

#[cfg(test)]
mod tests;

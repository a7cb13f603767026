//! Support library for end-to-end tests of Fuel OpenStack deployments.
//!
//! The crate drives lab nodes over SSH: it runs commands and checks their
//! exit codes, parses the output of standard Linux tools into records,
//! polls for remote state changes, bounds blocking calls with deadlines,
//! records timing statistics in a YAML document and gates expensive
//! environment setup behind named snapshots.

pub mod backend;
pub mod config;
pub mod diagnostics;
pub mod executor;
pub mod limit;
pub mod logging;
pub mod parsers;
pub mod render;
pub mod session;
pub mod snapshot;
pub mod test_support;
pub mod timing;
pub mod transport;
pub mod upload;
pub mod wait;

pub use backend::{BackendFuture, EnvironmentBackend};
pub use config::{ConfigError, HarnessConfig};
pub use executor::{ExecError, ExecOptions, ExpectedExitCodes, check_call, run_on_remote};
pub use limit::{Deadline, RunLimit, TimeoutSignalError};
pub use session::Session;
pub use snapshot::{RunGate, SnapshotError, SnapshotManager, check_run};
pub use timing::{TimeStat, TimingError, TimingStore};
pub use transport::{
    CommandResult, Remote, RemoteRegistry, SharedRemote, SshConfig, SshRemote, TransportError,
};
pub use wait::{PollTimeoutError, WaitError, WaitPolicy, wait};

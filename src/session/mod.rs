//! Explicit per-run context shared by scenarios.
//!
//! A [`Session`] owns everything one test run shares between call sites:
//! the harness configuration, the environment backend, the remote
//! registry and the timing store. It is constructed once and passed by
//! reference; there is no global environment object.

use camino::Utf8PathBuf;
use tracing::{debug, info};

use crate::backend::EnvironmentBackend;
use crate::config::HarnessConfig;
use crate::diagnostics::{DEFAULT_LOG_DIRS, best_effort, pull_out_logs};
use crate::limit::RunLimit;
use crate::snapshot::{RunGate, SnapshotError, SnapshotManager, check_run};
use crate::timing::{TimeStat, TimingStore, measure};
use crate::transport::{RemoteRegistry, SharedRemote, TransportError};
use crate::wait::WaitPolicy;

/// Context for one harness run.
#[derive(Debug)]
pub struct Session<B> {
    config: HarnessConfig,
    backend: B,
    remotes: RemoteRegistry,
    timings: TimingStore,
    current_test: Option<String>,
}

impl<B> Session<B>
where
    B: EnvironmentBackend,
{
    /// Builds a session; the timing store lives at the configured path.
    #[must_use]
    pub fn new(config: HarnessConfig, backend: B, remotes: RemoteRegistry) -> Self {
        let timings = TimingStore::new(config.timing_path());
        Self {
            config,
            backend,
            remotes,
            timings,
            current_test: None,
        }
    }

    /// Harness configuration.
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Environment backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Shared remote registry.
    #[must_use]
    pub const fn remotes(&self) -> &RemoteRegistry {
        &self.remotes
    }

    /// Timing store for the run.
    #[must_use]
    pub const fn timings(&self) -> &TimingStore {
        &self.timings
    }

    /// Marks `name` as the running test method; stopwatches nest under it.
    pub fn begin_test(&mut self, test: impl Into<String>) {
        let name: String = test.into();
        debug!(test = %name, "test method started");
        self.current_test = Some(name);
    }

    /// Clears the running test method.
    pub fn end_test(&mut self) {
        if let Some(name) = self.current_test.take() {
            debug!(test = %name, "test method finished");
        }
    }

    /// Name of the running test method, if any.
    #[must_use]
    pub fn current_test(&self) -> Option<&str> {
        self.current_test.as_deref()
    }

    /// Remote for `host`, reusing a cached connection.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the connector fails.
    pub fn remote(&self, host: &str) -> Result<SharedRemote, TransportError> {
        self.remotes.get(host)
    }

    /// Starts a stopwatch named `name` under the running test method.
    pub fn stopwatch(&self, name: &str) -> TimeStat<'_> {
        TimeStat::start(&self.timings)
            .named(name)
            .in_test(self.current_test.clone())
    }

    /// Runs `operation` under a stopwatch named `name`.
    pub fn measure<T, F>(&self, name: &str, operation: F) -> T
    where
        F: FnOnce() -> T,
    {
        measure(&self.timings, name, self.current_test.clone(), operation)
    }

    /// Poll policy built from the configuration.
    #[must_use]
    pub const fn wait_policy(&self) -> WaitPolicy {
        self.config.wait_policy()
    }

    /// Guard for remote commands built from the configuration.
    #[must_use]
    pub fn run_limit(&self) -> RunLimit {
        self.config.run_limit()
    }

    /// Snapshot manager honouring the configured snapshot toggle.
    #[must_use]
    pub const fn snapshots(&self) -> SnapshotManager<'_, B> {
        SnapshotManager::new(&self.backend, self.config.make_snapshot)
    }

    /// Run-once gate for the checkpoint `name`.
    ///
    /// Cached connections are dropped when the environment is restored.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] when a backend call fails.
    pub async fn check_run(&self, name: &str) -> Result<RunGate, SnapshotError<B::Error>> {
        let gate = check_run(&self.backend, name).await?;
        if gate == RunGate::AlreadyBuilt {
            self.remotes.clear();
        }
        Ok(gate)
    }

    /// Archives the default log directories on `host` into the logs dir.
    ///
    /// Never fails; problems are logged and reported as `None`.
    pub fn pull_out_logs(&self, host: &str, name: &str) -> Option<String> {
        let remote = best_effort("connect", || self.remote(host))?;
        let local_dir: Utf8PathBuf = self.config.logs_dir();
        let archive = pull_out_logs(&*remote, name, DEFAULT_LOG_DIRS, &local_dir);
        if archive.is_some() {
            info!(host, scenario = name, "diagnostics collected");
        }
        archive
    }
}

//! Named environment checkpoints and the run-once gate built on them.
//!
//! A scenario that builds an expensive environment ends by storing a
//! snapshot. The next run asks [`check_run`] first: when the snapshot exists
//! the environment is reverted and resumed and the scenario returns early.

use thiserror::Error;
use tracing::info;

use crate::backend::EnvironmentBackend;

/// Outcome of the run-once gate.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunGate {
    /// No checkpoint exists; the scenario must build the environment.
    Proceed,
    /// The checkpoint was restored; the scenario should return early.
    AlreadyBuilt,
}

/// Backend failure during a snapshot operation.
#[derive(Debug, Error, Eq, PartialEq)]
#[error("{operation} failed for snapshot {name}: {source}")]
pub struct SnapshotError<E> {
    /// Backend operation that failed.
    pub operation: &'static str,
    /// Snapshot involved.
    pub name: String,
    /// Backend error.
    #[source]
    pub source: E,
}

fn wrap<E>(operation: &'static str, name: &str) -> impl FnOnce(E) -> SnapshotError<E> {
    move |source| SnapshotError {
        operation,
        name: name.to_owned(),
        source,
    }
}

/// Takes and restores snapshots on an [`EnvironmentBackend`].
#[derive(Debug)]
pub struct SnapshotManager<'a, B: ?Sized> {
    backend: &'a B,
    enabled: bool,
}

impl<'a, B> SnapshotManager<'a, B>
where
    B: EnvironmentBackend + ?Sized,
{
    /// Wraps `backend`; `enabled` mirrors the harness snapshot toggle.
    #[must_use]
    pub const fn new(backend: &'a B, enabled: bool) -> Self {
        Self { backend, enabled }
    }

    /// Suspends the environment and stores it as `name`.
    ///
    /// Does nothing unless snapshots are enabled or `force` is set. Returns
    /// whether a snapshot was taken.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] when suspending or snapshotting fails.
    pub async fn make_snapshot(
        &self,
        name: &str,
        description: &str,
        force: bool,
    ) -> Result<bool, SnapshotError<B::Error>> {
        if !(self.enabled || force) {
            info!(snapshot = name, "snapshots disabled, skipping");
            return Ok(false);
        }
        self.backend.suspend().await.map_err(wrap("suspend", name))?;
        self.backend
            .snapshot(name, description)
            .await
            .map_err(wrap("snapshot", name))?;
        info!(snapshot = name, description, "snapshot stored");
        Ok(true)
    }

    /// Restores `name` and resumes the environment.
    ///
    /// Returns `false` without touching the environment when the snapshot
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] when a backend call fails.
    pub async fn revert_snapshot(&self, name: &str) -> Result<bool, SnapshotError<B::Error>> {
        let exists = self
            .backend
            .has_snapshot(name)
            .await
            .map_err(wrap("has_snapshot", name))?;
        if !exists {
            return Ok(false);
        }

        info!(snapshot = name, "Reverting the snapshot");
        self.backend.revert(name).await.map_err(wrap("revert", name))?;
        info!(snapshot = name, "Resuming the snapshot");
        self.backend.resume().await.map_err(wrap("resume", name))?;
        Ok(true)
    }
}

/// Run-once gate: restores `name` when it exists.
///
/// # Errors
///
/// Returns [`SnapshotError`] when a backend call fails.
pub async fn check_run<B>(backend: &B, name: &str) -> Result<RunGate, SnapshotError<B::Error>>
where
    B: EnvironmentBackend + ?Sized,
{
    let manager = SnapshotManager::new(backend, true);
    if manager.revert_snapshot(name).await? {
        info!(snapshot = name, "environment already built, skipping setup");
        Ok(RunGate::AlreadyBuilt)
    } else {
        Ok(RunGate::Proceed)
    }
}

#[cfg(test)]
mod tests;

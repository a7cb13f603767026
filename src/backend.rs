//! Backend abstraction for the virtual environment a test run deploys into.
//!
//! The harness never provisions machines itself. A backend wraps whatever
//! drives the virtual machines (libvirt, a cloud API) and exposes the
//! lifecycle and snapshot operations the run-once gate needs.

use std::future::Future;
use std::pin::Pin;

/// Future returned by backend operations.
pub type BackendFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Lifecycle and checkpoint operations on the test environment.
pub trait EnvironmentBackend {
    /// Provider specific error type returned by the backend.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Boots every node of the environment.
    fn start(&self) -> BackendFuture<'_, (), Self::Error>;

    /// Tears the environment down.
    fn destroy(&self) -> BackendFuture<'_, (), Self::Error>;

    /// Pauses every node, keeping memory state.
    fn suspend(&self) -> BackendFuture<'_, (), Self::Error>;

    /// Resumes suspended nodes.
    fn resume(&self) -> BackendFuture<'_, (), Self::Error>;

    /// Stores a named checkpoint of the whole environment.
    fn snapshot<'a>(
        &'a self,
        name: &'a str,
        description: &'a str,
    ) -> BackendFuture<'a, (), Self::Error>;

    /// Restores the environment to a named checkpoint.
    fn revert<'a>(&'a self, name: &'a str) -> BackendFuture<'a, (), Self::Error>;

    /// Reports whether a named checkpoint exists.
    fn has_snapshot<'a>(&'a self, name: &'a str) -> BackendFuture<'a, bool, Self::Error>;
}

//! Shared registry of remote connections keyed by host.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use super::{ProcessCommandRunner, Remote, RemoteHost, SshConfig, SshRemote, TransportError};

/// Remote handle that can be shared between call sites and threads.
pub type SharedRemote = Arc<dyn Remote + Send + Sync>;

type Connector = dyn Fn(&str) -> Result<SharedRemote, TransportError> + Send + Sync;

/// Hands out one remote per host, connecting lazily on first use.
///
/// Access to the underlying map is serialised, so concurrent scenarios see a
/// single connection per host.
pub struct RemoteRegistry {
    connector: Box<Connector>,
    remotes: Mutex<HashMap<String, SharedRemote>>,
}

impl fmt::Debug for RemoteRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteRegistry")
            .field("hosts", &self.hosts())
            .finish_non_exhaustive()
    }
}

impl RemoteRegistry {
    /// Builds a registry that creates remotes with `connector`.
    #[must_use]
    pub fn new<F>(connector: F) -> Self
    where
        F: Fn(&str) -> Result<SharedRemote, TransportError> + Send + Sync + 'static,
    {
        Self {
            connector: Box::new(connector),
            remotes: Mutex::new(HashMap::new()),
        }
    }

    /// Builds a registry connecting through the system SSH client.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidConfig`] when `config` is invalid.
    pub fn ssh(config: SshConfig) -> Result<Self, TransportError> {
        config.validate()?;
        Ok(Self::new(move |address| {
            let host = RemoteHost::new(address, config.ssh_port);
            let remote = SshRemote::with_process_runner(config.clone(), host)?;
            Ok(Arc::new(remote) as SharedRemote)
        }))
    }

    /// Returns the remote for `host`, connecting when none is cached.
    ///
    /// # Errors
    ///
    /// Returns any error raised by the connector.
    pub fn get(&self, host: &str) -> Result<SharedRemote, TransportError> {
        let mut remotes = self.remotes.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(remote) = remotes.get(host) {
            return Ok(Arc::clone(remote));
        }

        debug!(host, "opening remote connection");
        let remote = (self.connector)(host)?;
        remotes.insert(host.to_owned(), Arc::clone(&remote));
        Ok(remote)
    }

    /// Drops every cached connection, e.g. after an environment revert.
    pub fn clear(&self) {
        let mut remotes = self.remotes.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(count = remotes.len(), "dropping cached remote connections");
        remotes.clear();
    }

    /// Hosts with a cached connection, sorted.
    #[must_use]
    pub fn hosts(&self) -> Vec<String> {
        let remotes = self.remotes.lock().unwrap_or_else(PoisonError::into_inner);
        let mut hosts: Vec<String> = remotes.keys().cloned().collect();
        hosts.sort();
        hosts
    }
}

//! Best-effort diagnostics collectors.
//!
//! Everything here runs after a failure or at the end of a run, when the
//! outcome of the test is already decided. Collectors therefore log their
//! own problems and never propagate them; [`best_effort`] makes that
//! convention explicit at each call site.

mod inventory;

pub use inventory::{PACKAGES_FILE_NAME, PackageInventory, store_packages_json};

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::executor::{ExecError, check_call};
use crate::transport::{Remote, TransportError, quote};

/// Directories archived by [`pull_out_logs`] when the caller has no opinion.
pub const DEFAULT_LOG_DIRS: &[&str] = &["/var/log/", "/root/", "/etc/fuel/"];

/// Remote directory the diagnostic archive is written to.
const ARCHIVE_DIR: &str = "/var/tmp";

/// Failures met by a collector, logged rather than returned to callers.
#[derive(Debug, Error)]
pub enum DiagnosticsError {
    /// A remote command failed.
    #[error(transparent)]
    Exec(#[from] ExecError),
    /// The transport failed outside command execution.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A local file could not be read or written.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// A local file could not be serialised.
    #[error("failed to encode {path}: {message}")]
    Encode {
        /// Path being written.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// The archive could not be copied back.
    #[error("Downloading of archive {archive} with logs failed, file wasn't saved on local host")]
    Download {
        /// Remote archive path.
        archive: String,
    },
}

/// Runs a collector, logging and swallowing any failure.
///
/// Returns the collector's value on success.
pub fn best_effort<T, E, F>(label: &str, collector: F) -> Option<T>
where
    E: fmt::Display,
    F: FnOnce() -> Result<T, E>,
{
    match collector() {
        Ok(value) => Some(value),
        Err(err) => {
            error!(collector = label, error = %err, "best-effort collector failed");
            None
        }
    }
}

/// Remote path of the archive for scenario `name`.
#[must_use]
pub fn archive_path(name: &str) -> String {
    format!(
        "{ARCHIVE_DIR}/fail_{name}_diagnostic-logs_{}.tgz",
        Uuid::new_v4().simple()
    )
}

/// Archives `logs_dirs` on `remote` and downloads the archive to
/// `local_dir`.
///
/// Never fails: problems are logged and reported as `None`. Returns the
/// remote archive path when the download succeeded.
pub fn pull_out_logs<R>(
    remote: &R,
    name: &str,
    logs_dirs: &[&str],
    local_dir: &Utf8Path,
) -> Option<String>
where
    R: Remote + ?Sized,
{
    best_effort("pull_out_logs", || {
        let archive = archive_path(name);
        let dirs: Vec<String> = logs_dirs.iter().map(|dir| quote(dir)).collect();
        let command = format!(
            "tar --absolute-names --warning=no-file-changed -czf {} {}",
            quote(&archive),
            dirs.join(" ")
        );
        check_call(remote, &command)?;
        if !remote.download(&archive, local_dir)? {
            return Err(DiagnosticsError::Download { archive });
        }
        info!(host = remote.host(), archive = %archive, local = %local_dir, "diagnostic logs saved");
        Ok::<_, DiagnosticsError>(archive)
    })
}

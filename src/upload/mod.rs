//! Conditional upload of local files and package trees to a remote node.
//!
//! Every uploaded package file whose name looks like `name-version-release`
//! is checked against the package installed on the node. Policy violations
//! are collected in the [`UploadReport`] and the upload carries on, so one
//! stale package does not hide the rest.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::parsers::{PackageError, PackageVersionError, compare_packages_version};
use crate::transport::{Remote, TransportError, expand_tilde};

/// Marker in file names that exempts Debian packages from the rpm check.
const DEB_MARKER: &str = "deb";

/// Outcome of [`cond_upload`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UploadReport {
    /// Files copied to the remote node.
    pub uploaded: usize,
    /// Packages that break the upgrade policy.
    pub version_errors: Vec<PackageVersionError>,
}

/// Errors that stop an upload.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A package version query failed for a reason other than policy.
    #[error(transparent)]
    Package(#[from] PackageError),
    /// A local path could not be read.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
}

fn io_error(path: &Utf8Path, err: &io::Error) -> UploadError {
    UploadError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

/// Returns `true` when `condition` matches at the start of `path`; no
/// condition matches everything.
fn matches_condition(condition: Option<&Regex>, path: &str) -> bool {
    condition.is_none_or(|pattern| pattern.find(path).is_some_and(|found| found.start() == 0))
}

/// Package name of an rpm file `name-version-release.arch.rpm`.
fn package_name(file_name: &str) -> Option<&str> {
    let mut parts = file_name.rsplitn(3, '-');
    let _release = parts.next()?;
    let _version = parts.next()?;
    parts.next().filter(|name| !name.is_empty())
}

fn is_local_dir(path: &Utf8Path) -> Result<bool, UploadError> {
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let Some(file_name) = path.file_name() else {
        // `/` and paths ending in `..` have no file name; open them directly.
        return Ok(Dir::open_ambient_dir(path, ambient_authority()).is_ok());
    };
    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| io_error(parent, &err))?;
    let metadata = dir.metadata(file_name).map_err(|err| io_error(path, &err))?;
    Ok(metadata.is_dir())
}

/// Uploads `source` to `target` on `remote` when its path matches
/// `condition` from the start.
///
/// A directory is copied recursively, creating each target directory and
/// filtering every file by its full local path. When `target` is an existing
/// remote directory, the source's base name is appended to it.
///
/// # Errors
///
/// Returns [`UploadError`] when the local tree cannot be read, the transport
/// fails, or a package query fails. Version policy violations are reported in
/// [`UploadReport::version_errors`] instead.
pub fn cond_upload<R>(
    remote: &R,
    source: &Utf8Path,
    target: &str,
    condition: Option<&Regex>,
) -> Result<UploadReport, UploadError>
where
    R: Remote + ?Sized,
{
    let local_root = Utf8PathBuf::from(expand_tilde(source.as_str()));
    let remote_root = match local_root.file_name() {
        Some(base) if remote.isdir(target)? => format!("{}/{base}", target.trim_end_matches('/')),
        _ => target.to_owned(),
    };

    let mut report = UploadReport::default();
    if !is_local_dir(&local_root)? {
        if matches_condition(condition, local_root.as_str()) {
            remote.upload(&local_root, &remote_root)?;
            report.uploaded = 1;
            debug!(local = %local_root, remote = %remote_root, "File uploaded to the remote folder");
        } else {
            debug!(local = %local_root, "Pattern doesn't match the file, uploading skipped");
        }
        return Ok(report);
    }

    let dir = Dir::open_ambient_dir(&local_root, ambient_authority())
        .map_err(|err| io_error(&local_root, &err))?;
    upload_tree(remote, &dir, &local_root, &remote_root, condition, &mut report)?;
    Ok(report)
}

fn upload_tree<R>(
    remote: &R,
    dir: &Dir,
    local_dir: &Utf8Path,
    remote_dir: &str,
    condition: Option<&Regex>,
    report: &mut UploadReport,
) -> Result<(), UploadError>
where
    R: Remote + ?Sized,
{
    remote.mkdir(remote_dir)?;

    let mut files = Vec::new();
    let mut subdirs = Vec::new();
    for entry in dir.entries().map_err(|err| io_error(local_dir, &err))? {
        let item = entry.map_err(|err| io_error(local_dir, &err))?;
        let name = item.file_name().map_err(|err| io_error(local_dir, &err))?;
        let kind = item.file_type().map_err(|err| io_error(&local_dir.join(&name), &err))?;
        if kind.is_dir() {
            subdirs.push(name);
        } else {
            files.push(name);
        }
    }
    files.sort();
    subdirs.sort();

    for name in files {
        let local_path = local_dir.join(&name);
        let remote_path = format!("{remote_dir}/{name}");
        if !matches_condition(condition, local_path.as_str()) {
            debug!(local = %local_path, "Pattern doesn't match the file, uploading skipped");
            continue;
        }
        remote.upload(&local_path, &remote_path)?;
        report.uploaded += 1;
        debug!(local = %local_path, remote = %remote_path, "File uploaded to the remote folder");

        if name.contains(DEB_MARKER) {
            continue;
        }
        let Some(package) = package_name(&name) else {
            debug!(file = %name, "not a name-version-release package, version check skipped");
            continue;
        };
        match compare_packages_version(remote, package, &remote_path) {
            Ok(()) => {}
            Err(PackageError::Version(violation)) => {
                warn!(package, error = %violation, "package version check failed");
                report.version_errors.push(violation);
            }
            Err(other) => return Err(other.into()),
        }
    }

    for name in subdirs {
        let child = dir
            .open_dir(&name)
            .map_err(|err| io_error(&local_dir.join(&name), &err))?;
        upload_tree(
            remote,
            &child,
            &local_dir.join(&name),
            &format!("{remote_dir}/{name}"),
            condition,
            report,
        )?;
    }
    Ok(())
}

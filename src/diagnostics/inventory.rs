//! Per-test, per-role inventory of installed packages, merged into
//! `packages.json`.

use std::collections::{BTreeMap, BTreeSet};
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::DiagnosticsError;
use crate::executor::ExecError;
use crate::parsers::{InstalledPackage, PackageManager, get_node_packages};
use crate::transport::Remote;

/// File name of the inventory inside the logs directory.
pub const PACKAGES_FILE_NAME: &str = "packages.json";

/// `test -> role -> {"name version"}`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PackageInventory(BTreeMap<String, BTreeMap<String, BTreeSet<String>>>);

impl PackageInventory {
    /// Creates an empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `packages` for `role` under `test`, keeping what was recorded
    /// before.
    pub fn record(&mut self, test: &str, role: &str, packages: &[InstalledPackage]) {
        self.0
            .entry(test.to_owned())
            .or_default()
            .entry(role.to_owned())
            .or_default()
            .extend(packages.iter().map(ToString::to_string));
    }

    /// Lists the packages of `remote` and records them.
    ///
    /// Returns the number of packages listed.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError`] when the listing command fails.
    pub fn collect<R>(
        &mut self,
        remote: &R,
        test: &str,
        role: &str,
        manager: PackageManager,
    ) -> Result<usize, ExecError>
    where
        R: Remote + ?Sized,
    {
        let packages = get_node_packages(remote, manager)?;
        self.record(test, role, &packages);
        Ok(packages.len())
    }

    /// Unions `other` into `self`.
    pub fn merge(&mut self, other: Self) {
        for (test, roles) in other.0 {
            let target = self.0.entry(test).or_default();
            for (role, packages) in roles {
                target.entry(role).or_default().extend(packages);
            }
        }
    }

    /// Packages recorded for `role` under `test`.
    #[must_use]
    pub fn packages(&self, test: &str, role: &str) -> Option<&BTreeSet<String>> {
        self.0.get(test).and_then(|roles| roles.get(role))
    }

    /// Returns `true` when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Merges `inventory` into `packages.json` under `logs_dir`.
///
/// An unreadable existing file is replaced. Returns the path written.
///
/// # Errors
///
/// Returns [`DiagnosticsError`] when the directory or file cannot be written.
pub fn store_packages_json(
    inventory: &PackageInventory,
    logs_dir: &Utf8Path,
) -> Result<Utf8PathBuf, DiagnosticsError> {
    let path = logs_dir.join(PACKAGES_FILE_NAME);
    let io_error = |target: &Utf8Path, err: &io::Error| DiagnosticsError::Io {
        path: target.to_path_buf(),
        message: err.to_string(),
    };

    Dir::create_ambient_dir_all(logs_dir, ambient_authority())
        .map_err(|err| io_error(logs_dir, &err))?;
    let dir = Dir::open_ambient_dir(logs_dir, ambient_authority())
        .map_err(|err| io_error(logs_dir, &err))?;

    let mut merged = match dir.read_to_string(PACKAGES_FILE_NAME) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            warn!(path = %path, error = %err, "discarding unreadable package inventory");
            PackageInventory::new()
        }),
        Err(err) if err.kind() == io::ErrorKind::NotFound => PackageInventory::new(),
        Err(err) => return Err(io_error(&path, &err)),
    };
    merged.merge(inventory.clone());

    let rendered = serde_json::to_string(&merged).map_err(|err| DiagnosticsError::Encode {
        path: path.clone(),
        message: err.to_string(),
    })?;
    dir.write(PACKAGES_FILE_NAME, rendered)
        .map_err(|err| io_error(&path, &err))?;
    debug!(path = %path, "package inventory stored");
    Ok(path)
}

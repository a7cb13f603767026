//! Package queries: version lookup, upgrade policy, inventory and install.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use super::ParseError;
use super::version::LooseVersion;
use crate::executor::{ExecError, ExecOptions, run_on_remote};
use crate::transport::{Remote, quote};

const NOT_INSTALLED: &str = "not installed";
const RPM_QUERY_FORMAT: &str = "--queryformat \"%{VERSION} %{RELEASE}\"";
const RPM_LISTING: &str = "rpm -qa --qf \"%{name} %{version}\r\"";
const DPKG_LISTING: &str = "dpkg-query -W -f='${Package} ${Version}\r'";

/// Upgrade policy violation between an incoming artefact and the installed
/// package.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("Package {package} has unacceptable version {version}")]
pub struct PackageVersionError {
    /// Incoming package that was rejected.
    pub package: String,
    /// Version string that broke the policy.
    pub version: String,
}

/// Errors raised by package queries.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PackageError {
    /// The query command could not run or returned an unexpected code.
    #[error(transparent)]
    Exec(#[from] ExecError),
    /// The query failed for a reason other than absence.
    #[error("Command {command} fails by unexpected reason: {output}")]
    Query {
        /// Query command.
        command: String,
        /// Captured stdout.
        output: String,
    },
    /// The query output did not hold a version and release.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The incoming package breaks the upgrade policy.
    #[error(transparent)]
    Version(#[from] PackageVersionError),
}

/// Version and release of one package.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PackageVersion {
    /// Upstream version (`%{VERSION}`).
    pub version: String,
    /// Packaging release (`%{RELEASE}`).
    pub release: String,
}

impl FromStr for PackageVersion {
    type Err = ParseError;

    /// Accepts the `version release` query output or a `version-release`
    /// label, splitting the latter on its last dash.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        let pair = match fields.as_slice() {
            [version, release] => Some((*version, *release)),
            [label] => label.rsplit_once('-'),
            _ => None,
        };
        pair.filter(|(version, release)| !version.is_empty() && !release.is_empty())
            .map(|(version, release)| Self {
                version: version.to_owned(),
                release: release.to_owned(),
            })
            .ok_or_else(|| ParseError::MissingColumns {
                label: trimmed.to_owned(),
                expected: 2,
                found: fields.len(),
            })
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.version, self.release)
    }
}

/// Decides whether `incoming` may replace `installed`.
///
/// Releases must match, and the incoming version must be strictly newer.
///
/// # Errors
///
/// Returns [`PackageVersionError`] naming `package` and the offending
/// incoming version or release.
pub fn check_upgrade(
    package: &str,
    installed: &PackageVersion,
    incoming: &PackageVersion,
) -> Result<(), PackageVersionError> {
    if LooseVersion::new(&installed.release) != LooseVersion::new(&incoming.release) {
        return Err(PackageVersionError {
            package: package.to_owned(),
            version: incoming.release.clone(),
        });
    }
    if LooseVersion::new(&installed.version) >= LooseVersion::new(&incoming.version) {
        return Err(PackageVersionError {
            package: package.to_owned(),
            version: incoming.version.clone(),
        });
    }
    Ok(())
}

/// Where [`get_package_version`] looks for the package.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PackageSource {
    /// Query the rpm database by package name.
    Installed,
    /// Query a package file on the remote (`rpm -qp`).
    File,
}

/// Queries the version and release of `package` on `remote`.
///
/// Returns `Ok(None)` when rpm reports the package as not installed.
///
/// # Errors
///
/// Returns [`PackageError::Query`] when the query fails for any other reason,
/// and [`PackageError::Parse`] when the output is malformed.
pub fn get_package_version<R>(
    remote: &R,
    package: &str,
    source: PackageSource,
) -> Result<Option<PackageVersion>, PackageError>
where
    R: Remote + ?Sized,
{
    let flag = match source {
        PackageSource::Installed => "-q",
        PackageSource::File => "-qp",
    };
    let command = format!("rpm {flag} {} {RPM_QUERY_FORMAT}", quote(package));
    let result = run_on_remote(
        remote,
        &command,
        &ExecOptions::default().with_raise_on_mismatch(false),
    )?;
    let output = result.stdout_str();
    debug!(command = %command, exit_code = result.exit_code(), output = %output.trim(), "package query");

    if result.exit_code() != 0 {
        if output.contains(NOT_INSTALLED) {
            return Ok(None);
        }
        return Err(PackageError::Query { command, output });
    }
    Ok(Some(output.parse()?))
}

/// Checks a package file on `remote` against the installed `package_name`.
///
/// A package that is not installed accepts any incoming version.
///
/// # Errors
///
/// Returns [`PackageError::Version`] when the upgrade policy rejects the
/// file, and [`PackageError::Query`] when the file cannot be queried.
pub fn compare_packages_version<R>(
    remote: &R,
    package_name: &str,
    incoming_path: &str,
) -> Result<(), PackageError>
where
    R: Remote + ?Sized,
{
    let incoming = get_package_version(remote, incoming_path, PackageSource::File)?.ok_or_else(
        || PackageError::Query {
            command: format!("rpm -qp {}", quote(incoming_path)),
            output: String::from(NOT_INSTALLED),
        },
    )?;
    let Some(installed) = get_package_version(remote, package_name, PackageSource::Installed)?
    else {
        return Ok(());
    };
    check_upgrade(incoming_path, &installed, &incoming)?;
    Ok(())
}

/// Package manager used for a whole-node listing.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PackageManager {
    /// CentOS nodes.
    #[default]
    Rpm,
    /// Ubuntu nodes.
    Dpkg,
}

impl PackageManager {
    /// Listing command printing `name version` records separated by `\r`.
    #[must_use]
    pub const fn listing_command(self) -> &'static str {
        match self {
            Self::Rpm => RPM_LISTING,
            Self::Dpkg => DPKG_LISTING,
        }
    }
}

/// One entry of a node package listing.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct InstalledPackage {
    /// Package name.
    pub name: String,
    /// Version as printed by the package manager.
    pub version: String,
}

impl fmt::Display for InstalledPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// Splits a `\r` separated listing into packages.
///
/// Records without a version are skipped.
#[must_use]
pub fn parse_package_listing(output: &str) -> Vec<InstalledPackage> {
    output
        .split('\r')
        .map(str::trim)
        .filter_map(|record| record.split_once(' '))
        .map(|(name, version)| InstalledPackage {
            name: name.to_owned(),
            version: version.trim().to_owned(),
        })
        .collect()
}

/// Lists every package installed on `remote`.
///
/// # Errors
///
/// Returns [`ExecError`] when the listing command fails.
pub fn get_node_packages<R>(
    remote: &R,
    manager: PackageManager,
) -> Result<Vec<InstalledPackage>, ExecError>
where
    R: Remote + ?Sized,
{
    let result = run_on_remote(remote, manager.listing_command(), &ExecOptions::default())?;
    let packages = parse_package_listing(&result.stdout_str());
    debug!(host = remote.host(), count = packages.len(), "node packages listed");
    Ok(packages)
}

/// Installs `package` with yum unless rpm already knows it.
///
/// Returns the exit code of the last command run.
///
/// # Errors
///
/// Returns [`ExecError`] only when a command cannot be executed at all.
pub fn install_pkg<R>(remote: &R, package: &str) -> Result<i32, ExecError>
where
    R: Remote + ?Sized,
{
    let tolerant = ExecOptions::default().with_raise_on_mismatch(false);
    let query = run_on_remote(remote, &format!("rpm -q {}", quote(package)), &tolerant)?;
    if query.exit_code() == 0 {
        info!(package, "Package already installed");
        return Ok(0);
    }

    info!(package, "Installing package");
    let install = run_on_remote(remote, &format!("yum -y install {}", quote(package)), &tolerant)?;
    info!(
        package,
        exit_code = install.exit_code(),
        "Installation of the package has been completed"
    );
    Ok(install.exit_code())
}

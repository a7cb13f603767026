//! Package version policy, inventory and install helper.

use rstest::rstest;

use super::remote;
use crate::parsers::{
    InstalledPackage, PackageError, PackageManager, PackageSource, PackageVersion,
    PackageVersionError, check_upgrade, compare_packages_version, get_node_packages,
    get_package_version, install_pkg, parse_package_listing,
};
use crate::test_support::ScriptedRemote;

const QUERY_FORMAT: &str = "--queryformat \"%{VERSION} %{RELEASE}\"";
const INCOMING: &str = "/var/www/nailgun/fuel-agent-2.0-1.noarch.rpm";

fn version(label: &str) -> PackageVersion {
    label.parse().expect("version label should parse")
}

#[rstest]
#[case::dashed("2.0-1", "2.0", "1")]
#[case::query_output("9.0.0 1.mos8460\n", "9.0.0", "1.mos8460")]
#[case::dash_in_version("1.0-rc1-3", "1.0-rc1", "3")]
fn parses_version_and_release(#[case] raw: &str, #[case] expected: &str, #[case] release: &str) {
    let parsed = version(raw);

    assert_eq!(parsed.version, expected);
    assert_eq!(parsed.release, release);
}

#[rstest]
fn rejects_unsplittable_version() {
    assert!("2.0".parse::<PackageVersion>().is_err());
}

#[rstest]
fn equal_installed_version_blocks_upgrade() {
    let err = check_upgrade("fuel-agent", &version("2.0-1"), &version("2.0-1"))
        .expect_err("equal version should be rejected");

    assert_eq!(
        err,
        PackageVersionError {
            package: String::from("fuel-agent"),
            version: String::from("2.0"),
        }
    );
}

#[rstest]
fn newer_incoming_version_is_accepted() {
    assert_eq!(
        check_upgrade("fuel-agent", &version("1.0-1"), &version("2.0-1")),
        Ok(())
    );
}

#[rstest]
fn release_mismatch_names_the_incoming_release() {
    let err = check_upgrade("fuel-agent", &version("1.0-1"), &version("2.0-2"))
        .expect_err("release mismatch should be rejected");

    assert_eq!(err.version, "2");
}

#[rstest]
fn loose_ordering_drives_the_policy() {
    assert_eq!(
        check_upgrade("fuel-agent", &version("1.9-1"), &version("1.10-1")),
        Ok(())
    );
}

#[rstest]
fn not_installed_is_absence(remote: ScriptedRemote) {
    remote.respond(
        &format!("rpm -q fuel-agent {QUERY_FORMAT}"),
        1,
        "package fuel-agent is not installed\n",
    );

    let found = get_package_version(&remote, "fuel-agent", PackageSource::Installed)
        .expect("absence is not an error");

    assert_eq!(found, None);
}

#[rstest]
fn other_query_failures_are_errors(remote: ScriptedRemote) {
    remote.respond(&format!("rpm -q fuel-agent {QUERY_FORMAT}"), 1, "rpmdb open failed\n");

    let err = get_package_version(&remote, "fuel-agent", PackageSource::Installed)
        .expect_err("unexpected failure should surface");

    assert!(matches!(err, PackageError::Query { ref output, .. } if output.contains("rpmdb")));
}

#[rstest]
fn compare_rejects_stale_upload(remote: ScriptedRemote) {
    remote.respond(&format!("rpm -qp {INCOMING} {QUERY_FORMAT}"), 0, "2.0 1");
    remote.respond(&format!("rpm -q fuel-agent {QUERY_FORMAT}"), 0, "2.0 1");

    let err = compare_packages_version(&remote, "fuel-agent", INCOMING)
        .expect_err("equal version should be rejected");

    let PackageError::Version(violation) = err else {
        panic!("expected version error, got {err:?}");
    };
    assert_eq!(violation.package, INCOMING);
}

#[rstest]
fn compare_accepts_package_missing_on_node(remote: ScriptedRemote) {
    remote.respond(&format!("rpm -qp {INCOMING} {QUERY_FORMAT}"), 0, "2.0 1");
    remote.respond(
        &format!("rpm -q fuel-agent {QUERY_FORMAT}"),
        1,
        "package fuel-agent is not installed\n",
    );

    assert_eq!(compare_packages_version(&remote, "fuel-agent", INCOMING), Ok(()));
}

#[rstest]
fn listing_splits_on_carriage_returns() {
    let packages = parse_package_listing("bash 4.2.46\rfuel-agent 9.0.0\r\n");

    assert_eq!(
        packages,
        [
            InstalledPackage {
                name: String::from("bash"),
                version: String::from("4.2.46"),
            },
            InstalledPackage {
                name: String::from("fuel-agent"),
                version: String::from("9.0.0"),
            },
        ]
    );
}

#[rstest]
#[case::rpm(PackageManager::Rpm)]
#[case::dpkg(PackageManager::Dpkg)]
fn node_packages_use_manager_listing(remote: ScriptedRemote, #[case] manager: PackageManager) {
    remote.respond(manager.listing_command(), 0, "bash 4.3\rcurl 7.47\r");

    let packages = get_node_packages(&remote, manager).expect("listing should succeed");

    assert_eq!(packages.len(), 2);
    assert_eq!(remote.commands(), [manager.listing_command()]);
}

#[rstest]
fn install_skips_known_packages(remote: ScriptedRemote) {
    remote.respond("rpm -q htop", 0, "htop-2.0.2-1.el7.x86_64\n");

    assert_eq!(install_pkg(&remote, "htop"), Ok(0));
    assert_eq!(remote.commands(), ["rpm -q htop"]);
}

#[rstest]
fn install_reports_yum_exit_code(remote: ScriptedRemote) {
    remote.respond("rpm -q htop", 1, "package htop is not installed\n");
    remote.respond("yum -y install htop", 1, "No package htop available.\n");

    assert_eq!(install_pkg(&remote, "htop"), Ok(1));
    assert_eq!(remote.commands(), ["rpm -q htop", "yum -y install htop"]);
}

//! Unit tests for the remote command executor.

use std::time::Duration;

use rstest::{fixture, rstest};
use serde::Deserialize;

use super::*;
use crate::test_support::ScriptedRemote;

#[fixture]
fn remote() -> ScriptedRemote {
    ScriptedRemote::new("10.109.0.2")
}

#[rstest]
#[case::default_zero(&[0], 0, true)]
#[case::default_rejects_one(&[0], 1, false)]
#[case::grep_no_match(&[0, 1], 1, true)]
#[case::outside_set(&[0, 1], 2, false)]
fn returns_normally_iff_code_is_expected(
    remote: ScriptedRemote,
    #[case] expected: &[i32],
    #[case] produced: i32,
    #[case] succeeds: bool,
) {
    remote.respond("grep -q fuel /etc/hosts", produced, "");
    let options = ExecOptions::default().with_expected(expected.iter().copied());

    let outcome = run_on_remote(&remote, "grep -q fuel /etc/hosts", &options);

    assert_eq!(outcome.is_ok(), succeeds, "outcome: {outcome:?}");
    if let Err(err) = outcome {
        assert!(
            err.to_string().contains("grep -q fuel /etc/hosts"),
            "message should carry the command: {err}"
        );
    }
}

#[rstest]
fn mismatch_carries_full_diagnostics(remote: ScriptedRemote) {
    remote.respond_with(
        "fuel env",
        CommandResult::from_streams(2, "partial\n", "boom\n"),
    );

    let err = check_call(&remote, "fuel env").expect_err("exit 2 should fail");

    let ExecError::CommandExecution(failure) = err else {
        panic!("expected command execution error, got {err:?}");
    };
    assert_eq!(failure.host, "10.109.0.2");
    assert_eq!(failure.exit_code, 2);
    assert_eq!(failure.stdout, ["partial\n"]);
    assert_eq!(failure.stderr, ["boom\n"]);
    assert_eq!(
        failure.message,
        "Unexpected exit_code returned: actual 2, expected 0."
    );
}

#[rstest]
fn custom_message_replaces_summary(remote: ScriptedRemote) {
    remote.respond("service nailgun status", 3, "");
    let options = ExecOptions::default().with_message("nailgun is down");

    let err = run_on_remote(&remote, "service nailgun status", &options)
        .expect_err("exit 3 should fail");

    assert!(
        err.to_string().starts_with("nailgun is down  Command: 'service nailgun status'"),
        "got: {err}"
    );
}

#[rstest]
fn mismatch_without_raise_returns_result(remote: ScriptedRemote) {
    remote.respond("rpm -q fuel-agent", 1, "package fuel-agent is not installed\n");
    let options = ExecOptions::default().with_raise_on_mismatch(false);

    let result = run_on_remote(&remote, "rpm -q fuel-agent", &options).expect("not raised");

    assert_eq!(result.exit_code(), 1);
    assert_eq!(result.stdout_len(), 1);
}

#[rstest]
fn executes_exactly_once(remote: ScriptedRemote) {
    remote.respond("false", 1, "");

    check_call(&remote, "false").expect_err("false should fail");

    assert_eq!(remote.commands(), ["false"]);
}

#[derive(Debug, Deserialize, PartialEq)]
struct Release {
    id: u32,
    name: String,
}

#[rstest]
fn json_mode_decodes_concatenated_stdout(remote: ScriptedRemote) {
    remote.respond("fuel rel --json", 0, "[{\"id\": 2,\n\"name\": \"Mitaka\"}]\n");

    let releases: Vec<Release> =
        run_on_remote_json(&remote, "fuel rel --json", &ExecOptions::default())
            .expect("valid json");

    assert_eq!(
        releases,
        [Release {
            id: 2,
            name: String::from("Mitaka")
        }]
    );
}

#[rstest]
fn json_mode_reports_deserialization_error(remote: ScriptedRemote) {
    remote.respond("fuel rel --json", 0, "not json\n");

    let err = run_on_remote_json::<_, serde_json::Value>(
        &remote,
        "fuel rel --json",
        &ExecOptions::default(),
    )
    .expect_err("invalid json should fail");

    let ExecError::Deserialization { command, host, .. } = err else {
        panic!("expected deserialization error, got {err:?}");
    };
    assert_eq!(command, "fuel rel --json");
    assert_eq!(host, "10.109.0.2");
}

#[rstest]
fn json_mode_checks_exit_code_first(remote: ScriptedRemote) {
    remote.respond("fuel rel --json", 1, "{}");

    let err = run_on_remote_json::<_, serde_json::Value>(
        &remote,
        "fuel rel --json",
        &ExecOptions::default(),
    )
    .expect_err("exit 1 should fail");

    assert!(matches!(err, ExecError::CommandExecution(_)), "got {err:?}");
}

#[rstest]
fn expired_deadline_maps_to_timeout(remote: ScriptedRemote) {
    remote.respond("uptime", 0, "up\n");
    let options = ExecOptions::default()
        .with_deadline(Deadline::after(Duration::ZERO, "uptime took too long"));

    let err = run_on_remote(&remote, "uptime", &options).expect_err("deadline expired");

    let ExecError::Timeout(timeout) = err else {
        panic!("expected timeout, got {err:?}");
    };
    assert_eq!(timeout.message, "uptime took too long");
}

#[rstest]
fn transport_failures_surface(remote: ScriptedRemote) {
    let err = check_call(&remote, "unscripted").expect_err("no response scripted");

    assert!(matches!(err, ExecError::Transport(_)), "got {err:?}");
}

#[rstest]
fn expected_codes_display_space_separated() {
    let codes: ExpectedExitCodes = [1, 0, 4].into_iter().collect();

    assert_eq!(codes.to_string(), "0 1 4");
    assert!(codes.contains(4));
    assert!(!ExpectedExitCodes::default().contains(1));
}

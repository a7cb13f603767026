//! Unit tests for snapshot management and the run-once gate.

use rstest::{fixture, rstest};

use super::*;
use crate::test_support::{EnvironmentCall, ScriptedEnvironment};

#[fixture]
fn env() -> ScriptedEnvironment {
    ScriptedEnvironment::new()
}

#[fixture]
fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().unwrap_or_else(|err| panic!("runtime: {err}"))
}

#[rstest]
fn gate_proceeds_without_checkpoint(env: ScriptedEnvironment, runtime: tokio::runtime::Runtime) {
    let gate = runtime
        .block_on(check_run(&env, "ready_with_3_slaves"))
        .unwrap_or_else(|err| panic!("gate: {err}"));

    assert_eq!(gate, RunGate::Proceed);
    assert_eq!(
        env.calls(),
        [EnvironmentCall::HasSnapshot(String::from("ready_with_3_slaves"))]
    );
}

#[rstest]
fn gate_reverts_existing_checkpoint_once(
    env: ScriptedEnvironment,
    runtime: tokio::runtime::Runtime,
) {
    env.add_snapshot("ready_with_3_slaves");

    let gate = runtime
        .block_on(check_run(&env, "ready_with_3_slaves"))
        .unwrap_or_else(|err| panic!("gate: {err}"));

    assert_eq!(gate, RunGate::AlreadyBuilt);
    assert_eq!(
        env.count(&EnvironmentCall::Revert(String::from("ready_with_3_slaves"))),
        1
    );
    assert_eq!(env.calls().last(), Some(&EnvironmentCall::Resume));
}

#[rstest]
fn failed_revert_is_reported(env: ScriptedEnvironment, runtime: tokio::runtime::Runtime) {
    env.add_snapshot("ready");
    env.fail_revert();

    let err = runtime
        .block_on(check_run(&env, "ready"))
        .expect_err("revert failure should surface");

    assert_eq!(err.operation, "revert");
    assert_eq!(err.name, "ready");
    assert!(!env.calls().contains(&EnvironmentCall::Resume));
}

#[rstest]
#[case::enabled(true, false, true)]
#[case::forced(false, true, true)]
#[case::disabled(false, false, false)]
fn snapshot_respects_toggle(
    env: ScriptedEnvironment,
    runtime: tokio::runtime::Runtime,
    #[case] enabled: bool,
    #[case] force: bool,
    #[case] taken: bool,
) {
    let manager = SnapshotManager::new(&env, enabled);

    let outcome = runtime
        .block_on(manager.make_snapshot("deploy_neutron", "Deployed cluster", force))
        .unwrap_or_else(|err| panic!("snapshot: {err}"));

    assert_eq!(outcome, taken);
    if taken {
        assert_eq!(
            env.calls(),
            [
                EnvironmentCall::Suspend,
                EnvironmentCall::Snapshot(
                    String::from("deploy_neutron"),
                    String::from("Deployed cluster")
                ),
            ]
        );
    } else {
        assert!(env.calls().is_empty());
    }
}

#[rstest]
fn revert_of_missing_snapshot_returns_false(
    env: ScriptedEnvironment,
    runtime: tokio::runtime::Runtime,
) {
    let manager = SnapshotManager::new(&env, true);

    let reverted = runtime
        .block_on(manager.revert_snapshot("absent"))
        .unwrap_or_else(|err| panic!("revert: {err}"));

    assert!(!reverted);
    assert_eq!(env.count(&EnvironmentCall::Resume), 0);
}

//! BDD step definitions for the run-once snapshot gate.

use fuel_harness::test_support::EnvironmentCall;
use fuel_harness::{RunGate, SnapshotManager, check_run};
use rstest_bdd_macros::{given, then, when};

use super::test_helpers::{GateOutcome, SnapshotContext, runtime};

#[given("an environment without checkpoints")]
fn environment_without_checkpoints(snapshot_context: &SnapshotContext) {
    assert!(snapshot_context.environment.snapshots().is_empty());
}

#[given("an environment with checkpoint \"{name}\"")]
fn environment_with_checkpoint(snapshot_context: &SnapshotContext, name: String) {
    snapshot_context.environment.add_snapshot(&name);
}

#[given("reverting fails")]
fn reverting_fails(snapshot_context: &SnapshotContext) {
    snapshot_context.environment.fail_revert();
}

#[when("the run-once gate checks \"{name}\"")]
fn gate_checks(snapshot_context: &SnapshotContext, name: String) {
    let outcome = match runtime().block_on(check_run(&snapshot_context.environment, &name)) {
        Ok(gate) => GateOutcome::Gate(gate),
        Err(err) => GateOutcome::Failed {
            operation: err.operation.to_owned(),
        },
    };
    snapshot_context.record(outcome);
}

fn store_snapshot(snapshot_context: &SnapshotContext, name: &str, force: bool) {
    let manager = SnapshotManager::new(&snapshot_context.environment, false);
    let outcome = match runtime().block_on(manager.make_snapshot(name, "", force)) {
        Ok(taken) => GateOutcome::Taken(taken),
        Err(err) => GateOutcome::Failed {
            operation: err.operation.to_owned(),
        },
    };
    snapshot_context.record(outcome);
}

#[when("the scenario stores snapshot \"{name}\"")]
fn scenario_stores_snapshot(snapshot_context: &SnapshotContext, name: String) {
    store_snapshot(snapshot_context, &name, false);
}

#[when("the scenario forces snapshot \"{name}\"")]
fn scenario_forces_snapshot(snapshot_context: &SnapshotContext, name: String) {
    store_snapshot(snapshot_context, &name, true);
}

#[then("the scenario proceeds to build the environment")]
fn scenario_proceeds(snapshot_context: &SnapshotContext) {
    assert_eq!(snapshot_context.outcome(), GateOutcome::Gate(RunGate::Proceed));
}

#[then("the scenario is skipped as already built")]
fn scenario_skipped(snapshot_context: &SnapshotContext) {
    assert_eq!(
        snapshot_context.outcome(),
        GateOutcome::Gate(RunGate::AlreadyBuilt)
    );
}

#[then("no revert was requested")]
fn no_revert(snapshot_context: &SnapshotContext) {
    let reverted = snapshot_context
        .environment
        .calls()
        .into_iter()
        .any(|call| matches!(call, EnvironmentCall::Revert(_)));
    assert!(!reverted, "unexpected revert");
}

#[then("the environment was reverted once and resumed")]
fn reverted_once(snapshot_context: &SnapshotContext) {
    let calls = snapshot_context.environment.calls();
    let reverts = calls
        .iter()
        .filter(|call| matches!(call, EnvironmentCall::Revert(_)))
        .count();
    assert_eq!(reverts, 1);
    assert_eq!(calls.last(), Some(&EnvironmentCall::Resume));
}

#[then("the gate reports a \"{operation}\" failure")]
fn gate_reports_failure(snapshot_context: &SnapshotContext, operation: String) {
    assert_eq!(snapshot_context.outcome(), GateOutcome::Failed { operation });
}

#[then("no snapshot was taken")]
fn no_snapshot_taken(snapshot_context: &SnapshotContext) {
    assert_eq!(snapshot_context.outcome(), GateOutcome::Taken(false));
    assert!(snapshot_context.environment.calls().is_empty());
}

#[then("checkpoint \"{name}\" exists")]
fn checkpoint_exists(snapshot_context: &SnapshotContext, name: String) {
    assert_eq!(snapshot_context.outcome(), GateOutcome::Taken(true));
    assert_eq!(snapshot_context.environment.snapshots(), [name]);
}

//! BDD scenarios for the run-once snapshot gate.

use rstest_bdd_macros::scenario;

use super::test_helpers::{SnapshotContext, snapshot_context};

#[scenario(
    path = "tests/features/snapshot_gate.feature",
    name = "Build the environment when no checkpoint exists"
)]
fn scenario_gate_proceeds(snapshot_context: SnapshotContext) {
    drop(snapshot_context);
}

#[scenario(
    path = "tests/features/snapshot_gate.feature",
    name = "Skip setup when the checkpoint exists"
)]
fn scenario_gate_skips(snapshot_context: SnapshotContext) {
    drop(snapshot_context);
}

#[scenario(
    path = "tests/features/snapshot_gate.feature",
    name = "Surface revert failures"
)]
fn scenario_revert_failure(snapshot_context: SnapshotContext) {
    drop(snapshot_context);
}

#[scenario(
    path = "tests/features/snapshot_gate.feature",
    name = "Leave the environment alone when snapshots are disabled"
)]
fn scenario_snapshot_disabled(snapshot_context: SnapshotContext) {
    drop(snapshot_context);
}

#[scenario(
    path = "tests/features/snapshot_gate.feature",
    name = "Store a forced snapshot"
)]
fn scenario_snapshot_forced(snapshot_context: SnapshotContext) {
    drop(snapshot_context);
}

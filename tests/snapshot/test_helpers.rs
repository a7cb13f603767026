//! Shared fixtures for snapshot gate scenarios.

use std::cell::RefCell;

use fuel_harness::RunGate;
use fuel_harness::test_support::ScriptedEnvironment;
use rstest::fixture;

/// What the last `When` step observed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GateOutcome {
    Gate(RunGate),
    Taken(bool),
    Failed { operation: String },
}

#[derive(Debug)]
pub struct SnapshotContext {
    pub environment: ScriptedEnvironment,
    pub outcome: RefCell<Option<GateOutcome>>,
}

impl SnapshotContext {
    pub fn record(&self, outcome: GateOutcome) {
        self.outcome.replace(Some(outcome));
    }

    pub fn outcome(&self) -> GateOutcome {
        self.outcome
            .borrow()
            .clone()
            .unwrap_or_else(|| panic!("no gate outcome was recorded"))
    }
}

#[fixture]
pub fn snapshot_context() -> SnapshotContext {
    SnapshotContext {
        environment: ScriptedEnvironment::new(),
        outcome: RefCell::new(None),
    }
}

pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().unwrap_or_else(|err| panic!("runtime: {err}"))
}

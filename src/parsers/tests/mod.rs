//! Unit tests for the output parsers and their remote probes.

mod net;
mod packages;
mod storage;

use rstest::fixture;

use crate::test_support::ScriptedRemote;

#[fixture]
pub(super) fn remote() -> ScriptedRemote {
    ScriptedRemote::new("10.109.0.3")
}

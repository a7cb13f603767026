//! Unit tests for the timing store and stopwatch.

use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use serde_yaml_ng::{Mapping, Value};
use tempfile::TempDir;

use super::*;

struct Scratch {
    _dir: TempDir,
    store: TimingStore,
}

#[fixture]
fn scratch() -> Scratch {
    let dir = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let path = Utf8PathBuf::from_path_buf(dir.path().join("reports").join("timing.yaml"))
        .unwrap_or_else(|err| panic!("temp path should be utf8: {}", err.display()));
    Scratch {
        _dir: dir,
        store: TimingStore::new(path),
    }
}

fn lookup<'m>(document: &'m Mapping, path: &[&str]) -> Option<&'m Value> {
    let (last, parents) = path.split_last()?;
    let mut node = document;
    for key in parents {
        node = node.get(*key)?.as_mapping()?;
    }
    node.get(*last)
}

#[rstest]
fn missing_document_loads_empty(scratch: Scratch) {
    let document = scratch.store.load().unwrap_or_else(|err| panic!("load: {err}"));

    assert!(document.is_empty());
}

#[rstest]
fn non_unique_updates_append_suffixes(scratch: Scratch) {
    let first = scratch
        .store
        .update(&["testA", "step1"], "3.50", false)
        .unwrap_or_else(|err| panic!("first update: {err}"));
    let second = scratch
        .store
        .update(&["testA", "step1"], "3.50", false)
        .unwrap_or_else(|err| panic!("second update: {err}"));

    assert_eq!(first, "step1_00");
    assert_eq!(second, "step1_01");
    let document = scratch.store.load().unwrap_or_else(|err| panic!("load: {err}"));
    let section = lookup(&document, &["testA"])
        .and_then(Value::as_mapping)
        .unwrap_or_else(|| panic!("testA should be a mapping"));
    assert_eq!(section.len(), 2);
}

#[rstest]
fn unique_updates_overwrite(scratch: Scratch) {
    for value in ["1.00", "2.00"] {
        scratch
            .store
            .update(&["setup"], value, true)
            .unwrap_or_else(|err| panic!("update: {err}"));
    }

    let document = scratch.store.load().unwrap_or_else(|err| panic!("load: {err}"));
    assert_eq!(
        lookup(&document, &["setup"]).and_then(Value::as_str),
        Some("2.00")
    );
}

#[rstest]
fn unrelated_writes_preserve_existing_keys(scratch: Scratch) {
    scratch
        .store
        .update(&["test_foo", "setup"], "12.34", true)
        .unwrap_or_else(|err| panic!("seed: {err}"));
    scratch
        .store
        .update(&["test_foo", "deploy", "controller"], "99.00", true)
        .unwrap_or_else(|err| panic!("seed nested: {err}"));
    let before = scratch.store.load().unwrap_or_else(|err| panic!("load: {err}"));

    scratch
        .store
        .update(&["test_bar", "setup"], "5.01", true)
        .unwrap_or_else(|err| panic!("unrelated: {err}"));

    let after = scratch.store.load().unwrap_or_else(|err| panic!("reload: {err}"));
    assert_eq!(after.get("test_foo"), before.get("test_foo"));
    assert_eq!(
        lookup(&after, &["test_bar", "setup"]).and_then(Value::as_str),
        Some("5.01")
    );
}

#[rstest]
fn scalar_on_path_is_rejected(scratch: Scratch) {
    scratch
        .store
        .update(&["setup"], "1.00", true)
        .unwrap_or_else(|err| panic!("seed: {err}"));

    let err = scratch
        .store
        .update(&["setup", "inner"], "2.00", true)
        .expect_err("scalar cannot hold children");

    assert!(matches!(err, TimingError::InvalidStructure { .. }));
}

#[rstest]
fn empty_path_is_rejected(scratch: Scratch) {
    let path: [&str; 0] = [];

    assert_eq!(
        scratch.store.update(&path, "1.00", true),
        Err(TimingError::EmptyPath)
    );
}

#[rstest]
fn suffixes_run_out_after_one_hundred(scratch: Scratch) {
    for _ in 0..100 {
        scratch
            .store
            .update(&["busy"], "0.01", false)
            .unwrap_or_else(|err| panic!("update: {err}"));
    }

    let err = scratch
        .store
        .update(&["busy"], "0.01", false)
        .expect_err("no suffix left");

    assert!(matches!(err, TimingError::SuffixesExhausted { ref key, .. } if key == "busy"));
}

#[rstest]
fn stopwatch_records_under_test_method(scratch: Scratch) {
    let spent = TimeStat::start(&scratch.store)
        .named("bootstrap")
        .in_test(Some(String::from("deploy_ha")))
        .finish()
        .unwrap_or_else(|err| panic!("finish: {err}"));

    let document = scratch.store.load().unwrap_or_else(|err| panic!("load: {err}"));
    let recorded = lookup(&document, &["deploy_ha", "bootstrap_00"])
        .and_then(Value::as_str)
        .unwrap_or_else(|| panic!("bootstrap_00 should be recorded"));
    assert_eq!(recorded, format!("{:.2}", spent.as_secs_f64()));
}

#[rstest]
fn dropped_stopwatch_records_default_name(scratch: Scratch) {
    {
        let stopwatch = TimeStat::start(&scratch.store);
        assert!(stopwatch.spent_time() < std::time::Duration::from_secs(60));
    }

    let document = scratch.store.load().unwrap_or_else(|err| panic!("load: {err}"));
    assert!(lookup(&document, &["timestat_00"]).is_some());
}

#[rstest]
fn measure_returns_the_operation_outcome(scratch: Scratch) {
    let outcome = measure(&scratch.store, "probe", None, || 42);

    assert_eq!(outcome, 42);
    let document = scratch.store.load().unwrap_or_else(|err| panic!("load: {err}"));
    assert!(lookup(&document, &["probe_00"]).is_some());
}

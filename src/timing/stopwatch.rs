//! Stopwatch guards that record elapsed time into a [`TimingStore`].

use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::{TimingError, TimingStore};

/// Label used when a stopwatch is not named.
pub const DEFAULT_TIMESTAT_NAME: &str = "timestat";

/// Running stopwatch; records on [`TimeStat::finish`] or, failing that, on
/// drop.
///
/// Values are stored under `[test method, name]`, or just `[name]` outside a
/// test, as seconds with two decimals.
#[derive(Debug)]
#[must_use = "a stopwatch records when finished or dropped"]
pub struct TimeStat<'a> {
    store: &'a TimingStore,
    name: String,
    test_method: Option<String>,
    is_uniq: bool,
    started: Instant,
    recorded: bool,
}

impl<'a> TimeStat<'a> {
    /// Starts a stopwatch named [`DEFAULT_TIMESTAT_NAME`].
    pub fn start(store: &'a TimingStore) -> Self {
        Self {
            store,
            name: String::from(DEFAULT_TIMESTAT_NAME),
            test_method: None,
            is_uniq: false,
            started: Instant::now(),
            recorded: false,
        }
    }

    /// Sets the label the time is recorded under.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Nests the record under the given test method.
    pub fn in_test(mut self, test_method: Option<String>) -> Self {
        self.test_method = test_method;
        self
    }

    /// Overwrites an existing record instead of adding a suffixed one.
    pub const fn unique(mut self, is_uniq: bool) -> Self {
        self.is_uniq = is_uniq;
        self
    }

    /// Time elapsed since the stopwatch started.
    #[must_use]
    pub fn spent_time(&self) -> Duration {
        self.started.elapsed()
    }

    /// Stops the stopwatch and records the elapsed time.
    ///
    /// # Errors
    ///
    /// Returns [`TimingError`] when the timing document cannot be updated.
    pub fn finish(mut self) -> Result<Duration, TimingError> {
        self.recorded = true;
        self.record()
    }

    fn record(&self) -> Result<Duration, TimingError> {
        let spent = self.spent_time();
        let value = format!("{:.2}", spent.as_secs_f64());
        let key_path: Vec<&str> = self
            .test_method
            .as_deref()
            .into_iter()
            .chain([self.name.as_str()])
            .collect();
        let key = self.store.update(&key_path, &value, self.is_uniq)?;
        info!(name = %self.name, key = %key, seconds = %value, "time spent");
        Ok(spent)
    }
}

impl Drop for TimeStat<'_> {
    fn drop(&mut self) {
        if self.recorded {
            return;
        }
        self.recorded = true;
        if let Err(err) = self.record() {
            warn!(name = %self.name, error = %err, "failed to record timing statistics");
        }
    }
}

/// Runs `operation` under a stopwatch named `name`.
///
/// The timing is recorded whether or not the operation succeeds; a failure
/// to record is logged and does not mask the operation's outcome.
pub fn measure<T, F>(store: &TimingStore, name: &str, test_method: Option<String>, operation: F) -> T
where
    F: FnOnce() -> T,
{
    let stopwatch = TimeStat::start(store).named(name).in_test(test_method);
    let outcome = operation();
    if let Err(err) = stopwatch.finish() {
        warn!(name, error = %err, "failed to record timing statistics");
    }
    outcome
}

//! Blocking condition polling with an interval and an overall timeout.
//!
//! The predicate is called on the current thread, once straight away and then
//! every `interval` until it yields a value or `timeout` has elapsed since the
//! first call. Nothing here retries on its own behalf: callers decide which
//! failures mean "not ready yet" through [`WaitPolicy::wait_tolerating`].

use std::convert::Infallible;
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

/// Message used when the caller does not supply one.
pub const DEFAULT_WAIT_MESSAGE: &str = "Timeout waiting for condition";

/// Raised when the predicate never yielded a value within the budget.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{message} (waited {elapsed:?})")]
pub struct PollTimeoutError {
    /// Caller message, or [`DEFAULT_WAIT_MESSAGE`].
    pub message: String,
    /// Time spent polling.
    pub elapsed: Duration,
}

/// Failure of a fallible poll.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum WaitError<E> {
    /// The budget ran out.
    #[error(transparent)]
    Timeout(PollTimeoutError),
    /// The predicate failed with a non-transient error.
    #[error("predicate failed: {0}")]
    Predicate(E),
}

/// Interval, timeout and message for a poll loop.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WaitPolicy {
    interval: Duration,
    timeout: Duration,
    message: Option<String>,
}

impl WaitPolicy {
    /// Builds a policy with the default timeout message.
    #[must_use]
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            message: None,
        }
    }

    /// Replaces the timeout message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Pause between predicate calls.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Overall budget measured from the first call.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Polls until `predicate` returns `Some`.
    ///
    /// # Errors
    ///
    /// Returns [`PollTimeoutError`] when the timeout elapses first.
    pub fn wait<T, F>(&self, mut predicate: F) -> Result<T, PollTimeoutError>
    where
        F: FnMut() -> Option<T>,
    {
        self.drive(|| Ok::<_, Infallible>(predicate()), Err)
            .map_err(|err| match err {
                WaitError::Timeout(timeout) => timeout,
                WaitError::Predicate(never) => match never {},
            })
    }

    /// Polls until `predicate` returns `true`.
    ///
    /// # Errors
    ///
    /// Returns [`PollTimeoutError`] when the timeout elapses first.
    pub fn wait_until<F>(&self, mut predicate: F) -> Result<(), PollTimeoutError>
    where
        F: FnMut() -> bool,
    {
        self.wait(|| predicate().then_some(()))
    }

    /// Polls a fallible predicate; any error ends the loop.
    ///
    /// # Errors
    ///
    /// Returns [`WaitError::Predicate`] with the first error and
    /// [`WaitError::Timeout`] when the timeout elapses first.
    pub fn try_wait<T, E, F>(&self, predicate: F) -> Result<T, WaitError<E>>
    where
        F: FnMut() -> Result<Option<T>, E>,
    {
        self.drive(predicate, Err)
    }

    /// Polls a fallible predicate, treating errors accepted by
    /// `is_transient` as "not ready yet".
    ///
    /// The last transient error is appended to the timeout message.
    ///
    /// # Errors
    ///
    /// Returns [`WaitError::Predicate`] for the first non-transient error and
    /// [`WaitError::Timeout`] when the timeout elapses first.
    pub fn wait_tolerating<T, E, F, C>(&self, predicate: F, is_transient: C) -> Result<T, WaitError<E>>
    where
        F: FnMut() -> Result<Option<T>, E>,
        E: fmt::Display,
        C: Fn(&E) -> bool,
    {
        self.drive(predicate, |err| {
            if is_transient(&err) {
                Ok(err.to_string())
            } else {
                Err(err)
            }
        })
    }

    fn drive<T, E, F, C>(&self, mut predicate: F, classify: C) -> Result<T, WaitError<E>>
    where
        F: FnMut() -> Result<Option<T>, E>,
        C: Fn(E) -> Result<String, E>,
    {
        let started = Instant::now();
        let mut last_transient: Option<String> = None;
        loop {
            match predicate() {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(err) => {
                    let note = classify(err).map_err(WaitError::Predicate)?;
                    debug!(error = %note, "transient error while polling");
                    last_transient = Some(note);
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= self.timeout {
                let error = self.timeout_error(elapsed, last_transient.as_deref());
                warn!(elapsed = ?elapsed, "{}", error.message);
                return Err(WaitError::Timeout(error));
            }
            thread::sleep(self.interval);
        }
    }

    fn timeout_error(&self, elapsed: Duration, last_transient: Option<&str>) -> PollTimeoutError {
        let base = self.message.as_deref().unwrap_or(DEFAULT_WAIT_MESSAGE);
        let message = match last_transient {
            Some(note) => format!("{base} (last error: {note})"),
            None => base.to_owned(),
        };
        PollTimeoutError { message, elapsed }
    }
}

/// Polls `predicate` every `interval` until it yields a value or `timeout`
/// elapses.
///
/// ```
/// use std::time::Duration;
/// use fuel_harness::wait::wait;
///
/// let mut calls = 0;
/// let value = wait(
///     || {
///         calls += 1;
///         (calls == 3).then_some(calls)
///     },
///     Duration::from_millis(1),
///     Duration::from_secs(5),
///     None,
/// );
/// assert_eq!(value, Ok(3));
/// ```
///
/// # Errors
///
/// Returns [`PollTimeoutError`] carrying `message` (or the default) when the
/// timeout elapses first.
pub fn wait<T, F>(
    predicate: F,
    interval: Duration,
    timeout: Duration,
    message: Option<&str>,
) -> Result<T, PollTimeoutError>
where
    F: FnMut() -> Option<T>,
{
    let policy = WaitPolicy::new(interval, timeout);
    match message {
        Some(text) => policy.with_message(text).wait(predicate),
        None => policy.wait(predicate),
    }
}

//! Per-call deadlines that abort blocking work with a distinguished error.
//!
//! A [`Deadline`] is a plain value threaded into blocking calls. Several
//! deadlines may be alive at once, on any thread, and an inner deadline
//! created with [`Deadline::nested`] never outlives its parent. [`RunLimit`]
//! is the scoped form: it arms a deadline for the duration of a closure or a
//! future and disarms it when the scope ends.

use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::warn;

/// Default limit applied by [`RunLimit::default`].
pub const DEFAULT_LIMIT: Duration = Duration::from_secs(60);

/// Horizon used when a limit is too large to represent as an instant.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Default message carried by [`TimeoutSignalError`].
pub const DEFAULT_LIMIT_MESSAGE: &str = "Timeout";

/// Raised when a guarded operation is still running once its deadline passes.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{message} (limit {limit:?})")]
pub struct TimeoutSignalError {
    /// Caller supplied message.
    pub message: String,
    /// Limit that was exceeded.
    pub limit: Duration,
}

/// Wall-clock deadline carried into blocking calls.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Deadline {
    expires_at: Instant,
    limit: Duration,
    message: String,
}

impl Deadline {
    /// Builds a deadline that expires `limit` from now.
    ///
    /// A limit past the representable range saturates to a far-future expiry.
    #[must_use]
    pub fn after(limit: Duration, message: impl Into<String>) -> Self {
        let now = Instant::now();
        let expires_at = now
            .checked_add(limit)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        Self {
            expires_at,
            limit,
            message: message.into(),
        }
    }

    /// Returns a deadline bounded by both `self` and a fresh `limit`.
    ///
    /// Whichever expires first wins, together with its message.
    #[must_use]
    pub fn nested(&self, limit: Duration, message: impl Into<String>) -> Self {
        let inner = Self::after(limit, message);
        if inner.expires_at <= self.expires_at {
            inner
        } else {
            self.clone()
        }
    }

    /// Instant at which the deadline expires.
    #[must_use]
    pub const fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Limit the deadline was created with.
    #[must_use]
    pub const fn limit(&self) -> Duration {
        self.limit
    }

    /// Message reported on expiry.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Time left before expiry, zero once expired.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// Returns `true` once the expiry instant has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Fails with [`TimeoutSignalError`] when the deadline has passed.
    ///
    /// # Errors
    ///
    /// Returns [`TimeoutSignalError`] carrying the deadline message once the
    /// expiry instant is reached.
    pub fn check(&self) -> Result<(), TimeoutSignalError> {
        if self.is_expired() {
            return Err(self.to_error());
        }
        Ok(())
    }

    /// Builds the error reported when this deadline expires.
    #[must_use]
    pub fn to_error(&self) -> TimeoutSignalError {
        TimeoutSignalError {
            message: self.message.clone(),
            limit: self.limit,
        }
    }
}

/// Scoped time limit around a blocking closure or a future.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunLimit {
    limit: Duration,
    message: String,
}

impl Default for RunLimit {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, DEFAULT_LIMIT_MESSAGE)
    }
}

impl RunLimit {
    /// Creates a limit with the given duration and expiry message.
    #[must_use]
    pub fn new(limit: Duration, message: impl Into<String>) -> Self {
        Self {
            limit,
            message: message.into(),
        }
    }

    /// Creates a limit from a whole number of seconds.
    #[must_use]
    pub fn from_secs(seconds: u64, message: impl Into<String>) -> Self {
        Self::new(Duration::from_secs(seconds), message)
    }

    /// Configured duration.
    #[must_use]
    pub const fn limit(&self) -> Duration {
        self.limit
    }

    /// Arms a fresh deadline for this limit.
    #[must_use]
    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.limit, self.message.clone())
    }

    /// Runs `operation` with a freshly armed deadline.
    ///
    /// The closure receives the deadline and is expected to hand it to every
    /// blocking call it makes (for example
    /// [`crate::transport::Remote::execute_until`]). The deadline is dropped,
    /// and therefore disarmed, when the closure returns. A closure that
    /// returns successfully after the deadline has passed is still reported as
    /// a timeout so that overruns are never silent.
    ///
    /// # Errors
    ///
    /// Propagates the closure's error, or converts an overrun into `E` via
    /// `From<TimeoutSignalError>`.
    pub fn run<T, E, F>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce(&Deadline) -> Result<T, E>,
        E: From<TimeoutSignalError>,
    {
        let deadline = self.deadline();
        let value = operation(&deadline)?;
        if deadline.is_expired() {
            warn!(
                message = deadline.message(),
                limit_secs = self.limit.as_secs(),
                "guarded operation overran its limit"
            );
            return Err(E::from(deadline.to_error()));
        }
        Ok(value)
    }

    /// Awaits `future`, cancelling it once the limit expires.
    ///
    /// # Errors
    ///
    /// Returns [`TimeoutSignalError`] when the future does not complete in
    /// time. The future is dropped at that point.
    pub async fn run_async<F>(&self, future: F) -> Result<F::Output, TimeoutSignalError>
    where
        F: Future,
    {
        tokio::time::timeout(self.limit, future)
            .await
            .map_err(|_| TimeoutSignalError {
                message: self.message.clone(),
                limit: self.limit,
            })
    }
}

#[cfg(test)]
mod tests;

//! Unit tests for deadlines and run limits.

use std::thread::sleep;
use std::time::Duration;

use rstest::rstest;

use super::*;

#[rstest]
fn fresh_deadline_is_not_expired() {
    let deadline = Deadline::after(Duration::from_secs(30), "later");

    assert!(!deadline.is_expired());
    assert!(deadline.check().is_ok());
    assert!(deadline.remaining() > Duration::from_secs(29));
}

#[rstest]
fn expired_deadline_reports_message_and_limit() {
    let deadline = Deadline::after(Duration::ZERO, "boot took too long");

    let err = deadline
        .check()
        .expect_err("zero-length deadline should be expired");

    assert_eq!(err.message, "boot took too long");
    assert_eq!(err.limit, Duration::ZERO);
    assert_eq!(deadline.remaining(), Duration::ZERO);
}

#[rstest]
fn nested_deadline_keeps_the_earlier_expiry() {
    let outer = Deadline::after(Duration::from_millis(50), "outer");

    let longer = outer.nested(Duration::from_secs(60), "inner");
    let shorter = outer.nested(Duration::from_millis(1), "inner");

    assert_eq!(longer.message(), "outer");
    assert_eq!(shorter.message(), "inner");
    assert!(shorter.expires_at() <= outer.expires_at());
}

#[rstest]
fn independent_deadlines_coexist() {
    let first = Deadline::after(Duration::ZERO, "first");
    let second = Deadline::after(Duration::from_secs(60), "second");

    assert!(first.is_expired());
    assert!(!second.is_expired());
}

#[rstest]
fn run_returns_value_within_limit() {
    let limit = RunLimit::from_secs(5, "quick");

    let value: Result<u8, TimeoutSignalError> = limit.run(|deadline| {
        deadline.check()?;
        Ok(7)
    });

    assert_eq!(value, Ok(7));
}

#[rstest]
fn run_reports_overrun_as_timeout() {
    let limit = RunLimit::new(Duration::from_millis(5), "slow step");

    let result: Result<(), TimeoutSignalError> = limit.run(|_| {
        sleep(Duration::from_millis(20));
        Ok(())
    });

    let err = result.expect_err("overrun should be reported");
    assert_eq!(err.message, "slow step");
}

#[rstest]
fn unrepresentable_limit_never_expires() {
    let limit = RunLimit::from_secs(u64::MAX, "huge");

    let value: Result<u8, TimeoutSignalError> = limit.run(|deadline| {
        assert!(!deadline.is_expired());
        assert!(deadline.remaining() > Duration::from_secs(86_400));
        Ok(1)
    });

    assert_eq!(value, Ok(1));
    assert_eq!(limit.limit(), Duration::from_secs(u64::MAX));
}

#[rstest]
fn nesting_inside_huge_deadline_keeps_inner_expiry() {
    let outer = Deadline::after(Duration::MAX, "outer");

    let inner = outer.nested(Duration::from_secs(5), "inner");

    assert_eq!(inner.message(), "inner");
}

#[rstest]
fn default_limit_is_one_minute() {
    let limit = RunLimit::default();

    assert_eq!(limit.limit(), DEFAULT_LIMIT);
    assert_eq!(limit.deadline().message(), DEFAULT_LIMIT_MESSAGE);
}

#[tokio::test]
async fn run_async_cancels_slow_future() {
    let limit = RunLimit::new(Duration::from_millis(10), "async wait");

    let result = limit
        .run_async(tokio::time::sleep(Duration::from_secs(5)))
        .await;

    let err = result.expect_err("future should be cancelled");
    assert_eq!(err.message, "async wait");
}

#[tokio::test]
async fn run_async_passes_through_output() {
    let limit = RunLimit::from_secs(5, "async wait");

    let result = limit.run_async(async { 42_u32 }).await;

    assert_eq!(result, Ok(42));
}

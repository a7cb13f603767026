//! Process uptime from `ps`.

use std::time::Duration;

use tracing::debug;

use super::{ParseError, ProbeError, parse_number};
use crate::executor::check_call;
use crate::transport::{Remote, quote};

const SECONDS_PER_DAY: u64 = 86_400;
const ELAPSED_CONTEXT: &str = "elapsed time";

/// Converts a `ps -o etime` value into seconds.
///
/// Colon separated fields are weighted by powers of sixty from the right, so
/// any number of fields is accepted. A leading `dd-` day count is honoured.
///
/// ```
/// use fuel_harness::parsers::parse_elapsed;
///
/// assert_eq!(parse_elapsed("01:02:03"), Ok(3723));
/// assert_eq!(parse_elapsed("2-00:00:10"), Ok(172_810));
/// ```
///
/// # Errors
///
/// Returns [`ParseError`] when the value is empty or a field is not numeric.
pub fn parse_elapsed(value: &str) -> Result<u64, ParseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty {
            context: String::from(ELAPSED_CONTEXT),
        });
    }

    let (days, clock) = match trimmed.split_once('-') {
        Some((day_field, clock_field)) => (parse_number(day_field, ELAPSED_CONTEXT)?, clock_field),
        None => (0, trimmed),
    };

    let mut seconds = days.saturating_mul(SECONDS_PER_DAY);
    let mut factor: u64 = 1;
    for field in clock.rsplit(':') {
        let amount = parse_number(field, ELAPSED_CONTEXT)?;
        seconds = seconds.saturating_add(amount.saturating_mul(factor));
        factor = factor.saturating_mul(60);
    }
    Ok(seconds)
}

/// Measures how long the oldest process called `process_name` has run.
///
/// # Errors
///
/// Returns [`ProbeError::NoSuchProcess`] when no process matches, and other
/// [`ProbeError`] variants when `ps` fails or prints garbage.
pub fn get_process_uptime<R>(remote: &R, process_name: &str) -> Result<Duration, ProbeError>
where
    R: Remote + ?Sized,
{
    let lookup = format!(
        "ps hf -opid -C {} | awk '{{print $1; exit}}'",
        quote(process_name)
    );
    let pid = check_call(remote, &lookup)?
        .stdout_lines()
        .find(|line| !line.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| ProbeError::NoSuchProcess(process_name.to_owned()))?;
    let pid_value = parse_number(&pid, "process id")?;

    let etime = check_call(
        remote,
        &format!("ps -p {pid_value} -o etime= | awk '{{print $1}}'"),
    )?;
    let elapsed = etime.stdout_lines().next().unwrap_or_default();
    let seconds = parse_elapsed(elapsed)?;
    debug!(host = remote.host(), process = process_name, pid = pid_value, seconds, "process uptime");
    Ok(Duration::from_secs(seconds))
}

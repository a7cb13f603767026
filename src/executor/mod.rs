//! Single-shot remote command execution with exit-code assertions.
//!
//! Every call is logged with its host, command and exit code whatever the
//! outcome. A code outside the expected set is logged at error level with the
//! full diagnostic payload and, unless the caller opted out, returned as
//! [`ExecError::CommandExecution`]. Commands are never retried here; use
//! [`crate::wait`] for retry semantics.

use std::collections::BTreeSet;
use std::fmt;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{error, info};

use crate::limit::{Deadline, TimeoutSignalError};
use crate::render::LogTree;
use crate::transport::{CommandResult, Remote, TransportError};

/// Set of exit codes a caller accepts as success. Defaults to `{0}`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExpectedExitCodes(BTreeSet<i32>);

impl Default for ExpectedExitCodes {
    fn default() -> Self {
        Self(BTreeSet::from([0]))
    }
}

impl ExpectedExitCodes {
    /// Builds a set from the given codes.
    #[must_use]
    pub fn new(codes: impl IntoIterator<Item = i32>) -> Self {
        Self(codes.into_iter().collect())
    }

    /// Returns `true` when `code` counts as success.
    #[must_use]
    pub fn contains(&self, code: i32) -> bool {
        self.0.contains(&code)
    }

    /// Accepted codes in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<i32> for ExpectedExitCodes {
    fn from_iter<T: IntoIterator<Item = i32>>(iter: T) -> Self {
        Self::new(iter)
    }
}

impl fmt::Display for ExpectedExitCodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.iter().map(|code| code.to_string()).collect();
        f.write_str(&rendered.join(" "))
    }
}

/// Per-call execution options.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecOptions {
    expected: ExpectedExitCodes,
    raise_on_mismatch: bool,
    message: Option<String>,
    deadline: Option<Deadline>,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            expected: ExpectedExitCodes::default(),
            raise_on_mismatch: true,
            message: None,
            deadline: None,
        }
    }
}

impl ExecOptions {
    /// Accepts exactly the given exit codes.
    #[must_use]
    pub fn with_expected(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.expected = ExpectedExitCodes::new(codes);
        self
    }

    /// Chooses whether a mismatch fails the call or is only logged.
    #[must_use]
    pub const fn with_raise_on_mismatch(mut self, raise: bool) -> Self {
        self.raise_on_mismatch = raise;
        self
    }

    /// Replaces the default mismatch message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Aborts the command once `deadline` expires.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Accepted exit codes.
    #[must_use]
    pub const fn expected(&self) -> &ExpectedExitCodes {
        &self.expected
    }
}

/// Diagnostic payload of an unexpected exit code.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandFailure {
    /// Summary line, either caller supplied or generated.
    pub message: String,
    /// Command that was executed.
    pub command: String,
    /// Host the command ran on.
    pub host: String,
    /// Exit code actually produced.
    pub exit_code: i32,
    /// Exit codes that were accepted.
    pub expected: ExpectedExitCodes,
    /// Captured standard output lines.
    pub stdout: Vec<String>,
    /// Captured standard error lines.
    pub stderr: Vec<String>,
}

impl CommandFailure {
    fn new(host: &str, command: &str, result: &CommandResult, options: &ExecOptions) -> Self {
        let message = options.message.clone().unwrap_or_else(|| {
            format!(
                "Unexpected exit_code returned: actual {}, expected {}.",
                result.exit_code(),
                options.expected
            )
        });
        Self {
            message,
            command: command.to_owned(),
            host: host.to_owned(),
            exit_code: result.exit_code(),
            expected: options.expected.clone(),
            stdout: result.stdout().to_vec(),
            stderr: result.stderr().to_vec(),
        }
    }

    /// Structured view used for logging.
    #[must_use]
    pub fn details(&self) -> LogTree {
        LogTree::mapping([
            ("command", LogTree::scalar(&self.command)),
            ("host", LogTree::scalar(&self.host)),
            ("exit_code", LogTree::scalar(self.exit_code)),
            ("expected", LogTree::scalars(self.expected.iter())),
            ("stdout", LogTree::scalars(self.stdout.iter().map(|line| line.trim_end()))),
            ("stderr", LogTree::scalars(self.stderr.iter().map(|line| line.trim_end()))),
        ])
    }
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  Command: '{}'  Details: host={}, exit_code={}, stdout={:?}, stderr={:?}",
            self.message, self.command, self.host, self.exit_code, self.stdout, self.stderr
        )
    }
}

/// Errors raised by the executor.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ExecError {
    /// The command finished with an exit code outside the expected set.
    #[error("{0}")]
    CommandExecution(Box<CommandFailure>),
    /// Standard output could not be decoded as JSON.
    #[error("Unable to deserialize output of command '{command}' on host {host}: {message}")]
    Deserialization {
        /// Command whose output was decoded.
        command: String,
        /// Host the command ran on.
        host: String,
        /// Decoder error.
        message: String,
    },
    /// The command could not be delivered.
    #[error(transparent)]
    Transport(TransportError),
    /// The command was aborted by its deadline.
    #[error(transparent)]
    Timeout(TimeoutSignalError),
}

impl From<TransportError> for ExecError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Deadline(timeout) => Self::Timeout(timeout),
            other => Self::Transport(other),
        }
    }
}

impl From<TimeoutSignalError> for ExecError {
    fn from(err: TimeoutSignalError) -> Self {
        Self::Timeout(err)
    }
}

/// Runs `command` once on `remote` and checks its exit code.
///
/// # Errors
///
/// Returns [`ExecError::CommandExecution`] when the exit code is not expected
/// and the options ask for it, [`ExecError::Timeout`] when the deadline
/// expires, and [`ExecError::Transport`] for delivery failures.
pub fn run_on_remote<R>(
    remote: &R,
    command: &str,
    options: &ExecOptions,
) -> Result<CommandResult, ExecError>
where
    R: Remote + ?Sized,
{
    let host = remote.host();
    let outcome = match options.deadline {
        Some(ref deadline) => remote.execute_until(command, deadline),
        None => remote.execute(command),
    };
    let result = match outcome {
        Ok(result) => result,
        Err(err) => {
            error!(host, command, error = %err, "remote command did not complete");
            return Err(ExecError::from(err));
        }
    };

    info!(
        host,
        command,
        exit_code = result.exit_code(),
        stdout_lines = result.stdout_len(),
        stderr_lines = result.stderr_len(),
        "executed remote command"
    );

    if options.expected.contains(result.exit_code()) {
        return Ok(result);
    }

    let failure = CommandFailure::new(host, command, &result, options);
    error!(
        host,
        command,
        exit_code = result.exit_code(),
        "{}  Command: '{}'  Details:{}",
        failure.message,
        command,
        failure.details().render(2)
    );
    if options.raise_on_mismatch {
        return Err(ExecError::CommandExecution(Box::new(failure)));
    }
    Ok(result)
}

/// Runs `command` and decodes its standard output as JSON.
///
/// # Errors
///
/// Returns [`ExecError::Deserialization`] when the output is not valid JSON
/// for `T`, or any error from [`run_on_remote`].
pub fn run_on_remote_json<R, T>(
    remote: &R,
    command: &str,
    options: &ExecOptions,
) -> Result<T, ExecError>
where
    R: Remote + ?Sized,
    T: DeserializeOwned,
{
    let result = run_on_remote(remote, command, options)?;
    let stdout = result.stdout_str();
    serde_json::from_str(&stdout).map_err(|err| {
        error!(
            host = remote.host(),
            command,
            output = stdout.as_str(),
            "unable to deserialize command output"
        );
        ExecError::Deserialization {
            command: command.to_owned(),
            host: remote.host().to_owned(),
            message: err.to_string(),
        }
    })
}

/// Runs `command` with default options: exit code `0` or fail.
///
/// # Errors
///
/// See [`run_on_remote`].
pub fn check_call<R>(remote: &R, command: &str) -> Result<CommandResult, ExecError>
where
    R: Remote + ?Sized,
{
    run_on_remote(remote, command, &ExecOptions::default())
}

#[cfg(test)]
mod tests;

//! Command results and the runner abstraction used by the SSH transport.

use std::ffi::OsString;
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::warn;

use crate::limit::Deadline;

use super::TransportError;

const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Raw output of a local process.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Result of a command executed on a remote host.
///
/// Lines keep their trailing newline so that joining them reproduces the raw
/// stream. Derived views are computed on demand and never stored.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommandResult {
    exit_code: i32,
    stdout: Vec<String>,
    stderr: Vec<String>,
}

impl CommandResult {
    /// Builds a result from already split line sequences.
    #[must_use]
    pub const fn new(exit_code: i32, stdout: Vec<String>, stderr: Vec<String>) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
        }
    }

    /// Builds a result from raw stream contents, splitting after each newline.
    #[must_use]
    pub fn from_streams(exit_code: i32, stdout: &str, stderr: &str) -> Self {
        Self::new(exit_code, split_lines(stdout), split_lines(stderr))
    }

    /// Exit code returned by the remote command.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Standard output lines.
    #[must_use]
    pub fn stdout(&self) -> &[String] {
        &self.stdout
    }

    /// Standard error lines.
    #[must_use]
    pub fn stderr(&self) -> &[String] {
        &self.stderr
    }

    /// Concatenated standard output.
    #[must_use]
    pub fn stdout_str(&self) -> String {
        self.stdout.concat()
    }

    /// Number of standard output lines.
    #[must_use]
    pub const fn stdout_len(&self) -> usize {
        self.stdout.len()
    }

    /// Concatenated standard error.
    #[must_use]
    pub fn stderr_str(&self) -> String {
        self.stderr.concat()
    }

    /// Number of standard error lines.
    #[must_use]
    pub const fn stderr_len(&self) -> usize {
        self.stderr.len()
    }

    /// Standard output lines with surrounding whitespace removed.
    pub fn stdout_lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.iter().map(|line| line.trim())
    }
}

fn split_lines(stream: &str) -> Vec<String> {
    stream.split_inclusive('\n').map(str::to_owned).collect()
}

/// Abstraction over local process execution to support fakes in tests.
pub trait CommandRunner {
    /// Runs `program` with the given arguments, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Spawn`] if the command cannot be started.
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, TransportError>;

    /// Runs `program`, aborting once `deadline` expires.
    ///
    /// The default implementation checks the deadline before and after a
    /// plain [`CommandRunner::run`]; runners that can interrupt the process
    /// override it.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Deadline`] when the deadline has passed, or
    /// any error from [`CommandRunner::run`].
    fn run_until(
        &self,
        program: &str,
        args: &[OsString],
        deadline: &Deadline,
    ) -> Result<CommandOutput, TransportError> {
        deadline.check()?;
        let output = self.run(program, args)?;
        deadline.check()?;
        Ok(output)
    }
}

/// Real command runner that shells out to the host operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, TransportError> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| TransportError::Spawn {
                program: program.to_owned(),
                message: err.to_string(),
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn run_until(
        &self,
        program: &str,
        args: &[OsString],
        deadline: &Deadline,
    ) -> Result<CommandOutput, TransportError> {
        deadline.check()?;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| TransportError::Spawn {
                program: program.to_owned(),
                message: err.to_string(),
            })?;

        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if deadline.is_expired() => {
                    child.kill().ok();
                    child.wait().ok();
                    warn!(
                        program,
                        message = deadline.message(),
                        "killed command after its deadline expired"
                    );
                    return Err(TransportError::Deadline(deadline.to_error()));
                }
                Ok(None) => thread::sleep(CHILD_POLL_INTERVAL.min(deadline.remaining())),
                Err(err) => {
                    return Err(TransportError::Wait {
                        program: program.to_owned(),
                        message: err.to_string(),
                    });
                }
            }
        };

        Ok(CommandOutput {
            code: status.code(),
            stdout: collect_reader(stdout),
            stderr: collect_reader(stderr),
        })
    }
}

fn spawn_reader<S>(mut stream: S) -> JoinHandle<Vec<u8>>
where
    S: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buffer = Vec::new();
        stream.read_to_end(&mut buffer).ok();
        buffer
    })
}

fn collect_reader(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|reader| reader.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

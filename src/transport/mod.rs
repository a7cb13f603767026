//! Remote command transport over the system `ssh` and `scp` clients.
//!
//! The [`Remote`] trait is the seam every other module talks to. [`SshRemote`]
//! implements it by building client arguments and delegating process
//! execution to a [`CommandRunner`], so tests can script transport output
//! without spawning anything.

use std::ffi::OsString;

use camino::Utf8Path;
use tracing::{debug, warn};

use crate::limit::Deadline;

mod config;
mod registry;
mod types;
mod util;

pub use config::{DEFAULT_SSH_PORT, SshConfig, SshConfigLoadError, TransportError};
pub use registry::{RemoteRegistry, SharedRemote};
pub use types::{CommandOutput, CommandResult, CommandRunner, ProcessCommandRunner};
pub use util::{expand_tilde, quote};

/// Command/response interface to a single remote host.
pub trait Remote {
    /// Host identity used in logs and errors.
    fn host(&self) -> &str;

    /// Executes `command` and returns its exit code and output.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the command cannot be delivered or the
    /// transport loses the exit status.
    fn execute(&self, command: &str) -> Result<CommandResult, TransportError>;

    /// Executes `command`, aborting once `deadline` expires.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Deadline`] when the deadline expires, or any
    /// error from [`Remote::execute`].
    fn execute_until(
        &self,
        command: &str,
        deadline: &Deadline,
    ) -> Result<CommandResult, TransportError> {
        deadline.check()?;
        let result = self.execute(command)?;
        deadline.check()?;
        Ok(result)
    }

    /// Copies a local file or directory to `remote_path`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the copy fails.
    fn upload(&self, local: &Utf8Path, remote_path: &str) -> Result<(), TransportError>;

    /// Copies `remote_path` to `local`, returning whether the copy succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the copy could not be attempted.
    fn download(&self, remote_path: &str, local: &Utf8Path) -> Result<bool, TransportError>;

    /// Returns `true` when `path` is a directory on the remote host.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the check cannot be performed.
    fn isdir(&self, path: &str) -> Result<bool, TransportError>;

    /// Returns `true` when `path` is a regular file on the remote host.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the check cannot be performed.
    fn isfile(&self, path: &str) -> Result<bool, TransportError>;

    /// Creates `path` and any missing parents on the remote host.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the directory cannot be created.
    fn mkdir(&self, path: &str) -> Result<(), TransportError>;
}

/// SSH endpoint of a cluster node.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct RemoteHost {
    /// Address or resolvable host name.
    pub address: String,
    /// SSH port.
    pub port: u16,
}

impl RemoteHost {
    /// Builds a host description.
    #[must_use]
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

/// [`Remote`] implementation driving the host `ssh` and `scp` clients.
#[derive(Clone, Debug)]
pub struct SshRemote<R: CommandRunner> {
    config: SshConfig,
    host: RemoteHost,
    runner: R,
}

impl SshRemote<ProcessCommandRunner> {
    /// Convenience constructor that wires the real process runner.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidConfig`] when validation fails.
    pub fn with_process_runner(config: SshConfig, host: RemoteHost) -> Result<Self, TransportError> {
        Self::new(config, host, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> SshRemote<R> {
    /// Creates a transport for `host` using the provided runner.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidConfig`] when configuration validation
    /// fails.
    pub fn new(config: SshConfig, host: RemoteHost, runner: R) -> Result<Self, TransportError> {
        config.validate()?;
        Ok(Self {
            config,
            host,
            runner,
        })
    }

    /// Returns a reference to the underlying configuration.
    #[must_use]
    pub const fn config(&self) -> &SshConfig {
        &self.config
    }

    /// Returns the endpoint this transport talks to.
    #[must_use]
    pub const fn endpoint(&self) -> &RemoteHost {
        &self.host
    }

    fn build_ssh_args(&self, command: &str) -> Vec<OsString> {
        let mut args = self.common_options("-p");
        args.push(OsString::from(self.login()));
        args.push(OsString::from(command));
        args
    }

    fn build_scp_args(&self, from: String, to: String) -> Vec<OsString> {
        let mut args = self.common_options("-P");
        args.push(OsString::from("-r"));
        args.push(OsString::from(from));
        args.push(OsString::from(to));
        args
    }

    fn common_options(&self, port_flag: &str) -> Vec<OsString> {
        let mut args = vec![
            OsString::from(port_flag),
            OsString::from(self.host.port.to_string()),
        ];

        if let Some(ref identity_file) = self.config.ssh_identity_file {
            args.push(OsString::from("-i"));
            args.push(OsString::from(expand_tilde(identity_file)));
        }

        if self.config.ssh_batch_mode {
            args.push(OsString::from("-o"));
            args.push(OsString::from("BatchMode=yes"));
        }

        if !self.config.ssh_strict_host_key_checking {
            args.push(OsString::from("-o"));
            args.push(OsString::from("StrictHostKeyChecking=no"));
        }

        if !self.config.ssh_known_hosts_file.trim().is_empty() {
            args.push(OsString::from("-o"));
            args.push(OsString::from(format!(
                "UserKnownHostsFile={}",
                self.config.ssh_known_hosts_file
            )));
        }

        args
    }

    fn login(&self) -> String {
        format!("{}@{}", self.config.ssh_user, self.host.address)
    }

    fn to_result(&self, command: &str, output: CommandOutput) -> Result<CommandResult, TransportError> {
        let code = output.code.ok_or_else(|| TransportError::MissingExitCode {
            host: self.host.address.clone(),
            command: command.to_owned(),
        })?;
        Ok(CommandResult::from_streams(code, &output.stdout, &output.stderr))
    }

    fn test_path(&self, flag: &str, path: &str) -> Result<bool, TransportError> {
        let command = format!("test {flag} {}", quote(path));
        let result = self.execute(&command)?;
        match result.exit_code() {
            0 => Ok(true),
            1 => Ok(false),
            code => Err(TransportError::UnexpectedStatus {
                host: self.host.address.clone(),
                command,
                code,
                stderr: result.stderr_str(),
            }),
        }
    }
}

impl<R: CommandRunner> Remote for SshRemote<R> {
    fn host(&self) -> &str {
        &self.host.address
    }

    fn execute(&self, command: &str) -> Result<CommandResult, TransportError> {
        let args = self.build_ssh_args(command);
        let output = self.runner.run(&self.config.ssh_bin, &args)?;
        self.to_result(command, output)
    }

    fn execute_until(
        &self,
        command: &str,
        deadline: &Deadline,
    ) -> Result<CommandResult, TransportError> {
        let args = self.build_ssh_args(command);
        let output = self
            .runner
            .run_until(&self.config.ssh_bin, &args, deadline)?;
        self.to_result(command, output)
    }

    fn upload(&self, local: &Utf8Path, remote_path: &str) -> Result<(), TransportError> {
        let target = format!("{}:{remote_path}", self.login());
        let args = self.build_scp_args(local.to_string(), target);
        let output = self.runner.run(&self.config.scp_bin, &args)?;
        if output.is_success() {
            debug!(host = %self.host.address, %local, remote_path, "uploaded");
            return Ok(());
        }
        Err(TransportError::UnexpectedStatus {
            host: self.host.address.clone(),
            command: format!("{} {local} {remote_path}", self.config.scp_bin),
            code: output.code.unwrap_or(-1),
            stderr: output.stderr,
        })
    }

    fn download(&self, remote_path: &str, local: &Utf8Path) -> Result<bool, TransportError> {
        let source = format!("{}:{remote_path}", self.login());
        let args = self.build_scp_args(source, local.to_string());
        let output = self.runner.run(&self.config.scp_bin, &args)?;
        if !output.is_success() {
            warn!(
                host = %self.host.address,
                remote_path,
                %local,
                stderr = output.stderr.trim(),
                "download failed"
            );
        }
        Ok(output.is_success())
    }

    fn isdir(&self, path: &str) -> Result<bool, TransportError> {
        self.test_path("-d", path)
    }

    fn isfile(&self, path: &str) -> Result<bool, TransportError> {
        self.test_path("-f", path)
    }

    fn mkdir(&self, path: &str) -> Result<(), TransportError> {
        let command = format!("mkdir -p {}", quote(path));
        let result = self.execute(&command)?;
        if result.exit_code() == 0 {
            return Ok(());
        }
        Err(TransportError::UnexpectedStatus {
            host: self.host.address.clone(),
            command,
            code: result.exit_code(),
            stderr: result.stderr_str(),
        })
    }
}

#[cfg(test)]
mod tests;

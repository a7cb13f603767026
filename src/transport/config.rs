//! SSH transport configuration and error types.
//!
//! [`SshConfig`] is loaded via `ortho-config`, which merges defaults,
//! configuration files and environment variables (prefix `FUEL_SSH_`).

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::limit::TimeoutSignalError;

/// Default SSH port for cluster nodes.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// SSH and SCP client settings.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "FUEL_SSH",
    discovery(
        app_name = "fuel-harness",
        env_var = "FUEL_HARNESS_CONFIG_PATH",
        config_file_name = "fuel-harness.toml",
        dotfile_name = ".fuel-harness.toml",
        project_file_name = "fuel-harness.toml"
    )
)]
pub struct SshConfig {
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Path to the `scp` executable.
    #[ortho_config(default = "scp".to_owned())]
    pub scp_bin: String,
    /// Remote user to connect as.
    #[ortho_config(default = "root".to_owned())]
    pub ssh_user: String,
    /// Port used when a host does not specify one.
    #[ortho_config(default = DEFAULT_SSH_PORT)]
    pub ssh_port: u16,
    /// Whether to force batch mode so SSH never prompts for passwords.
    #[ortho_config(default = true)]
    pub ssh_batch_mode: bool,
    /// Whether to enforce host key checking. Lab nodes are rebuilt from
    /// snapshots, so the default disables it.
    #[ortho_config(default = false)]
    pub ssh_strict_host_key_checking: bool,
    /// Known hosts file override; defaults to `/dev/null`.
    #[ortho_config(default = "/dev/null".to_owned())]
    pub ssh_known_hosts_file: String,
    /// Private key used for authentication. Supports `~/` expansion. When
    /// absent the SSH client falls back to its default key locations.
    pub ssh_identity_file: Option<String>,
}

/// Errors raised when loading the SSH configuration from layered sources.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SshConfigLoadError {
    /// Parsing or merging configuration layers failed.
    #[error("ssh configuration parsing failed: {0}")]
    Parse(String),
}

impl SshConfig {
    /// Ensures configuration values are present after trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidConfig`] when any required field is
    /// empty or the port is zero.
    pub fn validate(&self) -> Result<(), TransportError> {
        Self::require_value(&self.ssh_bin, "ssh_bin")?;
        Self::require_value(&self.scp_bin, "scp_bin")?;
        Self::require_value(&self.ssh_user, "ssh_user")?;
        Self::require_optional_value(self.ssh_identity_file.as_deref(), "ssh_identity_file")?;
        if self.ssh_port == 0 {
            return Err(TransportError::InvalidConfig {
                field: String::from("ssh_port"),
            });
        }
        Ok(())
    }

    /// Loads configuration from defaults, configuration files and environment
    /// variables without consulting the process arguments.
    ///
    /// # Errors
    ///
    /// Returns [`SshConfigLoadError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, SshConfigLoadError> {
        Self::load_from_iter([std::ffi::OsString::from("fuel-harness")])
            .map_err(|err| SshConfigLoadError::Parse(err.to_string()))
    }

    fn require_optional_value(value: Option<&str>, field: &str) -> Result<(), TransportError> {
        match value {
            None => Ok(()),
            Some(v) if !v.trim().is_empty() => Ok(()),
            Some(_) => Err(TransportError::InvalidConfig {
                field: field.to_owned(),
            }),
        }
    }

    fn require_value(value: &str, field: &str) -> Result<(), TransportError> {
        Self::require_optional_value(Some(value), field)
    }
}

/// Errors surfaced by the remote transport.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TransportError {
    /// Configuration is missing a required value. The message explains how to
    /// provide it.
    #[error("missing {field}: set FUEL_SSH_{env_suffix} or add {field} to fuel-harness.toml", env_suffix = field.to_uppercase())]
    InvalidConfig {
        /// Configuration field that failed validation.
        field: String,
    },
    /// A local process could not be started.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Waiting on a running local process failed.
    #[error("failed to wait for {program}: {message}")]
    Wait {
        /// Program being waited on.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// The transport terminated without reporting an exit status.
    #[error("command on {host} terminated without an exit status: {command}")]
    MissingExitCode {
        /// Host the command was sent to.
        host: String,
        /// Command that was executed.
        command: String,
    },
    /// A transport helper command returned an exit status it does not
    /// understand.
    #[error("{command} on {host} exited with status {code}: {stderr}")]
    UnexpectedStatus {
        /// Host the command was sent to.
        host: String,
        /// Command that was executed.
        command: String,
        /// Exit status returned.
        code: i32,
        /// Captured standard error.
        stderr: String,
    },
    /// The call was aborted because its deadline expired.
    #[error(transparent)]
    Deadline(#[from] TimeoutSignalError),
}

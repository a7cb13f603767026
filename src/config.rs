//! Harness configuration loading via `ortho-config`.

use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::limit::{DEFAULT_LIMIT_MESSAGE, RunLimit};
use crate::wait::WaitPolicy;

/// Settings shared by every scenario of a run, derived from defaults,
/// configuration files, environment variables (prefix `FUEL_HARNESS_`) and
/// CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "FUEL_HARNESS",
    discovery(
        app_name = "fuel-harness",
        env_var = "FUEL_HARNESS_CONFIG_PATH",
        config_file_name = "fuel-harness.toml",
        dotfile_name = ".fuel-harness.toml",
        project_file_name = "fuel-harness.toml"
    )
)]
pub struct HarnessConfig {
    /// YAML document timing statistics are written to.
    #[ortho_config(default = "logs/timestat.yaml".to_owned())]
    pub timing_path: String,
    /// Local directory diagnostic archives and inventories are saved in.
    #[ortho_config(default = "logs".to_owned())]
    pub logs_dir: String,
    /// Whether scenarios store snapshots when they finish.
    #[ortho_config(default = false)]
    pub make_snapshot: bool,
    /// Seconds between two polls of a remote condition.
    #[ortho_config(default = 5)]
    pub poll_interval_secs: u64,
    /// Seconds a poll may run before giving up.
    #[ortho_config(default = 60)]
    pub poll_timeout_secs: u64,
    /// Seconds a guarded remote command may run.
    #[ortho_config(default = 60)]
    pub command_timeout_secs: u64,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to fuel-harness.toml",
            self.description, self.env_var, self.toml_key
        ))
    }
}

impl HarnessConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(metadata.missing());
        }
        Ok(())
    }

    fn require_positive(value: u64, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(metadata.missing());
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("fuel-harness")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and file key that provide the value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a path is empty or a
    /// duration is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.timing_path,
            &FieldMetadata::new(
                "timing statistics path",
                "FUEL_HARNESS_TIMING_PATH",
                "timing_path",
            ),
        )?;
        Self::require_field(
            &self.logs_dir,
            &FieldMetadata::new("logs directory", "FUEL_HARNESS_LOGS_DIR", "logs_dir"),
        )?;
        Self::require_positive(
            self.poll_interval_secs,
            &FieldMetadata::new(
                "poll interval",
                "FUEL_HARNESS_POLL_INTERVAL_SECS",
                "poll_interval_secs",
            ),
        )?;
        Self::require_positive(
            self.command_timeout_secs,
            &FieldMetadata::new(
                "command timeout",
                "FUEL_HARNESS_COMMAND_TIMEOUT_SECS",
                "command_timeout_secs",
            ),
        )?;
        Ok(())
    }

    /// Location of the timing document.
    #[must_use]
    pub fn timing_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(self.timing_path.trim())
    }

    /// Directory for diagnostic artefacts.
    #[must_use]
    pub fn logs_dir(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(self.logs_dir.trim())
    }

    /// Poll policy built from the configured interval and timeout.
    #[must_use]
    pub const fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy::new(
            Duration::from_secs(self.poll_interval_secs),
            Duration::from_secs(self.poll_timeout_secs),
        )
    }

    /// Scoped limit for guarded remote commands.
    #[must_use]
    pub fn run_limit(&self) -> RunLimit {
        RunLimit::from_secs(self.command_timeout_secs, DEFAULT_LIMIT_MESSAGE)
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

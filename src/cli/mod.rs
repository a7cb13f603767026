//! Command-line interface definitions for the `fuel-harness` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page. It
//! must only depend on `clap`.

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Top-level CLI for the `fuel-harness` binary.
#[derive(Debug, Parser)]
#[command(
    name = "fuel-harness",
    about = "Drive, probe and time Fuel lab nodes over SSH",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long, global = true)]
    pub(crate) verbose: bool,
    /// Subcommand to run.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Subcommands of `fuel-harness`.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Run a command on a node and check its exit code.
    #[command(name = "exec", about = "Run a command on a node and check its exit code")]
    Exec(ExecCommand),
    /// Parse the state of a node into structured output.
    #[command(name = "probe", about = "Parse the state of a node into structured output")]
    Probe(ProbeCommand),
    /// Inspect or extend the timing statistics document.
    #[command(name = "timing", about = "Inspect or extend the timing statistics document")]
    Timing(TimingCommand),
}

/// Connection flags shared by every remote subcommand.
#[derive(Debug, Args)]
pub(crate) struct Target {
    /// Address of the node.
    pub(crate) host: String,
    /// SSH port; defaults to the configured port.
    #[arg(long, value_name = "PORT")]
    pub(crate) port: Option<u16>,
}

/// Arguments for `fuel-harness exec`.
#[derive(Debug, Args)]
pub(crate) struct ExecCommand {
    /// Node to run on.
    #[command(flatten)]
    pub(crate) target: Target,
    /// Accepted exit codes, comma separated.
    #[arg(long, value_name = "CODES", value_delimiter = ',', default_value = "0")]
    pub(crate) expect: Vec<i32>,
    /// Decode standard output as JSON and print it pretty.
    #[arg(long)]
    pub(crate) json: bool,
    /// Abort the command after this many seconds.
    #[arg(long, value_name = "SECONDS")]
    pub(crate) timeout: Option<u64>,
    /// Command to execute on the node (use -- to separate flags).
    #[arg(required = true, trailing_var_arg = true)]
    pub(crate) command: Vec<String>,
}

/// Arguments for `fuel-harness probe`.
#[derive(Debug, Args)]
pub(crate) struct ProbeCommand {
    /// Node to probe.
    #[command(flatten)]
    pub(crate) target: Target,
    /// What to collect.
    #[command(subcommand)]
    pub(crate) probe: Probe,
}

/// Probes available on a node.
#[derive(Debug, Subcommand)]
pub(crate) enum Probe {
    /// Network interfaces with their kind, addresses and members.
    Net {
        /// Regex of interface names to leave out; repeatable.
        #[arg(long, value_name = "REGEX")]
        skip: Vec<String>,
    },
    /// Sockets in the listening state.
    Listen {
        /// Socket table to read.
        #[arg(value_enum, default_value_t = ProtocolArg::Tcp)]
        protocol: ProtocolArg,
    },
    /// Memory and swap usage.
    Memory {
        /// Unit of the reported figures.
        #[arg(long, value_enum, default_value_t = UnitArg::Mb)]
        unit: UnitArg,
    },
    /// Uptime of the oldest process with the given name.
    Uptime {
        /// Process name as shown by `ps`.
        process: String,
    },
    /// Number of NUMA nodes.
    Numa,
    /// Installed packages.
    Packages {
        /// Package manager to query.
        #[arg(long, value_enum, default_value_t = ManagerArg::Rpm)]
        manager: ManagerArg,
    },
    /// Size of a remote file in bytes.
    FileSize {
        /// Remote path.
        path: String,
    },
}

/// Socket tables understood by `probe listen`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum ProtocolArg {
    /// `/proc/net/tcp`
    Tcp,
    /// `/proc/net/udp`
    Udp,
}

/// Units understood by `probe memory`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum UnitArg {
    /// Kilobytes.
    Kb,
    /// Megabytes.
    Mb,
    /// Gigabytes.
    Gb,
}

/// Package managers understood by `probe packages`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum ManagerArg {
    /// `rpm -qa`
    Rpm,
    /// `dpkg-query -W`
    Dpkg,
}

/// Arguments for `fuel-harness timing`.
#[derive(Debug, Args)]
pub(crate) struct TimingCommand {
    /// Timing action.
    #[command(subcommand)]
    pub(crate) action: TimingAction,
}

/// Actions on the timing document.
#[derive(Debug, Subcommand)]
pub(crate) enum TimingAction {
    /// Print the timing document.
    Show,
    /// Run a command on a node and record how long it took.
    Measure(MeasureCommand),
}

/// Arguments for `fuel-harness timing measure`.
#[derive(Debug, Args)]
pub(crate) struct MeasureCommand {
    /// Label the time is recorded under.
    #[arg(long, value_name = "NAME")]
    pub(crate) name: String,
    /// Test method the record is nested under.
    #[arg(long, value_name = "TEST")]
    pub(crate) test: Option<String>,
    /// Overwrite an existing record instead of adding a suffixed one.
    #[arg(long)]
    pub(crate) unique: bool,
    /// Node to run on.
    #[command(flatten)]
    pub(crate) target: Target,
    /// Command to execute on the node (use -- to separate flags).
    #[arg(required = true, trailing_var_arg = true)]
    pub(crate) command: Vec<String>,
}

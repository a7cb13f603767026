//! Binary entry point for the `fuel-harness` CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use serde::Serialize;
use shell_escape::unix::escape;
use thiserror::Error;
use tracing::debug;

use fuel_harness::config::{ConfigError, HarnessConfig};
use fuel_harness::executor::{ExecError, ExecOptions, run_on_remote, run_on_remote_json};
use fuel_harness::limit::{DEFAULT_LIMIT_MESSAGE, RunLimit};
use fuel_harness::logging::init_logging;
use fuel_harness::parsers::{
    ListenProto, MemoryUnit, PackageManager, ProbeError, SkipPatterns, get_file_size,
    get_ip_listen_stats, get_net_settings, get_node_packages, get_process_uptime,
    get_quantity_of_numa, node_freemem,
};
use fuel_harness::timing::{TimeStat, TimingError, TimingStore};
use fuel_harness::transport::{
    ProcessCommandRunner, RemoteHost, SshConfig, SshRemote, TransportError,
};

mod cli;

use cli::{
    Cli, Command, ExecCommand, ManagerArg, MeasureCommand, Probe, ProbeCommand, ProtocolArg,
    Target, TimingAction, UnitArg,
};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error(transparent)]
    Timing(#[from] TimingError),
    #[error("invalid command argument: {0}")]
    InvalidCommand(String),
    #[error("invalid interface pattern: {0}")]
    InvalidPattern(String),
    #[error("unable to render output: {0}")]
    Output(String),
    #[error("worker task failed: {0}")]
    Join(String),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if !init_logging(cli.verbose) {
        writeln!(io::stderr(), "logging was already initialised").ok();
    }

    let outcome = tokio::task::spawn_blocking(move || dispatch(cli))
        .await
        .unwrap_or_else(|err| Err(CliError::Join(err.to_string())));
    let exit_code = match outcome {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn dispatch(cli: Cli) -> Result<i32, CliError> {
    match cli.command {
        Command::Exec(command) => exec(&command),
        Command::Probe(command) => probe(&command),
        Command::Timing(command) => match command.action {
            TimingAction::Show => show_timings(),
            TimingAction::Measure(measure) => measure_command(&measure),
        },
    }
}

fn load_harness_config() -> Result<HarnessConfig, CliError> {
    let config = HarnessConfig::load_without_cli_args()?;
    config.validate()?;
    Ok(config)
}

fn connect(target: &Target) -> Result<SshRemote<ProcessCommandRunner>, CliError> {
    let config =
        SshConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    let port = target.port.unwrap_or(config.ssh_port);
    debug!(host = %target.host, port, "connecting");
    Ok(SshRemote::with_process_runner(
        config,
        RemoteHost::new(target.host.clone(), port),
    )?)
}

fn exec(args: &ExecCommand) -> Result<i32, CliError> {
    validate_command_args(&args.command)?;
    let command = render_remote_command(&args.command);
    let limit = match args.timeout {
        Some(seconds) => RunLimit::from_secs(seconds, DEFAULT_LIMIT_MESSAGE),
        None => load_harness_config()?.run_limit(),
    };
    let remote = connect(&args.target)?;

    if args.json {
        let value: serde_json::Value = limit.run(|deadline| {
            let options = ExecOptions::default()
                .with_expected(args.expect.iter().copied())
                .with_deadline(deadline.clone());
            run_on_remote_json(&remote, &command, &options)
        })?;
        emit_json(&value)?;
        return Ok(0);
    }

    let result = limit.run(|deadline| {
        let options = ExecOptions::default()
            .with_expected(args.expect.iter().copied())
            .with_deadline(deadline.clone());
        run_on_remote(&remote, &command, &options)
    })?;
    write!(io::stdout(), "{}", result.stdout_str()).ok();
    write!(io::stderr(), "{}", result.stderr_str()).ok();
    Ok(result.exit_code())
}

fn probe(args: &ProbeCommand) -> Result<i32, CliError> {
    let remote = connect(&args.target)?;
    match args.probe {
        Probe::Net { ref skip } => {
            let patterns =
                SkipPatterns::new(skip).map_err(|err| CliError::InvalidPattern(err.to_string()))?;
            emit_json(&get_net_settings(&remote, &patterns)?)?;
        }
        Probe::Listen { protocol } => {
            let proto = match protocol {
                ProtocolArg::Tcp => ListenProto::Tcp,
                ProtocolArg::Udp => ListenProto::Udp,
            };
            emit_json(&get_ip_listen_stats(&remote, proto)?)?;
        }
        Probe::Memory { unit } => {
            let selected = match unit {
                UnitArg::Kb => MemoryUnit::Kb,
                UnitArg::Mb => MemoryUnit::Mb,
                UnitArg::Gb => MemoryUnit::Gb,
            };
            emit_json(&node_freemem(&remote, selected)?)?;
        }
        Probe::Uptime { ref process } => {
            let uptime = get_process_uptime(&remote, process)?;
            emit_json(&serde_json::json!({
                "process": process,
                "seconds": uptime.as_secs(),
            }))?;
        }
        Probe::Numa => {
            let count = get_quantity_of_numa(&remote)?;
            emit_json(&serde_json::json!({
                "nodes": count.raw,
                "reported_by_fuel": count.as_reported_by_fuel(),
            }))?;
        }
        Probe::Packages { manager } => {
            let selected = match manager {
                ManagerArg::Rpm => PackageManager::Rpm,
                ManagerArg::Dpkg => PackageManager::Dpkg,
            };
            emit_json(&get_node_packages(&remote, selected)?)?;
        }
        Probe::FileSize { ref path } => {
            let size = get_file_size(&remote, path)?;
            emit_json(&serde_json::json!({ "path": path, "bytes": size }))?;
        }
    }
    Ok(0)
}

fn show_timings() -> Result<i32, CliError> {
    let config = load_harness_config()?;
    let store = TimingStore::new(config.timing_path());
    let document = store.load()?;
    let rendered =
        serde_yaml_ng::to_string(&document).map_err(|err| CliError::Output(err.to_string()))?;
    write!(io::stdout(), "{rendered}").ok();
    Ok(0)
}

fn measure_command(args: &MeasureCommand) -> Result<i32, CliError> {
    validate_command_args(&args.command)?;
    let command = render_remote_command(&args.command);
    let config = load_harness_config()?;
    let store = TimingStore::new(config.timing_path());
    let remote = connect(&args.target)?;

    let stopwatch = TimeStat::start(&store)
        .named(args.name.as_str())
        .in_test(args.test.clone())
        .unique(args.unique);
    let result = config.run_limit().run(|deadline| {
        let options = ExecOptions::default().with_deadline(deadline.clone());
        run_on_remote(&remote, &command, &options)
    })?;
    let spent = stopwatch.finish()?;
    writeln!(io::stdout(), "{}: {:.2}s", args.name, spent.as_secs_f64()).ok();
    Ok(result.exit_code())
}

fn emit_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|err| CliError::Output(err.to_string()))?;
    writeln!(io::stdout(), "{rendered}").ok();
    Ok(())
}

fn render_remote_command(args: &[String]) -> String {
    let escaped: Vec<String> = args
        .iter()
        .map(|arg| escape(arg.as_str().into()).into_owned())
        .collect();
    escaped.join(" ")
}

fn validate_command_args(args: &[String]) -> Result<(), CliError> {
    for arg in args {
        if arg
            .chars()
            .any(|ch| matches!(ch, '\u{0000}'..='\u{001F}' | '\u{007F}'))
        {
            return Err(CliError::InvalidCommand(String::from(concat!(
                "command arguments must not contain control characters (ASCII ",
                "0x00-0x1F or 0x7F, e.g. newline, carriage return, tab, NUL)"
            ))));
        }
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;

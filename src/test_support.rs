//! Test support utilities shared across unit and integration tests.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::env;
use std::ffi::OsString;
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

use crate::backend::{BackendFuture, EnvironmentBackend};
use crate::transport::{CommandOutput, CommandResult, CommandRunner, Remote, TransportError};

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic transport outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Rc<RefCell<VecDeque<CommandOutput>>>,
    invocations: Rc<RefCell<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.borrow().clone()
    }

    /// Pushes a successful exit status with empty output.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a specific exit code with empty output.
    pub fn push_exit_code(&self, code: i32) {
        self.push_output(Some(code), "", "");
    }

    /// Pushes a response with no exit code to simulate a killed client.
    pub fn push_missing_exit_code(&self) {
        self.push_output(None, "", "");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.responses.borrow_mut().push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, TransportError> {
        self.invocations.borrow_mut().push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
        });
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| TransportError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

/// In-memory [`Remote`] with scripted command results.
///
/// Results registered with [`ScriptedRemote::respond`] answer every
/// execution of that exact command; anything else is served from a FIFO
/// queue filled by [`ScriptedRemote::push_result`].
#[derive(Clone, Debug)]
pub struct ScriptedRemote {
    host: String,
    state: Arc<Mutex<RemoteState>>,
}

#[derive(Debug)]
struct RemoteState {
    fixed: HashMap<String, CommandResult>,
    queued: VecDeque<CommandResult>,
    commands: Vec<String>,
    uploads: Vec<(Utf8PathBuf, String)>,
    downloads: Vec<(String, Utf8PathBuf)>,
    directories: BTreeSet<String>,
    created: Vec<String>,
    download_succeeds: bool,
}

impl ScriptedRemote {
    /// Creates a remote identified by `host` with no scripted responses.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            state: Arc::new(Mutex::new(RemoteState {
                fixed: HashMap::new(),
                queued: VecDeque::new(),
                commands: Vec::new(),
                uploads: Vec::new(),
                downloads: Vec::new(),
                directories: BTreeSet::new(),
                created: Vec::new(),
                download_succeeds: true,
            })),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut RemoteState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Answers every execution of `command` with the given output.
    pub fn respond(&self, command: &str, exit_code: i32, stdout: &str) {
        self.respond_with(command, CommandResult::from_streams(exit_code, stdout, ""));
    }

    /// Answers every execution of `command` with `result`.
    pub fn respond_with(&self, command: &str, result: CommandResult) {
        self.with_state(|state| state.fixed.insert(command.to_owned(), result));
    }

    /// Queues a result for the next unmatched command.
    pub fn push_result(&self, exit_code: i32, stdout: &str, stderr: &str) {
        self.with_state(|state| {
            state
                .queued
                .push_back(CommandResult::from_streams(exit_code, stdout, stderr));
        });
    }

    /// Marks `path` as an existing remote directory.
    pub fn add_dir(&self, path: &str) {
        self.with_state(|state| state.directories.insert(path.to_owned()));
    }

    /// Makes subsequent downloads report failure.
    pub fn fail_downloads(&self) {
        self.with_state(|state| state.download_succeeds = false);
    }

    /// Commands executed so far, in order.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.with_state(|state| state.commands.clone())
    }

    /// Uploads performed so far as `(local, remote)` pairs.
    #[must_use]
    pub fn uploads(&self) -> Vec<(Utf8PathBuf, String)> {
        self.with_state(|state| state.uploads.clone())
    }

    /// Downloads attempted so far as `(remote, local)` pairs.
    #[must_use]
    pub fn downloads(&self) -> Vec<(String, Utf8PathBuf)> {
        self.with_state(|state| state.downloads.clone())
    }

    /// Directories created through [`Remote::mkdir`].
    #[must_use]
    pub fn created_dirs(&self) -> Vec<String> {
        self.with_state(|state| state.created.clone())
    }
}

impl Remote for ScriptedRemote {
    fn host(&self) -> &str {
        &self.host
    }

    fn execute(&self, command: &str) -> Result<CommandResult, TransportError> {
        self.with_state(|state| {
            state.commands.push(command.to_owned());
            if let Some(result) = state.fixed.get(command) {
                return Ok(result.clone());
            }
            state
                .queued
                .pop_front()
                .ok_or_else(|| TransportError::Spawn {
                    program: String::from("ssh"),
                    message: format!("no scripted response for `{command}`"),
                })
        })
    }

    fn upload(&self, local: &Utf8Path, remote_path: &str) -> Result<(), TransportError> {
        self.with_state(|state| {
            state
                .uploads
                .push((local.to_path_buf(), remote_path.to_owned()));
        });
        Ok(())
    }

    fn download(&self, remote_path: &str, local: &Utf8Path) -> Result<bool, TransportError> {
        Ok(self.with_state(|state| {
            state
                .downloads
                .push((remote_path.to_owned(), local.to_path_buf()));
            state.download_succeeds
        }))
    }

    fn isdir(&self, path: &str) -> Result<bool, TransportError> {
        Ok(self.with_state(|state| state.directories.contains(path)))
    }

    // Uploaded paths count as files.
    fn isfile(&self, path: &str) -> Result<bool, TransportError> {
        Ok(self.with_state(|state| state.uploads.iter().any(|(_, remote)| remote == path)))
    }

    fn mkdir(&self, path: &str) -> Result<(), TransportError> {
        self.with_state(|state| {
            state.created.push(path.to_owned());
            state.directories.insert(path.to_owned());
        });
        Ok(())
    }
}

/// Errors raised by [`ScriptedEnvironment`] when a failure is injected.
#[derive(Clone, Debug, thiserror::Error, Eq, PartialEq)]
#[error("scripted environment failure: {0}")]
pub struct ScriptedEnvironmentError(pub String);

/// Calls recorded by [`ScriptedEnvironment`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EnvironmentCall {
    /// `start`
    Start,
    /// `destroy`
    Destroy,
    /// `suspend`
    Suspend,
    /// `resume`
    Resume,
    /// `snapshot(name, description)`
    Snapshot(String, String),
    /// `revert(name)`
    Revert(String),
    /// `has_snapshot(name)`
    HasSnapshot(String),
}

/// In-memory environment backend tracking snapshots and calls.
#[derive(Clone, Debug, Default)]
pub struct ScriptedEnvironment {
    state: Arc<Mutex<EnvironmentState>>,
}

#[derive(Debug, Default)]
struct EnvironmentState {
    snapshots: BTreeSet<String>,
    calls: Vec<EnvironmentCall>,
    fail_revert: bool,
}

impl ScriptedEnvironment {
    /// Creates an environment without snapshots.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut EnvironmentState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Seeds an existing snapshot.
    pub fn add_snapshot(&self, name: &str) {
        self.with_state(|state| state.snapshots.insert(name.to_owned()));
    }

    /// Makes subsequent reverts fail.
    pub fn fail_revert(&self) {
        self.with_state(|state| state.fail_revert = true);
    }

    /// Calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<EnvironmentCall> {
        self.with_state(|state| state.calls.clone())
    }

    /// Number of recorded calls equal to `call`.
    #[must_use]
    pub fn count(&self, call: &EnvironmentCall) -> usize {
        self.with_state(|state| state.calls.iter().filter(|seen| *seen == call).count())
    }

    /// Names of the snapshots currently stored.
    #[must_use]
    pub fn snapshots(&self) -> Vec<String> {
        self.with_state(|state| state.snapshots.iter().cloned().collect())
    }

    fn record(&self, call: EnvironmentCall) -> Result<(), ScriptedEnvironmentError> {
        self.with_state(|state| {
            let outcome = match call {
                EnvironmentCall::Snapshot(ref name, _) => {
                    state.snapshots.insert(name.clone());
                    Ok(())
                }
                EnvironmentCall::Revert(ref name) if state.fail_revert => {
                    Err(ScriptedEnvironmentError(format!("revert {name}")))
                }
                _ => Ok(()),
            };
            state.calls.push(call);
            outcome
        })
    }
}

impl EnvironmentBackend for ScriptedEnvironment {
    type Error = ScriptedEnvironmentError;

    fn start(&self) -> BackendFuture<'_, (), Self::Error> {
        Box::pin(async move { self.record(EnvironmentCall::Start) })
    }

    fn destroy(&self) -> BackendFuture<'_, (), Self::Error> {
        Box::pin(async move { self.record(EnvironmentCall::Destroy) })
    }

    fn suspend(&self) -> BackendFuture<'_, (), Self::Error> {
        Box::pin(async move { self.record(EnvironmentCall::Suspend) })
    }

    fn resume(&self) -> BackendFuture<'_, (), Self::Error> {
        Box::pin(async move { self.record(EnvironmentCall::Resume) })
    }

    fn snapshot<'a>(
        &'a self,
        name: &'a str,
        description: &'a str,
    ) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.record(EnvironmentCall::Snapshot(
                name.to_owned(),
                description.to_owned(),
            ))
        })
    }

    fn revert<'a>(&'a self, name: &'a str) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move { self.record(EnvironmentCall::Revert(name.to_owned())) })
    }

    fn has_snapshot<'a>(&'a self, name: &'a str) -> BackendFuture<'a, bool, Self::Error> {
        Box::pin(async move {
            self.record(EnvironmentCall::HasSnapshot(name.to_owned()))?;
            Ok(self.with_state(|state| state.snapshots.contains(name)))
        })
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}

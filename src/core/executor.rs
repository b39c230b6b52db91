//! Command execution module.
//!
//! Runs code block content in a `bash` subshell with a merged environment and
//! captures its output. Commands can run blocking on the caller's thread or in
//! a background thread that reports completion over a channel.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command as ProcessCommand, Stdio};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use super::env_state::EnvState;
use crate::error::EngineError;

/// Captured output of a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// A command that failed, with whatever output it produced.
#[derive(Debug)]
pub struct CommandFailure {
    pub output: CommandOutput,
    pub error: EngineError,
}

/// Outcome of one command invocation.
pub type CommandResult = Result<CommandOutput, CommandFailure>;

/// How the child process is attached to the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StdioMode {
    /// Capture stdout and stderr.
    #[default]
    Capture,
    /// Hand the terminal to the child. Nothing is captured.
    Inherit,
}

/// Command executor.
#[derive(Debug, Clone)]
pub struct Executor {
    /// State file shared between invocations
    pub state: EnvState,

    /// Whether to pass the caller's environment to the child
    pub inherit_environment: bool,

    /// Whether to append each command to `~/.bash_history`
    pub write_history: bool,

    /// Directory commands run in
    pub working_dir: Option<PathBuf>,
}

impl Default for Executor {
    fn default() -> Self {
        Self {
            state: EnvState::default(),
            inherit_environment: true,
            write_history: false,
            working_dir: None,
        }
    }
}

impl Executor {
    /// Create a new executor.
    pub fn new(state: EnvState) -> Self {
        Self { state, ..Self::default() }
    }

    #[must_use]
    pub fn inherit_environment(mut self, inherit: bool) -> Self {
        self.inherit_environment = inherit;
        self
    }

    #[must_use]
    pub fn write_history(mut self, write: bool) -> Self {
        self.write_history = write;
        self
    }

    #[must_use]
    pub fn working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }

    /// Run a command and wait for it.
    ///
    /// Variables from the state file are merged over `env`, so exports made by
    /// earlier commands win over the scenario's initial values.
    pub fn run(&self, command: &str, env: &BTreeMap<String, String>, mode: StdioMode) -> CommandResult {
        let merged = match self.merged_env(env) {
            Ok(merged) => merged,
            Err(error) => return Err(CommandFailure { output: CommandOutput::default(), error }),
        };

        if self.write_history {
            if let Err(e) = append_history(command) {
                tracing::warn!(error = %e, "failed to write shell history");
            }
        }

        let script = wrap_command(command, self.state.path());
        let mut cmd = ProcessCommand::new("bash");
        cmd.arg("-c").arg(&script);
        if !self.inherit_environment {
            cmd.env_clear();
        }
        cmd.envs(&merged);
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }

        tracing::debug!(command, mode = ?mode, "executing command");

        let result = match mode {
            StdioMode::Capture => cmd
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
                .map(|out| {
                    let output = CommandOutput {
                        stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                        stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
                    };
                    (out.status, output)
                }),
            StdioMode::Inherit => cmd
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .map(|status| (status, CommandOutput::default())),
        };

        // `env` dumps exported functions and multi-line values verbatim
        if self.state.exists() {
            if let Err(e) = self.state.clean() {
                tracing::warn!(error = %e, "failed to clean environment state");
            }
        }

        match result {
            Ok((status, output)) if status.success() => Ok(output),
            Ok((status, output)) => {
                let exit_code = status.code().map_or_else(|| status.to_string(), |c| c.to_string());
                tracing::debug!(command, exit_code, "command failed");
                let error =
                    EngineError::CommandExecution { exit_code, stderr: output.stderr.clone() };
                Err(CommandFailure { output, error })
            }
            Err(e) => Err(CommandFailure {
                output: CommandOutput::default(),
                error: EngineError::CommandExecution {
                    exit_code: "not started".to_string(),
                    stderr: e.to_string(),
                },
            }),
        }
    }

    /// Run a captured command on a background thread and call `on_done` with its result.
    pub fn spawn_with<F>(&self, command: String, env: BTreeMap<String, String>, on_done: F) -> JoinHandle<()>
    where
        F: FnOnce(CommandResult) + Send + 'static,
    {
        let executor = self.clone();
        thread::spawn(move || {
            let result = executor.run(&command, &env, StdioMode::Capture);
            on_done(result);
        })
    }

    /// Run a captured command on a background thread.
    pub fn spawn(&self, command: String, env: BTreeMap<String, String>) -> CommandHandle {
        let (tx, rx) = mpsc::channel();
        let thread = self.spawn_with(command, env, move |result| {
            let _ = tx.send(result);
        });
        CommandHandle { rx, thread: Some(thread) }
    }

    fn merged_env(&self, env: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>, EngineError> {
        let mut merged = env.clone();
        merged.extend(self.state.load()?);
        Ok(merged)
    }
}

/// A command running on a background thread.
#[derive(Debug)]
pub struct CommandHandle {
    rx: Receiver<CommandResult>,
    thread: Option<JoinHandle<()>>,
}

impl CommandHandle {
    /// Return the result if the command has finished.
    pub fn try_finish(&mut self) -> Option<CommandResult> {
        match self.rx.try_recv() {
            Ok(result) => {
                self.join();
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(worker_lost())),
        }
    }

    /// Block until the command finishes.
    pub fn wait(mut self) -> CommandResult {
        let result = self.rx.recv().unwrap_or_else(|_| Err(worker_lost()));
        self.join();
        result
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn worker_lost() -> CommandFailure {
    CommandFailure {
        output: CommandOutput::default(),
        error: EngineError::CommandExecution {
            exit_code: "unknown".to_string(),
            stderr: "command thread terminated unexpectedly".to_string(),
        },
    }
}

/// Append a postamble that records the exit code and dumps the environment.
fn wrap_command(command: &str, state_file: &Path) -> String {
    format!(
        "{command}\nEXECDOC_LAST_EXIT_CODE=\"$?\"\nenv > {}\nexit $EXECDOC_LAST_EXIT_CODE",
        shell_quote(&state_file.to_string_lossy())
    )
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn append_history(command: &str) -> std::io::Result<()> {
    let Some(home) = dirs::home_dir() else {
        return Ok(());
    };
    let mut file = OpenOptions::new().create(true).append(true).open(home.join(".bash_history"))?;
    writeln!(file, "{command}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor(dir: &tempfile::TempDir) -> Executor {
        Executor::new(EnvState::new(dir.path().join("env-vars")))
    }

    #[test]
    fn test_execute_simple_command() {
        let dir = tempfile::tempdir().unwrap();
        let output = executor(&dir).run("echo hello", &BTreeMap::new(), StdioMode::Capture).unwrap();
        assert_eq!(output.stdout, "hello\n");
        assert!(output.stderr.is_empty());
    }

    #[test]
    fn test_stdout_and_stderr_separate() {
        let dir = tempfile::tempdir().unwrap();
        let output = executor(&dir)
            .run("echo out; echo err >&2", &BTreeMap::new(), StdioMode::Capture)
            .unwrap();
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[test]
    fn test_failure_keeps_exit_code_and_output() {
        let dir = tempfile::tempdir().unwrap();
        let failure = executor(&dir)
            .run("echo partial; echo bad >&2; exit 3", &BTreeMap::new(), StdioMode::Capture)
            .unwrap_err();
        assert_eq!(failure.output.stdout, "partial\n");
        match failure.error {
            EngineError::CommandExecution { exit_code, stderr } => {
                assert_eq!(exit_code, "3");
                assert_eq!(stderr, "bad\n");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_env_is_passed() {
        let dir = tempfile::tempdir().unwrap();
        let env = BTreeMap::from([("GREETING".to_string(), "hi".to_string())]);
        let output = executor(&dir).run("echo $GREETING", &env, StdioMode::Capture).unwrap();
        assert_eq!(output.stdout, "hi\n");
    }

    #[test]
    fn test_exports_persist_between_commands() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor(&dir);
        let env = BTreeMap::from([("NAME".to_string(), "initial".to_string())]);

        executor.run("export NAME=changed", &env, StdioMode::Capture).unwrap();
        let output = executor.run("echo $NAME", &env, StdioMode::Capture).unwrap();

        assert_eq!(output.stdout, "changed\n");
    }

    #[test]
    fn test_state_file_cleaned_after_command() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor(&dir);
        executor
            .run("f() { echo hi; }; export -f f; export KEEP=1", &BTreeMap::new(), StdioMode::Capture)
            .unwrap();

        let content = std::fs::read_to_string(executor.state.path()).unwrap();
        assert!(content.contains("KEEP=\"1\"\n"));
        assert!(!content.contains("BASH_FUNC"));
        assert!(content.lines().all(|line| line.contains("=\"")));
    }

    #[test]
    fn test_without_inherited_environment() {
        let dir = tempfile::tempdir().unwrap();
        let output = executor(&dir)
            .inherit_environment(false)
            .run("echo \"[${HOME:-unset}]\"", &BTreeMap::new(), StdioMode::Capture)
            .unwrap();
        assert_eq!(output.stdout, "[unset]\n");
    }

    #[test]
    fn test_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let output = executor(&dir)
            .working_dir(Some(work.path().to_path_buf()))
            .run("pwd", &BTreeMap::new(), StdioMode::Capture)
            .unwrap();
        let expected = work.path().canonicalize().unwrap();
        assert_eq!(PathBuf::from(output.stdout.trim()).canonicalize().unwrap(), expected);
    }

    #[test]
    fn test_background_command() {
        let dir = tempfile::tempdir().unwrap();
        let handle = executor(&dir).spawn("sleep 0.1; echo done".to_string(), BTreeMap::new());
        let output = handle.wait().unwrap();
        assert_eq!(output.stdout, "done\n");
    }

    #[test]
    fn test_background_try_finish() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = executor(&dir).spawn("true".to_string(), BTreeMap::new());
        let result = loop {
            if let Some(result) = handle.try_finish() {
                break result;
            }
            thread::sleep(std::time::Duration::from_millis(10));
        };
        assert!(result.is_ok());
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/tmp/env vars"), "'/tmp/env vars'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }
}

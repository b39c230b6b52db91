//! Running code blocks on behalf of a driver.

use std::collections::BTreeMap;
use std::io;
use std::sync::mpsc::Sender;
use std::thread::JoinHandle;

use super::events::DriverEvent;
use super::state::BlockRun;
use crate::core::{CommandResult, Executor, StdioMode};
use crate::document::CodeBlock;
use crate::verify::compare;

/// Execute `block` and verify its output against any expected output.
///
/// A verification failure replaces an otherwise successful execution.
pub fn run_code_block(
    executor: &Executor,
    block: &CodeBlock,
    env: &BTreeMap<String, String>,
    mode: StdioMode,
) -> BlockRun {
    complete_run(block, executor.run(&block.content, env, mode))
}

/// Turn a finished command into a block outcome, verifying successful output.
pub fn complete_run(block: &CodeBlock, result: CommandResult) -> BlockRun {
    let output = match result {
        Ok(output) => output,
        Err(failure) => {
            return BlockRun { output: failure.output, score: None, error: Some(failure.error) };
        }
    };
    let Some(ref expected) = block.expected_output else {
        return BlockRun { output, score: None, error: None };
    };
    let comparison = compare(&output.stdout, expected);
    if let Err(ref e) = comparison.outcome {
        tracing::info!(score = comparison.score, error = %e, "output verification failed");
    }
    BlockRun { output, score: Some(comparison.score), error: comparison.outcome.err() }
}

/// Run `block` on a background thread and post the result to `events`.
///
/// `env` is moved into the thread so the command never shares the driver's map.
pub fn dispatch_background(
    executor: &Executor,
    index: usize,
    block: CodeBlock,
    env: BTreeMap<String, String>,
    events: Sender<DriverEvent>,
) -> JoinHandle<()> {
    let executor = executor.clone();
    std::thread::spawn(move || {
        let run = run_code_block(&executor, &block, &env, StdioMode::Capture);
        if events.send(DriverEvent::Finished { index, run }).is_err() {
            tracing::debug!(index, "driver loop exited before command finished");
        }
    })
}

/// Exclusive control of the terminal, handed to a child for blocking commands.
pub trait TerminalControl {
    fn release(&mut self) -> io::Result<()>;
    fn restore(&mut self) -> io::Result<()>;
}

/// Terminal released to a child process, restored on drop.
pub struct Released<'a> {
    terminal: &'a mut dyn TerminalControl,
}

impl<'a> Released<'a> {
    /// Release `terminal`. A release that fails partway is still restored.
    pub fn new(terminal: &'a mut dyn TerminalControl) -> io::Result<Self> {
        let mut guard = Self { terminal };
        guard.terminal.release()?;
        Ok(guard)
    }
}

impl Drop for Released<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.terminal.restore() {
            tracing::error!(error = %e, "failed to restore terminal");
        }
    }
}

/// Run `block` in the foreground with the terminal handed to it.
pub fn run_blocking(
    executor: &Executor,
    block: &CodeBlock,
    env: &BTreeMap<String, String>,
    terminal: &mut dyn TerminalControl,
) -> BlockRun {
    let guard = match Released::new(terminal) {
        Ok(guard) => guard,
        Err(e) => {
            return BlockRun { error: Some(e.into()), ..BlockRun::default() };
        }
    };
    let run = run_code_block(executor, block, env, StdioMode::Inherit);
    drop(guard);
    run
}

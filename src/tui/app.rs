//! Interactive runner.
//!
//! Owns the terminal for one scenario run and drives the
//! [`InteractiveModel`] from a single event loop. Command completions and
//! re-enqueued inputs arrive on an mpsc channel; key presses are polled from
//! crossterm between frames.

use std::collections::VecDeque;
use std::io::{self, stdout, Stdout};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use super::input::Keymap;
use super::theme::Theme;
use super::ui::{draw, View};
use crate::core::Executor;
use crate::engine::{dispatch_background, run_blocking, DriverEvent, Effect, InteractiveModel, TerminalControl};
use crate::status::StatusReporter;

/// Presentation settings for an interactive run.
#[derive(Debug, Clone, Default)]
pub struct InteractiveOptions {
    pub keymap: Keymap,
    pub theme: Theme,
    pub tick_rate: Duration,
}

/// The terminal in TUI mode. Dropping the session restores it.
pub struct TerminalSession {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalSession {
    pub fn new() -> Result<Self> {
        setup_terminal()?;
        let terminal = match Terminal::new(CrosstermBackend::new(stdout())) {
            Ok(terminal) => terminal,
            Err(e) => {
                let _ = restore_terminal();
                return Err(e).context("failed to create terminal");
            }
        };
        Ok(Self { terminal })
    }

    /// Force a full repaint on the next draw.
    fn clear(&mut self) -> io::Result<()> {
        self.terminal.clear()
    }
}

impl TerminalControl for TerminalSession {
    fn release(&mut self) -> io::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()
    }

    fn restore(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        execute!(self.terminal.backend_mut(), EnterAlternateScreen)?;
        self.terminal.clear()
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        if let Err(e) = restore_terminal() {
            tracing::error!(error = %e, "failed to restore terminal");
        }
        let _ = self.terminal.show_cursor();
    }
}

/// Setup the terminal for TUI mode.
fn setup_terminal() -> Result<()> {
    enable_raw_mode()?;
    execute!(stdout(), EnterAlternateScreen)?;

    // Restore the terminal before the panic message is printed
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore_terminal();
        original_hook(panic_info);
    }));

    Ok(())
}

fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(stdout(), LeaveAlternateScreen)
}

/// Run `model` until it exits.
///
/// Status reports go through `reporter`, which shares stdout with the
/// terminal, so the screen is repainted after each one.
pub fn run_interactive(
    model: &mut InteractiveModel,
    executor: &Executor,
    reporter: &mut StatusReporter,
    options: &InteractiveOptions,
) -> Result<()> {
    let mut session = TerminalSession::new()?;
    let (tx, rx) = mpsc::channel();
    let mut runner = Runner { executor, reporter, tx, rx, pending: model.start().into() };
    let mut tick = 0usize;

    loop {
        runner.apply_effects(model, &mut session)?;
        if model.has_exited() {
            break;
        }

        session.terminal.draw(|frame| {
            let view = View { model: &*model, theme: &options.theme, keymap: &options.keymap, tick };
            draw(frame, &view);
        })?;

        runner.drain_events(model);
        if !runner.pending.is_empty() {
            continue;
        }

        if event::poll(options.tick_rate)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    let input = options.keymap.map(key);
                    runner.pending.extend(model.handle_input(input));
                }
            }
        }

        tick = tick.wrapping_add(1);
    }

    Ok(())
}

struct Runner<'a> {
    executor: &'a Executor,
    reporter: &'a mut StatusReporter,
    tx: Sender<DriverEvent>,
    rx: Receiver<DriverEvent>,
    pending: VecDeque<Effect>,
}

impl Runner<'_> {
    fn apply_effects(&mut self, model: &mut InteractiveModel, session: &mut TerminalSession) -> Result<()> {
        while let Some(effect) = self.pending.pop_front() {
            match effect {
                Effect::Dispatch { index, blocking } => {
                    let Some(block) = model.block(index).map(|b| b.code_block.clone()) else {
                        continue;
                    };
                    let env = model.env().clone();
                    if blocking {
                        let run = run_blocking(self.executor, &block, &env, session);
                        self.pending.extend(model.handle_finished(index, run));
                    } else {
                        dispatch_background(self.executor, index, block, env, self.tx.clone());
                    }
                }
                Effect::Enqueue(input) => {
                    // The receiver lives in `self`, so the send cannot fail.
                    let _ = self.tx.send(DriverEvent::Input(input));
                }
                Effect::Report => {
                    if self.reporter.is_enabled() {
                        self.reporter.report(model.status()).context("failed to report status")?;
                        session.clear()?;
                    }
                }
                Effect::Exit => tracing::debug!("interactive run exiting"),
            }
        }
        Ok(())
    }

    fn drain_events(&mut self, model: &mut InteractiveModel) {
        while let Ok(event) = self.rx.try_recv() {
            let effects = match event {
                DriverEvent::Input(input) => model.handle_input(input),
                DriverEvent::Finished { index, run } => model.handle_finished(index, run),
            };
            self.pending.extend(effects);
        }
    }
}

//! Terminal user interface for the interactive driver.
//!
//! Rendering and key handling use ratatui and crossterm.

mod app;
mod input;
mod theme;
mod ui;

pub use app::{run_interactive, InteractiveOptions, TerminalSession};
pub use input::Keymap;
pub use theme::Theme;
pub use ui::{draw, View};

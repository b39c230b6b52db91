//! Core functionality for execdoc.
//!
//! This module contains configuration, command execution, and the persisted
//! environment state shared between commands.

mod config;
mod env_state;
mod executor;

pub use config::{Config, ExecutionConfig, GeneralConfig, KeyConfig, PolicyConfig, UiConfig};
pub use env_state::{is_valid_key, parse_state, render_state, EnvState, DEFAULT_STATE_FILE};
pub use executor::{CommandFailure, CommandHandle, CommandOutput, CommandResult, Executor, StdioMode};

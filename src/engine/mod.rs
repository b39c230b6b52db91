//! Scenario execution engine.
//!
//! Three drivers walk a scenario's blocks:
//!
//! - **interactive**: user-driven stepping, see [`InteractiveModel`]
//! - **automated**: fail-fast test run
//! - **linear**: headless run that records failures and keeps going

mod automated;
mod dispatch;
mod events;
mod interactive;
mod linear;
mod state;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub use dispatch::{complete_run, dispatch_background, run_blocking, run_code_block, Released, TerminalControl};
pub use events::{DriverEvent, Input};
pub use interactive::{Effect, InteractiveContext, InteractiveModel};
pub use state::{flatten, previous_succeeded, BlockRun, BlockStatus, StatefulCodeBlock};

use crate::azure::{AzureCli, ResourceBackend};
use crate::core::{Config, EnvState, Executor, PolicyConfig};
use crate::environment::Environment;
use crate::error::{EngineError, EngineResult};
use crate::scenario::Scenario;

/// Behaviors tied to hosted deployments, switchable per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policies {
    /// A block may only start after the previous block succeeded
    pub require_previous_success: bool,
    /// Report success before a final remote login takes over the terminal
    pub report_before_remote_login: bool,
}

impl Default for Policies {
    fn default() -> Self {
        Self { require_previous_success: true, report_before_remote_login: true }
    }
}

impl From<&PolicyConfig> for Policies {
    fn from(config: &PolicyConfig) -> Self {
        Self {
            require_previous_success: config.require_previous_success,
            report_before_remote_login: config.report_before_remote_login,
        }
    }
}

/// Settings for one engine run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub environment: Environment,
    pub verbose: bool,
    pub do_not_delete: bool,
    pub subscription: String,
    pub correlation_id: String,
    pub working_directory: Option<PathBuf>,
    pub state_file: PathBuf,
    pub inherit_environment: bool,
    pub write_history: bool,
    pub spinner_refresh: Duration,
    pub policies: Policies,
}

impl EngineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            environment: config.general.environment,
            verbose: false,
            do_not_delete: false,
            subscription: String::new(),
            correlation_id: String::new(),
            working_directory: None,
            state_file: config.execution.state_file.clone(),
            inherit_environment: config.execution.inherit_environment,
            write_history: config.execution.write_history,
            spinner_refresh: Duration::from_millis(config.execution.spinner_refresh_ms.max(1)),
            policies: Policies::from(&config.policy),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Runs scenarios with one of the drivers.
pub struct Engine {
    config: EngineConfig,
    executor: Executor,
    resources: Arc<dyn ResourceBackend>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        if let Some(ref dir) = config.working_directory {
            if !dir.is_dir() {
                return Err(EngineError::WorkingDirectory {
                    path: dir.clone(),
                    reason: "not a directory".to_string(),
                });
            }
        }

        let executor = Executor::new(EnvState::new(&config.state_file))
            .inherit_environment(config.inherit_environment)
            .write_history(config.write_history)
            .working_dir(config.working_directory.clone());

        Ok(Self { config, executor, resources: Arc::new(AzureCli::new()) })
    }

    /// Replace the cloud backend.
    #[must_use]
    pub fn with_resources(mut self, resources: Arc<dyn ResourceBackend>) -> Self {
        self.resources = resources;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn state(&self) -> &EnvState {
        &self.executor.state
    }

    /// Select the configured subscription, if any.
    fn select_subscription(&self) -> EngineResult<()> {
        if self.config.subscription.is_empty() {
            return Ok(());
        }
        self.resources.set_subscription(&self.config.subscription)
    }

    /// Build the interactive state machine for `scenario`.
    pub fn interactive_model(&self, scenario: &Scenario) -> EngineResult<InteractiveModel> {
        self.select_subscription()?;
        Ok(InteractiveModel::new(
            scenario,
            InteractiveContext {
                environment: self.config.environment,
                subscription: self.config.subscription.clone(),
                policies: self.config.policies,
                state: self.executor.state.clone(),
                resources: Arc::clone(&self.resources),
            },
        ))
    }
}

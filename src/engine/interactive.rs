//! Interactive step-through driver.
//!
//! [`InteractiveModel`] is a pure state machine. Inputs and command
//! completions go in, [`Effect`]s come out, and the event loop that owns the
//! terminal carries them out. Execute-all and execute-N are counters of
//! remaining auto-continuations: each success re-enqueues an execute input
//! while the counter is positive.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::events::Input;
use super::state::{flatten, previous_succeeded, BlockRun, BlockStatus, StatefulCodeBlock};
use super::Policies;
use crate::azure::{find_resource_group_name, resource_group_id, ResourceBackend};
use crate::core::EnvState;
use crate::environment::Environment;
use crate::patterns::{is_az_command, is_ssh_command};
use crate::scenario::Scenario;
use crate::status::{DeploymentState, DeploymentStatus};

/// Work requested by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Run the block at `index`; `blocking` hands it the terminal.
    Dispatch { index: usize, blocking: bool },
    /// Feed an input back into the event queue.
    Enqueue(Input),
    /// Emit the current deployment status.
    Report,
    Exit,
}

/// Run context the model needs besides the scenario.
pub struct InteractiveContext {
    pub environment: Environment,
    pub subscription: String,
    pub policies: Policies,
    pub state: EnvState,
    pub resources: Arc<dyn ResourceBackend>,
}

pub struct InteractiveModel {
    title: String,
    markdown: String,
    env: BTreeMap<String, String>,
    blocks: Vec<StatefulCodeBlock>,
    current: usize,
    furthest: usize,
    executing: bool,
    remaining: usize,
    recording: Option<String>,
    completed: bool,
    exited: bool,
    resource_group: Option<String>,
    command_lines: Vec<String>,
    status: DeploymentStatus,
    context: InteractiveContext,
}

impl InteractiveModel {
    pub fn new(scenario: &Scenario, context: InteractiveContext) -> Self {
        let blocks = flatten(scenario);
        let command_lines = blocks
            .first()
            .map(|block| vec![command_prompt(&block.code_block.content)])
            .unwrap_or_default();

        Self {
            title: scenario.name.clone(),
            markdown: scenario.markdown.clone(),
            env: scenario.environment.clone(),
            blocks,
            current: 0,
            furthest: 0,
            executing: false,
            remaining: 0,
            recording: None,
            completed: false,
            exited: false,
            resource_group: None,
            command_lines,
            status: DeploymentStatus::for_scenario(scenario),
            context,
        }
    }

    /// Effects to run before the first input.
    pub fn start(&mut self) -> Vec<Effect> {
        if self.blocks.is_empty() {
            self.completed = true;
            self.status.status = DeploymentState::Succeeded;
            self.exited = true;
            return vec![Effect::Report, Effect::Exit];
        }
        vec![Effect::Report]
    }

    pub fn handle_input(&mut self, input: Input) -> Vec<Effect> {
        if self.exited {
            return Vec::new();
        }

        if let Some(mut digits) = self.recording.take() {
            if let Input::Digit(d) = input {
                digits.push(char::from(b'0' + d));
                self.recording = Some(digits);
                return Vec::new();
            }
            // Only digits are recorded, so a parse error means overflow
            let requested = if digits.is_empty() { 0 } else { digits.parse().unwrap_or(usize::MAX) };
            tracing::debug!(requested, "executing next blocks");
            return self.auto_continue(requested);
        }

        match input {
            Input::Execute => self.execute_current(),
            Input::ExecuteAll => self.auto_continue(usize::MAX),
            Input::ExecuteMany => {
                self.recording = Some(String::new());
                Vec::new()
            }
            Input::Previous => {
                if self.executing {
                    tracing::info!("command is executing, ignoring navigation");
                } else if self.current > 0 {
                    self.current -= 1;
                }
                Vec::new()
            }
            Input::Next => {
                if self.executing {
                    tracing::info!("command is executing, ignoring navigation");
                } else if self.current < self.navigation_limit() {
                    self.current += 1;
                }
                Vec::new()
            }
            Input::Pause => {
                if !self.executing {
                    tracing::info!("no command is executing, pause only clears the queue");
                }
                self.remaining = 0;
                Vec::new()
            }
            Input::Quit => {
                self.exited = true;
                vec![Effect::Exit]
            }
            Input::Digit(_) | Input::Enter | Input::Other => Vec::new(),
        }
    }

    /// Arm `count` auto-continuations, clamped to the blocks left.
    ///
    /// A block already running counts as the first one; its completion
    /// carries on from there.
    fn auto_continue(&mut self, count: usize) -> Vec<Effect> {
        self.remaining = count.min(self.blocks.len().saturating_sub(self.current));
        if self.remaining == 0 || self.executing {
            return Vec::new();
        }
        vec![Effect::Enqueue(Input::Execute)]
    }

    /// Whether the block at `index` may start now.
    pub fn may_execute(&self, index: usize) -> bool {
        let Some(block) = self.blocks.get(index) else {
            return false;
        };
        if self.executing {
            tracing::info!("command already executing, ignoring execute");
            return false;
        }
        if block.status() != BlockStatus::Pending {
            tracing::info!(index, "block already ran, ignoring execute");
            return false;
        }
        if self.context.policies.require_previous_success && !previous_succeeded(&self.blocks, index) {
            tracing::info!(index, "previous block has not succeeded, ignoring execute");
            return false;
        }
        true
    }

    fn execute_current(&mut self) -> Vec<Effect> {
        if !self.may_execute(self.current) {
            self.remaining = 0;
            return Vec::new();
        }
        self.executing = true;
        let index = self.current;
        let content = &self.blocks[index].code_block.content;
        tracing::info!(index, command = %content, "executing block");

        let is_last = index + 1 == self.blocks.len();
        if is_last && is_ssh_command(content) {
            let mut effects = Vec::new();
            if self.context.policies.report_before_remote_login {
                self.status.status = DeploymentState::Succeeded;
                self.attach_resources();
                self.configure_markdown();
                effects.push(Effect::Report);
            }
            effects.push(Effect::Dispatch { index, blocking: true });
            return effects;
        }

        vec![Effect::Dispatch { index, blocking: false }]
    }

    /// Record the outcome of the block at `index`.
    pub fn handle_finished(&mut self, index: usize, run: BlockRun) -> Vec<Effect> {
        if index != self.current || !self.executing {
            tracing::warn!(index, current = self.current, "ignoring unexpected completion");
            return Vec::new();
        }
        self.executing = false;

        if run.succeeded() {
            self.on_success(index, run)
        } else {
            self.on_failure(index, run)
        }
    }

    fn on_success(&mut self, index: usize, run: BlockRun) -> Vec<Effect> {
        self.blocks[index].finish(run);
        let block = &self.blocks[index];
        tracing::info!(index, "block succeeded");

        if self.resource_group.is_none() && is_az_command(&block.code_block.content) {
            if let Some(group) = find_resource_group_name(&block.stdout) {
                tracing::info!(group, "found resource group");
                self.status.add_resource_uri(resource_group_id(&self.context.subscription, &group));
                self.resource_group = Some(group);
            }
        }
        self.command_lines.push(self.blocks[index].stdout.clone());

        self.current += 1;
        self.furthest = self.furthest.max(self.current);
        if let Some(next) = self.blocks.get(self.current) {
            self.command_lines.push(command_prompt(&next.code_block.content));
            if next.step_name != self.blocks[index].step_name {
                self.status.current_step += 1;
            }
        }
        self.remaining = self.remaining.saturating_sub(1);

        if self.current == self.blocks.len() {
            self.completed = true;
            self.exited = true;
            self.status.status = DeploymentState::Succeeded;
            self.attach_resources();
            self.configure_markdown();
            self.status.set_output(self.command_lines.join("\n"));
            return vec![Effect::Report, Effect::Exit];
        }

        let mut effects = vec![Effect::Report];
        if self.remaining > 0 {
            effects.push(Effect::Enqueue(Input::Execute));
        }
        effects
    }

    fn on_failure(&mut self, index: usize, run: BlockRun) -> Vec<Effect> {
        let message = run.error.as_ref().map(ToString::to_string).unwrap_or_default();
        self.blocks[index].finish(run);
        tracing::warn!(index, error = %message, "block failed");

        self.command_lines.push(self.blocks[index].stderr.clone());
        self.remaining = 0;
        self.exited = true;
        self.status.set_error(message);
        self.attach_resources();
        self.status.set_output(self.command_lines.join("\n"));
        vec![Effect::Report, Effect::Exit]
    }

    fn navigation_limit(&self) -> usize {
        let last = self.blocks.len().saturating_sub(1);
        if self.context.policies.require_previous_success {
            self.furthest.min(last)
        } else {
            last
        }
    }

    fn attach_resources(&mut self) {
        if !self.context.environment.is_hosted() {
            return;
        }
        let Some(ref group) = self.resource_group else {
            tracing::warn!("no resource group found");
            return;
        };
        for uri in self.context.resources.deployed_resource_uris(group) {
            self.status.add_resource_uri(uri);
        }
    }

    fn configure_markdown(&mut self) {
        if !self.context.environment.is_hosted() {
            return;
        }
        match self.context.state.load() {
            Ok(variables) => self.status.configure_markdown(&self.markdown, &variables),
            Err(e) => {
                tracing::error!(error = %e, "failed to load environment state");
                self.status.set_error(e);
            }
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn blocks(&self) -> &[StatefulCodeBlock] {
        &self.blocks
    }

    pub fn block(&self, index: usize) -> Option<&StatefulCodeBlock> {
        self.blocks.get(index)
    }

    /// Index of the block on screen. Equals the block count once complete.
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn is_executing(&self) -> bool {
        self.executing
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn has_exited(&self) -> bool {
        self.exited
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Digits captured after execute-many, while capture is active.
    pub fn recording(&self) -> Option<&str> {
        self.recording.as_deref()
    }

    pub fn command_lines(&self) -> &[String] {
        &self.command_lines
    }

    pub fn status(&self) -> &DeploymentStatus {
        &self.status
    }

    pub fn environment(&self) -> Environment {
        self.context.environment
    }
}

fn command_prompt(content: &str) -> String {
    format!("$ {}", content.trim_end())
}

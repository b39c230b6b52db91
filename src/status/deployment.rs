//! Deployment status snapshots for hosted environments.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::scenario::{rewrite_all_exports, Scenario};

/// Overall state of a hosted deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeploymentState {
    #[default]
    Executing,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedCodeBlock {
    pub description: String,
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedStep {
    pub name: String,
    #[serde(rename = "codeblocks")]
    pub code_blocks: Vec<ReportedCodeBlock>,
}

/// Progress snapshot scraped by a hosting process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatus {
    pub steps: Vec<ReportedStep>,
    pub current_step: usize,
    pub status: DeploymentState,
    #[serde(rename = "resourceURIs")]
    pub resource_uris: Vec<String>,
    pub error: String,
    pub output: String,
    pub configured_markdown: String,
}

impl DeploymentStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// A status listing every step of `scenario` as `"N. name"`, positioned at step 1.
    pub fn for_scenario(scenario: &Scenario) -> Self {
        let mut status = Self { current_step: 1, ..Self::default() };
        for (number, step) in scenario.steps.iter().enumerate() {
            let code_blocks = step
                .code_blocks
                .iter()
                .map(|block| ReportedCodeBlock {
                    description: block.description.clone(),
                    command: block.content.clone(),
                })
                .collect();
            status.add_step(format!("{}. {}", number + 1, step.name), code_blocks);
        }
        status
    }

    pub fn add_step(&mut self, name: impl Into<String>, code_blocks: Vec<ReportedCodeBlock>) {
        self.steps.push(ReportedStep { name: name.into(), code_blocks });
    }

    /// Record a resource id, ignoring duplicates.
    pub fn add_resource_uri(&mut self, uri: impl Into<String>) {
        let uri = uri.into();
        if !self.resource_uris.contains(&uri) {
            self.resource_uris.push(uri);
        }
    }

    /// Mark the deployment failed with `error`.
    pub fn set_error(&mut self, error: impl ToString) {
        self.status = DeploymentState::Failed;
        self.error = error.to_string();
    }

    pub fn set_output(&mut self, output: impl Into<String>) {
        self.output = output.into();
    }

    /// Store `markdown` with each export rewritten to the value in `variables`.
    pub fn configure_markdown(&mut self, markdown: &str, variables: &BTreeMap<String, String>) {
        let mut configured = markdown.to_string();
        for (key, value) in variables {
            configured = rewrite_all_exports(&configured, key, value);
        }
        self.configured_markdown = configured;
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

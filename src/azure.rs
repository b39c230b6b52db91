//! Azure CLI integration.
//!
//! Resource discovery for hosted status reports, subscription selection,
//! correlation ids, and resource group cleanup.

use std::collections::BTreeMap;

use crate::core::{CommandOutput, EnvState, Executor, StdioMode};
use crate::error::{EngineError, EngineResult};
use crate::patterns::{is_az_command, AZ_GROUP_DELETE, AZ_RESOURCE_GROUP_NAME, AZ_RESOURCE_URI};
use crate::scenario::Step;

/// Cloud operations the drivers need around a run.
pub trait ResourceBackend: Send + Sync {
    fn set_subscription(&self, subscription: &str) -> EngineResult<()>;

    /// Ids of the resources deployed in `group`.
    fn deployed_resource_uris(&self, group: &str) -> Vec<String>;

    fn delete_resource_group(&self, group: &str) -> EngineResult<()>;
}

/// [`ResourceBackend`] backed by the `az` command line.
#[derive(Debug, Clone)]
pub struct AzureCli {
    executor: Executor,
}

impl AzureCli {
    /// The CLI runs with its own state file so that lookups do not clobber
    /// the scenario's persisted environment.
    pub fn new() -> Self {
        let state = EnvState::new(std::env::temp_dir().join("execdoc-az-env"));
        Self { executor: Executor::new(state) }
    }

    fn run(&self, command: &str) -> Result<CommandOutput, EngineError> {
        self.executor
            .run(command, &BTreeMap::new(), StdioMode::Capture)
            .map_err(|failure| failure.error)
    }
}

impl Default for AzureCli {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceBackend for AzureCli {
    fn set_subscription(&self, subscription: &str) -> EngineResult<()> {
        if subscription.is_empty() {
            return Ok(());
        }
        self.run(&format!("az account set --subscription {subscription}"))?;
        tracing::info!(subscription, "set subscription");
        Ok(())
    }

    fn deployed_resource_uris(&self, group: &str) -> Vec<String> {
        match self.run(&format!("az resource list -g {group}")) {
            Ok(output) => find_resource_uris(&output.stdout),
            Err(e) => {
                tracing::error!(group, error = %e, "failed to list deployed resources");
                Vec::new()
            }
        }
    }

    fn delete_resource_group(&self, group: &str) -> EngineResult<()> {
        tracing::info!(group, "deleting resource group");
        self.run(&format!("az group delete --name {group} --yes --no-wait"))?;
        Ok(())
    }
}

/// Backend that knows no resources and does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResources;

impl ResourceBackend for NoResources {
    fn set_subscription(&self, _subscription: &str) -> EngineResult<()> {
        Ok(())
    }

    fn deployed_resource_uris(&self, _group: &str) -> Vec<String> {
        Vec::new()
    }

    fn delete_resource_group(&self, _group: &str) -> EngineResult<()> {
        Ok(())
    }
}

/// Resource group named in az command output.
pub fn find_resource_group_name(output: &str) -> Option<String> {
    AZ_RESOURCE_GROUP_NAME.captures(output).map(|c| c[1].to_string())
}

pub fn find_resource_uris(output: &str) -> Vec<String> {
    AZ_RESOURCE_URI.captures_iter(output).map(|c| c[1].to_string()).collect()
}

pub fn resource_group_id(subscription: &str, group: &str) -> String {
    format!("/subscriptions/{subscription}/resourceGroups/{group}")
}

/// Tag Azure Resource Manager requests with `correlation_id`.
pub fn set_correlation_id(correlation_id: &str, env: &mut BTreeMap<String, String>) {
    if correlation_id.is_empty() {
        return;
    }
    let agent = format!("execdoc-{correlation_id}");
    tracing::info!(tracking_id = %agent, "resource tracking enabled");
    env.insert("AZURE_HTTP_USER_AGENT".to_string(), agent);
}

/// The az CLI sometimes exits zero while reporting errors on stderr only.
pub fn az_cli_error(command: &str, output: &CommandOutput) -> Option<EngineError> {
    if is_az_command(command) && output.stdout.is_empty() && !output.stderr.is_empty() {
        Some(EngineError::CommandExecution {
            exit_code: "0".to_string(),
            stderr: output.stderr.clone(),
        })
    } else {
        None
    }
}

/// Drop every code block that deletes a resource group. Emptied steps are removed.
pub fn filter_deletion_commands(steps: &[Step]) -> Vec<Step> {
    steps
        .iter()
        .filter_map(|step| {
            let code_blocks: Vec<_> = step
                .code_blocks
                .iter()
                .filter(|block| !AZ_GROUP_DELETE.is_match(&block.content))
                .cloned()
                .collect();
            (!code_blocks.is_empty()).then(|| Step { name: step.name.clone(), code_blocks })
        })
        .collect()
}

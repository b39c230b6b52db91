//! Post-run reports.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::document::ExpectedOutput;
use crate::engine::{BlockStatus, StatefulCodeBlock};
use crate::error::EngineResult;
use crate::scenario::Scenario;

/// Outcome of one code block.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockReport {
    pub step_name: String,
    pub step_number: usize,
    pub block_number: usize,
    pub code_block: String,
    pub expected_output: Option<ExpectedOutput>,
    pub actual_output: String,
    pub stderr: String,
    pub score: Option<f64>,
    pub status: BlockStatus,
    pub error: Option<String>,
}

/// Summary of a scenario run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub name: String,
    pub properties: BTreeMap<String, serde_json::Value>,
    pub environment_variables: BTreeMap<String, String>,
    pub success: bool,
    pub error: String,
    /// 1-based position of the first failed block, in execution order
    pub failed_at_step: Option<usize>,
    pub code_blocks: Vec<BlockReport>,
    pub generated_at: DateTime<Utc>,
}

impl Report {
    /// Summarize `blocks` after running `scenario`.
    ///
    /// A run succeeds only when every block succeeded.
    pub fn new(scenario: &Scenario, blocks: &[StatefulCodeBlock]) -> Self {
        let failed = blocks.iter().position(StatefulCodeBlock::failed);
        let error = failed
            .and_then(|index| blocks[index].error.as_ref())
            .map(ToString::to_string)
            .unwrap_or_default();

        Self {
            name: scenario.name.clone(),
            properties: scenario.properties.clone(),
            environment_variables: scenario.environment.clone(),
            success: blocks.iter().all(StatefulCodeBlock::succeeded),
            error,
            failed_at_step: failed.map(|index| index + 1),
            code_blocks: blocks.iter().map(BlockReport::from).collect(),
            generated_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_to_file(&self, path: &Path) -> EngineResult<()> {
        std::fs::write(path, self.to_json()?)?;
        tracing::info!(path = %path.display(), "wrote report");
        Ok(())
    }
}

impl From<&StatefulCodeBlock> for BlockReport {
    fn from(block: &StatefulCodeBlock) -> Self {
        Self {
            step_name: block.step_name.clone(),
            step_number: block.step_number,
            block_number: block.block_number,
            code_block: block.code_block.content.clone(),
            expected_output: block.code_block.expected_output.clone(),
            actual_output: block.stdout.clone(),
            stderr: block.stderr.clone(),
            score: block.score,
            status: block.status(),
            error: block.error.as_ref().map(ToString::to_string),
        }
    }
}

//! Per-block run state.

use serde::Serialize;

use crate::core::CommandOutput;
use crate::document::CodeBlock;
use crate::error::EngineError;
use crate::scenario::Scenario;

/// Terminal state of a code block. Running is tracked by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockStatus {
    #[default]
    Pending,
    Success,
    Failure,
}

/// A code block together with the outcome of running it.
#[derive(Debug)]
pub struct StatefulCodeBlock {
    pub code_block: CodeBlock,
    pub step_name: String,
    /// Zero-based step index
    pub step_number: usize,
    /// Zero-based index within the step
    pub block_number: usize,
    status: BlockStatus,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<EngineError>,
    pub score: Option<f64>,
}

impl StatefulCodeBlock {
    pub fn new(code_block: CodeBlock, step_name: impl Into<String>, step_number: usize, block_number: usize) -> Self {
        Self {
            code_block,
            step_name: step_name.into(),
            step_number,
            block_number,
            status: BlockStatus::Pending,
            stdout: String::new(),
            stderr: String::new(),
            error: None,
            score: None,
        }
    }

    pub fn status(&self) -> BlockStatus {
        self.status
    }

    pub fn succeeded(&self) -> bool {
        self.status == BlockStatus::Success
    }

    pub fn failed(&self) -> bool {
        self.status == BlockStatus::Failure
    }

    /// Record the block's outcome. A block that already finished keeps its
    /// first outcome and `false` is returned.
    pub fn finish(&mut self, run: BlockRun) -> bool {
        if self.status != BlockStatus::Pending {
            tracing::warn!(step = %self.step_name, "ignoring second outcome for finished block");
            return false;
        }
        self.stdout = run.output.stdout;
        self.stderr = run.output.stderr;
        self.score = run.score;
        self.status = if run.error.is_some() { BlockStatus::Failure } else { BlockStatus::Success };
        self.error = run.error;
        true
    }
}

/// Outcome of executing and verifying one block.
#[derive(Debug, Default)]
pub struct BlockRun {
    pub output: CommandOutput,
    /// Similarity score, when the block declared an expected output
    pub score: Option<f64>,
    pub error: Option<EngineError>,
}

impl BlockRun {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Flatten a scenario into blocks in execution order.
pub fn flatten(scenario: &Scenario) -> Vec<StatefulCodeBlock> {
    scenario
        .steps
        .iter()
        .enumerate()
        .flat_map(|(step_number, step)| {
            step.code_blocks.iter().enumerate().map(move |(block_number, block)| {
                StatefulCodeBlock::new(block.clone(), step.name.clone(), step_number, block_number)
            })
        })
        .collect()
}

/// Whether the block at `index` may start under the previous-success gate.
pub fn previous_succeeded(blocks: &[StatefulCodeBlock], index: usize) -> bool {
    index == 0 || blocks.get(index - 1).is_some_and(StatefulCodeBlock::succeeded)
}

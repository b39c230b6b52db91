//! Scenario data model.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use super::rewrite::double_quoted;
use crate::document::CodeBlock;

/// A named group of code blocks sharing a heading.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub name: String,
    pub code_blocks: Vec<CodeBlock>,
}

/// An executable scenario built from one markdown document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub name: String,
    pub steps: Vec<Step>,

    /// Resolved variables, overrides applied
    pub environment: BTreeMap<String, String>,

    /// Markdown source the scenario was built from
    #[serde(skip)]
    pub markdown: String,

    /// Front matter properties
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl Scenario {
    /// All code blocks in execution order, paired with their step.
    pub fn code_blocks(&self) -> impl Iterator<Item = (&Step, &CodeBlock)> {
        self.steps.iter().flat_map(|step| step.code_blocks.iter().map(move |block| (step, block)))
    }

    pub fn block_count(&self) -> usize {
        self.steps.iter().map(|step| step.code_blocks.len()).sum()
    }

    /// Render the scenario as a standalone shell script.
    pub fn to_shell_script(&self) -> String {
        let mut script = String::new();
        for (key, value) in &self.environment {
            let _ = writeln!(script, "export {key}={}", double_quoted(value));
        }
        for step in &self.steps {
            if !step.name.is_empty() {
                let _ = writeln!(script, "# {}", step.name);
            }
            for block in &step.code_blocks {
                script.push_str(&block.content);
                script.push('\n');
            }
        }
        script
    }
}

/// Group blocks into steps by header.
///
/// Steps appear in order of each header's first appearance; blocks keep
/// source order within their step.
pub fn group_into_steps(blocks: Vec<CodeBlock>) -> Vec<Step> {
    let mut steps: Vec<Step> = Vec::new();
    let mut index: BTreeMap<String, usize> = BTreeMap::new();

    for block in blocks {
        if let Some(&position) = index.get(&block.header) {
            steps[position].code_blocks.push(block);
        } else {
            index.insert(block.header.clone(), steps.len());
            steps.push(Step { name: block.header.clone(), code_blocks: vec![block] });
        }
    }

    steps
}

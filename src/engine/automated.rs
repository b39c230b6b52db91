//! Fail-fast automated test driver.

use std::io::Write;
use std::sync::mpsc;

use crossterm::style::Stylize;

use super::dispatch::dispatch_background;
use super::events::DriverEvent;
use super::state::{flatten, previous_succeeded, StatefulCodeBlock};
use super::Engine;
use crate::azure::find_resource_group_name;
use crate::error::EngineResult;
use crate::patterns::is_az_command;
use crate::report::Report;
use crate::scenario::Scenario;

impl Engine {
    /// Run every block in order, stopping at the first failure.
    ///
    /// Each block runs in the background and the next one is dispatched only
    /// after its predecessor succeeded. Progress lines go to `out`.
    pub fn run_automated<W: Write>(&self, scenario: &Scenario, out: &mut W) -> EngineResult<Report> {
        self.select_subscription()?;

        let mut blocks = flatten(scenario);
        let env = scenario.environment.clone();
        let (tx, rx) = mpsc::channel();
        let mut resource_group: Option<String> = None;

        writeln!(out, "{}", scenario.name.as_str().bold())?;
        if let Some(first) = blocks.first() {
            write_step_heading(out, first)?;
            dispatch_background(&self.executor, 0, first.code_block.clone(), env.clone(), tx.clone());
        }

        while let Ok(event) = rx.recv() {
            let DriverEvent::Finished { index, run } = event else {
                continue;
            };
            let succeeded = run.succeeded();
            blocks[index].finish(run);
            let block = &blocks[index];
            write_outcome(out, block, self.config.verbose)?;

            if !succeeded {
                tracing::warn!(index, "block failed, stopping test run");
                break;
            }

            if resource_group.is_none() && is_az_command(&block.code_block.content) {
                resource_group = find_resource_group_name(&block.stdout);
                if let Some(ref group) = resource_group {
                    tracing::info!(group, "found resource group");
                }
            }

            let next = index + 1;
            if next == blocks.len() {
                break;
            }
            if !previous_succeeded(&blocks, next) {
                break;
            }
            if blocks[next].step_name != blocks[index].step_name {
                write_step_heading(out, &blocks[next])?;
            }
            dispatch_background(&self.executor, next, blocks[next].code_block.clone(), env.clone(), tx.clone());
        }
        drop(tx);

        if let Some(group) = resource_group {
            if let Err(e) = self.resources.delete_resource_group(&group) {
                tracing::error!(group, error = %e, "failed to delete resource group");
            }
        }

        let report = Report::new(scenario, &blocks);
        if report.success {
            writeln!(out, "{} all {} blocks passed", "✔".green(), blocks.len())?;
        } else {
            writeln!(out, "{} test failed", "✗".red())?;
        }
        Ok(report)
    }
}

/// Print the numbered heading of the step `block` opens. Unnamed steps get none.
pub(super) fn write_step_heading<W: Write>(out: &mut W, block: &StatefulCodeBlock) -> std::io::Result<()> {
    if block.step_name.is_empty() {
        return Ok(());
    }
    writeln!(out, "\n{}. {}", block.step_number + 1, block.step_name)
}

pub(super) fn write_outcome<W: Write>(out: &mut W, block: &StatefulCodeBlock, verbose: bool) -> std::io::Result<()> {
    let command = block.code_block.content.trim_end();
    if block.succeeded() {
        writeln!(out, "    {} {command}", "✔".green())?;
        if verbose && !block.stdout.is_empty() {
            writeln!(out, "{}", block.stdout.trim_end())?;
        }
    } else {
        writeln!(out, "    {} {command}", "✗".red())?;
        if let Some(ref error) = block.error {
            let kind = if error.is_verification_failure() { "output mismatch" } else { "command failed" };
            writeln!(out, "      {kind}: {error}")?;
        }
        if let Some(score) = block.score {
            writeln!(out, "      similarity score: {score:.3}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tempfile::TempDir;

    use super::*;
    use crate::engine::{BlockStatus, EngineConfig};
    use crate::scenario::Scenario;

    fn engine(dir: &TempDir) -> Engine {
        let config = EngineConfig { state_file: dir.path().join("env-vars"), ..EngineConfig::default() };
        Engine::new(config).unwrap().with_resources(std::sync::Arc::new(crate::azure::NoResources))
    }

    fn scenario(markdown: &str) -> Scenario {
        Scenario::from_markdown(markdown.to_string(), "test", &["bash"], BTreeMap::new(), &BTreeMap::new()).unwrap()
    }

    #[test]
    fn test_all_blocks_pass() {
        let dir = TempDir::new().unwrap();
        let scenario = scenario(
            "# Demo\n\n## One\n\n```bash\necho one\n```\n\n## Two\n\n```bash\necho two\n```\n",
        );
        let mut out = Vec::new();
        let report = engine(&dir).run_automated(&scenario, &mut out).unwrap();

        assert!(report.success);
        assert_eq!(report.failed_at_step, None);
        assert_eq!(report.code_blocks[1].actual_output, "two\n");
        let printed = String::from_utf8_lossy(&out);
        assert!(printed.contains("1. One"));
        assert!(printed.contains("2. Two"));
    }

    #[test]
    fn test_stops_at_first_failure() {
        let dir = TempDir::new().unwrap();
        let scenario = scenario(
            "# Demo\n\n## Steps\n\n```bash\necho one\n```\n\n```bash\nexit 3\n```\n\n```bash\necho three\n```\n",
        );
        let mut out = Vec::new();
        let report = engine(&dir).run_automated(&scenario, &mut out).unwrap();

        assert!(!report.success);
        assert_eq!(report.failed_at_step, Some(2));
        assert_eq!(report.code_blocks[2].status, BlockStatus::Pending);
        assert!(report.error.contains("'3'"));
        assert!(String::from_utf8_lossy(&out).contains("command failed: command exited with '3'"));
    }

    #[test]
    fn test_verification_failure_stops_run() {
        let dir = TempDir::new().unwrap();
        let scenario = scenario(
            "# Demo\n\n## Greet\n\n```bash\necho Goodbye\n```\n\n<!-- expected_similarity=0.9 -->\n\n```text\nHello, World!\n```\n\n```bash\necho after\n```\n",
        );
        let mut out = Vec::new();
        let report = engine(&dir).run_automated(&scenario, &mut out).unwrap();

        assert_eq!(report.failed_at_step, Some(1));
        assert!(report.code_blocks[0].score.is_some_and(|score| score < 0.9));
        assert_eq!(report.code_blocks[1].status, BlockStatus::Pending);
        assert!(String::from_utf8_lossy(&out).contains("output mismatch: expected output with similarity 0.90"));
    }

    #[test]
    fn test_leftover_exports_have_no_heading() {
        let dir = TempDir::new().unwrap();
        let overrides = BTreeMap::from([("EXTRA".to_string(), "1".to_string())]);
        let scenario = Scenario::from_markdown(
            "# Demo\n\n## Show\n\n```bash\necho $EXTRA\n```\n".to_string(),
            "test",
            &["bash"],
            BTreeMap::new(),
            &overrides,
        )
        .unwrap();
        let mut out = Vec::new();
        let report = engine(&dir).run_automated(&scenario, &mut out).unwrap();

        assert!(report.success);
        assert_eq!(report.code_blocks[1].actual_output, "1\n");
        let printed = String::from_utf8_lossy(&out);
        assert!(!printed.contains("1. \n"));
        assert!(printed.contains("2. Show"));
    }

    #[test]
    fn test_exports_carry_between_blocks() {
        let dir = TempDir::new().unwrap();
        let scenario = scenario(
            "# Demo\n\n## Steps\n\n```bash\nexport GREETING=hi\n```\n\n```bash\necho $GREETING\n```\n",
        );
        let mut out = Vec::new();
        let report = engine(&dir).run_automated(&scenario, &mut out).unwrap();

        assert!(report.success);
        assert_eq!(report.code_blocks[1].actual_output, "hi\n");
    }
}

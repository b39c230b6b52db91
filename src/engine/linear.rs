//! Headless linear driver.
//!
//! Runs every block in order without gating on earlier outcomes. Captured
//! commands run in the background while a spinner turns on the terminal.

use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use crossterm::cursor;
use crossterm::style::Stylize;
use crossterm::QueueableCommand;

use super::automated::{write_outcome, write_step_heading};
use super::dispatch::complete_run;
use super::state::{flatten, StatefulCodeBlock};
use super::Engine;
use crate::azure::{
    az_cli_error, filter_deletion_commands, find_resource_group_name, find_resource_uris, resource_group_id,
    set_correlation_id,
};
use crate::core::{CommandHandle, CommandResult, StdioMode};
use crate::error::EngineResult;
use crate::patterns::{is_az_command, is_ssh_command};
use crate::report::Report;
use crate::scenario::Scenario;
use crate::status::{DeploymentState, DeploymentStatus, StatusReporter};

const SPINNER_FRAMES: [char; 4] = ['-', '\\', '|', '/'];

impl Engine {
    /// Run every block in order, recording failures and moving on.
    ///
    /// In hosted environments a status marker is emitted at each step and
    /// at the end. The persisted state file is removed when the run ends.
    pub fn run_linear<W: Write>(
        &self,
        scenario: &Scenario,
        out: &mut W,
        reporter: &mut StatusReporter,
    ) -> EngineResult<Report> {
        self.select_subscription()?;

        let scenario = if self.config.do_not_delete {
            Scenario { steps: filter_deletion_commands(&scenario.steps), ..scenario.clone() }
        } else {
            scenario.clone()
        };
        let mut env = scenario.environment.clone();
        set_correlation_id(&self.config.correlation_id, &mut env);

        let hosted = self.config.environment.is_hosted();
        let mut blocks = flatten(&scenario);
        let mut status = DeploymentStatus::for_scenario(&scenario);
        let mut resource_group: Option<String> = None;

        writeln!(out, "{}", scenario.name.as_str().bold())?;

        for index in 0..blocks.len() {
            let new_step = index == 0 || blocks[index].step_name != blocks[index - 1].step_name;
            if new_step {
                let block = &blocks[index];
                write_step_heading(out, block)?;
                status.current_step = block.step_number + 1;
                report(reporter, &status);
            }

            let block = &blocks[index].code_block;
            for line in block.content.lines() {
                writeln!(out, "    {line}")?;
            }
            out.flush()?;

            let result = if is_ssh_command(&block.content) {
                tracing::info!(index, "running remote login in the foreground");
                self.executor.run(&block.content, &env, StdioMode::Inherit)
            } else {
                let handle = self.executor.spawn(block.content.clone(), env.clone());
                wait_with_spinner(out, handle, self.config.spinner_refresh)?
            };

            let mut run = complete_run(block, result);
            if run.error.is_none() {
                run.error = az_cli_error(&block.content, &run.output);
            }

            if run.succeeded() && is_az_command(&block.content) {
                if resource_group.is_none() {
                    resource_group = find_resource_group_name(&run.output.stdout);
                    if let Some(ref group) = resource_group {
                        tracing::info!(group, "found resource group");
                        status.add_resource_uri(resource_group_id(&self.config.subscription, group));
                    }
                }
                for uri in find_resource_uris(&run.output.stdout) {
                    status.add_resource_uri(uri);
                }
            }

            blocks[index].finish(run);
            let block = &blocks[index];
            write_outcome(out, block, self.config.verbose)?;

            if block.failed() {
                tracing::warn!(index, "block failed, continuing");
                if hosted {
                    let message = block.error.as_ref().map(ToString::to_string).unwrap_or_default();
                    status.set_error(message);
                    status.set_output(block.stderr.clone());
                    report(reporter, &status);
                }
            }
        }

        if hosted {
            self.finish_status(&mut status, &blocks, &scenario, resource_group.as_deref());
            report(reporter, &status);
        }

        if let Err(e) = self.executor.state.delete() {
            tracing::warn!(error = %e, "failed to reset environment state");
        }

        Ok(Report::new(&scenario, &blocks))
    }

    fn finish_status(
        &self,
        status: &mut DeploymentStatus,
        blocks: &[StatefulCodeBlock],
        scenario: &Scenario,
        resource_group: Option<&str>,
    ) {
        if let Some(group) = resource_group {
            for uri in self.resources.deployed_resource_uris(group) {
                status.add_resource_uri(uri);
            }
        }
        if blocks.iter().any(StatefulCodeBlock::failed) {
            status.status = DeploymentState::Failed;
            return;
        }
        status.status = DeploymentState::Succeeded;
        match self.executor.state.load() {
            Ok(variables) => status.configure_markdown(&scenario.markdown, &variables),
            Err(e) => tracing::error!(error = %e, "failed to load environment state"),
        }
    }
}

fn report(reporter: &mut StatusReporter, status: &DeploymentStatus) {
    if let Err(e) = reporter.report(status) {
        tracing::error!(error = %e, "failed to report status");
    }
}

/// Poll `handle` until it finishes, turning a spinner every `refresh`.
fn wait_with_spinner<W: Write>(out: &mut W, mut handle: CommandHandle, refresh: Duration) -> io::Result<CommandResult> {
    out.queue(cursor::Hide)?;
    let mut frame = 0;
    let result = loop {
        if let Some(result) = handle.try_finish() {
            break result;
        }
        write!(out, "\r  {}", SPINNER_FRAMES[frame % SPINNER_FRAMES.len()])?;
        out.flush()?;
        frame += 1;
        thread::sleep(refresh);
    };
    write!(out, "\r   \r")?;
    out.queue(cursor::Show)?;
    out.flush()?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    use tempfile::TempDir;

    use super::*;
    use crate::engine::{BlockStatus, EngineConfig};
    use crate::environment::Environment;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn engine(dir: &TempDir, configure: impl FnOnce(&mut EngineConfig)) -> Engine {
        let mut config = EngineConfig {
            state_file: dir.path().join("env-vars"),
            spinner_refresh: Duration::from_millis(5),
            ..EngineConfig::default()
        };
        configure(&mut config);
        Engine::new(config).unwrap().with_resources(Arc::new(crate::azure::NoResources))
    }

    fn scenario(markdown: &str) -> Scenario {
        Scenario::from_markdown(markdown.to_string(), "test", &["bash"], BTreeMap::new(), &BTreeMap::new()).unwrap()
    }

    #[test]
    fn test_continues_past_failure() {
        let dir = TempDir::new().unwrap();
        let scenario = scenario(
            "# Demo\n\n## Steps\n\n```bash\necho one\n```\n\n```bash\nexit 1\n```\n\n```bash\necho three\n```\n",
        );
        let mut out = Vec::new();
        let mut reporter = StatusReporter::new(Environment::Local, Box::new(io::sink()));
        let report = engine(&dir, |_| {}).run_linear(&scenario, &mut out, &mut reporter).unwrap();

        assert!(!report.success);
        assert_eq!(report.failed_at_step, Some(2));
        assert_eq!(report.code_blocks[2].status, BlockStatus::Success);
        assert_eq!(report.code_blocks[2].actual_output, "three\n");
    }

    #[test]
    fn test_leftover_exports_step_is_unnumbered() {
        let dir = TempDir::new().unwrap();
        let overrides = BTreeMap::from([("EXTRA".to_string(), "x y".to_string())]);
        let scenario = Scenario::from_markdown(
            "# Demo\n\n## Show\n\n```bash\necho \"$EXTRA\"\n```\n".to_string(),
            "test",
            &["bash"],
            BTreeMap::new(),
            &overrides,
        )
        .unwrap();
        let mut out = Vec::new();
        let mut reporter = StatusReporter::new(Environment::Local, Box::new(io::sink()));
        let report = engine(&dir, |_| {}).run_linear(&scenario, &mut out, &mut reporter).unwrap();

        assert_eq!(report.code_blocks[1].actual_output, "x y\n");
        let printed = String::from_utf8_lossy(&out);
        assert!(!printed.contains("1. \n"));
        assert!(printed.contains("\n2. Show\n"));
    }

    #[test]
    fn test_state_file_removed_after_run() {
        let dir = TempDir::new().unwrap();
        let scenario = scenario("# Demo\n\n## Steps\n\n```bash\nexport A=1\n```\n");
        let mut out = Vec::new();
        let mut reporter = StatusReporter::new(Environment::Local, Box::new(io::sink()));
        let engine = engine(&dir, |_| {});
        engine.run_linear(&scenario, &mut out, &mut reporter).unwrap();
        assert!(!engine.state().exists());
    }

    #[test]
    fn test_do_not_delete_drops_group_deletion() {
        let dir = TempDir::new().unwrap();
        let scenario = scenario(
            "# Demo\n\n## Deploy\n\n```bash\necho deploy\n```\n\n## Clean up\n\n```bash\naz group delete --name rg --yes\n```\n",
        );
        let mut out = Vec::new();
        let mut reporter = StatusReporter::new(Environment::Local, Box::new(io::sink()));
        let report = engine(&dir, |config| config.do_not_delete = true)
            .run_linear(&scenario, &mut out, &mut reporter)
            .unwrap();

        assert!(report.success);
        assert_eq!(report.code_blocks.len(), 1);
        assert!(!String::from_utf8_lossy(&out).contains("Clean up"));
    }

    #[test]
    fn test_correlation_id_sets_user_agent() {
        let dir = TempDir::new().unwrap();
        let scenario = scenario("# Demo\n\n## Steps\n\n```bash\necho $AZURE_HTTP_USER_AGENT\n```\n");
        let mut out = Vec::new();
        let mut reporter = StatusReporter::new(Environment::Local, Box::new(io::sink()));
        let report = engine(&dir, |config| config.correlation_id = "abc".to_string())
            .run_linear(&scenario, &mut out, &mut reporter)
            .unwrap();
        assert_eq!(report.code_blocks[0].actual_output, "execdoc-abc\n");
    }

    #[test]
    fn test_hosted_run_reports_status() {
        let dir = TempDir::new().unwrap();
        let scenario = scenario(
            "# Demo\n\n## One\n\n```bash\nexport NAME=demo\n```\n\n## Two\n\n```bash\necho $NAME\n```\n",
        );
        let buffer = SharedBuffer::default();
        let mut reporter = StatusReporter::new(Environment::Azure, Box::new(buffer.clone()));
        let mut out = Vec::new();
        let report = engine(&dir, |config| config.environment = Environment::Azure)
            .run_linear(&scenario, &mut out, &mut reporter)
            .unwrap();

        assert!(report.success);
        let markers = buffer.contents();
        assert_eq!(markers.lines().count(), 3);
        let last = markers.lines().last().unwrap();
        assert!(last.starts_with("ie_us") && last.ends_with("ie_ue"));
        assert!(last.contains(r#""status":"Succeeded""#));
    }

    #[test]
    fn test_hosted_failure_marks_status_failed() {
        let dir = TempDir::new().unwrap();
        let scenario = scenario("# Demo\n\n## One\n\n```bash\nfalse\n```\n");
        let buffer = SharedBuffer::default();
        let mut reporter = StatusReporter::new(Environment::Ocd, Box::new(buffer.clone()));
        let mut out = Vec::new();
        engine(&dir, |config| config.environment = Environment::Ocd)
            .run_linear(&scenario, &mut out, &mut reporter)
            .unwrap();

        let markers = buffer.contents();
        assert!(markers.lines().last().unwrap().contains(r#""status":"Failed""#));
    }
}

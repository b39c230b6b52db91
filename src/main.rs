//! Execdoc - execute markdown documents as verifiable shell scenarios.
//!
//! Documents can be stepped through interactively, run as a fail-fast test,
//! executed headless, or rendered as a plain shell script.

#![allow(clippy::single_match_else)]

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use execdoc::core::{Config, EnvState};
use execdoc::engine::{Engine, EngineConfig, StatefulCodeBlock};
use execdoc::environment::Environment;
use execdoc::error::EngineError;
use execdoc::report::Report;
use execdoc::scenario::Scenario;
use execdoc::status::{wrap_marker, StatusReporter};
use execdoc::tui::{self, InteractiveOptions, Keymap, Theme};

/// Code block languages that run as commands.
const LANGUAGES: &[&str] = &["bash", "azurecli", "azurecli-interactive", "terraform"];

/// Languages shown by `inspect`.
const INSPECT_LANGUAGES: &[&str] = &["bash", "azurecli", "azurecli-interactive", "azurecli-inspect", "terraform"];

/// Log file used by interactive runs when none is configured.
const INTERACTIVE_LOG_FILE: &str = "execdoc.log";

/// Execute markdown documents as verifiable shell scenarios
#[derive(Parser)]
#[command(name = "execdoc")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log filter (e.g. "debug", "execdoc=trace")
    #[arg(long, global = true, env = "EXECDOC_LOG_LEVEL")]
    log_level: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Environment the scenario runs in (local, ci, github-actions, ocd, azure)
    #[arg(long, global = true, env = "EXECDOC_ENVIRONMENT")]
    environment: Option<Environment>,

    /// File used to carry exported variables between commands
    #[arg(long, global = true, env = "EXECDOC_STATE_FILE")]
    state_file: Option<PathBuf>,
}

/// Arguments shared by every command that reads a document.
#[derive(Args)]
struct DocumentArgs {
    /// Path or URL of the markdown document
    document: String,

    /// Override a variable, repeatable
    #[arg(long = "var", value_name = "KEY=VALUE")]
    vars: Vec<String>,
}

/// Arguments shared by the drivers.
#[derive(Args)]
struct RunArgs {
    /// Azure subscription to select before running
    #[arg(long, default_value = "")]
    subscription: String,

    /// Directory commands run in
    #[arg(long)]
    working_directory: Option<PathBuf>,

    /// Write a JSON report of the run to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every block headless, continuing past failures
    Execute {
        #[command(flatten)]
        doc: DocumentArgs,

        #[command(flatten)]
        run: RunArgs,

        /// Print the output of successful blocks
        #[arg(short, long)]
        verbose: bool,

        /// Skip blocks that delete resource groups
        #[arg(long)]
        do_not_delete: bool,

        /// Tag Azure requests with this id
        #[arg(long, default_value = "")]
        correlation_id: String,
    },

    /// Run every block and stop at the first failure
    Test {
        #[command(flatten)]
        doc: DocumentArgs,

        #[command(flatten)]
        run: RunArgs,

        /// Print the output of successful blocks
        #[arg(short, long)]
        verbose: bool,
    },

    /// Step through the document in a terminal UI
    Interactive {
        #[command(flatten)]
        doc: DocumentArgs,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Show the steps and commands of a document
    Inspect {
        #[command(flatten)]
        doc: DocumentArgs,
    },

    /// Render the document as a shell script
    ToBash {
        #[command(flatten)]
        doc: DocumentArgs,
    },

    /// Delete the persisted environment state
    ClearEnv {
        /// Don't confirm before deleting
        #[arg(short, long)]
        force: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Show the effective configuration
    Config {
        /// Show the config directory path
        #[arg(long)]
        path: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load().context("failed to load configuration")?;

    if let Some(environment) = cli.environment {
        config.general.environment = environment;
    }
    if let Some(ref state_file) = cli.state_file {
        config.execution.state_file.clone_from(state_file);
    }

    let log_file = cli.log_file.clone().or_else(|| config.general.log_file.clone()).or_else(|| {
        matches!(cli.command, Commands::Interactive { .. }).then(|| PathBuf::from(INTERACTIVE_LOG_FILE))
    });
    let log_level = cli
        .log_level
        .clone()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| config.general.log_level.clone());
    init_logging(&log_level, log_file.as_deref())?;

    match cli.command {
        Commands::Execute { doc, run, verbose, do_not_delete, correlation_id } => {
            let engine_config = EngineConfig {
                verbose,
                do_not_delete,
                correlation_id,
                ..engine_config(&config, &run)
            };
            cmd_execute(&doc, engine_config, run.report.as_deref())?;
        }
        Commands::Test { doc, run, verbose } => {
            let engine_config = EngineConfig { verbose, ..engine_config(&config, &run) };
            cmd_test(&doc, engine_config, run.report.as_deref())?;
        }
        Commands::Interactive { doc, run } => {
            cmd_interactive(&doc, engine_config(&config, &run), &config, run.report.as_deref())?;
        }
        Commands::Inspect { doc } => {
            cmd_inspect(&doc)?;
        }
        Commands::ToBash { doc } => {
            cmd_to_bash(&doc, config.general.environment)?;
        }
        Commands::ClearEnv { force } => {
            cmd_clear_env(&EnvState::new(&config.execution.state_file), force)?;
        }
        Commands::Completions { shell } => {
            cmd_completions(shell);
        }
        Commands::Config { path } => {
            cmd_config(&config, path)?;
        }
    }

    Ok(())
}

/// Set up tracing. Logs go to `log_file` when given, otherwise to stderr.
fn init_logging(level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            registry.with(fmt::layer().with_target(false).with_ansi(false).with_writer(Mutex::new(file))).init();
        }
        None => {
            registry.with(fmt::layer().with_target(false).with_writer(io::stderr)).init();
        }
    }

    Ok(())
}

fn engine_config(config: &Config, run: &RunArgs) -> EngineConfig {
    EngineConfig {
        subscription: run.subscription.clone(),
        working_directory: run.working_directory.clone(),
        ..EngineConfig::from_config(config)
    }
}

/// Parse `KEY=VALUE` tokens.
fn parse_vars(tokens: &[String]) -> Result<BTreeMap<String, String>, EngineError> {
    tokens
        .iter()
        .map(|token| match token.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(EngineError::VariableFormat(token.clone())),
        })
        .collect()
}

fn load_scenario(doc: &DocumentArgs, languages: &[&str]) -> Result<Scenario> {
    let overrides = parse_vars(&doc.vars)?;
    Scenario::from_path(&doc.document, languages, &overrides)
        .with_context(|| format!("failed to load scenario from {}", doc.document))
}

/// Write the report if requested and fail when any block failed.
fn finish_run(report: &Report, report_path: Option<&Path>) -> Result<()> {
    if let Some(path) = report_path {
        report.write_to_file(path).with_context(|| format!("failed to write report to {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote report");
    }

    if !report.success {
        match report.failed_at_step {
            Some(position) => anyhow::bail!("scenario failed at block {position}: {}", report.error),
            None => anyhow::bail!("scenario did not complete"),
        }
    }
    Ok(())
}

/// Run the linear driver.
fn cmd_execute(doc: &DocumentArgs, engine_config: EngineConfig, report_path: Option<&Path>) -> Result<()> {
    use crossterm::{cursor, execute};

    let scenario = load_scenario(doc, LANGUAGES)?;
    let environment = engine_config.environment;
    let engine = Engine::new(engine_config)?;

    // The spinner hides the cursor; bring it back on interrupt
    ctrlc::set_handler(|| {
        let _ = execute!(io::stdout(), cursor::Show);
        std::process::exit(130);
    })
    .context("failed to install interrupt handler")?;

    let mut reporter = StatusReporter::stdout(environment);
    let mut out = io::stdout();
    let report = engine.run_linear(&scenario, &mut out, &mut reporter)?;
    finish_run(&report, report_path)
}

/// Run the automated test driver.
fn cmd_test(doc: &DocumentArgs, engine_config: EngineConfig, report_path: Option<&Path>) -> Result<()> {
    let scenario = load_scenario(doc, LANGUAGES)?;
    let engine = Engine::new(engine_config)?;

    let mut out = io::stdout();
    let report = engine.run_automated(&scenario, &mut out)?;
    finish_run(&report, report_path)
}

/// Run the interactive driver.
fn cmd_interactive(
    doc: &DocumentArgs,
    engine_config: EngineConfig,
    config: &Config,
    report_path: Option<&Path>,
) -> Result<()> {
    let scenario = load_scenario(doc, LANGUAGES)?;
    let environment = engine_config.environment;
    let engine = Engine::new(engine_config)?;
    let mut model = engine.interactive_model(&scenario)?;

    let theme = Theme::by_name(&config.ui.theme).unwrap_or_else(|| {
        tracing::warn!(theme = %config.ui.theme, "unknown theme, using default");
        Theme::default()
    });
    let options = InteractiveOptions {
        keymap: Keymap::from(&config.keys),
        theme,
        tick_rate: Duration::from_millis(config.ui.tick_rate_ms.max(1)),
    };

    let mut reporter = StatusReporter::stdout(environment);
    tui::run_interactive(&mut model, engine.executor(), &mut reporter, &options)?;

    let report = Report::new(&scenario, model.blocks());
    if let Some(path) = report_path {
        report.write_to_file(path).with_context(|| format!("failed to write report to {}", path.display()))?;
    }

    let done = model.blocks().iter().filter(|block| block.succeeded()).count();
    println!("{}: {done}/{} blocks succeeded", model.title(), model.blocks().len());
    if let Some(failed) = model.blocks().iter().find(|block| block.failed()) {
        anyhow::bail!("{}", failure_message(failed));
    }
    Ok(())
}

fn failure_message(block: &StatefulCodeBlock) -> String {
    let error = block.error.as_ref().map(ToString::to_string).unwrap_or_default();
    format!("step '{}' failed: {error}", block.step_name)
}

/// Print a document's steps.
fn cmd_inspect(doc: &DocumentArgs) -> Result<()> {
    let scenario = load_scenario(doc, INSPECT_LANGUAGES)?;
    let mut out = io::stdout().lock();

    writeln!(out, "{}", scenario.name)?;
    for (key, value) in &scenario.environment {
        writeln!(out, "  {key}={value}")?;
    }

    for (number, step) in scenario.steps.iter().enumerate() {
        writeln!(out)?;
        writeln!(out, "{}. {}", number + 1, step.name)?;
        for block in &step.code_blocks {
            if !block.description.is_empty() {
                writeln!(out, "   {}", block.description)?;
            }
            for line in block.content.lines() {
                writeln!(out, "   $ {line}")?;
            }
            if let Some(ref expected) = block.expected_output {
                match expected.expected_regex {
                    Some(ref pattern) => writeln!(out, "   expects output matching /{}/", pattern.as_str())?,
                    None => writeln!(out, "   expects output with similarity {}", expected.expected_similarity)?,
                }
            }
        }
    }

    Ok(())
}

/// Render a document as a shell script.
fn cmd_to_bash(doc: &DocumentArgs, environment: Environment) -> Result<()> {
    let scenario = load_scenario(doc, LANGUAGES)?;
    let script = scenario.to_shell_script();

    if environment.is_hosted() {
        let json = serde_json::json!({ "script": script }).to_string();
        println!("{}", wrap_marker(&json));
    } else {
        print!("{script}");
    }
    Ok(())
}

/// Delete the persisted environment state.
fn cmd_clear_env(state: &EnvState, force: bool) -> Result<()> {
    if !state.exists() {
        println!("No environment state at {}", state.path().display());
        return Ok(());
    }

    if !force {
        print!("Delete environment state at {}? [y/N] ", state.path().display());
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled");
            return Ok(());
        }
    }

    state.delete()?;
    println!("Removed {}", state.path().display());
    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "execdoc", &mut io::stdout());
}

/// Show configuration.
fn cmd_config(config: &Config, show_path: bool) -> Result<()> {
    if show_path {
        if let Some(path) = Config::config_dir() {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let toml = toml::to_string_pretty(config)?;
    println!("{toml}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vars() {
        let vars = parse_vars(&["A=1".to_string(), "B=x=y".to_string(), "C=".to_string()]).unwrap();
        assert_eq!(vars["A"], "1");
        assert_eq!(vars["B"], "x=y");
        assert_eq!(vars["C"], "");
    }

    #[test]
    fn test_parse_vars_rejects_malformed() {
        assert!(matches!(parse_vars(&["NOEQUALS".to_string()]), Err(EngineError::VariableFormat(_))));
        assert!(matches!(parse_vars(&["=value".to_string()]), Err(EngineError::VariableFormat(_))));
    }

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }
}

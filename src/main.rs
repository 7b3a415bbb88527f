//! # Main Entry Point
//!
//! Runs a plan of file and shell actions against a local directory:
//! - Domain: configuration
//! - Infrastructure: local sandbox, stdout sink, tracing
//! - Application: the action runner
//!
//! Plan format (YAML list, executed in order):
//!
//! ```yaml
//! - id: pkg
//!   type: file
//!   file_path: package.json
//!   content: "{}"
//! - id: install
//!   type: shell
//!   content: npm install
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use action_runner::application::runner::ActionRunner;
use action_runner::domain::config::AppConfig;
use action_runner::domain::types::{ActionRecord, ActionStatus};
use action_runner::infrastructure::logging::init_tracing;
use action_runner::infrastructure::sandbox::LocalSandbox;
use action_runner::infrastructure::sink::StdoutSink;
use action_runner::strings::messages;

#[derive(Parser, Debug)]
#[command(name = "action-runner", about = "Run a plan of file and shell actions in a sandbox")]
struct Cli {
    /// YAML configuration file. Built-in defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sandbox root directory (overrides `sandbox.root`).
    #[arg(long)]
    root: Option<String>,

    /// Print the final state snapshot as JSON instead of a summary.
    #[arg(long)]
    json: bool,

    /// Plan file listing the actions to run.
    plan: PathBuf,
}

#[derive(Debug, Deserialize)]
struct PlanEntry {
    id: String,
    #[serde(flatten)]
    record: ActionRecord,
}

fn load_plan(path: &Path) -> Result<Vec<PlanEntry>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read plan {}", path.display()))?;
    parse_plan(&content).with_context(|| format!("Failed to parse plan {}", path.display()))
}

fn parse_plan(content: &str) -> Result<Vec<PlanEntry>> {
    Ok(serde_yaml::from_str(content)?)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // 1. Configuration
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(root) = cli.root {
        config.sandbox.root = root;
    }

    // 2. Logging
    let _guard = init_tracing(&config.logging)?;

    let plan = load_plan(&cli.plan)?;
    tracing::info!("Loaded {} actions from {}", plan.len(), cli.plan.display());

    // 3. Runner
    let sandbox = LocalSandbox::new(&config.sandbox.root)?;
    tracing::info!("Sandbox root: {}", sandbox.root().display());
    let runner = ActionRunner::new(Arc::new(sandbox), config.runner.clone());
    runner.set_output_sink(Arc::new(StdoutSink));

    // Register everything first, as the parser does while streaming.
    for entry in &plan {
        if !runner.add_action(&entry.id, entry.record.clone()) {
            tracing::warn!("Duplicate action id {} in plan, keeping the first", entry.id);
        }
    }
    for entry in plan {
        runner.run_action(&entry.id, entry.record).await?;
    }

    // 4. Wait for the queue, aborting on Ctrl-C
    tokio::select! {
        result = runner.drain() => result?,
        _ = tokio::signal::ctrl_c() => {
            let aborted = runner.cancel_all();
            tracing::warn!("Interrupted, aborting {} actions", aborted);
            runner.drain().await?;
        }
    }

    // 5. Report
    let snapshot = runner.store().snapshot();
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        for state in &snapshot {
            println!(
                "{}",
                messages::summary_line(&state.id, state.status.as_str(), state.record.label())
            );
            if let Some(error) = &state.error {
                println!("           {}", error.trim_end());
            }
        }
    }

    let failed = snapshot
        .iter()
        .filter(|s| s.status == ActionStatus::Failed)
        .count();
    if failed > 0 {
        tracing::error!("{} of {} actions failed", failed, snapshot.len());
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan_entries() {
        let yaml = r#"
- id: pkg
  type: file
  file_path: package.json
  content: "{}"
- id: install
  type: shell
  content: npm install
"#;
        let plan = parse_plan(yaml).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].id, "pkg");
        assert_eq!(plan[0].record, ActionRecord::file("package.json", "{}"));
        assert_eq!(plan[1].record, ActionRecord::shell("npm install"));
    }

    #[test]
    fn test_parse_plan_rejects_unknown_type() {
        assert!(parse_plan("- id: x\n  type: deploy\n  content: now\n").is_err());
    }
}

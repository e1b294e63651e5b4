//! Status command implementation
//!
//! Implements `kojichain status`, optionally polling until the task
//! reaches a terminal state.

use anyhow::Result;
use serde::Serialize;

use super::CommandContext;
use crate::cli::output::{self, OutputConfig};
use crate::core::task::BuildStatus;

#[derive(Serialize)]
struct TaskReport {
    task_id: u64,
    status: BuildStatus,
    url: String,
}

/// Execute the status command
pub async fn execute(context: &CommandContext, task_id: u64, watch: bool) -> Result<()> {
    let orchestrator = context.task_orchestrator()?;
    let poll = orchestrator.options().timeouts.poll;
    let config = OutputConfig::global();

    let mut status = orchestrator.get_build_status(task_id).await;
    if watch {
        let spinner = output::create_spinner(&format!("Task {task_id}: {status}"));
        while !status.is_terminal() {
            tokio::time::sleep(poll).await;
            status = orchestrator.get_build_status(task_id).await;
            spinner.set_message(format!("Task {task_id}: {status}"));
        }
        spinner.finish_and_clear();
    }

    let report = TaskReport {
        task_id,
        status,
        url: context.hub().task_url(task_id),
    };
    if config.json {
        output::print_json(&report)?;
    } else if !config.quiet {
        println!("Task {}: {}", report.task_id, report.status);
        println!("  {}", report.url);
    }
    Ok(())
}

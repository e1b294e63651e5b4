//! Cancel command implementation

use anyhow::{bail, Result};

use super::CommandContext;
use crate::cli::output::{status, OutputConfig};

/// Execute the cancel command
pub async fn execute(context: &CommandContext, task_id: u64) -> Result<()> {
    let orchestrator = context.task_orchestrator()?;
    if !orchestrator.cancel_build(task_id).await {
        bail!("Task {task_id} could not be canceled");
    }
    if OutputConfig::global().is_human() {
        println!("{} Canceled task {task_id}", status::SUCCESS);
    }
    Ok(())
}

//! Wait-repo command implementation
//!
//! Implements `kojichain wait-repo`, the same repository barrier the
//! orchestrator runs between levels.

use std::time::Duration;

use anyhow::{bail, Result};

use super::CommandContext;
use crate::cli::output::{self, status, OutputConfig};

/// Execute the wait-repo command
pub async fn execute(
    context: &CommandContext,
    tag: Option<String>,
    timeout: Option<u64>,
) -> Result<()> {
    let orchestrator = context.task_orchestrator()?;
    let tag = tag.unwrap_or_else(|| orchestrator.options().build_tag.clone());
    let timeout = timeout.map_or(orchestrator.options().timeouts.repo, Duration::from_secs);

    let spinner = output::create_spinner(&format!("Waiting for repository of {tag}"));
    let ready = orchestrator.wait_for_repo(&tag, timeout).await;
    spinner.finish_and_clear();

    if !ready {
        bail!("Repository of {tag} was not regenerated within {}s", timeout.as_secs());
    }
    if OutputConfig::global().is_human() {
        println!("{} Repository of {tag} is ready", status::SUCCESS);
    }
    Ok(())
}

//! Chain command implementation
//!
//! Implements `kojichain chain`: build the given SRPMs in order, waiting
//! for the build repository after each one and stopping at the first
//! failure.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};

use super::CommandContext;
use crate::cli::output;
use crate::core::collaborators::{BuildRequirementProvider, NoLocator};
use crate::core::names::PassThrough;
use crate::infra::rpm::RpmQuery;

/// Pair every SRPM with its package name
async fn named_packages(srpms: &[PathBuf]) -> Result<Vec<(String, PathBuf)>> {
    let rpm = RpmQuery::new();
    let mut packages = Vec::with_capacity(srpms.len());
    for srpm in srpms {
        let info = rpm.package_info(srpm).await?;
        packages.push((info.name, srpm.clone()));
    }
    Ok(packages)
}

/// Execute the chain command
pub async fn execute(
    context: &CommandContext,
    target: &str,
    srpms: &[PathBuf],
    build_tag: Option<String>,
    scratch: bool,
) -> Result<()> {
    if let Some(missing) = srpms.iter().find(|p| !p.exists()) {
        bail!("SRPM not found: {}", missing.display());
    }

    let mut options = context.config.build_options(target);
    if let Some(tag) = build_tag {
        options.build_tag = tag;
    }
    options.scratch |= scratch;

    let packages = named_packages(srpms).await?;
    tracing::info!(
        "Chain: {}",
        packages
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    );

    let mut orchestrator =
        context.orchestrator(options, Arc::new(PassThrough), Arc::new(NoLocator))?;
    let spinner = output::create_spinner("Building chain");
    let result = orchestrator.build_chain(&packages).await;
    spinner.finish_and_clear();

    output::print_build_result(&result)?;
    if !result.success {
        let reason = result
            .aborted
            .clone()
            .unwrap_or_else(|| format!("failed: {}", result.failed_packages.join(", ")));
        bail!("Chain did not complete ({reason})");
    }
    Ok(())
}

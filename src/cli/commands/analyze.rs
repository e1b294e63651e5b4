//! Analyze command implementation
//!
//! Implements `kojichain analyze`: show an SRPM's build requirements and
//! which of them the build tag cannot satisfy.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use super::{normalizer, CommandContext};
use crate::cli::output::{self, status, OutputConfig};
use crate::core::collaborators::{BuildRequirementProvider, PackageInfo};
use crate::core::resolver::DependencyResolver;
use crate::infra::rpm::RpmQuery;

/// One build requirement and what it resolved to
#[derive(Debug, Serialize)]
pub struct Requirement {
    /// As written in the SRPM
    pub raw: String,
    /// Package name after normalization
    pub package: String,
}

/// Outcome of an analysis
#[derive(Debug, Serialize)]
pub struct Analysis {
    /// The analyzed package
    pub package: PackageInfo,
    /// Tag checked
    pub build_tag: String,
    /// Every build requirement
    pub requirements: Vec<Requirement>,
    /// Normalized names missing from the tag
    pub missing: Vec<String>,
}

fn format_analysis(analysis: &Analysis) -> String {
    let info = &analysis.package;
    let mut out = vec![
        format!("Package: {}", info.name),
        format!("Version: {}", info.version),
        format!("Release: {}", info.release),
        format!("NVR: {}", info.nvr()),
        String::new(),
        format!("BuildRequires ({}):", analysis.requirements.len()),
    ];
    for req in &analysis.requirements {
        if req.raw == req.package {
            out.push(format!("  - {}", req.raw));
        } else {
            out.push(format!("  - {} -> {}", req.raw, req.package));
        }
    }
    out.push(String::new());
    if analysis.missing.is_empty() {
        out.push(format!(
            "{} All dependencies available in {}",
            status::SUCCESS,
            analysis.build_tag
        ));
    } else {
        out.push(format!(
            "Missing from {} ({}):",
            analysis.build_tag,
            analysis.missing.len()
        ));
        out.extend(
            analysis
                .missing
                .iter()
                .map(|name| format!("  {} {name}", status::ERROR)),
        );
    }
    out.join("\n")
}

/// Execute the analyze command
pub async fn execute(
    context: &CommandContext,
    srpm: &Path,
    build_tag: Option<String>,
    no_name_resolution: bool,
) -> Result<()> {
    let rpm = Arc::new(RpmQuery::new());
    let package = rpm
        .package_info(srpm)
        .await
        .with_context(|| format!("Failed to analyze {}", srpm.display()))?;
    let raw = rpm.build_requires(srpm).await?;

    let names = normalizer(no_name_resolution);
    let requirements: Vec<Requirement> = raw
        .iter()
        .map(|raw| Requirement {
            raw: raw.clone(),
            package: names.normalize(raw),
        })
        .collect();

    let build_tag = build_tag.unwrap_or_else(|| context.config.build_tag().to_string());
    let hub = context.checked_hub()?;
    let mut resolver = DependencyResolver::new(Arc::new(hub), rpm, names, build_tag.clone());

    let spinner = output::create_spinner(&format!("Checking availability in {build_tag}"));
    let missing = resolver.find_missing(&raw).await;
    spinner.finish_and_clear();

    let analysis = Analysis {
        package,
        build_tag,
        requirements,
        missing: missing?,
    };

    let config = OutputConfig::global();
    if config.json {
        output::print_json(&analysis)?;
    } else if !config.quiet {
        println!("{}", format_analysis(&analysis));
    }
    Ok(())
}

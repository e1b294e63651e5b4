//! Output formatting and progress indicators
//!
//! This module provides utilities for displaying spinners, build
//! summaries and formatted messages to the user.

use std::sync::OnceLock;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::core::builder::BuildPlan;
use crate::core::task::{BuildResult, BuildStatus};

static OUTPUT: OnceLock<OutputConfig> = OnceLock::new();

/// How results are rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputConfig {
    /// Suppress everything but errors
    pub quiet: bool,
    /// Print machine-readable JSON
    pub json: bool,
    /// Verbosity level from `-v`
    pub verbose: u8,
}

impl OutputConfig {
    /// Create an output configuration
    pub fn new(quiet: bool, json: bool, verbose: u8) -> Self {
        Self {
            quiet,
            json,
            verbose,
        }
    }

    /// Make this configuration visible to every command
    pub fn apply_global(self) {
        let _ = OUTPUT.set(self);
    }

    /// The configuration set with [`apply_global`](Self::apply_global)
    pub fn global() -> Self {
        OUTPUT.get().copied().unwrap_or_default()
    }

    /// Default log filter directive for the chosen verbosity
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }

    /// Whether human-readable output should be printed
    pub fn is_human(&self) -> bool {
        !self.quiet && !self.json
    }
}

/// Print an error and its causes to stderr
pub fn display_error(error: &anyhow::Error) {
    eprintln!("{} {error}", status::ERROR);
    for cause in error.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
}

/// Print `value` as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Create a spinner for operations with unknown duration
///
/// Hidden unless output is human-readable.
pub fn create_spinner(message: &str) -> ProgressBar {
    if !OutputConfig::global().is_human() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.blue} {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Create a progress bar for downloads
pub fn create_download_bar(total: u64) -> ProgressBar {
    if !OutputConfig::global().is_human() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
    {
        pb.set_style(style.progress_chars("█▓▒░"));
    }
    pb
}

fn status_icon(status: BuildStatus) -> &'static str {
    match status {
        BuildStatus::Complete => status::SUCCESS,
        BuildStatus::Failed => status::ERROR,
        BuildStatus::Building => "⏳",
        BuildStatus::Pending => "○",
        BuildStatus::Canceled => "⊘",
    }
}

/// Render a build result as a human summary
pub fn format_build_result(result: &BuildResult) -> String {
    let rule = "=".repeat(60);
    let mut out = vec![rule.clone(), "BUILD SUMMARY".to_string(), rule.clone()];

    out.push(if result.success {
        format!("Status: SUCCESS {}", status::SUCCESS)
    } else {
        format!("Status: FAILED {}", status::ERROR)
    });
    out.push(format!(
        "Total time: {:.1} seconds",
        result.total_time.as_secs_f64()
    ));
    out.push(format!("Packages built: {}", result.built_packages.len()));
    out.push(format!("Packages failed: {}", result.failed_packages.len()));
    if let Some(reason) = &result.aborted {
        out.push(format!("Aborted: {reason}"));
    }

    let mut section = |title: &str, icon: &str, names: &[String]| {
        if !names.is_empty() {
            out.push(String::new());
            out.push(title.to_string());
            out.extend(names.iter().map(|name| format!("  {icon} {name}")));
        }
    };
    section("Successfully built:", status::SUCCESS, &result.built_packages);
    section("Failed packages:", status::ERROR, &result.failed_packages);
    section("Skipped (no SRPM):", status::WARNING, &result.skipped_packages);

    if !result.tasks.is_empty() {
        out.push(String::new());
        out.push("Build tasks:".to_string());
        for task in &result.tasks {
            out.push(format!(
                "  {} {}: {}",
                status_icon(task.status),
                task.package_name,
                task.status
            ));
            if let Some(id) = task.task_id {
                out.push(format!("      Task ID: {id}"));
            }
            if let Some(error) = &task.error_message {
                let short: String = error.chars().take(100).collect();
                out.push(format!("      Error: {short}"));
            }
        }
    }

    out.push(rule);
    out.join("\n")
}

/// Render a dry-run plan
pub fn format_plan(plan: &BuildPlan) -> String {
    let mut out = vec![format!("Target package: {}", plan.root.nvr())];
    let count: usize = plan.levels.iter().map(Vec::len).sum();
    if count == 0 {
        out.push("No additional dependencies to build".to_string());
    } else {
        out.push(format!("Build order ({count} packages):"));
        for (idx, level) in plan.levels.iter().enumerate() {
            out.push(format!("  Level {}: {}", idx + 1, level.join(", ")));
        }
    }
    if !plan.missing.is_empty() {
        out.push(format!(
            "{} No SRPM for: {}",
            status::WARNING,
            plan.missing.join(", ")
        ));
    }
    out.join("\n")
}

/// Print a build result in the configured format
pub fn print_build_result(result: &BuildResult) -> anyhow::Result<()> {
    let config = OutputConfig::global();
    if config.json {
        print_json(result)
    } else {
        if !config.quiet {
            println!("{}", format_build_result(result));
        }
        Ok(())
    }
}

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix (yellow triangle)
    pub const WARNING: &str = "⚠";

    /// Info prefix (blue circle)
    pub const INFO: &str = "ℹ";
}

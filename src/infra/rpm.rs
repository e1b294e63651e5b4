//! SRPM metadata through the `rpm` command

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::defaults;
use crate::core::collaborators::{BuildRequirementProvider, PackageInfo};
use crate::error::SourceError;
use crate::infra::process;

/// Version comparison operators, longest first
const VERSION_OPERATORS: &[&str] = &[">=", "<=", "==", ">", "<", "="];

const QUERY_FORMAT: &str = "%{NAME}\\n%{VERSION}\\n%{RELEASE}\\n";

/// Queries SRPM headers with `rpm -qp`
#[derive(Debug, Clone)]
pub struct RpmQuery {
    binary: PathBuf,
    timeout: Duration,
}

impl Default for RpmQuery {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("rpm"),
            timeout: Duration::from_secs(defaults::CALL_TIMEOUT),
        }
    }
}

impl RpmQuery {
    /// Create a query runner using `rpm` from `PATH`
    pub fn new() -> Self {
        Self::default()
    }

    async fn query(&self, srpm: &Path, args: &[&str]) -> Result<String, SourceError> {
        check_srpm(srpm)?;
        let mut command = Command::new(&self.binary);
        command.arg("-qp").args(args).arg(srpm);
        let display = format!("rpm -qp {} {}", args.join(" "), srpm.display());

        process::run(command, &display, self.timeout)
            .await
            .map_err(|e| SourceError::InvalidSrpm {
                path: srpm.to_path_buf(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl BuildRequirementProvider for RpmQuery {
    async fn build_requires(&self, srpm: &Path) -> Result<Vec<String>, SourceError> {
        let output = self.query(srpm, &["--requires"]).await?;
        Ok(parse_requires(&output))
    }

    async fn package_info(&self, srpm: &Path) -> Result<PackageInfo, SourceError> {
        let output = self.query(srpm, &["--queryformat", QUERY_FORMAT]).await?;
        parse_package_info(&output).ok_or_else(|| SourceError::SpecParse {
            path: srpm.to_path_buf(),
            reason: "missing name, version or release".to_string(),
        })
    }
}

/// Reject paths that do not exist or are not source RPMs
pub fn check_srpm(srpm: &Path) -> Result<(), SourceError> {
    if !srpm.exists() {
        return Err(SourceError::NotFound {
            path: srpm.to_path_buf(),
        });
    }
    let is_srpm = srpm
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(".src.rpm"));
    if !is_srpm {
        return Err(SourceError::InvalidSrpm {
            path: srpm.to_path_buf(),
            reason: "expected a .src.rpm file".to_string(),
        });
    }
    Ok(())
}

/// Requirement names from `rpm -qp --requires` output
///
/// Version constraints are dropped, as are rpmlib features and file paths.
/// A boolean dependency such as `(foo >= 1 with foo < 2)` contributes its
/// first operand.
pub fn parse_requires(output: &str) -> Vec<String> {
    let mut requires: Vec<String> = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        let line = if line.starts_with('(') {
            first_operand(line)
        } else {
            line
        };
        let name = VERSION_OPERATORS
            .iter()
            .find_map(|op| line.split_once(op).map(|(name, _)| name))
            .unwrap_or(line)
            .trim();

        if name.is_empty() || name.starts_with("rpmlib(") || name.starts_with('/') {
            continue;
        }
        if !requires.iter().any(|r| r == name) {
            requires.push(name.to_string());
        }
    }
    requires
}

/// Leading package name of a boolean dependency expression
fn first_operand(expr: &str) -> &str {
    let mut token = expr
        .trim_start_matches('(')
        .split_whitespace()
        .next()
        .unwrap_or("");
    while token.ends_with(')') && token.matches(')').count() > token.matches('(').count() {
        token = &token[..token.len() - 1];
    }
    token
}

fn parse_package_info(output: &str) -> Option<PackageInfo> {
    let mut lines = output.lines().map(str::trim);
    let name = lines.next().filter(|s| !s.is_empty())?;
    let version = lines.next().filter(|s| !s.is_empty())?;
    let release = lines.next().filter(|s| !s.is_empty())?;
    Some(PackageInfo::new(name, version, release))
}

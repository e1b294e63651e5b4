//! Error types for kojichain
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use thiserror::Error;

use crate::core::task::BuildStatus;

/// Source package errors
#[derive(Error, Debug)]
pub enum SourceError {
    /// SRPM file does not exist
    #[error("SRPM not found: {path}")]
    NotFound { path: PathBuf },

    /// File is not a usable source package
    #[error("Not a valid SRPM '{path}': {reason}")]
    InvalidSrpm { path: PathBuf, reason: String },

    /// Package metadata could not be extracted
    #[error("Failed to read package metadata from '{path}': {reason}")]
    SpecParse { path: PathBuf, reason: String },

    /// No source package could be obtained for a name
    #[error("Could not obtain SRPM for '{package}': {reason}")]
    Unavailable { package: String, reason: String },

    /// IO error
    #[error("IO error for '{path}': {error}")]
    IoError { path: PathBuf, error: String },
}

/// Errors talking to the remote build hub
///
/// Every variant is a connectivity failure: the command could not be run,
/// did not finish in time, or exited non-zero.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    /// Command exited with a non-zero status
    #[error("Command '{command}' failed (exit code {code:?}): {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Command did not finish before its deadline
    #[error("Command '{command}' timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    /// Command could not be started
    #[error("Failed to run '{command}': {error}")]
    Spawn { command: String, error: String },
}

/// Dependency resolution errors
#[derive(Error, Debug)]
pub enum ResolverError {
    /// Circular dependency detected
    #[error("Circular dependency detected involving: {}", packages.join(", "))]
    CircularDependency { packages: Vec<String> },

    /// Required packages have no buildable source
    #[error("No SRPM available for: {}", packages.join(", "))]
    MissingSources { packages: Vec<String> },

    /// Availability query failed
    #[error("Failed to query build tag: {0}")]
    Remote(#[from] RemoteError),
}

/// Download errors
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Network error
    #[error("Network error downloading '{url}': {error}")]
    NetworkError { url: String, error: String },

    /// IO error
    #[error("IO error for '{path}': {error}")]
    IoError { path: PathBuf, error: String },

    /// Max retries exceeded
    #[error("Download failed after {retries} retries: {url}")]
    MaxRetriesExceeded { url: String, retries: u32 },

    /// Content does not match the expected checksum
    #[error("Checksum mismatch for '{file}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: PathBuf,
        expected: String,
        actual: String,
    },

    /// URL cannot be downloaded as an SRPM
    #[error("Invalid SRPM URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Build errors
#[derive(Error, Debug)]
pub enum BuildError {
    /// Root or dependency SRPM is missing on disk
    #[error("SRPM not found: {path}")]
    SourceNotFound { path: PathBuf },

    /// The hub rejected the submission or the build failed
    #[error("Build failed for package '{package}': {message}")]
    Submission { package: String, message: String },

    /// Illegal task state transition
    #[error("Task '{package}' cannot move from {from} to {to}")]
    InvalidTransition {
        package: String,
        from: BuildStatus,
        to: BuildStatus,
    },

    /// Resolution failed before anything was submitted
    #[error(transparent)]
    Resolver(#[from] ResolverError),

    /// Package metadata could not be read
    #[error(transparent)]
    Source(#[from] SourceError),
}

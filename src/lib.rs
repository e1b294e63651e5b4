//! Kojichain - dependency-aware chain builds on a Koji hub
//!
//! Given a source RPM, kojichain discovers which of its build requirements
//! are missing from the build tag, fetches their sources, orders them into
//! dependency levels and submits each level in turn, waiting for the build
//! repository to regenerate between levels.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Graph, resolver and orchestration logic (no direct I/O)
//! - [`infra`] - Infrastructure layer (koji client, rpm, downloads)
//! - [`config`] - Configuration and constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;

//! Infrastructure layer
//!
//! Handles all I/O operations: the koji client, rpm queries, downloads,
//! and external processes. This module is the only place where side
//! effects occur.

pub mod dirs;
pub mod dist_git;
pub mod download;
pub mod fetch;
pub mod koji;
pub mod koji_config;
pub mod process;
pub mod rpm;

//! Core business logic module
//!
//! Dependency graph construction, build planning and orchestration. Hub,
//! rpm and filesystem access go through the traits in [`collaborators`];
//! their implementations live in [`crate::infra`].
//!
//! # Submodules
//!
//! - [`graph`] - Dependency graph, topological order and build levels
//! - [`resolver`] - Recursive discovery of missing build requirements
//! - [`builder`] - Leveled build orchestration
//! - [`task`] - Build task state machine and run results
//! - [`names`] - Requirement to package name normalization
//! - [`collaborators`] - Traits for the hub, rpm and SRPM lookup
//! - [`global_config`] - Global configuration management

pub mod builder;
pub mod collaborators;
pub mod global_config;
pub mod graph;
pub mod names;
pub mod resolver;
pub mod task;

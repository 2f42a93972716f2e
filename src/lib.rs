//! # diag-harvester
//!
//! Harvests diagnostics from network devices under test over SSH.
//!
//! ## Overview
//!
//! Each harvesting invocation runs a catalog of device commands, writes
//! their output to a staging directory on the device, copies the files
//! back and scans them for error patterns. Logging commands resume from a
//! per-device cursor so repeated invocations only fetch new lines. Core
//! files written since the previous invocation are copied too, and
//! decodable dumps are handed to an external decoder in the background.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use diag_harvester::config::{load_or_default, CommandCatalog, TargetRegistry};
//! use diag_harvester::harvest::DeviceHarvester;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let targets = TargetRegistry::from_binding_file(Path::new("binding.yaml"))?;
//! let catalog = CommandCatalog::from_yaml_file(Path::new("catalog.yaml"))?;
//! let harvester = DeviceHarvester::new(Arc::new(targets), Arc::new(catalog), load_or_default(None)?);
//!
//! let report = harvester.collect("dut1", Path::new("/tmp/logs"), "smoke").await?;
//! println!("{} commands harvested", report.outcomes.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`cli`]: Command-line interface definitions and argument parsing
//! - [`models`]: Targets, outcomes, core file records and reports
//! - [`error`]: Harvest and transport error types
//! - [`config`]: Binding, command catalog and harvest configuration
//! - [`remote`]: SSH command execution and SCP retrieval
//! - [`harvest`]: The harvesting pipeline
//! - [`utils`]: Harvest summary output
//! - [`security`]: Credential scrubbing and path validation
//! - [`constants`]: Application-wide constants

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Core data models and structures used throughout the application
pub mod models;

/// Error taxonomy of the pipeline and its transport layer
pub mod error;

/// Configuration management: binding, catalog and tunables
pub mod config;

/// Remote command execution and file retrieval
pub mod remote;

/// Harvest pipeline components
pub mod harvest;

/// Utility functions for harvest reporting
pub mod utils;

/// Application constants and configuration values
pub mod constants;

/// Security utilities for path validation and credential protection
pub mod security;

/// Test utilities and helpers
#[cfg(test)]
pub mod test_utils;

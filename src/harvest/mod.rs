//! The harvesting pipeline.
//!
//! Per invocation and device: the target is looked up, the collection
//! registry is updated, the remote staging directory is reset on the first
//! invocation, then every catalog command is synthesized, run, copied back,
//! scanned for error patterns and (for logging commands) used to move the
//! cursor. Core files written since the session start follow, and the
//! session start is refreshed last.
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use diag_harvester::config::{CommandCatalog, HarvestConfig, TargetRegistry};
//! use diag_harvester::harvest::DeviceHarvester;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let targets = TargetRegistry::from_binding_file(Path::new("binding.yaml"))?;
//! let harvester = DeviceHarvester::new(
//!     Arc::new(targets),
//!     Arc::new(CommandCatalog::default_catalog()),
//!     HarvestConfig::default(),
//! );
//! harvester.collect_router_logs("dut1", Path::new("/tmp/logs"), "smoke").await?;
//! # Ok(())
//! # }
//! ```

/// Per-device invocation counters, cursors, session starts and core claims
pub mod registry;

/// Catalog entry to device command
pub mod synthesizer;

/// Error pattern matching and log cursor extraction
pub mod scanner;

/// Device wall clock as epoch seconds
pub mod clock;

/// Core-file discovery, stabilization and decode triggering
pub mod core_dump;

/// Invocation driver and multi-device fan-out
pub mod collector;

pub use collector::{harvest_devices, DeviceHarvester};
pub use core_dump::{DecodeLauncher, DecodeOutcome, DecodeTask, ShellDecodeLauncher};
pub use registry::CollectionRegistry;

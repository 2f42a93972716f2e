//! Utility functions for harvest reporting.
//!
//! ## Components
//!
//! - **Summary**: per-invocation JSON summary written next to the artifacts
//!
//! ```no_run
//! use diag_harvester::models::HarvestReport;
//! use diag_harvester::utils::summary::write_harvest_summary;
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let report = HarvestReport::new("dut1", "smoke", 1);
//! let path = write_harvest_summary(&report, Path::new("/tmp/logs/debug_files/1_dut1_smoke"))?;
//! println!("Summary: {}", path.display());
//! # Ok(())
//! # }
//! ```

/// Harvest summary generation
pub mod summary;

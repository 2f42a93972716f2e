use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use serde_json::json;
use uuid::Uuid;

use crate::constants::SUMMARY_FILE_NAME;
use crate::models::HarvestReport;

/// Create a JSON summary of one harvesting invocation.
///
/// The summary carries a fresh harvest id, the per-command outcomes, the
/// core files seen and every accumulated error message.
///
/// # Example Output
///
/// ```json
/// {
///   "harvest_id": "550e8400-e29b-41d4-a716-446655440000",
///   "device_id": "dut1",
///   "test_name": "smoke",
///   "invocation": 2,
///   "outcomes": [...],
///   "core_files": [...],
///   "errors": ["Count: 1 Error patterns matched for command show logging"]
/// }
/// ```
pub fn create_harvest_summary(report: &HarvestReport) -> Result<String> {
    let summary = json!({
        "harvest_id": Uuid::new_v4().to_string(),
        "device_id": report.device_id,
        "test_name": report.test_name,
        "invocation": report.invocation,
        "started_at": report.started_at,
        "finished_at": report.finished_at,
        "harvester_version": env!("CARGO_PKG_VERSION"),
        "outcomes": report.outcomes,
        "core_files": report.core_files,
        "error_count": report.errors.len(),
        "errors": report.error_messages(),
    });

    serde_json::to_string_pretty(&summary).context("Failed to serialize harvest summary to JSON")
}

/// Write the summary into `dir`, creating it when needed
pub fn write_harvest_summary(report: &HarvestReport, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .context(format!("Failed to create summary directory {}", dir.display()))?;

    let path = dir.join(SUMMARY_FILE_NAME);
    fs::write(&path, create_harvest_summary(report)?)
        .context(format!("Failed to write harvest summary to {}", path.display()))?;

    info!("Harvest summary written to {}", path.display());
    Ok(path)
}

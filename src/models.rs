use std::fmt;
use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;

use crate::error::{HarvestError, HarvestResult};
use crate::security::credential_scrubber::redact;

/// Remote-access endpoint of one device under test.
///
/// Resolved once per run by the target registry and never mutated afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct Target {
    pub device_id: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub credential: String,
}

impl Target {
    /// `host:port` form used for TCP connections
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Credentials must never reach logs through `{:?}`
impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("device_id", &self.device_id)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("credential", &redact(&self.credential))
            .finish()
    }
}

/// Result of harvesting one catalog entry during one invocation
#[derive(Serialize, Debug, Clone, Default)]
pub struct HarvestOutcome {
    pub command: String,
    /// The device-native command that was actually sent
    pub synthesized: Option<String>,
    pub local_path: Option<PathBuf>,
    #[serde(skip)]
    pub raw_content: String,
    pub content_bytes: usize,
    pub matched_patterns: Vec<String>,
    pub error: Option<String>,
}

impl HarvestOutcome {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            ..Default::default()
        }
    }
}

/// Lifecycle of a discovered core file
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CoreFileStatus {
    Discovered,
    Copied,
    Stabilizing,
    DecodeTriggered,
    Failed,
}

impl fmt::Display for CoreFileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CoreFileStatus::Discovered => "discovered",
            CoreFileStatus::Copied => "copied",
            CoreFileStatus::Stabilizing => "stabilizing",
            CoreFileStatus::DecodeTriggered => "decode_triggered",
            CoreFileStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One core file found on the device during one invocation
#[derive(Serialize, Debug, Clone)]
pub struct CoreFileRecord {
    /// Device path, e.g. `harddisk:/foo.core.gz`
    pub remote_path: String,
    pub local_path: Option<PathBuf>,
    pub status: CoreFileStatus,
    /// Why the record stopped short of decoding, if it did
    pub note: Option<String>,
}

impl CoreFileRecord {
    pub fn discovered(remote_path: &str) -> Self {
        Self {
            remote_path: remote_path.to_string(),
            local_path: None,
            status: CoreFileStatus::Discovered,
            note: None,
        }
    }

    /// Move to `next`. `DecodeTriggered` and `Failed` are terminal.
    pub fn advance(&mut self, next: CoreFileStatus) {
        if matches!(self.status, CoreFileStatus::DecodeTriggered | CoreFileStatus::Failed) {
            return;
        }
        self.status = next;
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.advance(CoreFileStatus::Failed);
        self.note = Some(reason.into());
    }
}

/// Everything one harvesting invocation produced for one device
#[derive(Serialize, Debug)]
pub struct HarvestReport {
    pub device_id: String,
    pub test_name: String,
    pub invocation: u64,
    pub outcomes: Vec<HarvestOutcome>,
    pub core_files: Vec<CoreFileRecord>,
    /// Accumulated non-fatal errors, in the order they occurred
    #[serde(skip)]
    pub errors: Vec<HarvestError>,
    pub started_at: String,
    pub finished_at: Option<String>,
}

impl HarvestReport {
    pub fn new(device_id: &str, test_name: &str, invocation: u64) -> Self {
        Self {
            device_id: device_id.to_string(),
            test_name: test_name.to_string(),
            invocation,
            outcomes: Vec::new(),
            core_files: Vec::new(),
            errors: Vec::new(),
            started_at: Utc::now().to_rfc3339(),
            finished_at: None,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now().to_rfc3339());
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }

    /// Join the accumulated errors into one `Aggregate` error, if any
    pub fn into_result(self) -> HarvestResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(HarvestError::Aggregate {
                device: self.device_id,
                errors: self.errors,
            })
        }
    }
}

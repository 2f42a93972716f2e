//! Global constants for the diag-harvester application.
//!
//! This module centralizes the device layout, naming conventions and
//! timing values used by the harvesting pipeline. Most of them are only
//! defaults: `HarvestConfig` can override the ones that vary per platform.

// Remote layout
/// Staging directory on the device for harvested command output
pub const DEFAULT_REMOTE_LOG_DIR: &str = "harddisk:/firex_log_directory";

/// Directory searched for core files, as seen from the device shell
pub const DEFAULT_CORE_SEARCH_ROOT: &str = "/misc/disk1";

/// The same directory as addressed by the device CLI and file transfers
pub const DEFAULT_CORE_DEVICE_ROOT: &str = "harddisk:/";

/// Name pattern for core files handed to `find -name`
pub const DEFAULT_CORE_NAME_PATTERN: &str = "*core*";

/// Only core files whose name contains this marker are decoded
pub const DEFAULT_DECODE_NAME_FILTER: &str = "core.gz";

// Local layout
/// Sub-directory of the log root holding per-invocation command artifacts
pub const DEBUG_FILES_DIR: &str = "debug_files";

/// Name of the per-invocation JSON summary
pub const SUMMARY_FILE_NAME: &str = "harvest_summary.json";

// Command synthesis
/// Extension the device appends to show-tech archives
pub const SHOW_TECH_ARCHIVE_EXTENSION: &str = "tgz";

/// Number of leading characters of a log line kept as the cursor (timestamp prefix)
pub const CURSOR_PREFIX_LEN: usize = 38;

/// Command used to read the device clock
pub const SHOW_CLOCK_COMMAND: &str = "show clock";

// Decode sidecar convention
/// Extension of the metadata sidecar that accompanies a core file
pub const SIDECAR_EXTENSION: &str = "txt";

/// Key of the sidecar line that names the build workspace
pub const WORKSPACE_KEY: &str = "Workspace";

/// Suffix of the marker file that exists while a decode runs
pub const DECODE_MARKER_SUFFIX: &str = ".decode_in_progress";

/// Suffix of the decoder output file
pub const DECODE_OUTPUT_SUFFIX: &str = ".decoded.txt";

/// Default decoder executable
pub const DEFAULT_DECODER_COMMAND: &str = "/auto/mcp-project1/xr-decoder/xr-decode";

// Timeout and concurrency constants
/// Default SSH port
pub const SSH_DEFAULT_PORT: u16 = 22;

/// Upper bound for a single remote-to-local file transfer in seconds
pub const TRANSFER_TIMEOUT_SECS: u64 = 300;

/// Interval between core file size observations in milliseconds
pub const STABILIZATION_INTERVAL_MS: u64 = 5_000;

/// Default TCP connection timeout in seconds
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Maximum number of devices harvested concurrently
pub const MAX_PARALLEL_DEVICES: usize = 4;

// Error messages
pub const ERROR_FAILED_TO_CREATE_SESSION: &str = "Failed to create SSH session";
pub const ERROR_AUTHENTICATION_FAILED: &str = "Authentication failed";

//! Error types for the harvesting pipeline.
//!
//! `TransportError` covers failures of the SSH/SCP layer. `HarvestError` is
//! the pipeline taxonomy: most variants are recorded per command or per core
//! file and later joined into a single [`HarvestError::Aggregate`].

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of the remote session or file transfer layer
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("SSH error: {0}")]
    Ssh(#[from] ssh2::Error),

    #[error("authentication failed for user {0}")]
    Auth(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("remote task aborted: {0}")]
    Aborted(String),

    /// Error reported by the device itself (e.g. a rejected command)
    #[error("{0}")]
    Device(String),
}

/// Errors produced while harvesting a device
#[derive(Error, Debug)]
pub enum HarvestError {
    /// Missing or unresolvable target identity; fatal before any device I/O
    #[error("configuration error: {0}")]
    Config(String),

    #[error("Unknown command type {kind} for command {command}")]
    UnknownCommandKind { kind: String, command: String },

    #[error("Error executing command {command}: {source}")]
    RemoteExecution {
        command: String,
        #[source]
        source: TransportError,
    },

    #[error("Error copying file {remote_path}: {source}")]
    Transfer {
        remote_path: String,
        #[source]
        source: TransportError,
    },

    #[error("Error reading file {}: {source}", .path.display())]
    LocalRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Count: {count} Error patterns matched for command {command}")]
    PatternsMatched {
        command: String,
        count: usize,
        patterns: Vec<String>,
    },

    #[error("Error reading device clock: {0}")]
    Clock(String),

    #[error("Core file {path}: {reason}")]
    CoreFile { path: String, reason: String },

    #[error("Error starting decode for {}: {source}", .core_file.display())]
    Decode {
        core_file: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("errors encountered during log collection for {device}:\n{}", join_errors(.errors))]
    Aggregate {
        device: String,
        errors: Vec<HarvestError>,
    },
}

fn join_errors(errors: &[HarvestError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

impl HarvestError {
    /// Whether this error aborts an invocation rather than being accumulated
    pub fn is_fatal(&self) -> bool {
        matches!(self, HarvestError::Config(_))
    }
}

pub type HarvestResult<T> = std::result::Result<T, HarvestError>;

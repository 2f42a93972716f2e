//! Core-file discovery, retrieval and decode triggering.
//!
//! Every core written on the device since the session start is copied
//! locally. Copies whose name marks a decodable dump are polled until their
//! size settles, then handed to an external decoder once a sidecar file
//! names the build workspace. The decoder runs detached; the only signal of
//! its completion is the removal of the `.decode_in_progress` marker.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::process::Command;

use crate::config::HarvestConfig;
use crate::constants::{DECODE_MARKER_SUFFIX, DECODE_OUTPUT_SUFFIX, SIDECAR_EXTENSION, WORKSPACE_KEY};
use crate::error::{HarvestError, HarvestResult};
use crate::harvest::registry::CollectionRegistry;
use crate::models::{CoreFileRecord, CoreFileStatus, Target};
use crate::remote::{FileRetriever, RemoteExecutor};
use crate::security::validate_relative_suffix;

/// Everything a decoder needs to process one core file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeRequest {
    pub core_file: PathBuf,
    pub workspace: PathBuf,
    pub marker: PathBuf,
    pub output: PathBuf,
}

/// Handle to a detached decode.
///
/// There is no join: the task is finished once its marker is gone.
#[derive(Debug, Clone)]
pub struct DecodeTask {
    pub core_file: PathBuf,
    pub marker: PathBuf,
    pub output: PathBuf,
    pub pid: Option<u32>,
}

impl DecodeTask {
    pub fn is_in_progress(&self) -> bool {
        self.marker.exists()
    }
}

/// Result of asking for a core file to be decoded
#[derive(Debug)]
pub enum DecodeOutcome {
    Triggered(DecodeTask),
    /// Sidecar or workspace missing; try again on a later invocation
    NotReady(String),
    AlreadyInProgress,
    AlreadyDecoded,
}

/// Starts the decoder for a prepared request
pub trait DecodeLauncher: Send + Sync {
    fn launch(&self, request: &DecodeRequest) -> io::Result<DecodeTask>;
}

/// Runs the decoder through `sh -c` in the workspace directory.
///
/// The shell removes the marker when the decoder exits, whatever its status.
#[derive(Debug, Clone)]
pub struct ShellDecodeLauncher {
    decoder_command: String,
}

impl ShellDecodeLauncher {
    pub fn new(decoder_command: impl Into<String>) -> Self {
        Self {
            decoder_command: decoder_command.into(),
        }
    }

    fn script(&self, request: &DecodeRequest) -> String {
        format!(
            "{} -l {} > {} 2>&1; rm -f {}",
            self.decoder_command,
            shell_quote(&request.core_file),
            shell_quote(&request.output),
            shell_quote(&request.marker)
        )
    }
}

impl DecodeLauncher for ShellDecodeLauncher {
    fn launch(&self, request: &DecodeRequest) -> io::Result<DecodeTask> {
        let script = self.script(request);
        debug!("Launching decoder in {}: {}", request.workspace.display(), script);

        let child = Command::new("sh")
            .arg("-c")
            .arg(&script)
            .current_dir(&request.workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        // Dropping the handle leaves the decoder running
        Ok(DecodeTask {
            core_file: request.core_file.clone(),
            marker: request.marker.clone(),
            output: request.output.clone(),
            pid: child.id(),
        })
    }
}

fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', r"'\''"))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// `<core>.decode_in_progress`
pub fn marker_path(core_file: &Path) -> PathBuf {
    with_suffix(core_file, DECODE_MARKER_SUFFIX)
}

/// `<core>.decoded.txt`
pub fn decoded_output_path(core_file: &Path) -> PathBuf {
    with_suffix(core_file, DECODE_OUTPUT_SUFFIX)
}

/// The core path with its last extension replaced: `a.core.gz` -> `a.core.txt`
pub fn sidecar_path(core_file: &Path) -> PathBuf {
    core_file.with_extension(SIDECAR_EXTENSION)
}

/// Workspace named by the first `Workspace = <path>` line of a sidecar
pub fn read_workspace(sidecar: &Path) -> io::Result<Option<PathBuf>> {
    let content = fs::read_to_string(sidecar)?;
    let workspace = content
        .lines()
        .filter(|line| line.contains(WORKSPACE_KEY))
        .find_map(|line| line.split_once(" = ").or_else(|| line.split_once('=')))
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from);
    Ok(workspace)
}

/// Poll `probe` until two consecutive readings agree, returning that size.
///
/// There is no upper bound on the number of polls.
pub async fn wait_for_stable_size<F>(mut probe: F, interval: Duration) -> io::Result<u64>
where
    F: FnMut() -> io::Result<u64>,
{
    let mut previous = None;
    loop {
        let size = probe()?;
        if previous == Some(size) {
            return Ok(size);
        }
        debug!("File size {} bytes, waiting for it to settle", size);
        previous = Some(size);
        tokio::time::sleep(interval).await;
    }
}

/// Trigger a decode of a local core copy if its sidecar allows it
pub fn decode_core_file(
    launcher: &dyn DecodeLauncher,
    core_file: &Path,
) -> HarvestResult<DecodeOutcome> {
    let core_error = |reason: String| HarvestError::CoreFile {
        path: core_file.display().to_string(),
        reason,
    };

    // The decoder runs in another directory, so every path handed to it is absolute
    let core_file = fs::canonicalize(core_file)
        .map_err(|e| core_error(format!("cannot resolve local copy: {}", e)))?;

    let sidecar = sidecar_path(&core_file);
    if !sidecar.exists() {
        info!("Sidecar file {} not found", sidecar.display());
        return Ok(DecodeOutcome::NotReady(format!("{} not found", sidecar.display())));
    }

    let workspace = match read_workspace(&sidecar)
        .map_err(|e| core_error(format!("cannot read {}: {}", sidecar.display(), e)))?
    {
        Some(workspace) => workspace,
        None => {
            info!("No {} entry in {}", WORKSPACE_KEY, sidecar.display());
            return Ok(DecodeOutcome::NotReady(format!(
                "no {} entry in {}",
                WORKSPACE_KEY,
                sidecar.display()
            )));
        }
    };

    if !workspace.is_dir() {
        info!("Workspace {} does not exist", workspace.display());
        return Ok(DecodeOutcome::NotReady(format!(
            "workspace {} does not exist",
            workspace.display()
        )));
    }

    let marker = marker_path(&core_file);
    if marker.exists() {
        info!("Decoding already in progress for {}", core_file.display());
        return Ok(DecodeOutcome::AlreadyInProgress);
    }

    let output = decoded_output_path(&core_file);
    if output.exists() {
        info!("Decoded output {} already exists", output.display());
        return Ok(DecodeOutcome::AlreadyDecoded);
    }

    fs::write(&marker, b"")
        .map_err(|e| core_error(format!("cannot create marker {}: {}", marker.display(), e)))?;

    let request = DecodeRequest {
        core_file: core_file.clone(),
        workspace,
        marker,
        output,
    };

    match launcher.launch(&request) {
        Ok(task) => {
            info!("Decoding started for {} in {}", core_file.display(), request.workspace.display());
            Ok(DecodeOutcome::Triggered(task))
        }
        Err(source) => {
            if let Err(e) = fs::remove_file(&request.marker) {
                warn!("Failed to remove marker {}: {}", request.marker.display(), e);
            }
            Err(HarvestError::Decode { core_file, source })
        }
    }
}

/// `run find` command listing cores written since `session_start`
pub fn discovery_command(config: &HarvestConfig, session_start: i64) -> String {
    format!(
        "run find {} -maxdepth 1 -type f -name '{}' -newermt @{}",
        config.core_search_root.trim_end_matches('/'),
        config.core_name_pattern,
        session_start
    )
}

/// Map `find` output lines under the search root to device paths
pub fn parse_discovery(config: &HarvestConfig, output: &str) -> Vec<String> {
    let root = format!("{}/", config.core_search_root.trim_end_matches('/'));
    output
        .lines()
        .map(str::trim)
        .filter_map(|line| {
            line.find(&root)
                .map(|start| &line[start + root.len()..])
                .filter(|suffix| !suffix.is_empty())
                .map(|suffix| format!("{}{}", config.core_device_root, suffix))
        })
        .collect()
}

/// One pass of the core-dump state machine for one device
pub struct CoreDumpPipeline<'a> {
    pub executor: &'a dyn RemoteExecutor,
    pub retriever: &'a dyn FileRetriever,
    pub launcher: &'a dyn DecodeLauncher,
    pub registry: &'a CollectionRegistry,
    pub config: &'a HarvestConfig,
}

impl CoreDumpPipeline<'_> {
    /// Discover, copy and decode the cores written since `session_start`.
    ///
    /// Errors are collected per core file; one failing file never stops
    /// the others.
    pub async fn run(
        &self,
        target: &Target,
        invocation: u64,
        log_dir: &Path,
        session_start: i64,
    ) -> (Vec<CoreFileRecord>, Vec<HarvestError>) {
        let mut errors = Vec::new();

        let command = discovery_command(self.config, session_start);
        info!("Searching for core files on {}: {}", target.device_id, command);
        let output = match self.executor.run(target, &command).await {
            Ok(output) => output,
            Err(source) => {
                errors.push(HarvestError::RemoteExecution { command, source });
                return (Vec::new(), errors);
            }
        };

        let remote_paths = parse_discovery(self.config, &output);
        if remote_paths.is_empty() {
            info!("No new core files on {}", target.device_id);
        }

        let local_root = log_dir.join(invocation.to_string());
        let mut records = Vec::with_capacity(remote_paths.len());
        for remote_path in remote_paths {
            let mut record = CoreFileRecord::discovered(&remote_path);
            if let Err(e) = self.process(target, &local_root, &mut record).await {
                warn!("Core file {} on {}: {}", remote_path, target.device_id, e);
                record.fail(e.to_string());
                errors.push(e);
            }
            records.push(record);
        }

        (records, errors)
    }

    async fn process(
        &self,
        target: &Target,
        local_root: &Path,
        record: &mut CoreFileRecord,
    ) -> HarvestResult<()> {
        let remote_path = record.remote_path.clone();
        let core_error = |reason: String| HarvestError::CoreFile {
            path: remote_path.clone(),
            reason,
        };

        let suffix = record
            .remote_path
            .strip_prefix(self.config.core_device_root.as_str())
            .unwrap_or(&record.remote_path);
        let relative = validate_relative_suffix(suffix).map_err(|e| core_error(e.to_string()))?;
        let local_dir = match relative.parent() {
            Some(parent) => local_root.join(parent),
            None => local_root.to_path_buf(),
        };

        let local_path = self
            .retriever
            .copy(target, &record.remote_path, &local_dir)
            .await
            .map_err(|source| HarvestError::Transfer {
                remote_path: record.remote_path.clone(),
                source,
            })?;
        info!("Copied core file {} to {}", record.remote_path, local_path.display());
        record.local_path = Some(local_path.clone());
        record.advance(CoreFileStatus::Copied);

        if !record.remote_path.contains(self.config.decode_name_filter.as_str()) {
            debug!("{} is not a decodable dump", record.remote_path);
            return Ok(());
        }

        record.advance(CoreFileStatus::Stabilizing);
        if !self.registry.try_claim_core(&target.device_id, &record.remote_path) {
            info!("Decode already triggered for {} during this run", record.remote_path);
            record.note = Some("decode already triggered".to_string());
            return Ok(());
        }

        let probe_path = local_path.clone();
        let size = match wait_for_stable_size(
            || fs::metadata(&probe_path).map(|m| m.len()),
            self.config.stabilization_interval(),
        )
        .await
        {
            Ok(size) => size,
            Err(e) => {
                self.registry.release_core(&target.device_id, &record.remote_path);
                return Err(core_error(format!("cannot stat local copy: {}", e)));
            }
        };
        debug!("Core file {} settled at {} bytes", local_path.display(), size);

        let outcome = match decode_core_file(self.launcher, &local_path) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.registry.release_core(&target.device_id, &record.remote_path);
                return Err(e);
            }
        };

        match outcome {
            DecodeOutcome::Triggered(task) => {
                debug!("Decode task for {} has pid {:?}", task.core_file.display(), task.pid);
                record.advance(CoreFileStatus::DecodeTriggered);
            }
            DecodeOutcome::NotReady(reason) => {
                self.registry.release_core(&target.device_id, &record.remote_path);
                record.note = Some(reason);
            }
            DecodeOutcome::AlreadyInProgress => {
                self.registry.release_core(&target.device_id, &record.remote_path);
                record.note = Some("decode in progress".to_string());
            }
            DecodeOutcome::AlreadyDecoded => {
                self.registry.release_core(&target.device_id, &record.remote_path);
                record.note = Some("already decoded".to_string());
            }
        }

        Ok(())
    }
}

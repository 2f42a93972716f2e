//! Test utilities for diag-harvester
//!
//! Scripted stand-ins for the remote seams so the pipeline can run end to
//! end against a temporary directory instead of a device.

#![cfg(test)]

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use crate::constants::SHOW_CLOCK_COMMAND;
use crate::error::TransportError;
use crate::harvest::core_dump::{DecodeLauncher, DecodeRequest, DecodeTask};
use crate::models::Target;
use crate::remote::{remote_basename, FileRetriever, RemoteExecutor};

/// Creates a temporary directory that is automatically cleaned up
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// A target with throwaway credentials
pub fn sample_target(device_id: &str) -> Target {
    Target {
        device_id: device_id.to_string(),
        host: format!("{}.lab", device_id),
        port: 22,
        user: "admin".to_string(),
        credential: "lab-password".to_string(),
    }
}

/// Executor that records every command and answers from a script.
///
/// `show clock` returns the configured clock line; commands starting with a
/// registered prefix get its canned output or fail; everything else
/// returns empty output.
pub struct RecordingExecutor {
    clock: String,
    commands: Mutex<Vec<String>>,
    responses: Mutex<Vec<(String, String)>>,
    failures: Mutex<Vec<String>>,
}

impl RecordingExecutor {
    pub fn new(clock: &str) -> Self {
        Self {
            clock: clock.to_string(),
            commands: Mutex::new(Vec::new()),
            responses: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
        }
    }

    pub fn respond_to(&self, prefix: &str, output: &str) {
        self.responses
            .lock()
            .unwrap()
            .push((prefix.to_string(), output.to_string()));
    }

    pub fn fail_on(&self, prefix: &str) {
        self.failures.lock().unwrap().push(prefix.to_string());
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteExecutor for RecordingExecutor {
    async fn run(&self, _target: &Target, command: &str) -> Result<String, TransportError> {
        self.commands.lock().unwrap().push(command.to_string());

        if self.failures.lock().unwrap().iter().any(|p| command.starts_with(p.as_str())) {
            return Err(TransportError::Device("% Invalid input detected".to_string()));
        }
        if command == SHOW_CLOCK_COMMAND {
            return Ok(self.clock.clone());
        }

        let responses = self.responses.lock().unwrap();
        Ok(responses
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_default())
    }
}

/// Retriever that writes scripted content instead of transferring files.
///
/// Content is keyed by the remote file name; unknown files come back empty.
#[derive(Default)]
pub struct FakeRetriever {
    contents: Mutex<HashMap<String, Vec<u8>>>,
    requested: Mutex<Vec<String>>,
    missing: Mutex<Vec<String>>,
}

impl FakeRetriever {
    pub fn set_content(&self, file_name: &str, content: &str) {
        self.contents
            .lock()
            .unwrap()
            .insert(file_name.to_string(), content.as_bytes().to_vec());
    }

    /// Make copies of `file_name` fail as if the remote file did not exist
    pub fn set_missing(&self, file_name: &str) {
        self.missing.lock().unwrap().push(file_name.to_string());
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileRetriever for FakeRetriever {
    async fn copy(
        &self,
        _target: &Target,
        remote_path: &str,
        local_dir: &Path,
    ) -> Result<PathBuf, TransportError> {
        self.requested.lock().unwrap().push(remote_path.to_string());

        let name = remote_basename(remote_path);
        if self.missing.lock().unwrap().iter().any(|m| m == name) {
            return Err(TransportError::Device(format!("{}: No such file or directory", remote_path)));
        }

        fs::create_dir_all(local_dir)?;
        let local_path = local_dir.join(name);
        let content = self.contents.lock().unwrap().get(name).cloned().unwrap_or_default();
        fs::write(&local_path, content)?;
        Ok(local_path)
    }
}

/// Launcher that reports success without starting anything
pub struct NoopLauncher;

impl DecodeLauncher for NoopLauncher {
    fn launch(&self, request: &DecodeRequest) -> io::Result<DecodeTask> {
        Ok(DecodeTask {
            core_file: request.core_file.clone(),
            marker: request.marker.clone(),
            output: request.output.clone(),
            pid: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_executor_script() {
        let executor = RecordingExecutor::new("10:00:00.000 UTC Tue Mar 5 2024");
        executor.respond_to("run find", "/misc/disk1/a.core");
        executor.fail_on("show bogus");
        let target = sample_target("dut1");

        assert_eq!(executor.run(&target, "show clock").await.unwrap(), "10:00:00.000 UTC Tue Mar 5 2024");
        assert_eq!(executor.run(&target, "run find /misc/disk1").await.unwrap(), "/misc/disk1/a.core");
        assert!(executor.run(&target, "show bogus").await.is_err());
        assert_eq!(executor.run(&target, "show version").await.unwrap(), "");
        assert_eq!(executor.commands().len(), 4);
    }

    #[tokio::test]
    async fn test_fake_retriever_writes_files() {
        let temp_dir = create_temp_dir().unwrap();
        let retriever = FakeRetriever::default();
        retriever.set_content("1-dut1-show_logging", "line\n");
        retriever.set_missing("gone.core");
        let target = sample_target("dut1");

        let path = retriever
            .copy(&target, "harddisk:/d/1-dut1-show_logging", &temp_dir.path().join("out"))
            .await
            .unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "line\n");
        assert!(retriever.copy(&target, "harddisk:/gone.core", temp_dir.path()).await.is_err());
        assert_eq!(retriever.requested().len(), 2);
    }
}

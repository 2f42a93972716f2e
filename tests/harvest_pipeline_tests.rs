//! Integration tests for the harvesting pipeline.
//!
//! The pipeline runs against scripted in-process devices: commands are
//! answered from a table and "copied" files are written from canned
//! content into a temporary log directory.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use diag_harvester::config::{Binding, CommandCatalog, HarvestConfig, TargetRegistry};
use diag_harvester::error::{HarvestError, TransportError};
use diag_harvester::harvest::core_dump::{DecodeLauncher, DecodeRequest, DecodeTask};
use diag_harvester::harvest::{harvest_devices, DeviceHarvester};
use diag_harvester::models::{CoreFileStatus, Target};
use diag_harvester::remote::{remote_basename, FileRetriever, RemoteExecutor};

const BINDING: &str = r#"
options:
  username: admin
  password: lab-password
duts:
  - id: dut1
    name: spine
    ssh:
      target: "192.0.2.10"
  - id: dut2
    name: leaf
    ssh:
      target: "192.0.2.11:2222"
"#;

const CATALOG: &str = r#"
show logging:
  type: logging
  errorPatterns:
    - "ERROR.*"
    - "WARN.*"
show context:
  type: command
  errorPatterns:
    - regex: "(?i)crash reason"
show tech-support:
  type: show-tech
"#;

/// One scripted device per target, keyed by device id
#[derive(Default)]
struct ScriptedDevices {
    commands: Mutex<Vec<(String, String)>>,
    find_output: Mutex<HashMap<String, String>>,
}

impl ScriptedDevices {
    fn commands_for(&self, device_id: &str) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|(device, _)| device == device_id)
            .map(|(_, command)| command.clone())
            .collect()
    }
}

#[async_trait]
impl RemoteExecutor for ScriptedDevices {
    async fn run(&self, target: &Target, command: &str) -> Result<String, TransportError> {
        self.commands
            .lock()
            .unwrap()
            .push((target.device_id.clone(), command.to_string()));

        if command == "show clock" {
            return Ok("\r\n12:30:00.000 UTC Wed Mar 6 2024\r\n".to_string());
        }
        if command.starts_with("run find") {
            return Ok(self
                .find_output
                .lock()
                .unwrap()
                .get(&target.device_id)
                .cloned()
                .unwrap_or_default());
        }
        Ok(String::new())
    }
}

#[derive(Default)]
struct CannedFiles {
    contents: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl FileRetriever for CannedFiles {
    async fn copy(&self, _target: &Target, remote_path: &str, local_dir: &Path) -> Result<PathBuf, TransportError> {
        let name = remote_basename(remote_path);
        fs::create_dir_all(local_dir)?;
        let local_path = local_dir.join(name);
        let content = self.contents.lock().unwrap().get(name).cloned().unwrap_or_default();
        fs::write(&local_path, content)?;
        Ok(local_path)
    }
}

#[derive(Default)]
struct CountingLauncher {
    launched: Mutex<Vec<PathBuf>>,
}

impl DecodeLauncher for CountingLauncher {
    fn launch(&self, request: &DecodeRequest) -> io::Result<DecodeTask> {
        self.launched.lock().unwrap().push(request.core_file.clone());
        Ok(DecodeTask {
            core_file: request.core_file.clone(),
            marker: request.marker.clone(),
            output: request.output.clone(),
            pid: None,
        })
    }
}

struct Fixture {
    devices: Arc<ScriptedDevices>,
    files: Arc<CannedFiles>,
    launcher: Arc<CountingLauncher>,
    harvester: DeviceHarvester,
    log_dir: TempDir,
}

fn fixture() -> Result<Fixture> {
    let targets = TargetRegistry::resolve(&Binding::from_yaml_str(BINDING)?)?;
    let catalog = CommandCatalog::from_yaml_str(CATALOG)?;
    let mut config = HarvestConfig::default();
    config.stabilization_interval_ms = 1;
    config.write_summary = false;

    let devices = Arc::new(ScriptedDevices::default());
    let files = Arc::new(CannedFiles::default());
    let launcher = Arc::new(CountingLauncher::default());

    let harvester = DeviceHarvester::new(Arc::new(targets), Arc::new(catalog), config)
        .with_transport(devices.clone(), files.clone())
        .with_launcher(launcher.clone());

    Ok(Fixture {
        devices,
        files,
        launcher,
        harvester,
        log_dir: TempDir::new()?,
    })
}

#[tokio::test]
async fn test_invocation_count_and_command_sequence() -> Result<()> {
    let f = fixture()?;

    for _ in 0..3 {
        f.harvester.collect("dut1", f.log_dir.path(), "smoke").await?;
    }
    assert_eq!(f.harvester.registry().invocation_count("dut1"), 3);
    assert_eq!(f.harvester.registry().invocation_count("dut2"), 0);

    let commands = f.devices.commands_for("dut1");
    let cleanups = commands.iter().filter(|c| c.starts_with("run rm -rf")).count();
    assert_eq!(cleanups, 1);

    // First invocation: clock, cleanup, mkdir, then the catalog in order
    assert_eq!(commands[0], "show clock");
    assert_eq!(commands[1], "run rm -rf /harddisk:/firex_log_directory");
    assert_eq!(commands[2], "mkdir harddisk:/firex_log_directory");
    assert_eq!(commands[3], "show logging | file harddisk:/firex_log_directory/1-dut1-show_logging");
    assert_eq!(commands[4], "show context | file harddisk:/firex_log_directory/1-dut1-show_context");
    assert_eq!(commands[5], "show tech-support file harddisk:/firex_log_directory/1-dut1-show_tech-support");
    assert!(commands[6].starts_with("run find /misc/disk1 -maxdepth 1 -type f -name '*core*' -newermt @"));
    assert_eq!(commands[7], "show clock");
    Ok(())
}

#[tokio::test]
async fn test_patterns_and_cursor_across_invocations() -> Result<()> {
    let f = fixture()?;
    f.files.contents.lock().unwrap().extend([
        (
            "1-dut1-show_logging".to_string(),
            "RP/0/RP0/CPU0:Mar  6 12:29:58.001 UTC: bgp up\nRP/0/RP0/CPU0:Mar  6 12:29:59.002 UTC: ERROR peer reset\n".to_string(),
        ),
        ("1-dut1-show_context".to_string(), "Crash Reason: none\n".to_string()),
    ]);

    let err = f
        .harvester
        .collect_router_logs("dut1", f.log_dir.path(), "smoke")
        .await
        .unwrap_err();
    match &err {
        HarvestError::Aggregate { device, errors } => {
            assert_eq!(device, "dut1");
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            assert_eq!(
                messages,
                vec![
                    "Count: 1 Error patterns matched for command show logging",
                    "Count: 1 Error patterns matched for command show context",
                ]
            );
        }
        other => panic!("expected aggregate error, got {:?}", other),
    }

    f.harvester.collect_router_logs("dut1", f.log_dir.path(), "smoke").await?;
    let commands = f.devices.commands_for("dut1");
    assert!(commands.contains(
        &"show logging | begin RP/0/RP0/CPU0:Mar  6 12:29:59.002 UTC: | file harddisk:/firex_log_directory/2-dut1-show_logging"
            .to_string()
    ));

    let artifacts = f.log_dir.path().join("debug_files").join("1_dut1_smoke");
    assert!(artifacts.join("1-dut1-show_logging").is_file());
    assert!(artifacts.join("1-dut1-show_tech-support.tgz").is_file());
    Ok(())
}

#[tokio::test]
async fn test_core_decode_triggered_once_per_run() -> Result<()> {
    let f = fixture()?;
    let workspace = TempDir::new()?;
    f.devices
        .find_output
        .lock()
        .unwrap()
        .insert("dut1".to_string(), "/misc/disk1/bgp_1234.by.11.core.gz\r\n".to_string());
    f.files
        .contents
        .lock()
        .unwrap()
        .insert("bgp_1234.by.11.core.gz".to_string(), "gzipped core".to_string());

    // The sidecar sits next to where the first invocation copies the core
    let first_dir = f.log_dir.path().join("1");
    fs::create_dir_all(&first_dir)?;
    fs::write(
        first_dir.join("bgp_1234.by.11.core.txt"),
        format!("Workspace = {}\n", workspace.path().display()),
    )?;

    let report = f.harvester.collect("dut1", f.log_dir.path(), "smoke").await?;
    assert_eq!(report.core_files.len(), 1);
    assert_eq!(report.core_files[0].remote_path, "harddisk:/bgp_1234.by.11.core.gz");
    assert_eq!(report.core_files[0].status, CoreFileStatus::DecodeTriggered);
    assert!(first_dir.join("bgp_1234.by.11.core.gz.decode_in_progress").exists());

    // Rediscovered on the next invocation: copied again, never relaunched
    let report = f.harvester.collect("dut1", f.log_dir.path(), "smoke").await?;
    assert_eq!(report.core_files[0].status, CoreFileStatus::Stabilizing);
    assert!(f.log_dir.path().join("2").join("bgp_1234.by.11.core.gz").is_file());
    assert_eq!(f.launcher.launched.lock().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_devices_are_harvested_independently() -> Result<()> {
    let f = fixture()?;
    let devices = vec!["dut1".to_string(), "dut2".to_string()];

    let results = harvest_devices(&f.harvester, &devices, f.log_dir.path(), "smoke").await;
    assert!(results.iter().all(|(_, result)| result.is_ok()));

    let results = harvest_devices(&f.harvester, &devices, f.log_dir.path(), "smoke").await;
    for (device, result) in results {
        assert_eq!(result?.invocation, 2, "device {}", device);
    }

    assert!(f.devices.commands_for("dut2").contains(
        &"show context | file harddisk:/firex_log_directory/2-dut2-show_context".to_string()
    ));
    Ok(())
}

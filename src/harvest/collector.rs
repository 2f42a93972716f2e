use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future;
use log::{debug, info, warn};
use tokio::sync::Semaphore;

use crate::config::{CommandCatalog, CommandCatalogEntry, CommandKind, HarvestConfig, TargetRegistry};
use crate::constants::DEBUG_FILES_DIR;
use crate::error::{HarvestError, HarvestResult};
use crate::harvest::clock::read_device_epoch;
use crate::harvest::core_dump::{CoreDumpPipeline, DecodeLauncher, ShellDecodeLauncher};
use crate::harvest::registry::CollectionRegistry;
use crate::harvest::scanner::{last_log_line, scan};
use crate::harvest::synthesizer::{build, remote_output_file};
use crate::models::{HarvestOutcome, HarvestReport, Target};
use crate::remote::{FileRetriever, RemoteExecutor, ScpRetriever, SshConnector, SshExecutor};
use crate::security::{safe_error_message, sanitize_filename, scrub_credentials};
use crate::utils::summary::write_harvest_summary;

/// Harvests logs, command output and core files from devices under test.
///
/// One harvester is shared by every invocation of a run; per-device state
/// lives in its [`CollectionRegistry`].
pub struct DeviceHarvester {
    targets: Arc<TargetRegistry>,
    catalog: Arc<CommandCatalog>,
    config: HarvestConfig,
    executor: Arc<dyn RemoteExecutor>,
    retriever: Arc<dyn FileRetriever>,
    launcher: Arc<dyn DecodeLauncher>,
    registry: Arc<CollectionRegistry>,
}

impl DeviceHarvester {
    /// Harvester talking SSH/SCP to the devices and decoding through the shell
    pub fn new(targets: Arc<TargetRegistry>, catalog: Arc<CommandCatalog>, config: HarvestConfig) -> Self {
        let connector = SshConnector::new(config.connection_timeout());
        let executor = SshExecutor::new(connector.clone());
        let retriever = ScpRetriever::new(connector, config.transfer_timeout());
        let launcher = ShellDecodeLauncher::new(config.decoder_command.clone());

        Self {
            targets,
            catalog,
            config,
            executor: Arc::new(executor),
            retriever: Arc::new(retriever),
            launcher: Arc::new(launcher),
            registry: Arc::new(CollectionRegistry::new()),
        }
    }

    pub fn with_transport(
        mut self,
        executor: Arc<dyn RemoteExecutor>,
        retriever: Arc<dyn FileRetriever>,
    ) -> Self {
        self.executor = executor;
        self.retriever = retriever;
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn DecodeLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_registry(mut self, registry: Arc<CollectionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &Arc<CollectionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Local directory for the command artifacts of one invocation
    pub fn debug_dir(&self, log_dir: &Path, invocation: u64, device_id: &str, test_name: &str) -> PathBuf {
        log_dir.join(DEBUG_FILES_DIR).join(format!(
            "{}_{}_{}",
            invocation,
            device_id,
            sanitize_filename(test_name)
        ))
    }

    /// Run one harvesting invocation for `device_id`.
    ///
    /// Returns `Err` only for an unknown device or a failed first-invocation
    /// cleanup. Every other failure is accumulated in the report.
    pub async fn collect(
        &self,
        device_id: &str,
        log_dir: &Path,
        test_name: &str,
    ) -> HarvestResult<HarvestReport> {
        let target = self.targets.require(device_id)?;
        let invocation = self.registry.next_invocation(device_id);
        let mut report = HarvestReport::new(device_id, test_name, invocation);
        info!("Remote log directory: {}", self.config.remote_log_dir);

        if self.registry.session_start(device_id).is_none() {
            if let Err(e) = self.record_session_start(target).await {
                warn!("Could not record start time for DUT {}: {}", device_id, e);
                report.errors.push(e);
            }
        }

        if invocation == 1 {
            self.prepare_remote_log_dir(target).await?;
        }

        let debug_dir = self.debug_dir(log_dir, invocation, device_id, test_name);
        for entry in self.catalog.iter() {
            let (outcome, error) = self.harvest_entry(target, invocation, entry, &debug_dir).await;
            if let Some(e) = error {
                warn!("{}", scrub_credentials(&e.to_string()));
                report.errors.push(e);
            }
            report.outcomes.push(outcome);
        }

        match self.registry.session_start(device_id) {
            Some(session_start) => {
                let pipeline = CoreDumpPipeline {
                    executor: self.executor.as_ref(),
                    retriever: self.retriever.as_ref(),
                    launcher: self.launcher.as_ref(),
                    registry: self.registry.as_ref(),
                    config: &self.config,
                };
                let (records, errors) = pipeline.run(target, invocation, log_dir, session_start).await;
                report.core_files = records;
                report.errors.extend(errors);
            }
            None => info!("No start time known for DUT {}, skipping core file search", device_id),
        }

        if let Err(e) = self.record_session_start(target).await {
            warn!("Error updating start time for DUT {}: {}", device_id, e);
            report.errors.push(e);
        }

        report.finish();
        if self.config.write_summary {
            if let Err(e) = write_harvest_summary(&report, &debug_dir) {
                let context = format!("Failed to write harvest summary for {}", device_id);
                warn!("{}", safe_error_message(&context, &format!("{:#}", e)));
            }
        }

        info!(
            "Harvest {} of DUT {} finished: {} commands, {} core files, {} errors",
            invocation,
            device_id,
            report.outcomes.len(),
            report.core_files.len(),
            report.errors.len()
        );
        Ok(report)
    }

    /// Run one invocation and fold every accumulated error into a single
    /// [`HarvestError::Aggregate`].
    pub async fn collect_router_logs(
        &self,
        device_id: &str,
        log_dir: &Path,
        test_name: &str,
    ) -> HarvestResult<()> {
        self.collect(device_id, log_dir, test_name).await?.into_result()
    }

    async fn record_session_start(&self, target: &Target) -> HarvestResult<()> {
        let epoch = read_device_epoch(self.executor.as_ref(), target).await?;
        self.registry.set_session_start(&target.device_id, epoch);
        info!("Start time for DUT {} stored as {}", target.device_id, epoch);
        Ok(())
    }

    /// Wipe and recreate the remote staging directory
    async fn prepare_remote_log_dir(&self, target: &Target) -> HarvestResult<()> {
        let dir = self.config.remote_log_dir.trim_end_matches('/');
        let commands = [format!("run rm -rf /{}", dir), format!("mkdir {}", dir)];

        for command in commands {
            info!("Preparing log directory on {}: {}", target.device_id, command);
            self.executor
                .run(target, &command)
                .await
                .map_err(|source| HarvestError::RemoteExecution {
                    command: command.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    async fn harvest_entry(
        &self,
        target: &Target,
        invocation: u64,
        entry: &CommandCatalogEntry,
        debug_dir: &Path,
    ) -> (HarvestOutcome, Option<HarvestError>) {
        let mut outcome = HarvestOutcome::new(&entry.command);
        match self.try_harvest_entry(target, invocation, entry, debug_dir, &mut outcome).await {
            Ok(()) => (outcome, None),
            Err(e) => {
                outcome.error = Some(e.to_string());
                (outcome, Some(e))
            }
        }
    }

    async fn try_harvest_entry(
        &self,
        target: &Target,
        invocation: u64,
        entry: &CommandCatalogEntry,
        debug_dir: &Path,
        outcome: &mut HarvestOutcome,
    ) -> HarvestResult<()> {
        let device_id = target.device_id.as_str();
        let output_file = remote_output_file(&self.config, invocation, device_id, &entry.command);
        let cursor = match entry.kind {
            CommandKind::Logging => self.registry.cursor(device_id, &entry.command),
            _ => String::new(),
        };

        let synthesized = build(entry, &cursor, &output_file)?;
        outcome.synthesized = Some(synthesized.command.clone());

        info!("Executing on {}: {}", device_id, synthesized.command);
        let output = self
            .executor
            .run(target, &synthesized.command)
            .await
            .map_err(|source| HarvestError::RemoteExecution {
                command: entry.command.clone(),
                source,
            })?;
        debug!("Command output for {}: {}", entry.command, output.trim());

        let local_path = self
            .retriever
            .copy(target, &synthesized.artifact_path, debug_dir)
            .await
            .map_err(|source| HarvestError::Transfer {
                remote_path: synthesized.artifact_path.clone(),
                source,
            })?;
        outcome.local_path = Some(local_path.clone());

        let bytes = tokio::fs::read(&local_path)
            .await
            .map_err(|source| HarvestError::LocalRead {
                path: local_path.clone(),
                source,
            })?;
        outcome.content_bytes = bytes.len();
        outcome.raw_content = String::from_utf8_lossy(&bytes).into_owned();

        if entry.kind == CommandKind::Logging {
            match last_log_line(&outcome.raw_content) {
                Some(line) => self.registry.set_cursor(device_id, &entry.command, &line),
                None => info!("File empty, no last log line for {} on {}", entry.command, device_id),
            }
        }

        outcome.matched_patterns = scan(&outcome.raw_content, &entry.error_patterns);
        info!(
            "Matched error patterns for {} on {}: {:?}",
            entry.command, device_id, outcome.matched_patterns
        );

        if !outcome.matched_patterns.is_empty() {
            return Err(HarvestError::PatternsMatched {
                command: entry.command.clone(),
                count: outcome.matched_patterns.len(),
                patterns: outcome.matched_patterns.clone(),
            });
        }
        Ok(())
    }
}

/// Harvest several devices concurrently, at most `max_parallel_devices` at
/// a time. Results come back in the order of `device_ids`.
pub async fn harvest_devices(
    harvester: &DeviceHarvester,
    device_ids: &[String],
    log_dir: &Path,
    test_name: &str,
) -> Vec<(String, HarvestResult<HarvestReport>)> {
    let semaphore = Arc::new(Semaphore::new(harvester.config.max_parallel_devices.max(1)));

    let futures = device_ids.iter().map(|device_id| {
        let semaphore = Arc::clone(&semaphore);
        async move {
            // A closed semaphore only lifts the limit
            let _permit = semaphore.acquire().await.ok();
            let result = harvester.collect(device_id, log_dir, test_name).await;
            (device_id.clone(), result)
        }
    });

    future::join_all(futures).await
}

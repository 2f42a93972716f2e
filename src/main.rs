use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use log::{error, info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use tokio::runtime::Runtime;

use diag_harvester::cli::{Args, Commands};
use diag_harvester::config::{load_or_default, CommandCatalog, HarvestConfig, TargetRegistry};
use diag_harvester::harvest::{harvest_devices, DeviceHarvester};
use diag_harvester::security::safe_error_message;

fn main() -> Result<()> {
    // Parse arguments
    let args = Args::parse();

    // Initialize logging
    initialize_logging(args.verbose)?;

    // Handle subcommands
    if let Some(cmd) = &args.command {
        return handle_subcommand(cmd);
    }

    info!("Starting diagnostic harvest");

    let config = load_or_default(args.config.as_deref())?;
    let catalog = load_catalog(&args)?;

    let binding = args
        .binding
        .as_deref()
        .ok_or_else(|| anyhow!("--binding is required to resolve device targets"))?;
    let targets = TargetRegistry::from_binding_file(binding)?;
    let devices = select_devices(&args, &targets)?;

    let runtime = Runtime::new().context("Failed to create Tokio runtime")?;
    let harvester = DeviceHarvester::new(Arc::new(targets), Arc::new(catalog), config);

    let failures = runtime.block_on(run_passes(&harvester, &devices, &args));
    if failures > 0 {
        bail!("{} device harvests reported errors", failures);
    }

    info!("Harvest completed successfully");
    Ok(())
}

/// Initialize logging with the specified verbosity level
fn initialize_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ).context("Failed to initialize logger")?;
    Ok(())
}

/// Handle subcommands (init-catalog and init-config)
fn handle_subcommand(cmd: &Commands) -> Result<()> {
    match cmd {
        Commands::InitCatalog { path } => {
            info!("Creating default command catalog at {}", path.display());
            CommandCatalog::default_catalog().save_to_yaml_file(path)?;
            Ok(())
        }
        Commands::InitConfig { path } => {
            info!("Creating default harvest configuration at {}", path.display());
            HarvestConfig::default().save_to_yaml_file(path)?;
            Ok(())
        }
    }
}

fn load_catalog(args: &Args) -> Result<CommandCatalog> {
    match &args.catalog {
        Some(path) => CommandCatalog::from_yaml_file(path),
        None => {
            info!("No catalog path provided, using built-in command catalog");
            Ok(CommandCatalog::default_catalog())
        }
    }
}

/// Devices named with `--device`, or every device in the binding
fn select_devices(args: &Args, targets: &TargetRegistry) -> Result<Vec<String>> {
    if args.devices.is_empty() {
        return Ok(targets.device_ids().map(str::to_string).collect());
    }

    for device in &args.devices {
        targets.require(device)?;
    }
    Ok(args.devices.clone())
}

/// Run every pass and return the number of failed device harvests
async fn run_passes(harvester: &DeviceHarvester, devices: &[String], args: &Args) -> usize {
    let mut failures = 0;

    for pass in 1..=args.passes {
        info!("Harvest pass {} of {} over {} devices", pass, args.passes, devices.len());
        let results = harvest_devices(harvester, devices, &args.log_dir, &args.test_name).await;

        for (device, result) in results {
            match result.and_then(|report| report.into_result()) {
                Ok(()) => info!("Harvest of {} completed without errors", device),
                Err(e) => {
                    error!("{}", safe_error_message(&format!("Harvest of {} failed", device), &e));
                    failures += 1;
                }
            }
        }

        if pass < args.passes {
            tokio::time::sleep(Duration::from_secs(args.interval_secs)).await;
        }
    }

    failures
}

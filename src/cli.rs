use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the diag-harvester tool.
///
/// A run resolves SSH targets from the binding file, then performs one or
/// more harvest passes over the selected devices. Passes share one
/// collection registry, so the second pass resumes logs from the cursors of
/// the first.
#[derive(Parser, Debug)]
#[clap(name = "diag-harvester", about = "Log, show-tech and core-file harvester for devices under test")]
pub struct Args {
    /// Testbed binding file with the devices' SSH options
    #[clap(short, long)]
    pub binding: Option<PathBuf>,

    /// Command catalog YAML file (default: built-in catalog)
    #[clap(long)]
    pub catalog: Option<PathBuf>,

    /// Path to harvest configuration YAML file
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Local root directory for harvested files
    #[clap(short, long, default_value = "harvest-logs")]
    pub log_dir: PathBuf,

    /// Test name used in the local artifact directory names
    #[clap(short, long, default_value = "harvest")]
    pub test_name: String,

    /// Devices to harvest (repeatable; default: every device in the binding)
    #[clap(short, long = "device")]
    pub devices: Vec<String>,

    /// Number of harvest passes
    #[clap(long, default_value = "1")]
    pub passes: u32,

    /// Seconds to wait between passes
    #[clap(long, default_value = "60")]
    pub interval_secs: u64,

    /// Verbose logging
    #[clap(short, long)]
    pub verbose: bool,

    /// Subcommands
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands for the harvester.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write the built-in command catalog to a file
    InitCatalog {
        /// Path to output catalog file
        #[clap(default_value = "catalog.yaml")]
        path: PathBuf,
    },

    /// Create a default configuration file
    InitConfig {
        /// Path to output configuration file
        #[clap(default_value = "harvest.yaml")]
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_basic_args_parsing() {
        let args = Args::parse_from(&[
            "diag-harvester",
            "--binding", "/tmp/binding.yaml",
            "--log-dir", "/tmp/logs",
            "--verbose",
        ]);

        assert_eq!(args.binding, Some(PathBuf::from("/tmp/binding.yaml")));
        assert_eq!(args.log_dir, PathBuf::from("/tmp/logs"));
        assert!(args.verbose);
        assert_eq!(args.passes, 1);
        assert_eq!(args.test_name, "harvest");
        assert!(args.devices.is_empty());
        assert!(args.command.is_none());
    }

    #[test]
    fn test_repeated_devices_and_passes() {
        let args = Args::parse_from(&[
            "diag-harvester",
            "-b", "binding.yaml",
            "--device", "dut1",
            "--device", "dut2",
            "--passes", "3",
            "--interval-secs", "10",
            "--catalog", "catalog.yaml",
            "-c", "harvest.yaml",
            "--test-name", "bgp_flap",
        ]);

        assert_eq!(args.devices, vec!["dut1".to_string(), "dut2".to_string()]);
        assert_eq!(args.passes, 3);
        assert_eq!(args.interval_secs, 10);
        assert_eq!(args.catalog, Some(PathBuf::from("catalog.yaml")));
        assert_eq!(args.config, Some(PathBuf::from("harvest.yaml")));
        assert_eq!(args.test_name, "bgp_flap");
    }

    #[test]
    fn test_init_subcommands() {
        let args = Args::parse_from(&["diag-harvester", "init-catalog"]);
        match args.command {
            Some(Commands::InitCatalog { path }) => assert_eq!(path, PathBuf::from("catalog.yaml")),
            other => panic!("unexpected command {:?}", other),
        }

        let args = Args::parse_from(&["diag-harvester", "init-config", "/tmp/h.yaml"]);
        match args.command {
            Some(Commands::InitConfig { path }) => assert_eq!(path, PathBuf::from("/tmp/h.yaml")),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_invalid_passes_rejected() {
        assert!(Args::try_parse_from(&["diag-harvester", "--passes", "many"]).is_err());
    }
}

use crate::config::{CommandCatalogEntry, CommandKind, HarvestConfig};
use crate::constants::SHOW_TECH_ARCHIVE_EXTENSION;
use crate::error::{HarvestError, HarvestResult};

/// A device command together with the file it will produce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedCommand {
    /// Device-native command string
    pub command: String,
    /// Remote path of the artifact to retrieve afterwards
    pub artifact_path: String,
}

/// Remote staging file for one command of one invocation:
/// `<remote_log_dir>/<invocation>-<device>-<command>`, spaces in the
/// command replaced by `_`
pub fn remote_output_file(
    config: &HarvestConfig,
    invocation: u64,
    device_id: &str,
    command: &str,
) -> String {
    format!(
        "{}/{}-{}-{}",
        config.remote_log_dir.trim_end_matches('/'),
        invocation,
        device_id,
        command.replace(' ', "_")
    )
}

/// Build the device command for `entry`.
///
/// `Logging` entries resume from `cursor` when one is known. `ShowTech`
/// output is a device-written archive, so the artifact name gains the
/// archive extension.
pub fn build(
    entry: &CommandCatalogEntry,
    cursor: &str,
    output_file: &str,
) -> HarvestResult<SynthesizedCommand> {
    let command = &entry.command;

    let (command, artifact_path) = match &entry.kind {
        CommandKind::Logging if !cursor.is_empty() => (
            format!("{} | begin {} | file {}", command, cursor, output_file),
            output_file.to_string(),
        ),
        CommandKind::Logging | CommandKind::Command => (
            format!("{} | file {}", command, output_file),
            output_file.to_string(),
        ),
        CommandKind::ShowTech => (
            format!("{} file {}", command, output_file),
            format!("{}.{}", output_file, SHOW_TECH_ARCHIVE_EXTENSION),
        ),
        CommandKind::Unrecognized(kind) => {
            return Err(HarvestError::UnknownCommandKind {
                kind: kind.clone(),
                command: command.clone(),
            })
        }
    };

    Ok(SynthesizedCommand { command, artifact_path })
}

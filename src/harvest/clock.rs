use chrono::NaiveDateTime;
use log::debug;

use crate::constants::SHOW_CLOCK_COMMAND;
use crate::error::{HarvestError, HarvestResult};
use crate::models::Target;
use crate::remote::RemoteExecutor;

const CLOCK_FORMAT: &str = "%H:%M:%S%.3f %a %b %d %Y";

/// Parse one `show clock` line, e.g. `14:22:05.123 UTC Tue Mar 5 2024`.
///
/// The zone abbreviation is dropped and the time is read as UTC. Cisco
/// prefixes unsynchronized clocks with `*` or `.`, which is ignored too.
fn parse_clock_line(line: &str) -> Option<i64> {
    let line = line.trim().trim_start_matches(['*', '.']);
    let mut tokens = line.split_whitespace();
    let time = tokens.next()?;
    let _zone = tokens.next()?;
    let rest: Vec<&str> = tokens.collect();
    if rest.len() != 4 {
        return None;
    }

    let normalized = format!("{} {}", time, rest.join(" "));
    NaiveDateTime::parse_from_str(&normalized, CLOCK_FORMAT)
        .ok()
        .map(|dt| dt.and_utc().timestamp())
}

/// Convert `show clock` output to epoch seconds.
///
/// Devices echo prompts and blank lines around the clock, so lines are
/// tried from the end of the output backwards.
pub fn parse_device_clock(output: &str) -> HarvestResult<i64> {
    output
        .lines()
        .rev()
        .filter(|line| !line.trim().is_empty())
        .find_map(parse_clock_line)
        .ok_or_else(|| {
            HarvestError::Clock(format!(
                "no clock line in output {:?}",
                output.trim()
            ))
        })
}

/// Read the device clock as epoch seconds
pub async fn read_device_epoch(
    executor: &dyn RemoteExecutor,
    target: &Target,
) -> HarvestResult<i64> {
    let output = executor
        .run(target, SHOW_CLOCK_COMMAND)
        .await
        .map_err(|e| HarvestError::Clock(e.to_string()))?;

    let epoch = parse_device_clock(&output)?;
    debug!("Device {} clock reads epoch {}", target.device_id, epoch);
    Ok(epoch)
}

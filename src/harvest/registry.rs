use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::info;

/// Mutable per-device state shared by every harvest of a run.
///
/// Each map has its own mutex and every accessor holds it for the whole
/// read-modify-write, so concurrent harvests of different devices never
/// observe a torn update. Nothing here outlives the process.
#[derive(Debug, Default)]
pub struct CollectionRegistry {
    invocations: Mutex<HashMap<String, u64>>,
    cursors: Mutex<HashMap<String, HashMap<String, String>>>,
    session_starts: Mutex<HashMap<String, i64>>,
    claimed_cores: Mutex<HashMap<String, HashSet<String>>>,
}

// A panic while holding a lock cannot leave these maps half-written
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment and return the invocation count for `device_id`
    pub fn next_invocation(&self, device_id: &str) -> u64 {
        let mut invocations = lock(&self.invocations);
        let count = invocations.entry(device_id.to_string()).or_insert(0);
        *count += 1;
        info!("Log collection has been called {} times for DUT: {}", count, device_id);
        *count
    }

    /// Current invocation count, 0 before the first harvest
    pub fn invocation_count(&self, device_id: &str) -> u64 {
        lock(&self.invocations).get(device_id).copied().unwrap_or(0)
    }

    /// Last log line seen for `command`, empty if none was recorded
    pub fn cursor(&self, device_id: &str, command: &str) -> String {
        lock(&self.cursors)
            .get(device_id)
            .and_then(|commands| commands.get(command))
            .cloned()
            .unwrap_or_default()
    }

    /// Replace the cursor for `command`. Empty lines are ignored so a cursor
    /// is never cleared.
    pub fn set_cursor(&self, device_id: &str, command: &str, line: &str) {
        if line.is_empty() {
            return;
        }
        lock(&self.cursors)
            .entry(device_id.to_string())
            .or_default()
            .insert(command.to_string(), line.to_string());
    }

    pub fn session_start(&self, device_id: &str) -> Option<i64> {
        lock(&self.session_starts).get(device_id).copied()
    }

    pub fn set_session_start(&self, device_id: &str, epoch_secs: i64) {
        lock(&self.session_starts).insert(device_id.to_string(), epoch_secs);
    }

    /// Claim a remote core path for decoding. Returns false when it was
    /// already claimed during this run.
    pub fn try_claim_core(&self, device_id: &str, remote_path: &str) -> bool {
        lock(&self.claimed_cores)
            .entry(device_id.to_string())
            .or_default()
            .insert(remote_path.to_string())
    }

    /// Give a claim back when the decode was not started
    pub fn release_core(&self, device_id: &str, remote_path: &str) {
        if let Some(paths) = lock(&self.claimed_cores).get_mut(device_id) {
            paths.remove(remote_path);
        }
    }
}

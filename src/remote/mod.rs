//! Remote access to devices under test.
//!
//! The pipeline only talks to devices through two seams, [`RemoteExecutor`]
//! and [`FileRetriever`]. The production implementations open an `ssh2`
//! session per call and run the blocking work on tokio's blocking pool.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::TransportError;
use crate::models::Target;

/// SSH session setup shared by the executor and the retriever
pub mod session;

/// Command execution over an SSH exec channel
pub mod executor;

/// Remote-to-local copies over SCP
pub mod scp;

pub use executor::SshExecutor;
pub use scp::ScpRetriever;
pub use session::SshConnector;

/// Runs a device-native command and returns its raw text output.
///
/// No retries at this layer; callers decide whether to try again.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn run(&self, target: &Target, command: &str) -> Result<String, TransportError>;
}

/// Copies one remote file into a local directory.
///
/// Implementations create `local_dir` when missing and return the path of
/// the local copy, named after the remote file.
#[async_trait]
pub trait FileRetriever: Send + Sync {
    async fn copy(
        &self,
        target: &Target,
        remote_path: &str,
        local_dir: &Path,
    ) -> Result<PathBuf, TransportError>;
}

/// Last component of a device path such as `harddisk:/dir/file`
pub fn remote_basename(remote_path: &str) -> &str {
    remote_path.rsplit('/').next().unwrap_or(remote_path)
}

/// Device paths like `harddisk:/x` are addressed as `/harddisk:/x` over SCP
pub fn scp_path(remote_path: &str) -> String {
    if remote_path.starts_with('/') {
        remote_path.to_string()
    } else {
        format!("/{}", remote_path)
    }
}

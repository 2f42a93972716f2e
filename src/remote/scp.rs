use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, info};

use crate::constants::TRANSFER_TIMEOUT_SECS;
use crate::error::TransportError;
use crate::models::Target;
use crate::remote::session::SshConnector;
use crate::remote::{remote_basename, scp_path, FileRetriever};

/// Copies device files to the local archive over SCP.
///
/// Each transfer is bounded by `timeout`: the session itself carries the
/// same timeout, and the caller stops waiting once it has elapsed.
#[derive(Debug, Clone)]
pub struct ScpRetriever {
    connector: SshConnector,
    timeout: Duration,
}

impl Default for ScpRetriever {
    fn default() -> Self {
        Self::new(SshConnector::default(), Duration::from_secs(TRANSFER_TIMEOUT_SECS))
    }
}

impl ScpRetriever {
    pub fn new(connector: SshConnector, timeout: Duration) -> Self {
        Self { connector, timeout }
    }

    fn copy_blocking(
        &self,
        target: &Target,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<u64, TransportError> {
        let session = self.connector.open(target)?;
        session.set_timeout(self.timeout.as_millis().min(u32::MAX as u128) as u32);

        let (mut channel, stat) = session.scp_recv(Path::new(&scp_path(remote_path)))?;
        let mut file = fs::File::create(local_path)?;
        let copied = io::copy(&mut channel, &mut file)?;

        channel.send_eof()?;
        channel.wait_eof()?;
        channel.close()?;
        channel.wait_close()?;

        if copied != stat.size() {
            return Err(TransportError::Device(format!(
                "short transfer of {}: {} of {} bytes",
                remote_path,
                copied,
                stat.size()
            )));
        }

        Ok(copied)
    }
}

#[async_trait]
impl FileRetriever for ScpRetriever {
    async fn copy(
        &self,
        target: &Target,
        remote_path: &str,
        local_dir: &Path,
    ) -> Result<PathBuf, TransportError> {
        tokio::fs::create_dir_all(local_dir).await?;
        let local_path = local_dir.join(remote_basename(remote_path));

        info!(
            "Copying {} from {} to {}",
            remote_path,
            target.device_id,
            local_path.display()
        );
        let start_time = Instant::now();

        let retriever = self.clone();
        let target = target.clone();
        let remote = remote_path.to_string();
        let destination = local_path.clone();
        let transfer = tokio::task::spawn_blocking(move || {
            retriever.copy_blocking(&target, &remote, &destination)
        });

        let copied = tokio::time::timeout(self.timeout, transfer)
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))?
            .map_err(|e| TransportError::Aborted(e.to_string()))??;

        debug!(
            "Copied {} bytes to {} in {:?}",
            copied,
            local_path.display(),
            start_time.elapsed()
        );
        Ok(local_path)
    }
}

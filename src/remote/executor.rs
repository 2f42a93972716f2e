use std::io::Read;

use async_trait::async_trait;
use log::debug;

use crate::error::TransportError;
use crate::models::Target;
use crate::remote::session::SshConnector;
use crate::remote::RemoteExecutor;

/// Runs commands on an SSH exec channel, one session per command
#[derive(Debug, Clone, Default)]
pub struct SshExecutor {
    connector: SshConnector,
}

impl SshExecutor {
    pub fn new(connector: SshConnector) -> Self {
        Self { connector }
    }

    fn run_blocking(&self, target: &Target, command: &str) -> Result<String, TransportError> {
        let session = self.connector.open(target)?;

        let mut channel = session.channel_session()?;
        channel.exec(command)?;

        let mut raw = Vec::new();
        channel.read_to_end(&mut raw)?;
        channel.wait_close()?;

        let exit_status = channel.exit_status()?;
        debug!("Command on {} exited with status {}", target.device_id, exit_status);

        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn run(&self, target: &Target, command: &str) -> Result<String, TransportError> {
        let executor = self.clone();
        let target = target.clone();
        let command = command.to_string();

        tokio::task::spawn_blocking(move || executor.run_blocking(&target, &command))
            .await
            .map_err(|e| TransportError::Aborted(e.to_string()))?
    }
}

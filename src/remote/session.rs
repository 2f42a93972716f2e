use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::debug;
use ssh2::Session;

use crate::constants::{
    DEFAULT_CONNECTION_TIMEOUT_SECS, ERROR_AUTHENTICATION_FAILED, ERROR_FAILED_TO_CREATE_SESSION,
};
use crate::error::TransportError;
use crate::models::Target;

/// Opens password-authenticated SSH sessions to targets
#[derive(Debug, Clone)]
pub struct SshConnector {
    connection_timeout: Duration,
}

impl Default for SshConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECS))
    }
}

impl SshConnector {
    pub fn new(connection_timeout: Duration) -> Self {
        Self { connection_timeout }
    }

    /// Connect, handshake and authenticate. Blocking.
    pub fn open(&self, target: &Target) -> Result<Session, TransportError> {
        let tcp = self.connect(target)?;

        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        session.handshake().map_err(|e| {
            debug!("{} to {}: {}", ERROR_FAILED_TO_CREATE_SESSION, target.address(), e);
            TransportError::Ssh(e)
        })?;

        session
            .userauth_password(&target.user, &target.credential)
            .map_err(|e| {
                debug!("{} for {}@{}: {}", ERROR_AUTHENTICATION_FAILED, target.user, target.host, e);
                TransportError::Auth(target.user.clone())
            })?;

        if !session.authenticated() {
            return Err(TransportError::Auth(target.user.clone()));
        }

        debug!("SSH session open to {} ({})", target.device_id, target.address());
        Ok(session)
    }

    fn connect(&self, target: &Target) -> Result<TcpStream, TransportError> {
        let address = target.address();
        let addrs = address
            .to_socket_addrs()
            .map_err(|source| TransportError::Connect { address: address.clone(), source })?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connection_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(e),
            }
        }

        Err(TransportError::Connect {
            source: last_error.unwrap_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, "address resolved to nothing")
            }),
            address,
        })
    }
}

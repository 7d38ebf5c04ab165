//! The relay daemon: accepts one-line commands from launchers on a local
//! socket and forwards them to the socket exposed by the Windows guest.
//!
//! Clients are served strictly one at a time (accept, read, forward, close).
//! Further clients wait in the kernel backlog. A failed forward is logged and
//! dropped; recovering a dead guest is the VM supervisor's job.

use std::future::Future;
use std::io::ErrorKind;
use std::path::Path;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, instrument, warn};

use super::protocol::AgentCommand;
use crate::config::RelayConfig;
use crate::error::RelayError;

/// A bound relay daemon.
#[derive(Debug)]
pub struct RelayDaemon {
    config: RelayConfig,
    listener: UnixListener,
}

impl RelayDaemon {
    /// Binds the listen socket, replacing a stale socket file left behind by
    /// a previous instance.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Bind` if the stale file cannot be removed or the
    /// socket cannot be bound.
    pub fn bind(config: RelayConfig) -> Result<Self, RelayError> {
        let path = &config.listen_socket;

        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "Removed stale socket"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                return Err(RelayError::Bind {
                    path: path.clone(),
                    source,
                });
            }
        }

        let listener = UnixListener::bind(path).map_err(|source| RelayError::Bind {
            path: path.clone(),
            source,
        })?;

        info!(path = %path.display(), "Relay daemon listening");
        Ok(Self { config, listener })
    }

    #[must_use]
    pub fn listen_path(&self) -> &Path {
        &self.config.listen_socket
    }

    /// Serves clients forever.
    pub async fn run(self) {
        self.run_until(std::future::pending::<()>()).await;
    }

    /// Serves clients until `shutdown` completes, then removes the socket file.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => self.serve(stream).await,
                    Err(e) => error!(error = %e, "Failed to accept client"),
                },
            }
        }

        if let Err(e) = std::fs::remove_file(self.listen_path()) {
            warn!(error = %e, "Failed to remove socket file");
        }
    }

    /// Handles one client connection. The stream is closed on return.
    #[instrument(skip_all)]
    async fn serve(&self, mut stream: UnixStream) {
        let payload = match read_payload(&mut stream, self.config.read_limit).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Dropping client");
                return;
            }
        };

        debug!(command = %String::from_utf8_lossy(&payload), "Command accepted");

        match AgentCommand::parse(&payload) {
            Some(command) => {
                if let Err(e) = forward(&self.config.guest_socket, &command).await {
                    error!(error = %e, "Command not delivered to guest");
                }
            }
            None => debug!("Ignoring unrecognized command"),
        }
    }
}

/// Reads one client payload of at most `limit` bytes.
async fn read_payload(stream: &mut UnixStream, limit: usize) -> Result<Vec<u8>, RelayError> {
    let mut buf = vec![0u8; limit];
    let n = stream.read(&mut buf).await.map_err(RelayError::Read)?;
    buf.truncate(n);
    Ok(buf)
}

/// Opens a fresh connection to the guest socket and writes `command`'s frame.
///
/// # Errors
///
/// - `RelayError::GuestUnreachable` if the connection is refused
/// - `RelayError::Forward` if the write fails
#[instrument(skip_all, fields(guest = %guest.display()))]
pub async fn forward(guest: &Path, command: &AgentCommand) -> Result<(), RelayError> {
    let mut stream = UnixStream::connect(guest)
        .await
        .map_err(|source| RelayError::GuestUnreachable {
            path: guest.to_path_buf(),
            source,
        })?;

    stream
        .write_all(&command.guest_frame())
        .await
        .map_err(|source| RelayError::Forward {
            path: guest.to_path_buf(),
            source,
        })?;

    if let Err(e) = stream.shutdown().await {
        debug!(error = %e, "Guest connection shutdown failed");
    }

    info!(%command, "Sent command to Windows agent");
    Ok(())
}

//! Launcher side of the relay protocol.
//!
//! Blocking on purpose: the launcher never starts an async runtime, since
//! `unshare(CLONE_NEWNS)` refuses to run in a multi-threaded process.

use std::io::Write;
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::Path;

use tracing::{debug, instrument};

use super::protocol::AgentCommand;
use crate::error::RouteError;

/// Sends one command to the relay daemon at `socket` and closes the connection.
///
/// Exactly one connection is opened. No acknowledgement is awaited.
///
/// # Errors
///
/// - `RouteError::RelayUnavailable` if nothing listens on `socket`
/// - `RouteError::RelaySend` if the write fails
#[instrument(skip_all, fields(socket = %socket.display()))]
pub fn send_command(socket: &Path, command: &AgentCommand) -> Result<(), RouteError> {
    let mut stream = UnixStream::connect(socket).map_err(|source| RouteError::RelayUnavailable {
        socket: socket.to_path_buf(),
        source,
    })?;

    let send = |stream: &mut UnixStream| -> std::io::Result<()> {
        stream.write_all(&command.to_wire())?;
        stream.flush()?;
        stream.shutdown(Shutdown::Write)
    };

    send(&mut stream).map_err(|source| RouteError::RelaySend {
        socket: socket.to_path_buf(),
        source,
    })?;

    debug!("Command sent to relay daemon");
    Ok(())
}

//! The one-line relay wire protocol.
//!
//! Launcher → daemon: `RUN <path>` with no trailing newline, one command per
//! connection, no response. Daemon → guest: `<path>\n`. Paths travel as raw
//! bytes; nothing on the way re-encodes them.

use std::fmt;

/// Verb of the only command the guest understands.
pub const RUN_VERB: &str = "RUN ";

/// A command accepted by the relay daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentCommand {
    /// Start the Windows executable at the given path.
    Run(Vec<u8>),
}

impl AgentCommand {
    #[must_use]
    pub fn run(path: impl Into<Vec<u8>>) -> Self {
        Self::Run(path.into())
    }

    /// Parses a client payload.
    ///
    /// Trailing line terminators and NUL padding are ignored. Anything that is
    /// not `RUN ` followed by a non-empty path yields `None`.
    #[must_use]
    pub fn parse(payload: &[u8]) -> Option<Self> {
        let end = payload
            .iter()
            .rposition(|b| !matches!(b, b'\r' | b'\n' | b'\0'))
            .map_or(0, |i| i + 1);
        let path = payload[..end].strip_prefix(RUN_VERB.as_bytes())?;

        if path.is_empty() {
            return None;
        }
        Some(Self::Run(path.to_vec()))
    }

    /// Bytes the launcher sends to the daemon.
    #[must_use]
    pub fn to_wire(&self) -> Vec<u8> {
        match self {
            Self::Run(path) => [RUN_VERB.as_bytes(), path].concat(),
        }
    }

    /// Bytes the daemon forwards to the guest.
    #[must_use]
    pub fn guest_frame(&self) -> Vec<u8> {
        match self {
            Self::Run(path) => [path.as_slice(), b"\n"].concat(),
        }
    }
}

/// Log rendering only; invalid UTF-8 shows as U+FFFD.
impl fmt::Display for AgentCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run(path) => write!(f, "{RUN_VERB}{}", String::from_utf8_lossy(path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        assert_eq!(
            AgentCommand::parse(b"RUN C:\\App.exe"),
            Some(AgentCommand::run("C:\\App.exe"))
        );
    }

    #[test]
    fn test_parse_keeps_spaces_in_path() {
        assert_eq!(
            AgentCommand::parse(b"RUN C:\\Program Files\\App.exe\n"),
            Some(AgentCommand::run("C:\\Program Files\\App.exe"))
        );
    }

    #[test]
    fn test_parse_rejects_other_payloads() {
        for payload in [&b"PING"[..], b"", b"RUN ", b"RUN", b"run C:\\App.exe", b" RUN x", b"\n\0"] {
            assert_eq!(AgentCommand::parse(payload), None, "{payload:?}");
        }
    }

    #[test]
    fn test_non_utf8_path_is_forwarded_verbatim() {
        let command = AgentCommand::parse(b"RUN C:\\caf\xe9.exe\0\0").expect("parses");
        assert_eq!(command, AgentCommand::run(&b"C:\\caf\xe9.exe"[..]));
        assert_eq!(command.guest_frame(), b"C:\\caf\xe9.exe\n");
        assert_eq!(command.to_string(), "RUN C:\\caf\u{fffd}.exe");
    }

    #[test]
    fn test_frames() {
        let command = AgentCommand::run("C:\\App.exe");
        assert_eq!(command.to_wire(), b"RUN C:\\App.exe");
        assert_eq!(command.guest_frame(), b"C:\\App.exe\n");
    }
}

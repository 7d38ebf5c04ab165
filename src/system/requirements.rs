//! Preflight checks for the launcher.

use std::path::{Path, PathBuf};

use nix::unistd::geteuid;
use tracing::debug;

use crate::config::LauncherConfig;
use crate::error::{PreflightError, Result};

/// Results of all preflight checks.
#[derive(Debug, Clone)]
pub struct Preflight {
    /// Sandbox root that was checked.
    pub sandbox_root: PathBuf,
    /// Host path of the proxy loader under the root.
    pub loader: PathBuf,
    /// Effective UID of the launcher.
    pub euid: u32,
    /// Whether the relay daemon socket exists.
    pub relay_socket_present: bool,
}

/// Runs every check and returns the details, or the first unmet requirement.
///
/// A missing relay socket is reported but is not an error; Windows launches
/// will simply fail until the daemon runs.
///
/// # Errors
///
/// Returns the first failing `PreflightError`.
pub fn check_all(config: &LauncherConfig) -> Result<Preflight> {
    let sandbox_root = check_sandbox_root(&config.sandbox_root)?;
    let loader = check_loader(config)?;
    let euid = check_privileges()?;
    let relay_socket_present = config.relay_socket.exists();

    debug!(relay_socket_present, "Relay socket probed");

    Ok(Preflight {
        sandbox_root,
        loader,
        euid,
        relay_socket_present,
    })
}

/// Checks that the sandbox root is an existing directory.
///
/// # Errors
///
/// Returns `PreflightError::MissingRoot` otherwise.
pub fn check_sandbox_root(root: &Path) -> Result<PathBuf> {
    if !root.is_dir() {
        return Err(PreflightError::MissingRoot {
            path: root.to_path_buf(),
        }
        .into());
    }
    Ok(root.to_path_buf())
}

/// Checks that the proxy loader exists inside the sandbox root.
///
/// # Errors
///
/// Returns `PreflightError::MissingLoader` if it is not a regular file.
pub fn check_loader(config: &LauncherConfig) -> Result<PathBuf> {
    let loader = config.in_root(&config.loader_path);
    if !loader.is_file() {
        return Err(PreflightError::MissingLoader { path: loader }.into());
    }
    Ok(loader)
}

/// Checks that the launcher runs with an effective UID of 0.
///
/// # Errors
///
/// Returns `PreflightError::NotRoot` otherwise.
pub fn check_privileges() -> Result<u32> {
    let euid = geteuid().as_raw();
    if euid != 0 {
        return Err(PreflightError::NotRoot { euid }.into());
    }
    Ok(euid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_missing_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = check_sandbox_root(&dir.path().join("absent"));
        assert!(matches!(
            result,
            Err(Error::Preflight(PreflightError::MissingRoot { .. }))
        ));
    }

    #[test]
    fn test_existing_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = check_sandbox_root(dir.path()).expect("root exists");
        assert_eq!(root, dir.path());
    }

    #[test]
    fn test_loader_lookup_is_under_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = LauncherConfig::new().with_sandbox_root(dir.path());

        let result = check_loader(&config);
        match result {
            Err(Error::Preflight(PreflightError::MissingLoader { path })) => {
                assert_eq!(path, dir.path().join("bin/omnilaunch-proxy"));
            }
            other => panic!("expected missing loader, got {other:?}"),
        }

        std::fs::create_dir_all(dir.path().join("bin")).expect("mkdir");
        std::fs::write(dir.path().join("bin/omnilaunch-proxy"), b"").expect("write");
        assert!(check_loader(&config).is_ok());
    }

    #[test]
    fn test_privileges_match_euid() {
        let euid = geteuid().as_raw();
        assert_eq!(check_privileges().is_ok(), euid == 0);
    }
}

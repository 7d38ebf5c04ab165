//! Process-wide configuration for the launcher and the relay daemon.
//!
//! Both structs are built once at process start and passed by reference to
//! every component that needs a path. Defaults hold the fixed locations the
//! launcher, the relay daemon and the guest agent agree on.

use std::path::{Path, PathBuf};

/// Default isolated root filesystem for foreign Linux binaries.
pub const DEFAULT_SANDBOX_ROOT: &str = "/opt/omnilaunch/debroot";

/// Default path of the proxy loader, relative to the sandbox root.
pub const DEFAULT_LOADER_PATH: &str = "/bin/omnilaunch-proxy";

/// Default socket the relay daemon listens on.
pub const DEFAULT_RELAY_SOCKET: &str = "/tmp/omnilaunch_hostd.sock";

/// Default socket exposed by the Windows guest.
pub const DEFAULT_GUEST_SOCKET: &str = "/tmp/win_comm.sock";

/// Default flatpak executable.
pub const DEFAULT_FLATPAK_PROGRAM: &str = "/usr/bin/flatpak";

/// Package-manager binaries that get the host resolver configuration.
pub const DEFAULT_PACKAGE_MANAGERS: &[&str] = &["apt", "apt-get", "dpkg"];

/// Largest command the relay daemon reads from a client.
pub const DEFAULT_RELAY_READ_LIMIT: usize = 256;

/// Configuration for the launcher process.
///
/// # Example
///
/// ```
/// use omnilaunch::LauncherConfig;
///
/// let config = LauncherConfig::default()
///     .with_sandbox_root("/srv/bookworm")
///     .with_relay_socket("/run/omnilaunch/relay.sock");
///
/// assert_eq!(config.sandbox_root.to_str(), Some("/srv/bookworm"));
/// ```
#[derive(Debug, Clone)]
pub struct LauncherConfig {
    /// Host path of the isolated root.
    pub sandbox_root: PathBuf,

    /// Loader path as seen from inside the sandbox root.
    pub loader_path: PathBuf,

    /// Socket of the relay daemon for Windows launches.
    pub relay_socket: PathBuf,

    /// Flatpak executable used for `:flat:` targets.
    pub flatpak_program: PathBuf,

    /// File names treated as package managers (resolver passthrough).
    pub package_managers: Vec<String>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            sandbox_root: PathBuf::from(DEFAULT_SANDBOX_ROOT),
            loader_path: PathBuf::from(DEFAULT_LOADER_PATH),
            relay_socket: PathBuf::from(DEFAULT_RELAY_SOCKET),
            flatpak_program: PathBuf::from(DEFAULT_FLATPAK_PROGRAM),
            package_managers: DEFAULT_PACKAGE_MANAGERS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

impl LauncherConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the isolated root filesystem.
    #[must_use]
    pub fn with_sandbox_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.sandbox_root = path.into();
        self
    }

    /// Sets the loader path inside the sandbox root.
    #[must_use]
    pub fn with_loader_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.loader_path = path.into();
        self
    }

    /// Sets the relay daemon socket.
    #[must_use]
    pub fn with_relay_socket(mut self, path: impl Into<PathBuf>) -> Self {
        self.relay_socket = path.into();
        self
    }

    /// Sets the flatpak executable.
    #[must_use]
    pub fn with_flatpak_program(mut self, path: impl Into<PathBuf>) -> Self {
        self.flatpak_program = path.into();
        self
    }

    /// Replaces the package-manager name list.
    #[must_use]
    pub fn with_package_managers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.package_managers = names.into_iter().map(Into::into).collect();
        self
    }

    /// Maps an absolute guest path onto the host path under the sandbox root.
    ///
    /// `/home/alice` becomes `<root>/home/alice`. Relative paths are joined as-is.
    #[must_use]
    pub fn in_root(&self, guest_path: &Path) -> PathBuf {
        let relative = guest_path.strip_prefix("/").unwrap_or(guest_path);
        self.sandbox_root.join(relative)
    }

    /// Returns true if `file_name` is one of the configured package managers.
    #[must_use]
    pub fn is_package_manager(&self, file_name: &str) -> bool {
        self.package_managers.iter().any(|name| name == file_name)
    }
}

/// Configuration for the relay daemon.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Socket the daemon listens on.
    pub listen_socket: PathBuf,

    /// Socket exposed by the guest agent.
    pub guest_socket: PathBuf,

    /// Maximum bytes read from a client.
    pub read_limit: usize,

    /// Command run once before listening (typically the VM start script).
    pub start_vm: Option<PathBuf>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_socket: PathBuf::from(DEFAULT_RELAY_SOCKET),
            guest_socket: PathBuf::from(DEFAULT_GUEST_SOCKET),
            read_limit: DEFAULT_RELAY_READ_LIMIT,
            start_vm: None,
        }
    }
}

impl RelayConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the listen socket.
    #[must_use]
    pub fn with_listen_socket(mut self, path: impl Into<PathBuf>) -> Self {
        self.listen_socket = path.into();
        self
    }

    /// Sets the guest socket.
    #[must_use]
    pub fn with_guest_socket(mut self, path: impl Into<PathBuf>) -> Self {
        self.guest_socket = path.into();
        self
    }

    /// Sets the client read limit.
    #[must_use]
    pub fn with_read_limit(mut self, limit: usize) -> Self {
        self.read_limit = limit;
        self
    }

    /// Sets the command run before the daemon starts listening.
    #[must_use]
    pub fn with_start_vm(mut self, command: impl Into<PathBuf>) -> Self {
        self.start_vm = Some(command.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_launcher_config() {
        let config = LauncherConfig::default();
        assert_eq!(config.sandbox_root, PathBuf::from(DEFAULT_SANDBOX_ROOT));
        assert_eq!(config.loader_path, PathBuf::from(DEFAULT_LOADER_PATH));
        assert_eq!(config.relay_socket, PathBuf::from(DEFAULT_RELAY_SOCKET));
        assert!(config.is_package_manager("apt"));
        assert!(config.is_package_manager("apt-get"));
        assert!(config.is_package_manager("dpkg"));
        assert!(!config.is_package_manager("vlc"));
    }

    #[test]
    fn test_builder_chain() {
        let config = LauncherConfig::new()
            .with_sandbox_root("/srv/root")
            .with_loader_path("/sbin/proxy")
            .with_relay_socket("/run/relay.sock")
            .with_flatpak_program("/opt/flatpak")
            .with_package_managers(["pacman"]);

        assert_eq!(config.sandbox_root, PathBuf::from("/srv/root"));
        assert_eq!(config.loader_path, PathBuf::from("/sbin/proxy"));
        assert_eq!(config.relay_socket, PathBuf::from("/run/relay.sock"));
        assert_eq!(config.flatpak_program, PathBuf::from("/opt/flatpak"));
        assert!(config.is_package_manager("pacman"));
        assert!(!config.is_package_manager("apt"));
    }

    #[test]
    fn test_in_root_strips_leading_slash() {
        let config = LauncherConfig::new().with_sandbox_root("/srv/root");
        assert_eq!(
            config.in_root(Path::new("/home/alice")),
            PathBuf::from("/srv/root/home/alice")
        );
        assert_eq!(
            config.in_root(Path::new("dev/pts")),
            PathBuf::from("/srv/root/dev/pts")
        );
    }

    #[test]
    fn test_relay_config_builder() {
        let config = RelayConfig::new()
            .with_listen_socket("/tmp/a.sock")
            .with_guest_socket("/tmp/b.sock")
            .with_read_limit(64)
            .with_start_vm("/opt/vm/run.sh");

        assert_eq!(config.listen_socket, PathBuf::from("/tmp/a.sock"));
        assert_eq!(config.guest_socket, PathBuf::from("/tmp/b.sock"));
        assert_eq!(config.read_limit, 64);
        assert_eq!(config.start_vm, Some(PathBuf::from("/opt/vm/run.sh")));
    }
}

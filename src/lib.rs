//! omnilaunch - run binaries built for foreign environments on one Linux host.
//!
//! The first command-line argument selects the backend through a prefix tag:
//! `:deb:` binaries from another distribution run in a private mount namespace
//! chrooted into a foreign root, `:win:` executables are forwarded to a
//! Windows guest through the relay daemon, `:flat:` and `:app:` start Flatpak
//! applications and AppImages, and anything else runs on the host.
//!
//! # Platform Requirements
//!
//! - Linux with mount namespaces
//! - root privileges (usually via `sudo`) for sandboxed launches
//! - a statically linked `omnilaunch-proxy` inside the sandbox root
//!
//! # Example
//!
//! ```no_run
//! use omnilaunch::router::{self, LaunchRequest};
//! use omnilaunch::sandbox::{Environment, HostSyscalls};
//! use omnilaunch::LauncherConfig;
//!
//! fn main() -> miette::Result<()> {
//!     let config = LauncherConfig::default();
//!     let request = LaunchRequest::parse(":deb:/usr/bin/vlc", vec![])?;
//!
//!     // Replaces the process image on success.
//!     router::route(&request, &config, &mut HostSyscalls::new(), Environment::from_current())?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod loader;
pub mod relay;
pub mod router;
pub mod sandbox;
pub mod system;

// Re-export commonly used types
pub use config::{LauncherConfig, RelayConfig};
pub use error::{Error, Result};
pub use router::{Backend, Dispatch, LaunchRequest};

//! Backend dispatch.
//!
//! Dispatch is two-phase. [`Dispatch::plan`] turns a [`LaunchRequest`] into a
//! value describing the single action to take; [`Dispatch::execute`] performs
//! it. For every backend but Windows that action replaces the process image,
//! so a successful `execute` never returns.

use std::path::PathBuf;

use tracing::{info, warn};

use super::request::{Backend, LaunchRequest};
use crate::config::LauncherConfig;
use crate::error::{Result, RouteError};
use crate::relay::{AgentCommand, send_command};
use crate::sandbox::{Environment, SandboxBuilder, SandboxLaunch, Syscalls, argv_with_program};

/// The one action a launch request resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Build the sandbox and exec the loader for `target`.
    Sandboxed { target: PathBuf, args: Vec<String> },

    /// Send `command` to the relay daemon at `socket`.
    Relay {
        socket: PathBuf,
        command: AgentCommand,
    },

    /// Replace the process image with `program`.
    Exec {
        backend: Backend,
        program: PathBuf,
        argv: Vec<String>,
    },
}

impl Dispatch {
    /// Computes the dispatch for `request`. Pure; performs no I/O.
    #[must_use]
    pub fn plan(request: &LaunchRequest, config: &LauncherConfig) -> Self {
        let target = request.target();
        let args = request.args();

        match request.backend() {
            Backend::ForeignLinux => Self::Sandboxed {
                target: PathBuf::from(target),
                args: args.to_vec(),
            },

            Backend::Windows => {
                if !args.is_empty() {
                    warn!(
                        ?args,
                        "Windows launches carry only the executable path, dropping arguments"
                    );
                }
                Self::Relay {
                    socket: config.relay_socket.clone(),
                    command: AgentCommand::run(target),
                }
            }

            Backend::Flatpak => {
                let mut argv = vec!["flatpak".to_string(), "run".to_string(), target.to_string()];
                argv.extend(args.iter().cloned());
                Self::Exec {
                    backend: Backend::Flatpak,
                    program: config.flatpak_program.clone(),
                    argv,
                }
            }

            backend @ (Backend::AppImage | Backend::Native) => {
                let program = PathBuf::from(target);
                let argv = argv_with_program(&program, args);
                Self::Exec {
                    backend,
                    program,
                    argv,
                }
            }
        }
    }

    /// Performs the dispatch.
    ///
    /// Returns `Ok(())` only for relayed launches; exec-based dispatches
    /// return only on failure.
    ///
    /// # Errors
    ///
    /// - `RouteError::Exec` if a backend program cannot be executed
    /// - `RouteError::RelayUnavailable` / `RouteError::RelaySend` for Windows
    /// - any `SandboxError` or `PlanError` from the sandbox builder
    pub fn execute<S: Syscalls>(
        self,
        config: &LauncherConfig,
        sys: &mut S,
        env: Environment,
    ) -> Result<()> {
        match self {
            Self::Sandboxed { target, args } => {
                let launch = SandboxLaunch::new(target, args, env);
                match SandboxBuilder::new(config, sys).launch(launch)? {}
            }

            Self::Relay { socket, command } => {
                info!(%command, "Transferring command to Windows daemon");
                send_command(&socket, &command)?;
                info!("Command sent");
                Ok(())
            }

            Self::Exec {
                backend,
                program,
                argv,
            } => {
                info!(%backend, program = %program.display(), "Starting");
                let source = sys.exec(&program, &argv, None);
                Err(RouteError::Exec {
                    backend: backend.name(),
                    program,
                    source,
                }
                .into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(raw: &str, args: &[&str]) -> Dispatch {
        let args = args.iter().map(|s| (*s).to_string()).collect();
        let request = LaunchRequest::parse(raw, args).expect("parse");
        Dispatch::plan(&request, &LauncherConfig::default())
    }

    #[test]
    fn test_foreign_linux_is_sandboxed() {
        assert_eq!(
            plan(":deb:/usr/bin/vlc", &["extra-arg"]),
            Dispatch::Sandboxed {
                target: PathBuf::from("/usr/bin/vlc"),
                args: vec!["extra-arg".to_string()],
            }
        );
    }

    #[test]
    fn test_windows_is_relayed() {
        assert_eq!(
            plan(":win:C:\\App.exe", &[]),
            Dispatch::Relay {
                socket: PathBuf::from(crate::config::DEFAULT_RELAY_SOCKET),
                command: AgentCommand::run("C:\\App.exe"),
            }
        );
    }

    #[test]
    fn test_flatpak_argv() {
        assert_eq!(
            plan(":flat:org.gimp.GIMP", &["image.png"]),
            Dispatch::Exec {
                backend: Backend::Flatpak,
                program: PathBuf::from("/usr/bin/flatpak"),
                argv: vec![
                    "flatpak".to_string(),
                    "run".to_string(),
                    "org.gimp.GIMP".to_string(),
                    "image.png".to_string(),
                ],
            }
        );
    }

    #[test]
    fn test_appimage_program_name_is_stripped_target() {
        assert_eq!(
            plan(":app:/opt/Gimp.AppImage", &["--new-instance"]),
            Dispatch::Exec {
                backend: Backend::AppImage,
                program: PathBuf::from("/opt/Gimp.AppImage"),
                argv: vec!["/opt/Gimp.AppImage".to_string(), "--new-instance".to_string()],
            }
        );
    }

    #[test]
    fn test_native_default() {
        assert_eq!(
            plan("gedit", &["notes.txt"]),
            Dispatch::Exec {
                backend: Backend::Native,
                program: PathBuf::from("gedit"),
                argv: vec!["gedit".to_string(), "notes.txt".to_string()],
            }
        );
    }
}

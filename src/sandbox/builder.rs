//! Builds the isolated environment for a foreign Linux binary and hands over
//! to the proxy loader.
//!
//! # Setup pipeline
//!
//! 1. Unshare the mount namespace (fatal)
//! 2. Make `/` recursively private (fatal)
//! 3. Apply the mount plan; each step's criticality decides fatal vs warning
//! 4. `chroot` into the sandbox root (fatal)
//! 5. `chdir("/")`
//! 6. Ensure `/dev/null` exists
//! 7. Sanitize the environment
//! 8. Close stdin
//! 9. Exec the loader with `[loader, target, args...]` (fatal on failure)
//!
//! There is no rollback. A fatal error ends the process, and the kernel tears
//! down the private namespace with it.

use std::convert::Infallible;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use super::env::Environment;
use super::plan::{Condition, Criticality, MountPlan, PlanStep, plan_mounts};
use super::sys::Syscalls;
use crate::config::LauncherConfig;
use crate::error::{Result, SandboxError};

/// Path of the null device inside the sandbox root.
pub const DEV_NULL: &str = "/dev/null";

/// A foreign binary to launch inside the sandbox.
#[derive(Debug, Clone)]
pub struct SandboxLaunch {
    /// Target path as seen inside the sandbox root.
    pub target: PathBuf,
    /// Arguments after the target, forwarded unchanged.
    pub args: Vec<String>,
    /// Environment of the invoking process.
    pub env: Environment,
}

impl SandboxLaunch {
    #[must_use]
    pub fn new(target: impl Into<PathBuf>, args: Vec<String>, env: Environment) -> Self {
        Self {
            target: target.into(),
            args,
            env,
        }
    }
}

/// Argument vector for the proxy loader: `[loader, target, args...]`.
#[must_use]
pub fn loader_argv(loader: &Path, target: &Path, args: &[String]) -> Vec<String> {
    let mut argv = Vec::with_capacity(args.len() + 2);
    argv.push(loader.to_string_lossy().into_owned());
    argv.push(target.to_string_lossy().into_owned());
    argv.extend(args.iter().cloned());
    argv
}

/// Executes mount plans and the final handover against a [`Syscalls`] backend.
pub struct SandboxBuilder<'a, S: Syscalls> {
    config: &'a LauncherConfig,
    sys: &'a mut S,
}

impl<'a, S: Syscalls> SandboxBuilder<'a, S> {
    pub fn new(config: &'a LauncherConfig, sys: &'a mut S) -> Self {
        Self { config, sys }
    }

    /// Runs the full pipeline for `launch`.
    ///
    /// Returns only on failure; on success the process image is replaced.
    ///
    /// # Errors
    ///
    /// - `PlanError` if the computed plan breaks its ordering contract
    /// - `SandboxError` for every fatal step (unshare, private remount,
    ///   scaffolding, chroot, loader exec)
    #[instrument(skip_all, fields(target = %launch.target.display(), root = %self.config.sandbox_root.display()))]
    pub fn launch(mut self, launch: SandboxLaunch) -> Result<Infallible> {
        info!("Starting foreign binary in isolated environment");

        let home = launch.env.home();
        let plan = plan_mounts(self.config, &launch.target, home.as_deref());
        plan.validate()?;

        self.apply_plan(&plan)?;
        self.enter_root()?;

        let mut env = launch.env;
        env.sanitize(|name| self.sys.lookup_user(name));

        if let Err(e) = self.sys.close_stdin() {
            warn!(error = %e, "Failed to close stdin");
        }

        let loader = self.config.loader_path.clone();
        let argv = loader_argv(&loader, &launch.target, &launch.args);
        debug!(loader = %loader.display(), ?argv, "Handing over to proxy loader");

        let source = self.sys.exec(&loader, &argv, Some(&env));
        Err(SandboxError::LoaderExec { loader, source }.into())
    }

    /// Applies every step of `plan` in order.
    ///
    /// # Errors
    ///
    /// Returns the first failure of a step declared fatal. Best-effort
    /// failures are logged and skipped.
    pub fn apply_plan(&mut self, plan: &MountPlan) -> std::result::Result<(), SandboxError> {
        for step in plan.steps() {
            self.apply_step(step)?;
        }
        debug!("Mount plan applied");
        Ok(())
    }

    fn apply_step(&mut self, step: &PlanStep) -> std::result::Result<(), SandboxError> {
        match step {
            PlanStep::UnshareMountNamespace => self
                .sys
                .unshare_mount_namespace()
                .map_err(|source| SandboxError::Unshare { source }),

            PlanStep::MakeRootPrivate => self
                .sys
                .make_root_private()
                .map_err(|source| SandboxError::MakePrivate { source }),

            PlanStep::CreateDir {
                target,
                mode,
                criticality,
            } => {
                let path = self.config.in_root(target);
                match self.sys.create_dir(&path, *mode) {
                    Ok(()) => Ok(()),
                    Err(source) if *criticality == Criticality::Fatal => {
                        Err(SandboxError::Scaffold { path, source })
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Could not create directory");
                        Ok(())
                    }
                }
            }

            PlanStep::Mount(mount) => {
                if mount.condition == Condition::SourceExists && !self.sys.exists(&mount.source) {
                    debug!(source = %mount.source.display(), "Source missing, skipping mount");
                    return Ok(());
                }

                let target = self.config.in_root(&mount.target);
                match self.sys.mount(mount, &target) {
                    Ok(()) => Ok(()),
                    Err(source) if mount.criticality == Criticality::Fatal => {
                        Err(SandboxError::Mount {
                            source_path: mount.source.clone(),
                            target,
                            source,
                        })
                    }
                    Err(e) => {
                        warn!(
                            kind = ?mount.kind,
                            source = %mount.source.display(),
                            target = %target.display(),
                            error = %e,
                            "Mount failed, continuing with degraded sandbox"
                        );
                        Ok(())
                    }
                }
            }
        }
    }

    /// Chroots into the sandbox root and prepares `/dev/null`.
    fn enter_root(&mut self) -> std::result::Result<(), SandboxError> {
        let root = &self.config.sandbox_root;
        self.sys
            .chroot(root)
            .map_err(|source| SandboxError::Chroot {
                root: root.clone(),
                source,
            })?;

        if let Err(e) = self.sys.chdir(Path::new("/")) {
            warn!(error = %e, "chdir to new root failed");
        }

        if let Err(e) = self.sys.make_dev_null(Path::new(DEV_NULL)) {
            warn!(error = %e, "Could not create {DEV_NULL}");
        }

        debug!("Entered sandbox root");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_argv() {
        let argv = loader_argv(
            Path::new("/bin/omnilaunch-proxy"),
            Path::new("/usr/bin/vlc"),
            &["extra-arg".to_string()],
        );
        assert_eq!(argv, vec!["/bin/omnilaunch-proxy", "/usr/bin/vlc", "extra-arg"]);
    }

    #[test]
    fn test_loader_argv_without_args() {
        let argv = loader_argv(Path::new("/proxy"), Path::new("/bin/sh"), &[]);
        assert_eq!(argv, vec!["/proxy", "/bin/sh"]);
    }
}

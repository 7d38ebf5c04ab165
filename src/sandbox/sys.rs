//! The system-call seam used by the sandbox builder and the router.
//!
//! [`HostSyscalls`] talks to the kernel. Tests substitute a recording double,
//! which is why every privileged operation (and the final exec) goes through
//! the [`Syscalls`] trait instead of being called directly.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use nix::errno::Errno;
use nix::unistd::{User, chdir, chroot, close, execve, execvp};
use tracing::debug;

use super::env::{Environment, UserRecord};
use super::mounts;
use super::plan::MountStep;

/// Privileged operations and process replacement.
pub trait Syscalls {
    fn unshare_mount_namespace(&mut self) -> Result<(), Errno>;

    fn make_root_private(&mut self) -> Result<(), Errno>;

    /// Creates `path` unless present.
    fn create_dir(&mut self, path: &Path, mode: u32) -> io::Result<()>;

    /// Applies `step` onto `target`, the host path under the sandbox root.
    fn mount(&mut self, step: &MountStep, target: &Path) -> Result<(), Errno>;

    fn exists(&self, path: &Path) -> bool;

    fn chroot(&mut self, root: &Path) -> Result<(), Errno>;

    fn chdir(&mut self, path: &Path) -> Result<(), Errno>;

    /// Creates the null device node; an existing node is success.
    fn make_dev_null(&mut self, path: &Path) -> Result<(), Errno>;

    /// Looks `name` up in the user database visible to the process.
    fn lookup_user(&self, name: &str) -> Option<UserRecord>;

    fn close_stdin(&mut self) -> Result<(), Errno>;

    /// Replaces the process image.
    ///
    /// With `env` set, `program` is executed as given with exactly that
    /// environment. Without it, `program` is searched in `PATH` and the
    /// current environment is inherited. Returns only if the exec failed.
    fn exec(&mut self, program: &Path, argv: &[String], env: Option<&Environment>) -> Errno;
}

/// [`Syscalls`] backed by the running kernel.
#[derive(Debug, Default)]
pub struct HostSyscalls;

impl HostSyscalls {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn to_cstrings(args: &[String]) -> Result<Vec<CString>, Errno> {
    args.iter()
        .map(|a| CString::new(a.as_bytes()).map_err(|_| Errno::EINVAL))
        .collect()
}

impl Syscalls for HostSyscalls {
    fn unshare_mount_namespace(&mut self) -> Result<(), Errno> {
        mounts::unshare_mount_namespace()
    }

    fn make_root_private(&mut self) -> Result<(), Errno> {
        mounts::make_root_private()
    }

    fn create_dir(&mut self, path: &Path, mode: u32) -> io::Result<()> {
        mounts::create_dir_if_absent(path, mode).map(|_| ())
    }

    fn mount(&mut self, step: &MountStep, target: &Path) -> Result<(), Errno> {
        mounts::apply_mount(step, target)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn chroot(&mut self, root: &Path) -> Result<(), Errno> {
        chroot(root)
    }

    fn chdir(&mut self, path: &Path) -> Result<(), Errno> {
        chdir(path)
    }

    fn make_dev_null(&mut self, path: &Path) -> Result<(), Errno> {
        mounts::make_dev_null(path)
    }

    fn lookup_user(&self, name: &str) -> Option<UserRecord> {
        match User::from_name(name) {
            Ok(Some(user)) => Some(UserRecord {
                name: user.name,
                home: user.dir,
            }),
            Ok(None) => None,
            Err(e) => {
                debug!(user = name, error = %e, "User lookup failed");
                None
            }
        }
    }

    fn close_stdin(&mut self) -> Result<(), Errno> {
        close(0)
    }

    fn exec(&mut self, program: &Path, argv: &[String], env: Option<&Environment>) -> Errno {
        let Ok(path) = CString::new(program.as_os_str().as_bytes()) else {
            return Errno::EINVAL;
        };
        let argv = match to_cstrings(argv) {
            Ok(argv) => argv,
            Err(e) => return e,
        };

        let result = match env {
            Some(env) => execve(&path, &argv, &env.to_cstrings()),
            None => execvp(&path, &argv),
        };
        match result {
            Ok(never) => match never {},
            Err(e) => e,
        }
    }
}

/// Builds `[program, args...]` by explicit appends.
#[must_use]
pub fn argv_with_program(program: &Path, args: &[String]) -> Vec<String> {
    let mut argv = Vec::with_capacity(args.len() + 1);
    argv.push(program.to_string_lossy().into_owned());
    argv.extend(args.iter().cloned());
    argv
}

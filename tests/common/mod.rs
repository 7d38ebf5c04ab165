//! Shared test support: a [`Syscalls`] double that records every call.
#![allow(dead_code)]

use std::io;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use omnilaunch::LauncherConfig;
use omnilaunch::sandbox::{Environment, MountKind, MountStep, Syscalls, UserRecord, create_dir_if_absent};

/// One recorded system call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Unshare,
    MakePrivate,
    CreateDir(PathBuf),
    Mount { kind: MountKind, target: PathBuf },
    Chroot(PathBuf),
    Chdir(PathBuf),
    MakeDevNull(PathBuf),
    CloseStdin,
    Exec {
        program: PathBuf,
        argv: Vec<String>,
        env: Option<Environment>,
    },
}

/// Records calls instead of touching the kernel.
///
/// Directory creation is real when `dirs_on_disk` is set, so scaffolding can
/// be checked against a temporary root.
#[derive(Debug)]
pub struct RecordingSyscalls {
    pub calls: Vec<Call>,
    pub users: Vec<UserRecord>,
    /// Host paths reported as existing.
    pub existing: Vec<PathBuf>,
    /// Guest mount targets whose mount fails with `EPERM`.
    pub failing_mounts: Vec<PathBuf>,
    pub unshare_error: Option<Errno>,
    pub chroot_error: Option<Errno>,
    /// Returned by every `exec`.
    pub exec_error: Errno,
    pub dirs_on_disk: bool,
}

impl Default for RecordingSyscalls {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            users: Vec::new(),
            existing: Vec::new(),
            failing_mounts: Vec::new(),
            unshare_error: None,
            chroot_error: None,
            exec_error: Errno::ENOENT,
            dirs_on_disk: false,
        }
    }
}

impl RecordingSyscalls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, name: &str, home: &str) -> Self {
        self.users.push(UserRecord {
            name: name.to_string(),
            home: PathBuf::from(home),
        });
        self
    }

    pub fn mounted_targets(&self) -> Vec<PathBuf> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Mount { target, .. } => Some(target.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_exec(&self) -> Option<(&Path, &[String], Option<&Environment>)> {
        self.calls.iter().rev().find_map(|c| match c {
            Call::Exec { program, argv, env } => {
                Some((program.as_path(), argv.as_slice(), env.as_ref()))
            }
            _ => None,
        })
    }

    /// True if anything touched the mount namespace.
    pub fn touched_namespace(&self) -> bool {
        self.calls.iter().any(|c| {
            matches!(
                c,
                Call::Unshare | Call::MakePrivate | Call::Mount { .. } | Call::Chroot(_)
            )
        })
    }
}

impl Syscalls for RecordingSyscalls {
    fn unshare_mount_namespace(&mut self) -> Result<(), Errno> {
        self.calls.push(Call::Unshare);
        self.unshare_error.map_or(Ok(()), Err)
    }

    fn make_root_private(&mut self) -> Result<(), Errno> {
        self.calls.push(Call::MakePrivate);
        Ok(())
    }

    fn create_dir(&mut self, path: &Path, mode: u32) -> io::Result<()> {
        self.calls.push(Call::CreateDir(path.to_path_buf()));
        if self.dirs_on_disk {
            create_dir_if_absent(path, mode)?;
        }
        Ok(())
    }

    fn mount(&mut self, step: &MountStep, target: &Path) -> Result<(), Errno> {
        self.calls.push(Call::Mount {
            kind: step.kind,
            target: target.to_path_buf(),
        });
        if self.failing_mounts.contains(&step.target) {
            return Err(Errno::EPERM);
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.existing.iter().any(|p| p == path)
    }

    fn chroot(&mut self, root: &Path) -> Result<(), Errno> {
        self.calls.push(Call::Chroot(root.to_path_buf()));
        self.chroot_error.map_or(Ok(()), Err)
    }

    fn chdir(&mut self, path: &Path) -> Result<(), Errno> {
        self.calls.push(Call::Chdir(path.to_path_buf()));
        Ok(())
    }

    fn make_dev_null(&mut self, path: &Path) -> Result<(), Errno> {
        self.calls.push(Call::MakeDevNull(path.to_path_buf()));
        Ok(())
    }

    fn lookup_user(&self, name: &str) -> Option<UserRecord> {
        self.users.iter().find(|u| u.name == name).cloned()
    }

    fn close_stdin(&mut self) -> Result<(), Errno> {
        self.calls.push(Call::CloseStdin);
        Ok(())
    }

    fn exec(&mut self, program: &Path, argv: &[String], env: Option<&Environment>) -> Errno {
        self.calls.push(Call::Exec {
            program: program.to_path_buf(),
            argv: argv.to_vec(),
            env: env.cloned(),
        });
        self.exec_error
    }
}

/// Launcher configuration rooted at `root`.
pub fn config_in(root: &Path) -> LauncherConfig {
    LauncherConfig::new().with_sandbox_root(root)
}

/// Environment of a launcher started through `sudo` by `alice`.
pub fn sudo_env() -> Environment {
    [
        ("HOME", "/root"),
        ("USER", "root"),
        ("SUDO_USER", "alice"),
        ("LD_PRELOAD", "/usr/lib/libhook.so"),
        ("DISPLAY", ":0"),
        ("WAYLAND_DISPLAY", "wayland-0"),
        ("PATH", "/usr/bin:/bin"),
    ]
    .into_iter()
    .collect()
}

//! Kernel-facing mount operations for the sandbox root.
//!
//! This module performs the individual operations a [`MountPlan`] asks for:
//!
//! - private mount namespace setup (`unshare` + recursive `MS_PRIVATE` on `/`)
//! - recursive bind mounts of host directories (`/proc`, `/sys`, `/dev`, home)
//! - fresh `tmpfs` and `devpts` instances layered over the `/dev` bind
//! - create-if-absent scaffolding directories and the `/dev/null` node
//!
//! Nothing here decides whether a failure is fatal; callers consult the
//! step's declared criticality.
//!
//! [`MountPlan`]: super::plan::MountPlan

use std::fs::DirBuilder;
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::Path;

use nix::errno::Errno;
use nix::mount::{MsFlags, mount};
use nix::sched::{CloneFlags, unshare};
use nix::sys::stat::{Mode, SFlag, makedev, mknod};
use tracing::{debug, instrument, trace};

use super::plan::MountStep;

/// Major/minor numbers of the null device.
pub const DEV_NULL_MAJOR: u64 = 1;
pub const DEV_NULL_MINOR: u64 = 3;

/// Moves the calling process into a new, unshared mount namespace.
///
/// # Errors
///
/// Returns the errno from `unshare(2)`. `EINVAL` means the process has other
/// threads sharing its filesystem attributes.
#[instrument]
pub fn unshare_mount_namespace() -> Result<(), Errno> {
    unshare(CloneFlags::CLONE_NEWNS)?;
    debug!("Mount namespace unshared");
    Ok(())
}

/// Marks every mount under `/` private so later mounts stay in this namespace.
///
/// # Errors
///
/// Returns the errno from `mount(2)`.
#[instrument]
pub fn make_root_private() -> Result<(), Errno> {
    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_REC | MsFlags::MS_PRIVATE,
        None::<&str>,
    )?;
    debug!("Root mount marked private");
    Ok(())
}

/// Applies one mount step onto `target`, the step's path under the sandbox root.
///
/// # Errors
///
/// Returns the errno from `mount(2)`.
#[instrument(skip_all, fields(kind = ?step.kind, source = %step.source.display(), target = %target.display()))]
pub fn apply_mount(step: &MountStep, target: &Path) -> Result<(), Errno> {
    trace!(flags = ?step.flags, options = ?step.options, "Mounting");

    mount(
        Some(step.source.as_path()),
        target,
        step.kind.fstype(),
        step.flags,
        step.options.as_deref(),
    )?;

    trace!("Mounted");
    Ok(())
}

/// Creates `path` (and missing parents) with `mode` unless it already exists.
///
/// Returns `true` if the directory was created by this call. Concurrent
/// creators are tolerated: a directory that appears between the check and the
/// creation is treated as already present.
///
/// # Errors
///
/// Returns the I/O error if the directory could not be created.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn create_dir_if_absent(path: &Path, mode: u32) -> io::Result<bool> {
    if path.is_dir() {
        trace!("Directory already present");
        return Ok(false);
    }

    DirBuilder::new().recursive(true).mode(mode).create(path)?;
    debug!(mode = format!("{mode:o}"), "Directory created");
    Ok(true)
}

/// Creates the null character device at `path`.
///
/// An existing node counts as success.
///
/// # Errors
///
/// Returns the errno from `mknod(2)` for anything but `EEXIST`.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn make_dev_null(path: &Path) -> Result<(), Errno> {
    match mknod(
        path,
        SFlag::S_IFCHR,
        Mode::from_bits_truncate(0o666),
        makedev(DEV_NULL_MAJOR, DEV_NULL_MINOR),
    ) {
        Ok(()) => {
            debug!("Created null device node");
            Ok(())
        }
        Err(Errno::EEXIST) => {
            trace!("Null device already present");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_dir_if_absent_is_idempotent() {
        let root = tempfile::tempdir().expect("tempdir");
        let dir = root.path().join("run/user");

        assert!(create_dir_if_absent(&dir, 0o755).expect("first create"));
        assert!(!create_dir_if_absent(&dir, 0o755).expect("second create"));
        assert!(dir.is_dir());
    }

    #[test]
    fn test_create_dir_if_absent_fails_on_file() {
        let root = tempfile::tempdir().expect("tempdir");
        let file = root.path().join("dev");
        std::fs::write(&file, b"not a directory").expect("write");

        assert!(create_dir_if_absent(&file, 0o755).is_err());
    }

    #[test]
    fn test_make_dev_null_existing_is_ok() {
        // /dev/null exists on every host, so this must hit the EEXIST path
        // (or EPERM when unprivileged, which is not EEXIST).
        match make_dev_null(Path::new("/dev/null")) {
            Ok(()) => {}
            Err(e) => assert_ne!(e, Errno::EEXIST),
        }
    }
}

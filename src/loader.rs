//! The indirection loader that runs inside the sandbox root.
//!
//! Invoked as `omnilaunch-proxy <target> [args...]`, it execs `target` with
//! `[target, args...]` and the environment it was given. Built statically, it
//! needs nothing from the guest's dynamic loader, so the target starts fresh
//! under the guest's own runtime.

use std::convert::Infallible;
use std::ffi::{CString, OsString};
use std::os::unix::ffi::OsStrExt;

use nix::unistd::execv;

use crate::error::LoaderError;

/// Splits the loader's own argument vector into the target and the target's argv.
///
/// `args[0]` is the loader, `args[1]` the target; the returned argv starts
/// with the target followed by `args[2..]`.
///
/// # Errors
///
/// Returns `LoaderError::MissingTarget` with fewer than two arguments.
pub fn target_argv(args: Vec<OsString>) -> Result<(OsString, Vec<OsString>), LoaderError> {
    let mut args = args.into_iter().skip(1);
    let target = args.next().ok_or(LoaderError::MissingTarget)?;

    let mut argv = Vec::new();
    argv.push(target.clone());
    argv.extend(args);
    Ok((target, argv))
}

fn cstring(arg: &OsString) -> Result<CString, LoaderError> {
    CString::new(arg.as_bytes())
        .map_err(|_| LoaderError::InvalidArgument(arg.to_string_lossy().into_owned()))
}

/// Execs the target named by the loader's argument vector.
///
/// Returns only on failure.
///
/// # Errors
///
/// - `LoaderError::MissingTarget` with fewer than two arguments
/// - `LoaderError::InvalidArgument` if an argument contains a NUL byte
/// - `LoaderError::Exec` if `execv(2)` fails
pub fn exec_target(args: Vec<OsString>) -> Result<Infallible, LoaderError> {
    let (target, argv) = target_argv(args)?;

    let path = cstring(&target)?;
    let argv = argv.iter().map(cstring).collect::<Result<Vec<_>, _>>()?;

    execv(&path, &argv).map_err(|source| LoaderError::Exec {
        target: target.to_string_lossy().into_owned(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_target_argv_repoints_program_name() {
        let (target, argv) =
            target_argv(os(&["/bin/omnilaunch-proxy", "/usr/bin/vlc", "extra-arg"])).expect("ok");
        assert_eq!(target, OsString::from("/usr/bin/vlc"));
        assert_eq!(argv, os(&["/usr/bin/vlc", "extra-arg"]));
    }

    #[test]
    fn test_target_argv_without_args() {
        let (_, argv) = target_argv(os(&["proxy", "/bin/sh"])).expect("ok");
        assert_eq!(argv, os(&["/bin/sh"]));
    }

    #[test]
    fn test_missing_target() {
        assert!(matches!(
            target_argv(os(&["proxy"])),
            Err(LoaderError::MissingTarget)
        ));
        assert!(matches!(target_argv(vec![]), Err(LoaderError::MissingTarget)));
    }

    #[test]
    fn test_exec_failure_names_target() {
        let err = exec_target(os(&["proxy", "/nonexistent/omnilaunch-target"])).expect_err("fails");
        assert!(matches!(err, LoaderError::Exec { .. }));
        assert!(err.to_string().contains("/nonexistent/omnilaunch-target"));
    }
}

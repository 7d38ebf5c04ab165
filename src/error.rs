//! Error types for the launcher, the sandbox builder and the relay daemon.
//!
//! Uses thiserror for deriving std::error::Error and miette for rich diagnostics.
//! Every variant that reaches an operator carries the operation, the path and the
//! underlying OS error.

use std::path::PathBuf;

use miette::Diagnostic;
use nix::errno::Errno;
use thiserror::Error;

/// Top-level error type for the application.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// No launch target on the command line
    #[error("no launch target given")]
    #[diagnostic(
        code(omnilaunch::usage),
        help("run `omnilaunch --help` for all options")
    )]
    Usage,

    /// Sandbox construction failed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Sandbox(#[from] SandboxError),

    /// Mount plan broke an ordering contract
    #[error(transparent)]
    #[diagnostic(transparent)]
    Plan(#[from] PlanError),

    /// Backend dispatch failed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Route(#[from] RouteError),

    /// Relay daemon failure
    #[error(transparent)]
    #[diagnostic(transparent)]
    Relay(#[from] RelayError),

    /// Preflight requirement not met
    #[error(transparent)]
    #[diagnostic(transparent)]
    Preflight(#[from] PreflightError),

    /// I/O error
    #[error("I/O error: {0}")]
    #[diagnostic(code(omnilaunch::io))]
    Io(#[from] std::io::Error),
}

/// Fatal errors raised while building the sandbox.
///
/// Best-effort failures never surface here; they are logged and skipped.
#[derive(Error, Debug, Diagnostic)]
pub enum SandboxError {
    #[error("failed to unshare mount namespace: {source}")]
    #[diagnostic(
        code(omnilaunch::sandbox::unshare),
        help("creating a mount namespace needs CAP_SYS_ADMIN; run through sudo")
    )]
    Unshare {
        #[source]
        source: Errno,
    },

    #[error("failed to make / recursively private: {source}")]
    #[diagnostic(code(omnilaunch::sandbox::make_private))]
    MakePrivate {
        #[source]
        source: Errno,
    },

    #[error("unable to create {}: {source}", path.display())]
    #[diagnostic(
        code(omnilaunch::sandbox::scaffold),
        help("the sandbox root must be writable by the launcher")
    )]
    Scaffold {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to mount {} on {}: {source}", source_path.display(), target.display())]
    #[diagnostic(code(omnilaunch::sandbox::mount))]
    Mount {
        source_path: PathBuf,
        target: PathBuf,
        #[source]
        source: Errno,
    },

    #[error("chroot into {} failed: {source}", root.display())]
    #[diagnostic(
        code(omnilaunch::sandbox::chroot),
        help("check that the sandbox root directory exists")
    )]
    Chroot {
        root: PathBuf,
        #[source]
        source: Errno,
    },

    #[error("proxy loader {} could not be started: {source}", loader.display())]
    #[diagnostic(
        code(omnilaunch::sandbox::loader),
        help("install the statically linked omnilaunch-proxy inside the sandbox root")
    )]
    LoaderExec {
        loader: PathBuf,
        #[source]
        source: Errno,
    },
}

/// Ordering contract violations detected in a mount plan.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("mount plan must start by unsharing the mount namespace")]
    #[diagnostic(code(omnilaunch::plan::unshare_first))]
    UnshareNotFirst,

    #[error("mount plan must make / private right after unsharing")]
    #[diagnostic(code(omnilaunch::plan::private_second))]
    PrivateNotSecond,

    #[error("{} is layered before its parent {} is bound", layer.display(), parent.display())]
    #[diagnostic(code(omnilaunch::plan::layering))]
    LayerBeforeParent { layer: PathBuf, parent: PathBuf },

    #[error("mount target {} has no preceding directory creation step", target.display())]
    #[diagnostic(code(omnilaunch::plan::missing_dir))]
    MissingDirectory { target: PathBuf },
}

/// Errors raised while dispatching a launch request to a backend.
#[derive(Error, Debug, Diagnostic)]
pub enum RouteError {
    #[error("empty launch target")]
    #[diagnostic(
        code(omnilaunch::route::missing_target),
        help("pass a program path, optionally prefixed with a backend tag")
    )]
    MissingTarget,

    #[error("empty target after the {tag} tag")]
    #[diagnostic(code(omnilaunch::route::empty_target))]
    EmptyTarget { tag: &'static str },

    #[error("{backend}: failed to execute {}: {source}", program.display())]
    #[diagnostic(
        code(omnilaunch::route::exec),
        help("check that the program exists and is executable")
    )]
    Exec {
        backend: &'static str,
        program: PathBuf,
        #[source]
        source: Errno,
    },

    #[error("relay daemon not reachable at {}: {source}", socket.display())]
    #[diagnostic(
        code(omnilaunch::route::relay_unavailable),
        help("start omnilaunch-relayd first")
    )]
    RelayUnavailable {
        socket: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to send command to relay daemon at {}: {source}", socket.display())]
    #[diagnostic(code(omnilaunch::route::relay_send))]
    RelaySend {
        socket: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the relay daemon itself.
#[derive(Error, Debug, Diagnostic)]
pub enum RelayError {
    #[error("failed to bind {}: {source}", path.display())]
    #[diagnostic(code(omnilaunch::relay::bind))]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot connect to guest socket {}: {source}", path.display())]
    #[diagnostic(
        code(omnilaunch::relay::guest_unreachable),
        help("the virtual machine may not be running")
    )]
    GuestUnreachable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to forward to guest socket {}: {source}", path.display())]
    #[diagnostic(code(omnilaunch::relay::forward))]
    Forward {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read client command: {0}")]
    #[diagnostic(code(omnilaunch::relay::read))]
    Read(#[source] std::io::Error),
}

/// Errors raised by the indirection loader.
#[derive(Error, Debug, Diagnostic)]
pub enum LoaderError {
    #[error("no application path provided")]
    #[diagnostic(
        code(omnilaunch::loader::usage),
        help("usage: omnilaunch-proxy <target> [args...]")
    )]
    MissingTarget,

    #[error("exec of {target} failed inside isolation: {source}")]
    #[diagnostic(code(omnilaunch::loader::exec))]
    Exec {
        target: String,
        #[source]
        source: Errno,
    },

    #[error("argument contains an interior NUL byte: {0:?}")]
    #[diagnostic(code(omnilaunch::loader::argument))]
    InvalidArgument(String),
}

/// Unmet requirements reported by the preflight check.
#[derive(Error, Debug, Diagnostic)]
pub enum PreflightError {
    #[error("sandbox root {} does not exist or is not a directory", path.display())]
    #[diagnostic(
        code(omnilaunch::preflight::root),
        help("unpack a foreign root filesystem there (for example with debootstrap)")
    )]
    MissingRoot { path: PathBuf },

    #[error("proxy loader missing at {}", path.display())]
    #[diagnostic(
        code(omnilaunch::preflight::loader),
        help("copy a statically linked omnilaunch-proxy into the sandbox root")
    )]
    MissingLoader { path: PathBuf },

    #[error("effective uid is {euid}, mount namespaces and chroot need root")]
    #[diagnostic(code(omnilaunch::preflight::privileges), help("run through sudo"))]
    NotRoot { euid: u32 },
}

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

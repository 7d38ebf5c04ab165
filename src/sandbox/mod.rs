//! Mount-namespace sandbox for binaries built for a foreign Linux distribution.
//!
//! The sandbox gives the launcher process a private mount namespace, binds the
//! host's kernel interfaces and the caller's home into the sandbox root,
//! chroots, scrubs loader-related environment variables and finally execs the
//! static proxy loader, which in turn execs the real target.
//!
//! # Example
//!
//! ```no_run
//! use omnilaunch::LauncherConfig;
//! use omnilaunch::sandbox::{Environment, HostSyscalls, SandboxBuilder, SandboxLaunch};
//!
//! let config = LauncherConfig::default();
//! let mut sys = HostSyscalls::new();
//! let launch = SandboxLaunch::new("/usr/bin/vlc", vec![], Environment::from_current());
//!
//! // Only returns if something fatal happened.
//! let err = SandboxBuilder::new(&config, &mut sys).launch(launch).unwrap_err();
//! eprintln!("{err}");
//! ```

mod builder;
mod env;
mod mounts;
mod plan;
mod sys;

pub use builder::{DEV_NULL, SandboxBuilder, SandboxLaunch, loader_argv};
pub use env::{
    DISPLAY, Environment, LOADER_INJECTION_VARS, PRIVILEGE_MARKER, UserRecord, WAYLAND_DISPLAY,
};
pub use mounts::create_dir_if_absent;
pub use plan::{
    Condition, Criticality, DEVPTS_OPTIONS, MountKind, MountPlan, MountStep, PlanStep,
    RESOLV_CONF, SHM_OPTIONS, XAUTHORITY, plan_mounts,
};
pub use sys::{HostSyscalls, Syscalls, argv_with_program};

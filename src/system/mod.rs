//! Preflight validation.
//!
//! This module checks that the host is set up for sandboxed launches: the
//! sandbox root and the proxy loader exist and the launcher has the
//! privileges `unshare`, `mount` and `chroot` need.

mod requirements;

pub use requirements::{Preflight, check_all, check_loader, check_privileges, check_sandbox_root};

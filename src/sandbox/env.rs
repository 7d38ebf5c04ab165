//! Environment sanitization for processes started inside the sandbox.
//!
//! The foreign binary runs against a different C runtime than the host, so
//! anything that makes the guest's dynamic loader pull in host objects is
//! removed before the loader is executed.

use std::collections::BTreeMap;
use std::ffi::{CString, OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use tracing::{debug, warn};

/// Set by sudo to the name of the invoking unprivileged user.
pub const PRIVILEGE_MARKER: &str = "SUDO_USER";

/// Variables that inject host objects into the guest's dynamic loader.
pub const LOADER_INJECTION_VARS: &[&str] = &["LD_PRELOAD", "LD_AUDIT", "LD_LIBRARY_PATH"];

/// X11 display address forwarded to GUI programs.
pub const DISPLAY: &str = "DISPLAY";

/// Dropped so toolkits fall back to the forwarded X11 display.
pub const WAYLAND_DISPLAY: &str = "WAYLAND_DISPLAY";

/// Account information needed to restore the invoking user's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub name: String,
    pub home: PathBuf,
}

/// An owned process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<OsString, OsString>,
}

impl Environment {
    /// Captures the environment of the current process.
    #[must_use]
    pub fn from_current() -> Self {
        std::env::vars_os().collect()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&OsStr> {
        self.vars.get(OsStr::new(key)).map(OsString::as_os_str)
    }

    pub fn set(&mut self, key: impl Into<OsString>, value: impl Into<OsString>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<OsString> {
        self.vars.remove(OsStr::new(key))
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(OsStr::new(key))
    }

    /// Home directory named by `HOME`, if set.
    #[must_use]
    pub fn home(&self) -> Option<PathBuf> {
        self.get("HOME").map(PathBuf::from)
    }

    /// Prepares the environment for the sandboxed program.
    ///
    /// - If [`PRIVILEGE_MARKER`] names a user that `lookup` resolves, `HOME`,
    ///   `USER` and `LOGNAME` are overwritten with that user's values.
    /// - Every variable in [`LOADER_INJECTION_VARS`] is removed.
    /// - `WAYLAND_DISPLAY` is removed and `DISPLAY` is kept.
    pub fn sanitize<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<UserRecord>,
    {
        let invoking_user = self
            .get(PRIVILEGE_MARKER)
            .and_then(|name| name.to_str())
            .map(str::to_owned);

        if let Some(name) = invoking_user {
            match lookup(&name) {
                Some(user) => {
                    debug!(user = %user.name, home = %user.home.display(), "Restoring invoking user identity");
                    self.set("HOME", user.home.into_os_string());
                    self.set("USER", user.name.as_str());
                    self.set("LOGNAME", user.name.as_str());
                }
                None => warn!(user = %name, "Invoking user not found in the sandbox user database"),
            }
        }

        for key in LOADER_INJECTION_VARS {
            if self.remove(key).is_some() {
                debug!(variable = key, "Removed loader injection variable");
            }
        }

        self.remove(WAYLAND_DISPLAY);
        if !self.contains(DISPLAY) {
            debug!("DISPLAY not set, GUI programs will not reach an X server");
        }
    }

    /// Renders `KEY=VALUE` entries for `execve(2)`.
    ///
    /// Entries containing an interior NUL byte are skipped.
    #[must_use]
    pub fn to_cstrings(&self) -> Vec<CString> {
        self.vars
            .iter()
            .filter_map(|(key, value)| {
                let mut entry = Vec::with_capacity(key.len() + value.len() + 1);
                entry.extend_from_slice(key.as_bytes());
                entry.push(b'=');
                entry.extend_from_slice(value.as_bytes());
                CString::new(entry).ok()
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.vars.iter().map(|(k, v)| (k.as_os_str(), v.as_os_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for Environment
where
    K: Into<OsString>,
    V: Into<OsString>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice(name: &str) -> Option<UserRecord> {
        (name == "alice").then(|| UserRecord {
            name: "alice".to_string(),
            home: PathBuf::from("/home/alice"),
        })
    }

    #[test]
    fn test_sanitize_restores_sudo_user() {
        let mut env: Environment = [
            ("HOME", "/root"),
            ("USER", "root"),
            ("LOGNAME", "root"),
            ("SUDO_USER", "alice"),
            ("LD_PRELOAD", "/usr/lib/libhook.so"),
            ("DISPLAY", ":0"),
        ]
        .into_iter()
        .collect();

        env.sanitize(alice);

        assert!(!env.contains("LD_PRELOAD"));
        assert_eq!(env.get("HOME"), Some(OsStr::new("/home/alice")));
        assert_eq!(env.get("USER"), Some(OsStr::new("alice")));
        assert_eq!(env.get("LOGNAME"), Some(OsStr::new("alice")));
        assert_eq!(env.get("DISPLAY"), Some(OsStr::new(":0")));
    }

    #[test]
    fn test_sanitize_unknown_sudo_user_keeps_identity() {
        let mut env: Environment = [("HOME", "/root"), ("SUDO_USER", "mallory")]
            .into_iter()
            .collect();

        env.sanitize(alice);

        assert_eq!(env.get("HOME"), Some(OsStr::new("/root")));
        assert!(!env.contains("USER"));
    }

    #[test]
    fn test_sanitize_strips_loader_variables_without_marker() {
        let mut env: Environment = [
            ("LD_PRELOAD", "a.so"),
            ("LD_AUDIT", "b.so"),
            ("LD_LIBRARY_PATH", "/usr/lib64"),
            ("WAYLAND_DISPLAY", "wayland-0"),
            ("PATH", "/usr/bin"),
        ]
        .into_iter()
        .collect();

        env.sanitize(|_| None);

        for key in LOADER_INJECTION_VARS {
            assert!(!env.contains(key), "{key} should be removed");
        }
        assert!(!env.contains("WAYLAND_DISPLAY"));
        assert_eq!(env.get("PATH"), Some(OsStr::new("/usr/bin")));
    }

    #[test]
    fn test_to_cstrings() {
        let env: Environment = [("A", "1"), ("B", "x=y")].into_iter().collect();
        let entries = env.to_cstrings();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].to_str(), Ok("A=1"));
        assert_eq!(entries[1].to_str(), Ok("B=x=y"));
    }
}

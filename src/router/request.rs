//! Launch request parsing and backend classification.

use std::fmt;

use crate::error::RouteError;

/// Execution backend selected by the target's prefix tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Host binary, absolute or resolved through `PATH`. Default when no tag matches.
    Native,
    /// `:deb:` binary run inside the mount-namespace sandbox.
    ForeignLinux,
    /// `:win:` executable forwarded to the relay daemon.
    Windows,
    /// `:flat:` application id run through flatpak.
    Flatpak,
    /// `:app:` AppImage executed directly.
    AppImage,
}

impl Backend {
    /// Tagged backends with their prefixes.
    pub const TAGGED: [(Backend, &'static str); 4] = [
        (Backend::ForeignLinux, ":deb:"),
        (Backend::Windows, ":win:"),
        (Backend::Flatpak, ":flat:"),
        (Backend::AppImage, ":app:"),
    ];

    /// Prefix tag of the backend, `None` for [`Backend::Native`].
    #[must_use]
    pub fn tag(self) -> Option<&'static str> {
        Self::TAGGED
            .iter()
            .find(|(backend, _)| *backend == self)
            .map(|(_, tag)| *tag)
    }

    /// Splits `raw` into its backend and the tag-stripped target.
    #[must_use]
    pub fn classify(raw: &str) -> (Backend, &str) {
        Self::TAGGED
            .iter()
            .find_map(|(backend, tag)| raw.strip_prefix(tag).map(|rest| (*backend, rest)))
            .unwrap_or((Backend::Native, raw))
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::ForeignLinux => "foreign-linux",
            Self::Windows => "windows",
            Self::Flatpak => "flatpak",
            Self::AppImage => "appimage",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One parsed invocation. Immutable after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    raw: String,
    backend: Backend,
    target: String,
    args: Vec<String>,
}

impl LaunchRequest {
    /// Parses the first command-line argument and the arguments after it.
    ///
    /// # Errors
    ///
    /// - `RouteError::MissingTarget` if `raw` is empty
    /// - `RouteError::EmptyTarget` if a tag is followed by nothing
    pub fn parse(raw: impl Into<String>, args: Vec<String>) -> Result<Self, RouteError> {
        let raw = raw.into();
        let (backend, target) = Backend::classify(&raw);

        if target.is_empty() {
            return Err(match backend.tag() {
                Some(tag) => RouteError::EmptyTarget { tag },
                None => RouteError::MissingTarget,
            });
        }

        let target = target.to_string();
        Ok(Self {
            raw,
            backend,
            target,
            args,
        })
    }

    /// First argument exactly as given.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Target with the tag stripped.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Residual arguments, in order.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_backends() {
        let cases = [
            (":deb:/usr/bin/vlc", Backend::ForeignLinux, "/usr/bin/vlc"),
            (":win:C:\\App.exe", Backend::Windows, "C:\\App.exe"),
            (":flat:org.gimp.GIMP", Backend::Flatpak, "org.gimp.GIMP"),
            (":app:/opt/Gimp.AppImage", Backend::AppImage, "/opt/Gimp.AppImage"),
        ];

        for (raw, backend, target) in cases {
            let request = LaunchRequest::parse(raw, vec![]).expect("should parse");
            assert_eq!(request.backend(), backend, "{raw}");
            assert_eq!(request.target(), target, "{raw}");
            assert_eq!(request.raw(), raw);
        }
    }

    #[test]
    fn test_untagged_is_native() {
        for raw in ["/usr/bin/gedit", "gedit", ":unknown:/bin/sh", "deb:/bin/sh", ":DEB:/x"] {
            let request = LaunchRequest::parse(raw, vec![]).expect("should parse");
            assert_eq!(request.backend(), Backend::Native, "{raw}");
            assert_eq!(request.target(), raw);
        }
    }

    #[test]
    fn test_residual_args_preserved() {
        let args = vec!["-y".to_string(), "install".to_string(), "vim".to_string()];
        let request = LaunchRequest::parse(":deb:/usr/bin/apt", args.clone()).expect("parse");
        assert_eq!(request.args(), args.as_slice());
    }

    #[test]
    fn test_empty_tagged_target() {
        let err = LaunchRequest::parse(":deb:", vec![]).expect_err("should fail");
        assert!(matches!(err, RouteError::EmptyTarget { tag: ":deb:" }));
    }

    #[test]
    fn test_empty_untagged_target() {
        let err = LaunchRequest::parse("", vec![]).expect_err("should fail");
        assert!(matches!(err, RouteError::MissingTarget));
        assert_eq!(err.to_string(), "empty launch target");
    }

    #[test]
    fn test_tag_round_trip() {
        assert_eq!(Backend::Native.tag(), None);
        for (backend, tag) in Backend::TAGGED {
            assert_eq!(backend.tag(), Some(tag));
        }
    }
}

//! Execution routing: picks a backend from the target's prefix tag and
//! dispatches to it.
//!
//! | First argument     | Backend                                   |
//! |--------------------|-------------------------------------------|
//! | `:deb:<path>`      | foreign Linux binary in the sandbox       |
//! | `:win:<path>`      | Windows executable via the relay daemon   |
//! | `:flat:<app-id>`   | `flatpak run <app-id>`                    |
//! | `:app:<path>`      | AppImage, executed directly               |
//! | anything else      | host binary, absolute or from `PATH`      |

mod dispatch;
mod request;

pub use dispatch::Dispatch;
pub use request::{Backend, LaunchRequest};

use tracing::debug;

use crate::config::LauncherConfig;
use crate::error::Result;
use crate::sandbox::{Environment, Syscalls};

/// One invocation per backend, shown with the usage line.
pub const EXAMPLES: &str = "\
Examples:
  omnilaunch /usr/bin/gedit          (host)
  omnilaunch :deb:/usr/bin/vlc       (foreign Linux, sandboxed)
  omnilaunch :win:C:\\App.exe         (Windows guest)
  omnilaunch :app:~/Gimp.AppImage    (AppImage)
  omnilaunch :flat:org.gimp.GIMP     (Flatpak)";

/// Plans and executes the dispatch for `request`.
///
/// # Errors
///
/// See [`Dispatch::execute`].
pub fn route<S: Syscalls>(
    request: &LaunchRequest,
    config: &LauncherConfig,
    sys: &mut S,
    env: Environment,
) -> Result<()> {
    debug!(backend = %request.backend(), target = request.target(), "Routing launch request");
    Dispatch::plan(request, config).execute(config, sys, env)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_examples_cover_every_tag() {
        for (backend, tag) in Backend::TAGGED {
            assert!(EXAMPLES.contains(tag), "no example for {backend}");
        }
        assert!(EXAMPLES.contains("omnilaunch /usr/bin/gedit"));
    }
}

//! omnilaunch-proxy - static indirection loader executed inside the sandbox root.
//!
//! Usage: `omnilaunch-proxy <target> [args...]`

use miette::Result;

use omnilaunch::loader;

fn main() -> Result<()> {
    match loader::exec_target(std::env::args_os().collect())? {}
}

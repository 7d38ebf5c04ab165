//! Forwarding of Windows launch requests to the virtualized guest.
//!
//! ```text
//! omnilaunch :win:C:\App.exe
//!     │  "RUN C:\App.exe"   (listen socket)
//!     ▼
//! omnilaunch-relayd
//!     │  "C:\App.exe\n"     (guest socket)
//!     ▼
//! Windows agent
//! ```

mod client;
mod daemon;
mod protocol;

pub use client::send_command;
pub use daemon::{RelayDaemon, forward};
pub use protocol::{AgentCommand, RUN_VERB};

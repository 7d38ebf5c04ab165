//! omnilaunch-relayd - host relay between launchers and the Windows guest agent.

use std::path::{Path, PathBuf};

use clap::Parser;
use miette::Result;
use tokio::process::Command;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use omnilaunch::RelayConfig;
use omnilaunch::config::{DEFAULT_GUEST_SOCKET, DEFAULT_RELAY_SOCKET};
use omnilaunch::relay::RelayDaemon;

/// omnilaunch-relayd - forward `RUN` commands to the Windows guest agent.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Socket the launchers connect to
    #[arg(long, value_name = "SOCKET", default_value = DEFAULT_RELAY_SOCKET)]
    listen: PathBuf,

    /// Socket exposed by the guest agent
    #[arg(long, value_name = "SOCKET", default_value = DEFAULT_GUEST_SOCKET)]
    guest: PathBuf,

    /// Command that boots the Windows VM before serving
    #[arg(long, value_name = "PROGRAM")]
    start_vm: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

/// Runs the VM start hook. The daemon serves regardless of the outcome.
async fn start_vm(program: &Path) {
    info!(program = %program.display(), "Starting Windows VM");
    match Command::new(program).status().await {
        Ok(status) if status.success() => info!("VM start hook finished"),
        Ok(status) => warn!(%status, "VM start hook exited unsuccessfully"),
        Err(e) => warn!(error = %e, "Failed to run VM start hook"),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    info!("omnilaunch relay daemon v{}", env!("CARGO_PKG_VERSION"));

    let mut config = RelayConfig::new()
        .with_listen_socket(args.listen)
        .with_guest_socket(args.guest);
    if let Some(program) = args.start_vm {
        config = config.with_start_vm(program);
    }

    if let Some(program) = &config.start_vm {
        start_vm(program).await;
    }

    let daemon = RelayDaemon::bind(config)?;
    daemon
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Cannot listen for Ctrl-C, serving until killed");
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!("Relay daemon stopped");
    Ok(())
}

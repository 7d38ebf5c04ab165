//! omnilaunch - Entry Point
//!
//! Parses the invocation, classifies the target's prefix tag and hands over to
//! the selected backend. Runs without an async runtime: the sandbox path calls
//! `unshare(CLONE_NEWNS)`, which requires a single-threaded process.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use miette::Result;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use omnilaunch::config::{DEFAULT_LOADER_PATH, DEFAULT_RELAY_SOCKET, DEFAULT_SANDBOX_ROOT};
use omnilaunch::router::{self, EXAMPLES, LaunchRequest};
use omnilaunch::sandbox::{Environment, HostSyscalls};
use omnilaunch::{Error, LauncherConfig, system};

const USAGE: &str = "usage: omnilaunch [OPTIONS] <target> [args...]";

/// omnilaunch - run binaries built for foreign environments on this host.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, after_help = EXAMPLES)]
struct Args {
    /// Check that the host is ready for sandboxed launches and exit
    #[arg(long, default_value = "false")]
    check: bool,

    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Root filesystem for :deb: binaries
    #[arg(long, value_name = "DIR", default_value = DEFAULT_SANDBOX_ROOT)]
    root: PathBuf,

    /// Proxy loader path inside the root
    #[arg(long, value_name = "PATH", default_value = DEFAULT_LOADER_PATH)]
    loader: PathBuf,

    /// Relay daemon socket for :win: targets
    #[arg(long, value_name = "SOCKET", default_value = DEFAULT_RELAY_SOCKET)]
    relay_socket: PathBuf,

    /// Program to launch, optionally prefixed with :deb:, :win:, :flat: or
    /// :app:, followed by its arguments. Everything after the target is
    /// passed through untouched.
    #[arg(value_name = "TARGET", trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(args: Args) -> Result<()> {
    let config = LauncherConfig::new()
        .with_sandbox_root(args.root)
        .with_loader_path(args.loader)
        .with_relay_socket(args.relay_socket);

    if args.check {
        let report = system::check_all(&config)?;
        info!(
            "Ready: root {}, loader {}, euid {}",
            report.sandbox_root.display(),
            report.loader.display(),
            report.euid
        );
        if !report.relay_socket_present {
            warn!(
                "Relay daemon socket {} not found, :win: targets will fail",
                config.relay_socket.display()
            );
        }
        return Ok(());
    }

    let mut command = args.command.into_iter();
    let Some(target) = command.next().filter(|t| !t.is_empty()) else {
        eprintln!("{USAGE}\n\n{EXAMPLES}\n");
        return Err(Error::Usage.into());
    };
    let request = LaunchRequest::parse(target, command.collect()).map_err(Error::from)?;

    router::route(
        &request,
        &config,
        &mut HostSyscalls::new(),
        Environment::from_current(),
    )?;
    Ok(())
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    init_tracing(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            eprintln!("{report:?}");
            ExitCode::FAILURE
        }
    }
}

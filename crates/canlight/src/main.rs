//! CANLight CLI — drive CAN-attached RGB light-strip controllers from a terminal.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

mod cli;

/// Shared shutdown flag, set by the Ctrl+C handler.
pub static RUNNING: AtomicBool = AtomicBool::new(true);

#[derive(Parser)]
#[command(
    name = "canlight",
    version,
    about = "Control CAN-attached RGB light-strip controllers"
)]
struct Args {
    /// Output as JSON (for info, config)
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging (every bus request)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SocketCAN interface (overrides config)
    #[arg(long, global = true)]
    interface: Option<String>,

    /// Device identifier 1-60 (overrides config)
    #[arg(long, global = true)]
    id: Option<i32>,

    #[command(subcommand)]
    command: cli::Command,
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .format_target(false)
        .init();

    ctrlc::set_handler(move || {
        RUNNING.store(false, Ordering::SeqCst);
    })
    .ok();

    let opts = cli::Options {
        config_path: args.config,
        interface: args.interface,
        id: args.id,
        json: args.json,
    };

    if let Err(e) = cli::run(args.command, &opts) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

//! Query a running bridge.
//!
//! ```bash
//! tapbrctl get-stats
//! tapbrctl get-stats --addr 127.0.0.1:9470 --json
//! ```

use std::net::SocketAddr;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tapbr::cli::DEFAULT_CONTROL_ADDR;
use tapbr::control::fetch_stats;
use tapbr::stats::StatsSnapshot;

#[derive(Parser)]
#[command(name = "tapbrctl", version)]
#[command(about = "Control client for a running tapbr", long_about = None)]
struct Cli {
    /// Bridge control-plane address
    #[arg(long, global = true, env = "TAPBR_ADDR", default_value = DEFAULT_CONTROL_ADDR)]
    addr: SocketAddr,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the bridge counters
    GetStats {
        /// Print raw JSON instead of the summary
        #[arg(long)]
        json: bool,
    },
}

fn print_stats(snap: &StatsSnapshot, json: bool) -> tapbr::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(snap)?);
    } else {
        print!("{snap}");
    }
    Ok(())
}

fn run(cli: Cli) -> tapbr::Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    match cli.command {
        Commands::GetStats { json } => {
            let snap = rt.block_on(fetch_stats(cli.addr))?;
            print_stats(&snap, json)
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let addr = cli.addr;
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("tapbrctl: {addr}: {e}");
            ExitCode::FAILURE
        }
    }
}

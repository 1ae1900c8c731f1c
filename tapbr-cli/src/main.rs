//! Mirroring bridge.
//!
//! ```bash
//! # tap mode: ports 0 and 1 bridged, copies on port 2
//! tapbr -q 2 -- -l 0-2 -a 0000:01:00.0 -a 0000:01:00.1 -a 0000:01:00.2
//!
//! # ring mode: copies spread over rings mon0..mon3 by flow hash
//! tapbr -q 4 -R mon -N 4 -- -l 0-4 --proc-type=primary
//! ```

use std::process::ExitCode;

use clap::Parser;
use tapbr::cli::Args;
use tracing::error;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    match run(&args, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "bridge failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "dpdk")]
fn run(args: &Args, config: tapbr::config::BridgeConfig) -> tapbr::Result<()> {
    use std::sync::Arc;

    use tapbr::runner::Bridge;
    use tapbr::shutdown::ShutdownFlag;
    use tapbr::stats::BridgeStats;

    let stats = Arc::new(BridgeStats::new());
    Bridge::new(config).run(args.eal_argv(), stats.clone(), ShutdownFlag::new())?;
    print!("{}", stats.snapshot());
    Ok(())
}

#[cfg(not(feature = "dpdk"))]
fn run(_args: &Args, config: tapbr::config::BridgeConfig) -> tapbr::Result<()> {
    config.log_summary();
    Err(tapbr::Error::Unsupported("built without DPDK support"))
}

//! End-to-end run over null virtual devices. EAL can be initialized once per
//! process, so this file holds a single test.
#![cfg(feature = "dpdk")]

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tapbr::cli::Args;
use tapbr::runner::Bridge;
use tapbr::shutdown::ShutdownFlag;
use tapbr::stats::BridgeStats;
use tapbr_test::init_tracing;

#[test]
fn null_ports_forward_and_mirror() {
    init_tracing();
    let args = Args::try_parse_from([
        "tapbr",
        "--no-control",
        "--pool-size",
        "4095",
        "--pool-cache-size",
        "256",
        "--rx-desc",
        "512",
        "--tx-desc",
        "512",
        "--burst-size",
        "32",
        "--",
        "-l",
        "0-1",
        "--no-huge",
        "--no-pci",
        "--vdev=net_null0",
        "--vdev=net_null1",
        "--vdev=net_null2",
    ])
    .unwrap();
    let config = args.into_config().unwrap();

    let stats = Arc::new(BridgeStats::new());
    let shutdown = ShutdownFlag::new();
    let stopper = {
        let shutdown = shutdown.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs(1));
            shutdown.trigger();
        })
    };

    Bridge::new(config)
        .run(args.eal_argv(), stats.clone(), shutdown)
        .unwrap();
    stopper.join().unwrap();

    let snap = stats.snapshot();
    assert!(snap.total_pkts > 0);
    assert_eq!(snap.total_pkts, snap.if0_pkts + snap.if1_pkts);
}

//! Command-line parsing, environment tunables and configuration checks.

use clap::Parser;
use serial_test::serial;
use tapbr::Error;
use tapbr::cli::Args;
use tapbr::config::{DEFAULT_BURST_SIZE, DEFAULT_POOL_SIZE};
use tapbr::output::OutputMode;

const TUNABLE_VARS: [&str; 6] = [
    "PKTMBUF_POOL_SIZE",
    "PKTMBUF_POOL_CACHE_SIZE",
    "RX_DESC_PER_QUEUE",
    "TX_DESC_PER_QUEUE",
    "BURST_SIZE",
    "OUTPUT_RING_SIZE",
];

/// Sets environment variables for the lifetime of the guard.
struct EnvGuard;

impl EnvGuard {
    fn set(vars: &[(&str, &str)]) -> Self {
        clear_tunables();
        for (k, v) in vars {
            // SAFETY: tests touching the environment are serialized.
            unsafe { std::env::set_var(k, v) };
        }
        EnvGuard
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        clear_tunables();
    }
}

fn clear_tunables() {
    for k in TUNABLE_VARS {
        // SAFETY: see EnvGuard::set.
        unsafe { std::env::remove_var(k) };
    }
}

fn parse(args: &[&str]) -> Args {
    Args::try_parse_from(std::iter::once("tapbr").chain(args.iter().copied())).unwrap()
}

#[test]
#[serial]
fn defaults_without_environment() {
    let _env = EnvGuard::set(&[]);
    let cfg = parse(&[]).into_config().unwrap();
    assert_eq!(cfg.tunables.burst_size, DEFAULT_BURST_SIZE);
    assert_eq!(cfg.tunables.pool_size, DEFAULT_POOL_SIZE);
    assert_eq!(cfg.output, OutputMode::Tap { port: 2 });
    assert_eq!(cfg.required_ports(), 3);
}

#[test]
#[serial]
fn environment_overrides_defaults() {
    let _env = EnvGuard::set(&[
        ("BURST_SIZE", "64"),
        ("OUTPUT_RING_SIZE", "4096"),
        ("PKTMBUF_POOL_SIZE", "4095"),
    ]);
    let cfg = parse(&["-N", "2"]).into_config().unwrap();
    assert_eq!(cfg.tunables.burst_size, 64);
    assert_eq!(cfg.tunables.output_ring_size, 4096);
    assert_eq!(cfg.tunables.pool_size, 4095);
    assert_eq!(cfg.required_ports(), 2);
}

#[test]
#[serial]
fn flag_beats_environment() {
    let _env = EnvGuard::set(&[("BURST_SIZE", "64")]);
    let cfg = parse(&["--burst-size", "128"]).into_config().unwrap();
    assert_eq!(cfg.tunables.burst_size, 128);
}

#[test]
#[serial]
fn bad_environment_value_is_rejected() {
    let _env = EnvGuard::set(&[("PKTMBUF_POOL_SIZE", "4096")]);
    assert!(matches!(
        parse(&[]).into_config(),
        Err(Error::NotPowerOfTwoMinusOne { .. })
    ));
}

#[test]
#[serial]
fn unparsable_environment_is_usage_error() {
    let _env = EnvGuard::set(&[("RX_DESC_PER_QUEUE", "lots")]);
    let err = Args::try_parse_from(["tapbr"]).unwrap_err();
    assert_eq!(err.exit_code(), 2);
}

#[test]
#[serial]
fn duplicate_ports_are_rejected() {
    let _env = EnvGuard::set(&[]);
    assert!(matches!(
        parse(&["-1", "3", "-2", "3", "-T", "0"]).into_config(),
        Err(Error::DuplicatePort(3))
    ));
    assert!(matches!(
        parse(&["-T", "1"]).into_config(),
        Err(Error::DuplicatePort(1))
    ));
}

#[test]
#[serial]
fn long_ring_prefix_is_rejected() {
    let _env = EnvGuard::set(&[]);
    let prefix = "p".repeat(40);
    assert!(matches!(
        parse(&["-R", &prefix, "-N", "2"]).into_config(),
        Err(Error::RingNameTooLong { .. })
    ));
}

#[test]
#[serial]
fn port_availability() {
    let _env = EnvGuard::set(&[]);
    let cfg = parse(&["-N", "1"]).into_config().unwrap();
    assert!(cfg.validate_ports(2).is_ok());
    assert!(matches!(
        cfg.validate_ports(1),
        Err(Error::InsufficientPorts {
            required: 2,
            available: 1
        })
    ));

    let tap = parse(&["-T", "5"]).into_config().unwrap();
    assert!(matches!(
        tap.validate_ports(3),
        Err(Error::NoSuchPort { port: 5, .. })
    ));
}

//! Mirroring network bridge.
//!
//! Traffic received on either of two primary ports is forwarded to the other
//! while a copy of every packet goes to a tap port or to a set of fan-out
//! rings chosen by flow hash. Each worker lcore owns one queue index on every
//! port, so the data path takes no locks; the only shared state is the
//! relaxed atomic counters in [`stats`].
//!
//! The forwarding engine in [`forward`] is generic over the [`port`] traits.
//! With the `dpdk` feature the [`api::rte`] wrappers implement them and
//! [`runner::Bridge`] wires everything up.

pub mod cli;
pub mod config;
pub mod control;
pub mod error;
pub mod forward;
pub mod output;
pub mod planner;
pub mod port;
pub mod shutdown;
pub mod stats;

#[cfg(feature = "dpdk")]
pub mod api;
#[cfg(feature = "dpdk")]
pub mod runner;

pub use error::{Error, Result};

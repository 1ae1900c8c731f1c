//! Validated bridge configuration.
//!
//! Built once from the command line and environment, checked before any
//! DPDK resource is touched, and read-only afterwards.

use std::net::SocketAddr;

use tracing::info;

use crate::error::{Error, Result};
use crate::output::OutputMode;
use crate::port::{MAX_BURST_SIZE, PortId};

/// Longest ring name DPDK accepts once it adds its memzone prefix.
pub const RING_NAME_MAX: usize = 28;

/// Largest per-lcore mempool cache DPDK supports.
pub const POOL_CACHE_MAX: u32 = 512;

/// Largest descriptor ring a queue can be given.
pub const DESC_MAX: u32 = 1 << 15;

pub const DEFAULT_POOL_SIZE: u32 = 8191;
pub const DEFAULT_POOL_CACHE_SIZE: u32 = 512;
pub const DEFAULT_RX_DESC: u32 = 1024;
pub const DEFAULT_TX_DESC: u32 = 1024;
pub const DEFAULT_BURST_SIZE: u32 = 512;
pub const DEFAULT_OUTPUT_RING_SIZE: u32 = 1024;

/// Data-path sizing knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tunables {
    /// Number of mbufs in the pool (2^n - 1).
    pub pool_size: u32,
    /// Per-lcore mempool cache size.
    pub pool_cache_size: u32,
    /// RX descriptors per queue.
    pub rx_desc: u32,
    /// TX descriptors per queue.
    pub tx_desc: u32,
    /// Max packets per rx/tx burst.
    pub burst_size: u32,
    /// Slots per fan-out ring.
    pub output_ring_size: u32,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            pool_cache_size: DEFAULT_POOL_CACHE_SIZE,
            rx_desc: DEFAULT_RX_DESC,
            tx_desc: DEFAULT_TX_DESC,
            burst_size: DEFAULT_BURST_SIZE,
            output_ring_size: DEFAULT_OUTPUT_RING_SIZE,
        }
    }
}

fn power_of_two(name: &'static str, value: u32) -> Result<()> {
    if value.is_power_of_two() {
        Ok(())
    } else {
        Err(Error::NotPowerOfTwo { name, value })
    }
}

fn at_most(name: &'static str, value: u32, max: u32) -> Result<()> {
    if value <= max {
        Ok(())
    } else {
        Err(Error::OutOfRange { name, value, max })
    }
}

impl Tunables {
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 || !self.pool_size.wrapping_add(1).is_power_of_two() {
            return Err(Error::NotPowerOfTwoMinusOne {
                name: "PKTMBUF_POOL_SIZE",
                value: self.pool_size,
            });
        }
        power_of_two("PKTMBUF_POOL_CACHE_SIZE", self.pool_cache_size)?;
        at_most(
            "PKTMBUF_POOL_CACHE_SIZE",
            self.pool_cache_size,
            POOL_CACHE_MAX,
        )?;
        power_of_two("RX_DESC_PER_QUEUE", self.rx_desc)?;
        at_most("RX_DESC_PER_QUEUE", self.rx_desc, DESC_MAX)?;
        power_of_two("TX_DESC_PER_QUEUE", self.tx_desc)?;
        at_most("TX_DESC_PER_QUEUE", self.tx_desc, DESC_MAX)?;
        power_of_two("BURST_SIZE", self.burst_size)?;
        at_most("BURST_SIZE", self.burst_size, MAX_BURST_SIZE as u32)?;
        power_of_two("OUTPUT_RING_SIZE", self.output_ring_size)?;
        Ok(())
    }
}

/// Everything the runner needs to bring the bridge up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Queues per port, one worker each.
    pub queues: u16,
    /// Primary ports A and B.
    pub primary: [PortId; 2],
    pub output: OutputMode,
    pub tunables: Tunables,
    /// Control-plane listen address, `None` to disable.
    pub control_addr: Option<SocketAddr>,
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.queues == 0 {
            return Err(Error::InvalidQueueCount);
        }
        self.tunables.validate()?;

        let [a, b] = self.primary;
        if a == b {
            return Err(Error::DuplicatePort(a));
        }
        match &self.output {
            OutputMode::Tap { port } => {
                if self.primary.contains(port) {
                    return Err(Error::DuplicatePort(*port));
                }
            }
            OutputMode::Rings { count, .. } => {
                if *count == 0 {
                    return Err(Error::NoRings);
                }
                if let Some(name) = self
                    .output
                    .ring_names()
                    .into_iter()
                    .find(|n| n.len() > RING_NAME_MAX)
                {
                    return Err(Error::RingNameTooLong {
                        name,
                        max: RING_NAME_MAX,
                    });
                }
            }
        }
        Ok(())
    }

    /// Ports the output mode needs to exist.
    pub fn required_ports(&self) -> u16 {
        match self.output {
            OutputMode::Tap { .. } => 3,
            OutputMode::Rings { .. } => 2,
        }
    }

    /// Every port the bridge drives, primaries first.
    pub fn used_ports(&self) -> Vec<PortId> {
        self.primary
            .into_iter()
            .chain(self.output.tap_port())
            .collect()
    }

    /// Check the configured ports against the number of devices present.
    pub fn validate_ports(&self, available: u16) -> Result<()> {
        let required = self.required_ports();
        if available < required {
            return Err(Error::InsufficientPorts {
                required,
                available,
            });
        }
        if let Some(port) = self.used_ports().into_iter().find(|&p| p >= available) {
            return Err(Error::NoSuchPort { port, available });
        }
        Ok(())
    }

    pub fn log_summary(&self) {
        info!(
            port_a = self.primary[0],
            port_b = self.primary[1],
            queues = self.queues,
            "bridge ports"
        );
        match &self.output {
            OutputMode::Tap { port } => info!(tap = port, "mirror output: tap port"),
            OutputMode::Rings { .. } => {
                info!(rings = ?self.output.ring_names(), "mirror output: rings")
            }
        }
        let t = &self.tunables;
        info!(
            PKTMBUF_POOL_SIZE = t.pool_size,
            PKTMBUF_POOL_CACHE_SIZE = t.pool_cache_size,
            RX_DESC_PER_QUEUE = t.rx_desc,
            TX_DESC_PER_QUEUE = t.tx_desc,
            BURST_SIZE = t.burst_size,
            OUTPUT_RING_SIZE = t.output_ring_size,
            "tunables"
        );
        match self.control_addr {
            Some(addr) => info!(%addr, "control plane enabled"),
            None => info!("control plane disabled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tap_config() -> BridgeConfig {
        BridgeConfig {
            queues: 1,
            primary: [0, 1],
            output: OutputMode::Tap { port: 2 },
            tunables: Tunables::default(),
            control_addr: None,
        }
    }

    fn ring_config(prefix: &str, count: u16) -> BridgeConfig {
        BridgeConfig {
            output: OutputMode::Rings {
                prefix: prefix.to_string(),
                count,
            },
            ..tap_config()
        }
    }

    #[test]
    fn defaults_are_valid() {
        Tunables::default().validate().unwrap();
        tap_config().validate().unwrap();
        ring_config("tapbr", 4).validate().unwrap();
    }

    #[test]
    fn tunable_rules() {
        let bad = Tunables {
            pool_size: 8192,
            ..Default::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(Error::NotPowerOfTwoMinusOne { value: 8192, .. })
        ));

        let bad = Tunables {
            burst_size: 48,
            ..Default::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(Error::NotPowerOfTwo {
                name: "BURST_SIZE",
                ..
            })
        ));

        let bad = Tunables {
            burst_size: 2048,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(Error::OutOfRange { max: 1024, .. })));

        let bad = Tunables {
            pool_cache_size: 1024,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(Error::OutOfRange { .. })));

        let bad = Tunables {
            output_ring_size: 1000,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn ports_must_be_distinct() {
        let mut cfg = tap_config();
        cfg.primary = [1, 1];
        assert!(matches!(cfg.validate(), Err(Error::DuplicatePort(1))));

        let mut cfg = tap_config();
        cfg.output = OutputMode::Tap { port: 0 };
        assert!(matches!(cfg.validate(), Err(Error::DuplicatePort(0))));
    }

    #[test]
    fn ring_name_limit() {
        let long = "x".repeat(RING_NAME_MAX);
        assert!(matches!(
            ring_config(&long, 1).validate(),
            Err(Error::RingNameTooLong { .. })
        ));
        assert!(matches!(
            ring_config("tapbr", 0).validate(),
            Err(Error::NoRings)
        ));
    }

    #[test]
    fn port_requirements() {
        let tap = tap_config();
        assert_eq!(tap.required_ports(), 3);
        assert_eq!(tap.used_ports(), vec![0, 1, 2]);
        assert!(matches!(
            tap.validate_ports(2),
            Err(Error::InsufficientPorts {
                required: 3,
                available: 2
            })
        ));
        tap.validate_ports(3).unwrap();

        let rings = ring_config("tapbr", 2);
        assert_eq!(rings.required_ports(), 2);
        rings.validate_ports(2).unwrap();

        let mut far = tap_config();
        far.output = OutputMode::Tap { port: 5 };
        assert!(matches!(
            far.validate_ports(4),
            Err(Error::NoSuchPort { port: 5, .. })
        ));
    }
}

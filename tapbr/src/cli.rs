//! Command-line model for the `tapbr` binary.
//!
//! EAL options follow a `--` separator and are passed to DPDK untouched:
//!
//! ```bash
//! tapbr -q 2 -R mon -N 2 -- -l 0-2 -a 0000:01:00.0 -a 0000:01:00.1
//! ```

use std::net::SocketAddr;

use clap::Parser;

use crate::config::{
    BridgeConfig, DEFAULT_BURST_SIZE, DEFAULT_OUTPUT_RING_SIZE, DEFAULT_POOL_CACHE_SIZE,
    DEFAULT_POOL_SIZE, DEFAULT_RX_DESC, DEFAULT_TX_DESC, Tunables,
};
use crate::error::{Error, Result};
use crate::output::{DEFAULT_RING_PREFIX, DEFAULT_TAP_PORT, OutputMode};
use crate::port::PortId;

pub const DEFAULT_CONTROL_ADDR: &str = "127.0.0.1:9470";

#[derive(Parser, Debug, Clone)]
#[command(name = "tapbr", version)]
#[command(about = "Mirroring bridge: forward between two ports, copy every packet to a tap port or fan-out rings")]
pub struct Args {
    /// Queues per port (one worker lcore each)
    #[arg(short = 'q', long, default_value_t = 1)]
    pub queues: u16,

    /// First bridged port
    #[arg(short = '1', long, default_value_t = 0)]
    pub intf1: PortId,

    /// Second bridged port
    #[arg(short = '2', long, default_value_t = 1)]
    pub intf2: PortId,

    /// Mirror every packet to this port [default: 2 when no ring option is given]
    #[arg(short = 'T', long)]
    pub tap: Option<PortId>,

    /// Mirror into rings named <PREFIX>0..<PREFIX>N-1
    #[arg(short = 'R', long)]
    pub ring_prefix: Option<String>,

    /// Number of fan-out rings
    #[arg(short = 'N', long)]
    pub rings: Option<u16>,

    /// Control-plane listen address
    #[arg(long, default_value = DEFAULT_CONTROL_ADDR)]
    pub control_addr: SocketAddr,

    /// Do not start the control plane
    #[arg(long)]
    pub no_control: bool,

    /// Mbufs in the packet pool (2^n - 1)
    #[arg(long, env = "PKTMBUF_POOL_SIZE", default_value_t = DEFAULT_POOL_SIZE)]
    pub pool_size: u32,

    /// Per-lcore mempool cache size
    #[arg(long, env = "PKTMBUF_POOL_CACHE_SIZE", default_value_t = DEFAULT_POOL_CACHE_SIZE)]
    pub pool_cache_size: u32,

    /// RX descriptors per queue
    #[arg(long, env = "RX_DESC_PER_QUEUE", default_value_t = DEFAULT_RX_DESC)]
    pub rx_desc: u32,

    /// TX descriptors per queue
    #[arg(long, env = "TX_DESC_PER_QUEUE", default_value_t = DEFAULT_TX_DESC)]
    pub tx_desc: u32,

    /// Max packets per burst
    #[arg(long, env = "BURST_SIZE", default_value_t = DEFAULT_BURST_SIZE)]
    pub burst_size: u32,

    /// Slots per fan-out ring
    #[arg(long, env = "OUTPUT_RING_SIZE", default_value_t = DEFAULT_OUTPUT_RING_SIZE)]
    pub output_ring_size: u32,

    /// EAL arguments, after `--`
    #[arg(last = true)]
    pub eal_args: Vec<String>,
}

impl Args {
    /// Resolve the output mode and build a validated configuration.
    pub fn into_config(&self) -> Result<BridgeConfig> {
        let config = BridgeConfig {
            queues: self.queues,
            primary: [self.intf1, self.intf2],
            output: self.output_mode()?,
            tunables: self.tunables(),
            control_addr: (!self.no_control).then_some(self.control_addr),
        };
        config.validate()?;
        Ok(config)
    }

    /// `--rings 0` counts as not given.
    fn output_mode(&self) -> Result<OutputMode> {
        let rings = self.rings.filter(|&n| n != 0);
        match (self.tap, &self.ring_prefix, rings) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => Err(Error::ConflictingOutput),
            (Some(port), None, None) => Ok(OutputMode::Tap { port }),
            (None, None, None) => Ok(OutputMode::Tap {
                port: DEFAULT_TAP_PORT,
            }),
            (None, prefix, count) => Ok(OutputMode::Rings {
                prefix: prefix
                    .clone()
                    .unwrap_or_else(|| DEFAULT_RING_PREFIX.to_string()),
                count: count.unwrap_or(1),
            }),
        }
    }

    fn tunables(&self) -> Tunables {
        Tunables {
            pool_size: self.pool_size,
            pool_cache_size: self.pool_cache_size,
            rx_desc: self.rx_desc,
            tx_desc: self.tx_desc,
            burst_size: self.burst_size,
            output_ring_size: self.output_ring_size,
        }
    }

    /// Argument vector for EAL init, program name first.
    pub fn eal_argv(&self) -> Vec<String> {
        std::iter::once("tapbr".to_string())
            .chain(self.eal_args.iter().cloned())
            .collect()
    }
}

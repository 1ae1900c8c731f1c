// Ethernet Device API
// See /usr/local/include/rte_ethdev.h

use tapbr_sys::ffi;
use tracing::{debug, info};

use super::pktmbuf::MemPool;
use crate::api::{Result, check_neg_errno};
use crate::port::{PortId, QueueId};

/// RSS key with the 16-bit pattern repeated, so a flow and its reverse
/// direction hash to the same value.
pub const SYMMETRIC_RSS_KEY: [u8; 40] = {
    let mut key = [0u8; 40];
    let mut i = 0;
    while i < key.len() {
        key[i] = 0x6d;
        key[i + 1] = 0x5a;
        i += 2;
    }
    key
};

/// Hash functions requested; the device's supported set is applied on top.
pub const DEFAULT_RSS_HF: u64 = ffi::RUST_RTE_ETH_RSS_PROTO_MASK;

/// Ethernet device wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthDev {
    port_id: PortId,
}

impl EthDev {
    /// Create a handle for an existing port
    ///
    /// Does not configure or start the device.
    pub fn new(port_id: PortId) -> Self {
        Self { port_id }
    }

    #[inline]
    pub fn port_id(&self) -> PortId {
        self.port_id
    }

    /// Get the number of available Ethernet devices
    pub fn count_avail() -> u16 {
        unsafe { ffi::rte_eth_dev_count_avail() }
    }

    /// Get the NUMA socket ID of the device
    pub fn socket_id(&self) -> i32 {
        unsafe { ffi::rte_eth_dev_socket_id(self.port_id) }
    }

    /// Maximum `(rx, tx)` queues the device supports.
    pub fn max_queues(&self) -> Result<(u16, u16)> {
        let mut rx = 0u16;
        let mut tx = 0u16;
        let ret = unsafe { ffi::rust_eth_dev_max_queues(self.port_id, &mut rx, &mut tx) };
        check_neg_errno(ret)?;
        Ok((rx, tx))
    }

    /// Configure queues with RSS. `rss_hf` is masked with what the device
    /// supports; a device supporting none falls back to a single hash-less
    /// distribution mode.
    pub fn configure_rss(
        &self,
        nb_rx_queues: u16,
        nb_tx_queues: u16,
        key: &[u8; 40],
        rss_hf: u64,
    ) -> Result<()> {
        let ret = unsafe {
            ffi::rust_eth_dev_configure_rss(
                self.port_id,
                nb_rx_queues,
                nb_tx_queues,
                key.as_ptr(),
                key.len() as u8,
                rss_hf,
            )
        };
        check_neg_errno(ret)
    }

    pub fn rx_queue_setup(&self, queue_id: QueueId, nb_desc: u16, mempool: &MemPool) -> Result<()> {
        let ret = unsafe {
            ffi::rte_eth_rx_queue_setup(
                self.port_id,
                queue_id,
                nb_desc,
                self.socket_id() as u32,
                std::ptr::null(),
                mempool.as_ptr(),
            )
        };
        check_neg_errno(ret)
    }

    pub fn tx_queue_setup(&self, queue_id: QueueId, nb_desc: u16) -> Result<()> {
        let ret = unsafe {
            ffi::rte_eth_tx_queue_setup(
                self.port_id,
                queue_id,
                nb_desc,
                self.socket_id() as u32,
                std::ptr::null(),
            )
        };
        check_neg_errno(ret)
    }

    pub fn start(&self) -> Result<()> {
        let ret = unsafe { ffi::rte_eth_dev_start(self.port_id) };
        check_neg_errno(ret)
    }

    pub fn stop(&self) -> Result<()> {
        let ret = unsafe { ffi::rte_eth_dev_stop(self.port_id) };
        check_neg_errno(ret)
    }

    pub fn close(&self) -> Result<()> {
        let ret = unsafe { ffi::rte_eth_dev_close(self.port_id) };
        check_neg_errno(ret)
    }

    pub fn promiscuous_enable(&self) -> Result<()> {
        let ret = unsafe { ffi::rte_eth_promiscuous_enable(self.port_id) };
        check_neg_errno(ret)
    }
}

/// Builder for configuring and starting an Ethernet device
pub struct EthDevBuilder {
    port_id: PortId,
    nb_queues: u16,
    rx_desc: u16,
    tx_desc: u16,
    promiscuous: bool,
}

impl EthDevBuilder {
    pub fn new(port_id: PortId) -> Self {
        Self {
            port_id,
            nb_queues: 1,
            rx_desc: 1024,
            tx_desc: 1024,
            promiscuous: false,
        }
    }

    /// Number of RX and TX queues (always equal in the bridge).
    pub fn queues(mut self, n: u16) -> Self {
        self.nb_queues = n;
        self
    }

    pub fn descriptors(mut self, rx: u16, tx: u16) -> Self {
        self.rx_desc = rx;
        self.tx_desc = tx;
        self
    }

    pub fn promiscuous(mut self) -> Self {
        self.promiscuous = true;
        self
    }

    /// Configure, set up every queue, optionally enable promiscuous mode,
    /// and start the device.
    pub fn build(self, mempool: &MemPool) -> Result<EthDev> {
        let dev = EthDev::new(self.port_id);

        dev.configure_rss(self.nb_queues, self.nb_queues, &SYMMETRIC_RSS_KEY, DEFAULT_RSS_HF)?;

        for q in 0..self.nb_queues {
            dev.rx_queue_setup(q, self.rx_desc, mempool)?;
            dev.tx_queue_setup(q, self.tx_desc)?;
        }
        debug!(port = self.port_id, queues = self.nb_queues, "queues set up");

        if self.promiscuous {
            dev.promiscuous_enable()?;
        }

        dev.start()?;
        info!(
            port = self.port_id,
            queues = self.nb_queues,
            socket = dev.socket_id(),
            "port started"
        );

        Ok(dev)
    }
}

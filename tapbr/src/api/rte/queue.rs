// RX/TX Queue API
// See: /usr/local/include/rte_ethdev.h

use tapbr_sys::ffi;

use super::mbuf::Mbuf;
use crate::port::{Burst, MAX_BURST_SIZE, PortId, PortQueue, QueueId};

/// One queue index of one port, used for both receive and transmit.
///
/// Burst rx/tx on a queue is not thread-safe in DPDK; a handle must only be
/// polled from the lcore that owns the queue.
#[derive(Debug)]
pub struct EthQueue {
    port_id: PortId,
    queue_id: QueueId,
}

impl EthQueue {
    /// The queue must already be set up on a started device.
    #[inline]
    pub fn new(port_id: PortId, queue_id: QueueId) -> Self {
        Self { port_id, queue_id }
    }
}

impl PortQueue for EthQueue {
    type Packet = Mbuf;

    #[inline]
    fn port_id(&self) -> PortId {
        self.port_id
    }

    #[inline]
    fn queue_id(&self) -> QueueId {
        self.queue_id
    }

    #[inline]
    fn rx_burst(&mut self, burst: &mut Burst<Mbuf>, max: usize) -> usize {
        let room = (burst.capacity() - burst.len()).min(max);
        if room == 0 {
            return 0;
        }

        let mut raw: [*mut ffi::rte_mbuf; MAX_BURST_SIZE] = [std::ptr::null_mut(); MAX_BURST_SIZE];
        let received = unsafe {
            ffi::rust_eth_rx_burst(self.port_id, self.queue_id, raw.as_mut_ptr(), room as u16)
        } as usize;

        for &ptr in &raw[..received] {
            if let Some(mbuf) = unsafe { Mbuf::from_raw(ptr) } {
                burst.push(mbuf);
            }
        }
        received
    }

    #[inline]
    fn tx_burst(&mut self, burst: &mut Burst<Mbuf>) -> usize {
        if burst.is_empty() {
            return 0;
        }

        let mut raw: [*mut ffi::rte_mbuf; MAX_BURST_SIZE] = [std::ptr::null_mut(); MAX_BURST_SIZE];
        for (slot, mbuf) in raw.iter_mut().zip(burst.iter()) {
            *slot = mbuf.as_ptr();
        }

        let sent = unsafe {
            ffi::rust_eth_tx_burst(
                self.port_id,
                self.queue_id,
                raw.as_mut_ptr(),
                burst.len() as u16,
            )
        } as usize;

        // The device owns the accepted prefix now and frees it after sending.
        for mbuf in burst.drain(..sent) {
            let _ = mbuf.into_raw();
        }
        sent
    }
}

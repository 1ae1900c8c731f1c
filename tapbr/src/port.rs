//! Packet I/O seams.
//!
//! The forwarding engine is written against these traits so the same loop
//! drives DPDK ports in production and the in-memory backend in tests.
//!
//! Buffer ownership follows the type system: a [`Packet`] is a move-only
//! handle and dropping it returns the buffer to its pool. A burst handed to
//! [`PortQueue::tx_burst`] loses exactly the packets the device accepted;
//! whatever is left in the burst still belongs to the caller.

use arrayvec::ArrayVec;

/// Ethernet device port ID
pub type PortId = u16;

/// Queue ID for RX/TX queues
pub type QueueId = u16;

/// Worker execution context id (a DPDK lcore id).
pub type ContextId = u32;

/// Upper bound for a single rx/tx burst.
pub const MAX_BURST_SIZE: usize = 1024;

/// Fixed-capacity batch of packets.
pub type Burst<P> = ArrayVec<P, MAX_BURST_SIZE>;

/// Role a port plays in the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortRole {
    PrimaryA,
    PrimaryB,
    Mirror,
}

impl PortRole {
    /// The opposite primary port, or `None` for the mirror.
    pub fn peer(self) -> Option<PortRole> {
        match self {
            PortRole::PrimaryA => Some(PortRole::PrimaryB),
            PortRole::PrimaryB => Some(PortRole::PrimaryA),
            PortRole::Mirror => None,
        }
    }
}

/// A received packet buffer.
pub trait Packet: Send + 'static {
    /// Hash computed over the packet's flow identity (RSS hash).
    fn flow_hash(&self) -> u32;
}

/// Source of packet duplicates.
pub trait PacketPool: Send + Sync {
    type Packet: Packet;

    /// Obtain an independent buffer referencing the same payload.
    ///
    /// Returns `None` when the pool is exhausted.
    fn clone_packet(&self, pkt: &Self::Packet) -> Option<Self::Packet>;
}

/// One queue of one port, owned by a single worker.
pub trait PortQueue: Send {
    type Packet: Packet;

    fn port_id(&self) -> PortId;

    fn queue_id(&self) -> QueueId;

    /// Receive up to `max` packets, appending them to `burst`.
    ///
    /// Returns the number of packets appended.
    fn rx_burst(&mut self, burst: &mut Burst<Self::Packet>, max: usize) -> usize;

    /// Transmit packets from the front of `burst`.
    ///
    /// Accepted packets are removed from `burst`; the rest stay with the
    /// caller. Returns the number accepted.
    fn tx_burst(&mut self, burst: &mut Burst<Self::Packet>) -> usize;
}

/// Outcome of a successful ring enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Accepted,
    /// Accepted, but the ring is above its quota watermark.
    OverQuota,
}

/// A fan-out ring consumed by an external process.
pub trait FanoutRing: Send + Sync {
    type Packet: Packet;

    fn name(&self) -> &str;

    /// Hand a packet to the ring.
    ///
    /// On `Ok` the ring owns the buffer. On `Err` the ring is full and the
    /// packet is handed back.
    fn enqueue(&self, pkt: Self::Packet) -> Result<Enqueued, Self::Packet>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_of_primaries() {
        assert_eq!(PortRole::PrimaryA.peer(), Some(PortRole::PrimaryB));
        assert_eq!(PortRole::PrimaryB.peer(), Some(PortRole::PrimaryA));
        assert_eq!(PortRole::Mirror.peer(), None);
    }
}

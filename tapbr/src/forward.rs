//! Per-worker forwarding loop.
//!
//! Each worker owns one queue index on both primary ports (and on the tap
//! port in tap mode). One iteration polls port A then port B; for each
//! received burst it clones every packet, forwards the originals to the
//! peer port and hands the clones to the mirror target.

use std::sync::Arc;

use tracing::{debug, info, trace};

use crate::error::{Error, Result};
use crate::output::MirrorTarget;
use crate::port::{Burst, FanoutRing, MAX_BURST_SIZE, PacketPool, PortQueue, PortRole, QueueId};
use crate::shutdown::ShutdownFlag;
use crate::stats::{BridgeStats, Counter};

const ROLES: [PortRole; 2] = [PortRole::PrimaryA, PortRole::PrimaryB];

/// Totals reported when a loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub iterations: u64,
    pub packets: u64,
}

pub struct ForwardLoop<Q, P, R>
where
    Q: PortQueue,
{
    queue: QueueId,
    ports: [Q; 2],
    pool: Arc<P>,
    mirror: Option<MirrorTarget<Q, R>>,
    stats: Arc<BridgeStats>,
    burst_size: usize,
    rx: Burst<Q::Packet>,
    clones: Burst<Q::Packet>,
}

impl<Q, P, R> ForwardLoop<Q, P, R>
where
    Q: PortQueue,
    P: PacketPool<Packet = Q::Packet>,
    R: FanoutRing<Packet = Q::Packet>,
{
    /// `ports[0]` is primary A, `ports[1]` primary B. Every queue handle,
    /// including a tap queue, must carry `queue`.
    pub fn new(
        queue: QueueId,
        ports: [Q; 2],
        pool: Arc<P>,
        mirror: Option<MirrorTarget<Q, R>>,
        stats: Arc<BridgeStats>,
        burst_size: usize,
    ) -> Result<Self> {
        if burst_size == 0 || burst_size > MAX_BURST_SIZE {
            return Err(Error::InvalidBurstSize(burst_size));
        }
        let tap = match &mirror {
            Some(MirrorTarget::Tap(q)) => Some(q.queue_id()),
            _ => None,
        };
        for found in ports.iter().map(|p| p.queue_id()).chain(tap) {
            if found != queue {
                return Err(Error::QueueMismatch {
                    expected: queue,
                    found,
                });
            }
        }
        Ok(Self {
            queue,
            ports,
            pool,
            mirror,
            stats,
            burst_size,
            rx: Burst::new(),
            clones: Burst::new(),
        })
    }

    pub fn queue_id(&self) -> QueueId {
        self.queue
    }

    /// One pass over both primary ports. Returns packets received.
    pub fn poll_once(&mut self) -> usize {
        self.forward(0) + self.forward(1)
    }

    /// Poll until `shutdown` is set. The flag is only checked between
    /// iterations, so a received burst is always fully handled.
    pub fn run(&mut self, shutdown: &ShutdownFlag) -> LoopSummary {
        info!(queue = self.queue, "forward loop started");
        let mut summary = LoopSummary::default();
        while !shutdown.is_triggered() {
            summary.packets += self.poll_once() as u64;
            summary.iterations += 1;
        }
        info!(
            queue = self.queue,
            iterations = summary.iterations,
            packets = summary.packets,
            "forward loop stopped"
        );
        summary
    }

    fn forward(&mut self, side: usize) -> usize {
        let received = self.ports[side].rx_burst(&mut self.rx, self.burst_size);
        if received == 0 {
            return 0;
        }
        trace!(
            port = self.ports[side].port_id(),
            queue = self.queue,
            received,
            "rx burst"
        );
        self.stats.record_rx(ROLES[side], received as u64);

        // Clones are taken before transmit: once the peer accepts a buffer
        // it may already be recycled.
        if let Some(mirror) = &self.mirror {
            let mut failed = 0u64;
            for pkt in self.rx.iter() {
                match self.pool.clone_packet(pkt) {
                    Some(copy) => self.clones.push(copy),
                    None => failed += 1,
                }
            }
            if failed > 0 {
                debug!(queue = self.queue, failed, "mirror clone failed");
                self.stats.add(mirror.drop_counter(), failed);
            }
        }

        let peer = &mut self.ports[1 - side];
        let sent = peer.tx_burst(&mut self.rx);
        let unsent = self.rx.len();
        if unsent > 0 {
            debug!(
                port = peer.port_id(),
                queue = self.queue,
                sent,
                unsent,
                "tx short, dropping"
            );
            self.rx.clear();
            self.stats.add(Counter::TxDrops, unsent as u64);
        }

        if let Some(mirror) = self.mirror.as_mut() {
            mirror.dispatch(&mut self.clones, &self.stats);
        }

        received
    }
}

//! Mirror output: a tap port or a bank of fan-out rings.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::port::{Burst, Enqueued, FanoutRing, Packet, PortId, PortQueue};
use crate::stats::{BridgeStats, Counter};

/// Ring prefix used when `--rings` is given without `--ring-prefix`.
pub const DEFAULT_RING_PREFIX: &str = "tapbr";

/// Tap port used when no output option is given.
pub const DEFAULT_TAP_PORT: PortId = 2;

/// Where mirror copies go, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    Tap { port: PortId },
    Rings { prefix: String, count: u16 },
}

impl OutputMode {
    /// `<prefix><index>` for every ring, empty in tap mode.
    pub fn ring_names(&self) -> Vec<String> {
        match self {
            OutputMode::Tap { .. } => Vec::new(),
            OutputMode::Rings { prefix, count } => {
                (0..*count).map(|i| format!("{prefix}{i}")).collect()
            }
        }
    }

    pub fn tap_port(&self) -> Option<PortId> {
        match self {
            OutputMode::Tap { port } => Some(*port),
            OutputMode::Rings { .. } => None,
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Tap { port } => write!(f, "tap port {port}"),
            OutputMode::Rings { prefix, count } => {
                write!(f, "{count} rings {prefix}0..{prefix}{}", count.saturating_sub(1))
            }
        }
    }
}

/// Ring selected for a flow hash.
#[inline]
pub fn ring_index(hash: u32, n: usize) -> usize {
    debug_assert!(n > 0);
    hash as usize % n
}

/// Whether fan-out rings may be created single-producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerMode {
    Single,
    Multi,
}

impl ProducerMode {
    /// With one ring per queue and a power-of-two count, the default RSS
    /// redirection table sends hash `h` to queue `h % N`, which is also the
    /// ring it selects, so each ring has one writer. Any other layout lets
    /// several workers write the same ring.
    pub fn for_layout(rings: usize, queues: u16) -> ProducerMode {
        if rings == queues as usize && rings.is_power_of_two() {
            ProducerMode::Single
        } else {
            ProducerMode::Multi
        }
    }
}

/// Ordered fan-out rings shared by every worker.
pub struct RingSet<R> {
    prefix: String,
    rings: Vec<R>,
}

impl<R: FanoutRing> RingSet<R> {
    pub fn new(prefix: impl Into<String>, rings: Vec<R>) -> Result<Self> {
        if rings.is_empty() {
            return Err(Error::NoRings);
        }
        Ok(Self {
            prefix: prefix.into(),
            rings,
        })
    }

    #[inline]
    pub fn select(&self, flow_hash: u32) -> usize {
        ring_index(flow_hash, self.rings.len())
    }

    #[inline]
    pub fn ring(&self, index: usize) -> &R {
        &self.rings[index]
    }

    pub fn len(&self) -> usize {
        self.rings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rings.iter().map(|r| r.name())
    }
}

impl<R> fmt::Debug for RingSet<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingSet")
            .field("prefix", &self.prefix)
            .field("len", &self.rings.len())
            .finish()
    }
}

/// Per-worker mirror destination.
pub enum MirrorTarget<Q, R> {
    /// Worker's own queue on the tap port.
    Tap(Q),
    Rings(Arc<RingSet<R>>),
}

impl<Q, R> MirrorTarget<Q, R>
where
    Q: PortQueue,
    R: FanoutRing<Packet = Q::Packet>,
{
    /// Counter charged when a mirror copy is lost before dispatch.
    pub fn drop_counter(&self) -> Counter {
        match self {
            MirrorTarget::Tap(_) => Counter::TapDrops,
            MirrorTarget::Rings(_) => Counter::RingEnqDrops,
        }
    }

    /// Deliver every clone in `clones`. The burst is empty on return.
    pub fn dispatch(&mut self, clones: &mut Burst<Q::Packet>, stats: &BridgeStats) {
        if clones.is_empty() {
            return;
        }
        match self {
            MirrorTarget::Tap(queue) => {
                let sent = queue.tx_burst(clones);
                let unsent = clones.len();
                if unsent > 0 {
                    debug!(
                        port = queue.port_id(),
                        queue = queue.queue_id(),
                        sent,
                        unsent,
                        "tap tx short"
                    );
                    clones.clear();
                    stats.add(Counter::TapDrops, unsent as u64);
                }
            }
            MirrorTarget::Rings(rings) => {
                let mut dropped = 0u64;
                for pkt in clones.drain(..) {
                    let ring = rings.ring(rings.select(pkt.flow_hash()));
                    match ring.enqueue(pkt) {
                        Ok(Enqueued::Accepted) => {}
                        Ok(Enqueued::OverQuota) => {
                            trace!(ring = ring.name(), "ring above quota");
                        }
                        Err(pkt) => {
                            drop(pkt);
                            dropped += 1;
                        }
                    }
                }
                if dropped > 0 {
                    debug!(dropped, "ring enqueue failed");
                    stats.add(Counter::RingEnqDrops, dropped);
                }
            }
        }
    }
}

impl<Q: fmt::Debug, R> fmt::Debug for MirrorTarget<Q, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirrorTarget::Tap(q) => f.debug_tuple("Tap").field(q).finish(),
            MirrorTarget::Rings(r) => f.debug_tuple("Rings").field(r).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_names_use_prefix() {
        let mode = OutputMode::Rings {
            prefix: "mon".into(),
            count: 3,
        };
        assert_eq!(mode.ring_names(), vec!["mon0", "mon1", "mon2"]);
        assert!(OutputMode::Tap { port: 2 }.ring_names().is_empty());
        assert_eq!(mode.tap_port(), None);
    }

    #[test]
    fn ring_index_is_modulo() {
        assert_eq!(ring_index(10, 4), 2);
        assert_eq!(ring_index(u32::MAX, 1), 0);
        assert_eq!(ring_index(7, 7), 0);
        for h in [0u32, 1, 99, 0xdead_beef] {
            assert_eq!(ring_index(h, 1), 0);
            assert_eq!(ring_index(h, 3), ring_index(h, 3));
        }
    }

    #[test]
    fn producer_mode_layouts() {
        assert_eq!(ProducerMode::for_layout(4, 4), ProducerMode::Single);
        assert_eq!(ProducerMode::for_layout(1, 1), ProducerMode::Single);
        assert_eq!(ProducerMode::for_layout(3, 3), ProducerMode::Multi);
        assert_eq!(ProducerMode::for_layout(4, 2), ProducerMode::Multi);
        assert_eq!(ProducerMode::for_layout(1, 2), ProducerMode::Multi);
    }

    #[test]
    fn display_output_mode() {
        assert_eq!(OutputMode::Tap { port: 2 }.to_string(), "tap port 2");
        let rings = OutputMode::Rings {
            prefix: "tapbr".into(),
            count: 2,
        };
        assert_eq!(rings.to_string(), "2 rings tapbr0..tapbr1");
    }
}

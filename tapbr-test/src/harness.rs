//! Bridge wiring over the in-memory backend.

use std::sync::Arc;
use std::thread::JoinHandle;

use tapbr::forward::{ForwardLoop, LoopSummary};
use tapbr::output::{MirrorTarget, RingSet};
use tapbr::planner::QueuePlan;
use tapbr::port::{PortId, QueueId};
use tapbr::shutdown::ShutdownFlag;
use tapbr::stats::BridgeStats;

use crate::mem::{MemPacket, MemPool, MemPort, MemQueue, MemRing};

pub type MemLoop = ForwardLoop<MemQueue, MemPool, MemRing>;

pub const PORT_A: PortId = 0;
pub const PORT_B: PortId = 1;
pub const PORT_TAP: PortId = 2;

/// Mirror output of a [`MemBridge`].
pub enum MemOutput {
    None,
    Tap(Arc<MemPort>),
    Rings(Arc<RingSet<MemRing>>),
}

/// Two primary ports, a pool, stats and a mirror output, ready to build
/// forwarding loops from.
pub struct MemBridge {
    pub pool: Arc<MemPool>,
    pub a: Arc<MemPort>,
    pub b: Arc<MemPort>,
    pub output: MemOutput,
    pub stats: Arc<BridgeStats>,
    pub queues: u16,
    pub burst_size: usize,
}

impl MemBridge {
    fn new(queues: u16, pool_capacity: usize, output: MemOutput) -> Self {
        Self {
            pool: MemPool::new(pool_capacity),
            a: MemPort::new(PORT_A, queues),
            b: MemPort::new(PORT_B, queues),
            output,
            stats: Arc::new(BridgeStats::new()),
            queues,
            burst_size: 32,
        }
    }

    pub fn with_tap(queues: u16, pool_capacity: usize) -> Self {
        let tap = MemPort::new(PORT_TAP, queues);
        Self::new(queues, pool_capacity, MemOutput::Tap(tap))
    }

    /// `count` rings named `tapbr0..`, each holding `ring_size` packets.
    pub fn with_rings(queues: u16, pool_capacity: usize, count: u16, ring_size: usize) -> Self {
        let rings = (0..count)
            .map(|i| MemRing::new(format!("tapbr{i}"), ring_size))
            .collect();
        Self::with_ring_set(queues, pool_capacity, rings)
    }

    pub fn with_ring_set(queues: u16, pool_capacity: usize, rings: Vec<MemRing>) -> Self {
        let set = RingSet::new("tapbr", rings).expect("at least one ring");
        Self::new(queues, pool_capacity, MemOutput::Rings(Arc::new(set)))
    }

    pub fn without_mirror(queues: u16, pool_capacity: usize) -> Self {
        Self::new(queues, pool_capacity, MemOutput::None)
    }

    pub fn burst_size(mut self, n: usize) -> Self {
        self.burst_size = n;
        self
    }

    pub fn tap(&self) -> &Arc<MemPort> {
        match &self.output {
            MemOutput::Tap(port) => port,
            _ => panic!("bridge has no tap port"),
        }
    }

    pub fn rings(&self) -> &Arc<RingSet<MemRing>> {
        match &self.output {
            MemOutput::Rings(rings) => rings,
            _ => panic!("bridge has no rings"),
        }
    }

    /// Allocate a packet from the bridge's pool.
    pub fn packet(&self, flow_hash: u32, payload: &[u8]) -> MemPacket {
        self.pool
            .alloc(payload.to_vec(), flow_hash)
            .expect("pool exhausted")
    }

    /// Forwarding loop for one queue index.
    pub fn forward_loop(&self, queue: QueueId) -> MemLoop {
        let mirror = match &self.output {
            MemOutput::None => None,
            MemOutput::Tap(port) => Some(MirrorTarget::Tap(port.queue(queue))),
            MemOutput::Rings(rings) => Some(MirrorTarget::Rings(rings.clone())),
        };
        ForwardLoop::new(
            queue,
            [self.a.queue(queue), self.b.queue(queue)],
            self.pool.clone(),
            mirror,
            self.stats.clone(),
            self.burst_size,
        )
        .expect("valid forward loop")
    }

    /// Run one forwarding loop per planned queue on its own thread until
    /// `shutdown` is set.
    pub fn spawn(&self, plan: &QueuePlan, shutdown: &ShutdownFlag) -> Vec<JoinHandle<LoopSummary>> {
        plan.iter()
            .map(|(ctx, queue)| {
                let mut fwd = self.forward_loop(queue);
                let flag = shutdown.clone();
                std::thread::Builder::new()
                    .name(format!("worker-{ctx}"))
                    .spawn(move || fwd.run(&flag))
                    .expect("spawn worker thread")
            })
            .collect()
    }

    /// Drop every captured packet, returning how many there were.
    pub fn drain_outputs(&self) -> usize {
        let mut n = self.a.take_all_tx().len() + self.b.take_all_tx().len();
        match &self.output {
            MemOutput::None => {}
            MemOutput::Tap(port) => n += port.take_all_tx().len(),
            MemOutput::Rings(rings) => {
                n += (0..rings.len()).map(|i| rings.ring(i).drain().len()).sum::<usize>()
            }
        }
        n
    }
}

/// Route test logs through tracing; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

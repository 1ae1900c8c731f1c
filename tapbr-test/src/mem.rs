//! In-memory packet backend.
//!
//! Stands in for DPDK in tests: packets are reference-counted byte buffers,
//! ports are queues of injected packets plus a capture of everything
//! transmitted, and rings are bounded deques. The pool counts outstanding
//! buffers so tests can assert that nothing leaked once every captured
//! packet is dropped.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use tapbr::port::{Burst, Enqueued, FanoutRing, Packet, PacketPool, PortId, PortQueue, QueueId};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// One buffer checked out of a [`MemPool`]; returned on drop.
struct Lease(Arc<AtomicUsize>);

impl Drop for Lease {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Packet buffer. Clones made through the pool share the payload bytes.
pub struct MemPacket {
    payload: Bytes,
    flow_hash: u32,
    _lease: Lease,
}

impl MemPacket {
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Whether `self` and `other` reference the same payload memory.
    pub fn shares_payload(&self, other: &MemPacket) -> bool {
        self.payload.as_ptr() == other.payload.as_ptr() && self.payload.len() == other.payload.len()
    }
}

impl Packet for MemPacket {
    fn flow_hash(&self) -> u32 {
        self.flow_hash
    }
}

impl fmt::Debug for MemPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemPacket")
            .field("len", &self.payload.len())
            .field("flow_hash", &self.flow_hash)
            .finish()
    }
}

/// Fixed-capacity buffer pool.
#[derive(Debug)]
pub struct MemPool {
    capacity: usize,
    outstanding: Arc<AtomicUsize>,
}

impl MemPool {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            outstanding: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn lease(&self) -> Option<Lease> {
        self.outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.capacity).then_some(n + 1)
            })
            .ok()
            .map(|_| Lease(self.outstanding.clone()))
    }

    /// Allocate a packet, `None` if the pool is exhausted.
    pub fn alloc(&self, payload: impl Into<Bytes>, flow_hash: u32) -> Option<MemPacket> {
        self.lease().map(|lease| MemPacket {
            payload: payload.into(),
            flow_hash,
            _lease: lease,
        })
    }

    /// Buffers currently checked out.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl PacketPool for MemPool {
    type Packet = MemPacket;

    fn clone_packet(&self, pkt: &MemPacket) -> Option<MemPacket> {
        self.lease().map(|lease| MemPacket {
            payload: pkt.payload.clone(),
            flow_hash: pkt.flow_hash,
            _lease: lease,
        })
    }
}

#[derive(Default)]
struct QueueState {
    rx: VecDeque<MemPacket>,
    tx: Vec<MemPacket>,
    tx_limit: Option<usize>,
    tx_calls: usize,
}

/// Software port with a fixed number of queues.
pub struct MemPort {
    id: PortId,
    queues: Vec<Mutex<QueueState>>,
}

impl MemPort {
    pub fn new(id: PortId, queues: u16) -> Arc<Self> {
        Arc::new(Self {
            id,
            queues: (0..queues).map(|_| Mutex::default()).collect(),
        })
    }

    pub fn id(&self) -> PortId {
        self.id
    }

    fn state(&self, queue: QueueId) -> MutexGuard<'_, QueueState> {
        lock(&self.queues[queue as usize])
    }

    /// Queue handle for a worker.
    pub fn queue(self: &Arc<Self>, queue: QueueId) -> MemQueue {
        assert!((queue as usize) < self.queues.len(), "no queue {queue}");
        MemQueue {
            port: self.clone(),
            queue,
        }
    }

    /// Make `pkt` arrive on `queue`.
    pub fn inject(&self, queue: QueueId, pkt: MemPacket) {
        self.state(queue).rx.push_back(pkt);
    }

    pub fn inject_all(&self, queue: QueueId, pkts: impl IntoIterator<Item = MemPacket>) {
        self.state(queue).rx.extend(pkts);
    }

    /// Packets waiting to be received on any queue.
    pub fn pending_rx(&self) -> usize {
        self.queues.iter().map(|q| lock(q).rx.len()).sum()
    }

    /// Cap how many packets each `tx_burst` on `queue` accepts.
    pub fn set_tx_limit(&self, queue: QueueId, limit: Option<usize>) {
        self.state(queue).tx_limit = limit;
    }

    /// Remove and return everything transmitted on `queue`.
    pub fn take_tx(&self, queue: QueueId) -> Vec<MemPacket> {
        std::mem::take(&mut self.state(queue).tx)
    }

    /// Remove and return everything transmitted on every queue.
    pub fn take_all_tx(&self) -> Vec<MemPacket> {
        (0..self.queues.len() as QueueId)
            .flat_map(|q| self.take_tx(q))
            .collect()
    }

    pub fn tx_count(&self) -> usize {
        self.queues.iter().map(|q| lock(q).tx.len()).sum()
    }

    /// Number of `tx_burst` calls made on `queue`.
    pub fn tx_calls(&self, queue: QueueId) -> usize {
        self.state(queue).tx_calls
    }
}

impl fmt::Debug for MemPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemPort")
            .field("id", &self.id)
            .field("queues", &self.queues.len())
            .finish()
    }
}

/// `(port, queue)` handle over a [`MemPort`].
#[derive(Debug)]
pub struct MemQueue {
    port: Arc<MemPort>,
    queue: QueueId,
}

impl PortQueue for MemQueue {
    type Packet = MemPacket;

    fn port_id(&self) -> PortId {
        self.port.id
    }

    fn queue_id(&self) -> QueueId {
        self.queue
    }

    fn rx_burst(&mut self, burst: &mut Burst<MemPacket>, max: usize) -> usize {
        let room = (burst.capacity() - burst.len()).min(max);
        let mut state = self.port.state(self.queue);
        let n = room.min(state.rx.len());
        burst.extend(state.rx.drain(..n));
        n
    }

    fn tx_burst(&mut self, burst: &mut Burst<MemPacket>) -> usize {
        let mut state = self.port.state(self.queue);
        state.tx_calls += 1;
        let n = burst.len().min(state.tx_limit.unwrap_or(usize::MAX));
        state.tx.extend(burst.drain(..n));
        n
    }
}

/// Bounded ring with an optional quota watermark.
pub struct MemRing {
    name: String,
    capacity: usize,
    quota: Option<usize>,
    slots: Mutex<VecDeque<MemPacket>>,
}

impl MemRing {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            quota: None,
            slots: Mutex::default(),
        }
    }

    /// Enqueues that leave more than `quota` entries report `OverQuota`.
    pub fn with_quota(mut self, quota: usize) -> Self {
        self.quota = Some(quota);
        self
    }

    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume everything queued, as the external reader would.
    pub fn drain(&self) -> Vec<MemPacket> {
        lock(&self.slots).drain(..).collect()
    }
}

impl FanoutRing for MemRing {
    type Packet = MemPacket;

    fn name(&self) -> &str {
        &self.name
    }

    fn enqueue(&self, pkt: MemPacket) -> Result<Enqueued, MemPacket> {
        let mut slots = lock(&self.slots);
        if slots.len() >= self.capacity {
            return Err(pkt);
        }
        slots.push_back(pkt);
        match self.quota {
            Some(q) if slots.len() > q => Ok(Enqueued::OverQuota),
            _ => Ok(Enqueued::Accepted),
        }
    }
}

impl fmt::Debug for MemRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemRing")
            .field("name", &self.name)
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_counts_leases() {
        let pool = MemPool::new(2);
        let a = pool.alloc(&b"a"[..], 1).unwrap();
        let b = pool.clone_packet(&a).unwrap();
        assert!(a.shares_payload(&b));
        assert_eq!(pool.outstanding(), 2);
        assert!(pool.alloc(&b"c"[..], 1).is_none());
        assert!(pool.clone_packet(&a).is_none());
        drop(a);
        assert_eq!(pool.outstanding(), 1);
        assert_eq!(b.payload().as_ref(), b"a");
        drop(b);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn tx_limit_keeps_tail() {
        let pool = MemPool::new(8);
        let port = MemPort::new(0, 1);
        port.set_tx_limit(0, Some(2));
        let mut q = port.queue(0);
        let mut burst = Burst::new();
        for i in 0u8..5 {
            burst.push(pool.alloc(vec![i], i as u32).unwrap());
        }
        assert_eq!(q.tx_burst(&mut burst), 2);
        assert_eq!(burst.len(), 3);
        assert_eq!(burst[0].flow_hash(), 2);
        assert_eq!(port.take_tx(0).len(), 2);
    }

    #[test]
    fn ring_full_hands_back() {
        let pool = MemPool::new(8);
        let ring = MemRing::new("r0", 2).with_quota(1);
        assert_eq!(
            ring.enqueue(pool.alloc(&b"x"[..], 0).unwrap()).unwrap(),
            Enqueued::Accepted
        );
        assert_eq!(
            ring.enqueue(pool.alloc(&b"y"[..], 0).unwrap()).unwrap(),
            Enqueued::OverQuota
        );
        let back = ring.enqueue(pool.alloc(&b"z"[..], 0).unwrap()).unwrap_err();
        assert_eq!(back.payload().as_ref(), b"z");
        assert_eq!(ring.drain().len(), 2);
    }
}

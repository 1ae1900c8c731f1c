//! Bridge-wide packet counters.
//!
//! Every worker adds to the same six counters with relaxed atomics; readers
//! take a [`StatsSnapshot`] at any time. Counters only grow and are never
//! reset. A snapshot is not a consistent cut across counters.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::port::PortRole;

/// One of the bridge counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Counter {
    TotalPkts,
    If0Pkts,
    If1Pkts,
    TxDrops,
    RingEnqDrops,
    TapDrops,
}

impl Counter {
    pub const ALL: [Counter; 6] = [
        Counter::TotalPkts,
        Counter::If0Pkts,
        Counter::If1Pkts,
        Counter::TxDrops,
        Counter::RingEnqDrops,
        Counter::TapDrops,
    ];

    /// External name as reported by the control plane.
    pub fn name(self) -> &'static str {
        match self {
            Counter::TotalPkts => "total_pkts",
            Counter::If0Pkts => "if0_pkts",
            Counter::If1Pkts => "if1_pkts",
            Counter::TxDrops => "tx_drops",
            Counter::RingEnqDrops => "ring_enq_drops",
            Counter::TapDrops => "tap_drops",
        }
    }

    pub fn from_name(name: &str) -> Option<Counter> {
        Counter::ALL.into_iter().find(|c| c.name() == name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Keeps each counter on its own cache line so workers on different cores
/// do not contend.
#[repr(align(64))]
#[derive(Default)]
struct PaddedCounter(AtomicU64);

/// Shared counter registry.
#[derive(Default)]
pub struct BridgeStats {
    counters: [PaddedCounter; 6],
}

impl BridgeStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add(&self, counter: Counter, n: u64) {
        if n != 0 {
            self.counters[counter.index()]
                .0
                .fetch_add(n, Ordering::Relaxed);
        }
    }

    /// Account `n` packets received on a port: the per-port counter first,
    /// then the total.
    #[inline]
    pub fn record_rx(&self, role: PortRole, n: u64) {
        match role {
            PortRole::PrimaryA => self.add(Counter::If0Pkts, n),
            PortRole::PrimaryB => self.add(Counter::If1Pkts, n),
            // the mirror port is transmit-only
            PortRole::Mirror => {}
        }
        self.add(Counter::TotalPkts, n);
    }

    #[inline]
    pub fn get(&self, counter: Counter) -> u64 {
        self.counters[counter.index()].0.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_pkts: self.get(Counter::TotalPkts),
            if0_pkts: self.get(Counter::If0Pkts),
            if1_pkts: self.get(Counter::If1Pkts),
            tx_drops: self.get(Counter::TxDrops),
            ring_enq_drops: self.get(Counter::RingEnqDrops),
            tap_drops: self.get(Counter::TapDrops),
        }
    }
}

impl fmt::Debug for BridgeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.snapshot(), f)
    }
}

/// Point-in-time copy of the counters.
///
/// Serializes as a flat JSON object keyed by counter name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_pkts: u64,
    pub if0_pkts: u64,
    pub if1_pkts: u64,
    pub tx_drops: u64,
    pub ring_enq_drops: u64,
    pub tap_drops: u64,
}

impl StatsSnapshot {
    pub fn get(&self, counter: Counter) -> u64 {
        match counter {
            Counter::TotalPkts => self.total_pkts,
            Counter::If0Pkts => self.if0_pkts,
            Counter::If1Pkts => self.if1_pkts,
            Counter::TxDrops => self.tx_drops,
            Counter::RingEnqDrops => self.ring_enq_drops,
            Counter::TapDrops => self.tap_drops,
        }
    }

    /// Counters in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Counter, u64)> + '_ {
        Counter::ALL.into_iter().map(|c| (c, self.get(c)))
    }

    pub fn to_map(&self) -> BTreeMap<String, u64> {
        self.iter().map(|(c, v)| (c.name().to_string(), v)).collect()
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tapbr stats:")?;
        for (counter, value) in self.iter() {
            writeln!(f, "   {counter}: {value}")?;
        }
        Ok(())
    }
}

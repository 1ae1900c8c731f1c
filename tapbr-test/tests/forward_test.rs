//! Forwarding loop behaviour over the in-memory backend.

use std::sync::Arc;

use tapbr::Error;
use tapbr::forward::ForwardLoop;
use tapbr::output::MirrorTarget;
use tapbr::port::{MAX_BURST_SIZE, Packet};
use tapbr::stats::{BridgeStats, Counter};
use tapbr_test::{MemBridge, MemPool, MemPort, MemQueue, MemRing, init_tracing};

#[test]
fn forwards_both_directions_and_mirrors_everything() {
    init_tracing();
    let br = MemBridge::with_tap(1, 64);
    for i in 0..3 {
        br.a.inject(0, br.packet(i, b"from-a"));
    }
    for i in 0..2 {
        br.b.inject(0, br.packet(100 + i, b"from-b"));
    }

    let mut fwd = br.forward_loop(0);
    assert_eq!(fwd.poll_once(), 5);

    let to_b = br.b.take_tx(0);
    let to_a = br.a.take_tx(0);
    assert_eq!(to_b.len(), 3);
    assert_eq!(to_a.len(), 2);
    assert!(to_b.iter().all(|p| p.payload().as_ref() == b"from-a"));
    assert!(to_a.iter().all(|p| p.payload().as_ref() == b"from-b"));

    // A's burst is mirrored before B's
    let mirrored = br.tap().take_tx(0);
    let hashes: Vec<u32> = mirrored.iter().map(|p| p.flow_hash()).collect();
    assert_eq!(hashes, vec![0, 1, 2, 100, 101]);

    let snap = br.stats.snapshot();
    assert_eq!(snap.if0_pkts, 3);
    assert_eq!(snap.if1_pkts, 2);
    assert_eq!(snap.total_pkts, 5);
    assert_eq!(snap.tx_drops, 0);
    assert_eq!(snap.tap_drops, 0);

    drop((to_a, to_b, mirrored));
    drop(fwd);
    assert_eq!(br.pool.outstanding(), 0);
}

#[test]
fn idle_ports_do_nothing() {
    let br = MemBridge::with_tap(1, 8);
    let mut fwd = br.forward_loop(0);
    assert_eq!(fwd.poll_once(), 0);
    assert_eq!(br.stats.snapshot().total_pkts, 0);
    assert_eq!(br.b.tx_calls(0), 0);
    assert_eq!(br.tap().tx_calls(0), 0);
}

#[test]
fn partial_send_drops_tail_once() {
    let br = MemBridge::with_tap(1, 64);
    br.b.set_tx_limit(0, Some(1));
    br.a
        .inject_all(0, (0..4).map(|i| br.packet(i, b"x")));

    let mut fwd = br.forward_loop(0);
    assert_eq!(fwd.poll_once(), 4);

    let sent = br.b.take_tx(0);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].flow_hash(), 0);
    // no retry: exactly one transmit attempt for the burst
    assert_eq!(br.b.tx_calls(0), 1);

    let snap = br.stats.snapshot();
    assert_eq!(snap.tx_drops, 3);
    assert_eq!(snap.if0_pkts, 4);
    // the mirror still saw every packet
    assert_eq!(br.tap().tx_count(), 4);

    // rx + clones - forwarded - mirrored = freed
    drop(sent);
    br.drain_outputs();
    assert_eq!(br.pool.outstanding(), 0);
}

#[test]
fn clones_outlive_forwarded_originals() {
    let br = MemBridge::with_tap(1, 8);
    br.a.inject(0, br.packet(7, b"payload"));

    let mut fwd = br.forward_loop(0);
    fwd.poll_once();

    let original = br.b.take_tx(0).pop().unwrap();
    let clone = br.tap().take_tx(0).pop().unwrap();
    assert!(original.shares_payload(&clone));
    assert_eq!(br.pool.outstanding(), 2);

    drop(original);
    assert_eq!(clone.payload().as_ref(), b"payload");
    assert_eq!(clone.flow_hash(), 7);
    assert_eq!(br.pool.outstanding(), 1);
}

#[test]
fn clone_failure_is_a_mirror_drop() {
    // room for the three originals only
    let br = MemBridge::with_tap(1, 3);
    br.a
        .inject_all(0, (0..3).map(|i| br.packet(i, b"x")));

    let mut fwd = br.forward_loop(0);
    assert_eq!(fwd.poll_once(), 3);

    assert_eq!(br.b.tx_count(), 3);
    assert_eq!(br.tap().tx_count(), 0);
    let snap = br.stats.snapshot();
    assert_eq!(snap.tap_drops, 3);
    assert_eq!(snap.tx_drops, 0);
}

#[test]
fn clone_failure_in_ring_mode_counts_ring_drops() {
    let br = MemBridge::with_rings(1, 2, 2, 16);
    br.a
        .inject_all(0, (0..2).map(|i| br.packet(i, b"x")));

    let mut fwd = br.forward_loop(0);
    fwd.poll_once();

    let snap = br.stats.snapshot();
    assert_eq!(snap.ring_enq_drops, 2);
    assert_eq!(snap.tap_drops, 0);
    assert_eq!(br.b.tx_count(), 2);
}

#[test]
fn tap_shortfall_counts_tap_drops() {
    let br = MemBridge::with_tap(1, 64);
    br.tap().set_tx_limit(0, Some(2));
    br.a
        .inject_all(0, (0..5).map(|i| br.packet(i, b"x")));

    let mut fwd = br.forward_loop(0);
    fwd.poll_once();

    assert_eq!(br.tap().tx_count(), 2);
    assert_eq!(br.b.tx_count(), 5);
    let snap = br.stats.snapshot();
    assert_eq!(snap.tap_drops, 3);
    assert_eq!(snap.tx_drops, 0);

    br.drain_outputs();
    assert_eq!(br.pool.outstanding(), 0);
}

#[test]
fn burst_size_bounds_each_receive() {
    let br = MemBridge::with_tap(1, 64).burst_size(4);
    br.a
        .inject_all(0, (0..10).map(|i| br.packet(i, b"x")));

    let mut fwd = br.forward_loop(0);
    assert_eq!(fwd.poll_once(), 4);
    assert_eq!(fwd.poll_once(), 4);
    assert_eq!(fwd.poll_once(), 2);
    assert_eq!(fwd.poll_once(), 0);
    assert_eq!(br.b.tx_count(), 10);
    assert_eq!(br.stats.get(Counter::TotalPkts), 10);
}

#[test]
fn without_mirror_only_forwards() {
    let br = MemBridge::without_mirror(1, 4);
    br.a
        .inject_all(0, (0..4).map(|i| br.packet(i, b"x")));

    let mut fwd = br.forward_loop(0);
    assert_eq!(fwd.poll_once(), 4);
    assert_eq!(br.b.tx_count(), 4);
    let snap = br.stats.snapshot();
    assert_eq!(snap.tap_drops + snap.ring_enq_drops, 0);
}

#[test]
fn queues_stay_separate() {
    let br = MemBridge::with_tap(2, 64);
    br.a.inject(1, br.packet(1, b"q1"));

    let mut q0 = br.forward_loop(0);
    let mut q1 = br.forward_loop(1);
    assert_eq!(q0.poll_once(), 0);
    assert_eq!(q1.poll_once(), 1);
    assert_eq!(br.b.take_tx(0).len(), 0);
    assert_eq!(br.b.take_tx(1).len(), 1);
    assert_eq!(br.tap().take_tx(1).len(), 1);
}

#[test]
fn construction_checks() {
    let pool = MemPool::new(4);
    let stats = Arc::new(BridgeStats::new());
    let a = MemPort::new(0, 2);
    let b = MemPort::new(1, 2);

    let bad_burst = ForwardLoop::<MemQueue, MemPool, MemRing>::new(
        0,
        [a.queue(0), b.queue(0)],
        pool.clone(),
        None,
        stats.clone(),
        MAX_BURST_SIZE + 1,
    );
    assert!(matches!(bad_burst, Err(Error::InvalidBurstSize(_))));

    let zero_burst = ForwardLoop::<MemQueue, MemPool, MemRing>::new(
        0,
        [a.queue(0), b.queue(0)],
        pool.clone(),
        None,
        stats.clone(),
        0,
    );
    assert!(matches!(zero_burst, Err(Error::InvalidBurstSize(0))));

    let mismatch = ForwardLoop::<MemQueue, MemPool, MemRing>::new(
        0,
        [a.queue(0), b.queue(1)],
        pool.clone(),
        None,
        stats.clone(),
        32,
    );
    assert!(matches!(
        mismatch,
        Err(Error::QueueMismatch {
            expected: 0,
            found: 1
        })
    ));

    let tap = MemPort::new(2, 2);
    let tap_mismatch = ForwardLoop::<MemQueue, MemPool, MemRing>::new(
        1,
        [a.queue(1), b.queue(1)],
        pool,
        Some(MirrorTarget::Tap(tap.queue(0))),
        stats,
        32,
    );
    assert!(matches!(
        tap_mismatch,
        Err(Error::QueueMismatch { expected: 1, .. })
    ));
}

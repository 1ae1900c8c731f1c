//! Control plane: serve stats over HTTP and query them back.

use std::net::SocketAddr;
use std::sync::Arc;

use tapbr::Error;
use tapbr::control::{ControlPlane, fetch_stats};
use tapbr::shutdown::ShutdownFlag;
use tapbr::stats::{BridgeStats, Counter};
use tapbr_test::MemBridge;

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

#[tokio::test(flavor = "current_thread")]
async fn stats_reflect_forwarding() {
    let br = MemBridge::with_tap(1, 64);
    br.b.set_tx_limit(0, Some(2));
    br.a
        .inject_all(0, (0..6).map(|i| br.packet(i, b"x")));
    br.forward_loop(0).poll_once();

    let shutdown = ShutdownFlag::new();
    let cp = ControlPlane::spawn(loopback(), br.stats.clone(), shutdown.clone()).unwrap();

    let snap = fetch_stats(cp.local_addr()).await.unwrap();
    assert_eq!(snap.total_pkts, 6);
    assert_eq!(snap.if0_pkts, 6);
    assert_eq!(snap.if1_pkts, 0);
    assert_eq!(snap.tx_drops, 4);
    assert_eq!(snap.tap_drops, 0);
    assert_eq!(snap.ring_enq_drops, 0);

    shutdown.trigger();
    tokio::task::spawn_blocking(move || cp.join())
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test(flavor = "current_thread")]
async fn counters_only_grow_between_queries() {
    let stats = Arc::new(BridgeStats::new());
    let shutdown = ShutdownFlag::new();
    let cp = ControlPlane::spawn(loopback(), stats.clone(), shutdown.clone()).unwrap();
    let addr = cp.local_addr();

    let first = fetch_stats(addr).await.unwrap();
    stats.add(Counter::TotalPkts, 3);
    stats.add(Counter::RingEnqDrops, 1);
    let second = fetch_stats(addr).await.unwrap();

    for c in Counter::ALL {
        assert!(second.get(c) >= first.get(c), "{c} went backwards");
    }
    assert_eq!(second.total_pkts, 3);
    assert_eq!(second.ring_enq_drops, 1);

    shutdown.trigger();
    tokio::task::spawn_blocking(move || cp.join())
        .await
        .unwrap()
        .unwrap();
}

#[test]
fn bind_conflict_is_reported() {
    let stats = Arc::new(BridgeStats::new());
    let shutdown = ShutdownFlag::new();
    let first = ControlPlane::spawn(loopback(), stats.clone(), shutdown.clone()).unwrap();

    let second = ControlPlane::spawn(first.local_addr(), stats, shutdown.clone());
    assert!(matches!(second, Err(Error::Io(_))));

    shutdown.trigger();
    first.join().unwrap();
}

#[tokio::test(flavor = "current_thread")]
async fn fetch_without_server_fails() {
    // bind then drop to get a port nothing listens on
    let addr = std::net::TcpListener::bind(loopback())
        .unwrap()
        .local_addr()
        .unwrap();
    assert!(matches!(fetch_stats(addr).await, Err(Error::Io(_))));
}

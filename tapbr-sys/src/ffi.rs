use core::ffi::{c_char, c_int, c_uint, c_void};

// ── Opaque DPDK types ───────────────────────────────────────
// The bridge never touches their fields from Rust; the shim does.

#[repr(C)]
pub struct rte_mbuf {
    _private: [u8; 0],
}

#[repr(C)]
pub struct rte_mempool {
    _private: [u8; 0],
}

#[repr(C)]
pub struct rte_ring {
    _private: [u8; 0],
}

#[repr(C)]
pub struct rte_eth_rxconf {
    _private: [u8; 0],
}

#[repr(C)]
pub struct rte_eth_txconf {
    _private: [u8; 0],
}

/// Function type accepted by `rte_eal_remote_launch`.
pub type lcore_function_t = unsafe extern "C" fn(arg: *mut c_void) -> c_int;

// ── Exported DPDK functions ─────────────────────────────────

unsafe extern "C" {
    pub fn rte_eal_init(argc: c_int, argv: *mut *mut c_char) -> c_int;
    pub fn rte_eal_cleanup() -> c_int;
    pub fn rte_strerror(errnum: c_int) -> *const c_char;
    pub fn rte_socket_id() -> c_uint;

    pub fn rte_eth_dev_count_avail() -> u16;
    pub fn rte_eth_dev_socket_id(port_id: u16) -> c_int;
    pub fn rte_eth_rx_queue_setup(
        port_id: u16,
        rx_queue_id: u16,
        nb_rx_desc: u16,
        socket_id: c_uint,
        rx_conf: *const rte_eth_rxconf,
        mb_pool: *mut rte_mempool,
    ) -> c_int;
    pub fn rte_eth_tx_queue_setup(
        port_id: u16,
        tx_queue_id: u16,
        nb_tx_desc: u16,
        socket_id: c_uint,
        tx_conf: *const rte_eth_txconf,
    ) -> c_int;
    pub fn rte_eth_dev_start(port_id: u16) -> c_int;
    pub fn rte_eth_dev_stop(port_id: u16) -> c_int;
    pub fn rte_eth_dev_close(port_id: u16) -> c_int;
    pub fn rte_eth_promiscuous_enable(port_id: u16) -> c_int;

    pub fn rte_pktmbuf_pool_create(
        name: *const c_char,
        n: c_uint,
        cache_size: c_uint,
        priv_size: u16,
        data_room_size: u16,
        socket_id: c_int,
    ) -> *mut rte_mempool;
    pub fn rte_mempool_free(mp: *mut rte_mempool);

    pub fn rte_ring_create(
        name: *const c_char,
        count: c_uint,
        socket_id: c_int,
        flags: c_uint,
    ) -> *mut rte_ring;
    pub fn rte_ring_free(r: *mut rte_ring);

    pub fn rte_eal_remote_launch(
        f: Option<lcore_function_t>,
        arg: *mut c_void,
        worker_id: c_uint,
    ) -> c_int;
    pub fn rte_eal_wait_lcore(worker_id: c_uint) -> c_int;
    pub fn rte_get_next_lcore(i: c_uint, skip_main: c_int, wrap: c_int) -> c_uint;
}

// ── Shim functions (src/wrapper.c) ──────────────────────────

unsafe extern "C" {
    pub fn rust_get_rte_errno() -> c_int;

    pub fn rust_rte_max_lcore() -> c_uint;

    pub fn rust_eth_rx_burst(
        port_id: u16,
        queue_id: u16,
        rx_pkts: *mut *mut rte_mbuf,
        nb_pkts: u16,
    ) -> u16;
    pub fn rust_eth_tx_burst(
        port_id: u16,
        queue_id: u16,
        tx_pkts: *mut *mut rte_mbuf,
        nb_pkts: u16,
    ) -> u16;
    pub fn rust_eth_dev_configure_rss(
        port_id: u16,
        nb_rx_queues: u16,
        nb_tx_queues: u16,
        rss_key: *const u8,
        rss_key_len: u8,
        rss_hf: u64,
    ) -> c_int;
    pub fn rust_eth_dev_max_queues(port_id: u16, max_rx: *mut u16, max_tx: *mut u16) -> c_int;

    pub fn rust_pktmbuf_free(m: *mut rte_mbuf);
    pub fn rust_pktmbuf_clone(md: *mut rte_mbuf, mp: *mut rte_mempool) -> *mut rte_mbuf;
    pub fn rust_pktmbuf_mtod(m: *mut rte_mbuf) -> *mut c_void;
    pub fn rust_pktmbuf_data_len(m: *const rte_mbuf) -> u16;
    pub fn rust_pktmbuf_pkt_len(m: *const rte_mbuf) -> u32;
    pub fn rust_pktmbuf_rss_hash(m: *const rte_mbuf) -> u32;

    pub fn rust_ring_enqueue(r: *mut rte_ring, obj: *mut c_void) -> c_int;
    pub fn rust_ring_count(r: *const rte_ring) -> c_uint;
}

// ── Build-config constants ──────────────────────────────────
// These come from rte_build_config.h / DPDK headers.
pub const SOCKET_ID_ANY: i32 = -1;
pub const RTE_PKTMBUF_HEADROOM: u16 = 128;
pub const RTE_MBUF_DEFAULT_DATAROOM: u16 = 2048;
pub const RTE_MBUF_DEFAULT_BUF_SIZE: u16 = RTE_MBUF_DEFAULT_DATAROOM + RTE_PKTMBUF_HEADROOM;

// ── Ring flags (rte_ring_core.h) ────────────────────────────
pub const RING_F_SP_ENQ: u32 = 0x0001;

// ── RSS hash constants ──────────────────────────────────────
// RTE_ETH_RSS_* are defined as RTE_BIT64(n). Values from rte_ethdev.h.
pub const RUST_RTE_ETH_RSS_IPV4: u64 = 1 << 2;
pub const RUST_RTE_ETH_RSS_FRAG_IPV4: u64 = 1 << 3;
pub const RUST_RTE_ETH_RSS_NONFRAG_IPV4_TCP: u64 = 1 << 4;
pub const RUST_RTE_ETH_RSS_NONFRAG_IPV4_UDP: u64 = 1 << 5;
pub const RUST_RTE_ETH_RSS_NONFRAG_IPV4_SCTP: u64 = 1 << 6;
pub const RUST_RTE_ETH_RSS_NONFRAG_IPV4_OTHER: u64 = 1 << 7;
pub const RUST_RTE_ETH_RSS_IPV6: u64 = 1 << 8;
pub const RUST_RTE_ETH_RSS_FRAG_IPV6: u64 = 1 << 9;
pub const RUST_RTE_ETH_RSS_NONFRAG_IPV6_TCP: u64 = 1 << 10;
pub const RUST_RTE_ETH_RSS_NONFRAG_IPV6_UDP: u64 = 1 << 11;
pub const RUST_RTE_ETH_RSS_NONFRAG_IPV6_SCTP: u64 = 1 << 12;
pub const RUST_RTE_ETH_RSS_NONFRAG_IPV6_OTHER: u64 = 1 << 13;
pub const RUST_RTE_ETH_RSS_IPV6_EX: u64 = 1 << 15;
pub const RUST_RTE_ETH_RSS_IPV6_TCP_EX: u64 = 1 << 16;
pub const RUST_RTE_ETH_RSS_IPV6_UDP_EX: u64 = 1 << 17;
pub const RUST_RTE_ETH_RSS_IP: u64 = RUST_RTE_ETH_RSS_IPV4
    | RUST_RTE_ETH_RSS_FRAG_IPV4
    | RUST_RTE_ETH_RSS_NONFRAG_IPV4_OTHER
    | RUST_RTE_ETH_RSS_IPV6
    | RUST_RTE_ETH_RSS_FRAG_IPV6
    | RUST_RTE_ETH_RSS_NONFRAG_IPV6_OTHER
    | RUST_RTE_ETH_RSS_IPV6_EX;
pub const RUST_RTE_ETH_RSS_TCP: u64 = RUST_RTE_ETH_RSS_NONFRAG_IPV4_TCP
    | RUST_RTE_ETH_RSS_NONFRAG_IPV6_TCP
    | RUST_RTE_ETH_RSS_IPV6_TCP_EX;
pub const RUST_RTE_ETH_RSS_UDP: u64 = RUST_RTE_ETH_RSS_NONFRAG_IPV4_UDP
    | RUST_RTE_ETH_RSS_NONFRAG_IPV6_UDP
    | RUST_RTE_ETH_RSS_IPV6_UDP_EX;
pub const RUST_RTE_ETH_RSS_SCTP: u64 =
    RUST_RTE_ETH_RSS_NONFRAG_IPV4_SCTP | RUST_RTE_ETH_RSS_NONFRAG_IPV6_SCTP;
/// Equivalent of the legacy `ETH_RSS_PROTO_MASK`.
pub const RUST_RTE_ETH_RSS_PROTO_MASK: u64 =
    RUST_RTE_ETH_RSS_IP | RUST_RTE_ETH_RSS_TCP | RUST_RTE_ETH_RSS_UDP | RUST_RTE_ETH_RSS_SCTP;

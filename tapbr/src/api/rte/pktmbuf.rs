// pktmbuf API
// See: /usr/local/include/rte_mbuf.h

use std::ffi::CString;
use std::ptr::NonNull;

use tapbr_sys::ffi;

use super::mbuf::Mbuf;
use crate::api::{Errno, Result, rte_errno};
use crate::port::PacketPool;

/// Wrapper for DPDK rte_mempool for packet mbufs (owning)
pub struct MemPool {
    inner: NonNull<ffi::rte_mempool>,
}

// DPDK mempools are thread-safe
unsafe impl Send for MemPool {}
unsafe impl Sync for MemPool {}

/// Configuration for creating a MemPool
#[derive(Debug, Clone)]
pub struct MemPoolConfig {
    /// Number of mbufs in the pool (optimum: 2^q - 1)
    pub num_mbufs: u32,
    /// Per-core cache size (0 to disable caching)
    pub cache_size: u32,
    /// Private area size between rte_mbuf struct and data buffer
    pub priv_size: u16,
    /// Data room size including RTE_PKTMBUF_HEADROOM
    pub data_room_size: u16,
    /// NUMA socket ID (-1 for SOCKET_ID_ANY)
    pub socket_id: i32,
}

impl Default for MemPoolConfig {
    fn default() -> Self {
        Self {
            num_mbufs: 8191,
            cache_size: 512,
            priv_size: 0,
            data_room_size: ffi::RTE_MBUF_DEFAULT_BUF_SIZE,
            socket_id: ffi::SOCKET_ID_ANY,
        }
    }
}

impl MemPoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Optimum value is 2^q - 1 (e.g., 8191, 16383, 32767).
    pub fn num_mbufs(mut self, n: u32) -> Self {
        self.num_mbufs = n;
        self
    }

    /// Set to 0 to disable caching. Must not exceed 512 or
    /// `num_mbufs / 1.5`.
    pub fn cache_size(mut self, size: u32) -> Self {
        self.cache_size = size;
        self
    }

    pub fn socket_id(mut self, id: i32) -> Self {
        self.socket_id = id;
        self
    }
}

impl MemPool {
    /// Create a new pktmbuf mempool
    pub fn create<S>(name: S, config: &MemPoolConfig) -> Result<Self>
    where
        S: Into<Vec<u8>>,
    {
        let c_name = CString::new(name).map_err(|_| Errno::EINVAL)?;
        let ptr = unsafe {
            ffi::rte_pktmbuf_pool_create(
                c_name.as_ptr(),
                config.num_mbufs,
                config.cache_size,
                config.priv_size,
                config.data_room_size,
                config.socket_id,
            )
        };
        NonNull::new(ptr)
            .map(|inner| MemPool { inner })
            .ok_or_else(rte_errno)
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut ffi::rte_mempool {
        self.inner.as_ptr()
    }

    /// Make an indirect mbuf attached to `src`'s data buffer.
    ///
    /// Only the mbuf header is allocated; the payload is shared and
    /// reference counted. Returns `None` if the pool is exhausted.
    #[inline]
    pub fn clone_mbuf(&self, src: &Mbuf) -> Option<Mbuf> {
        let ptr = unsafe { ffi::rust_pktmbuf_clone(src.as_ptr(), self.inner.as_ptr()) };
        unsafe { Mbuf::from_raw(ptr) }
    }
}

impl PacketPool for MemPool {
    type Packet = Mbuf;

    #[inline]
    fn clone_packet(&self, pkt: &Mbuf) -> Option<Mbuf> {
        self.clone_mbuf(pkt)
    }
}

impl Drop for MemPool {
    fn drop(&mut self) {
        unsafe {
            ffi::rte_mempool_free(self.inner.as_ptr());
        }
    }
}

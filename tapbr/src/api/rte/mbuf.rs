// Mbuf API
// See: /usr/local/include/rte_mbuf_core.h
// and /usr/local/include/rte_mbuf.h

use std::ptr::NonNull;
use std::slice;

use tapbr_sys::ffi;

use crate::port::Packet;

/// A wrapper around DPDK's rte_mbuf.
///
/// The mbuf is freed when dropped. For an indirect mbuf made by
/// [`MemPool::clone_mbuf`](super::pktmbuf::MemPool::clone_mbuf) that drops a
/// reference to the shared data buffer.
pub struct Mbuf {
    inner: NonNull<ffi::rte_mbuf>,
}

// One owner at a time, but owners may move between lcores.
unsafe impl Send for Mbuf {}

impl Mbuf {
    /// Create an Mbuf from a raw pointer.
    ///
    /// # Safety
    /// The pointer must be a valid, non-null rte_mbuf that the caller owns.
    #[inline]
    pub unsafe fn from_raw(ptr: *mut ffi::rte_mbuf) -> Option<Self> {
        NonNull::new(ptr).map(|inner| Mbuf { inner })
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut ffi::rte_mbuf {
        self.inner.as_ptr()
    }

    /// Consume the Mbuf and return the raw pointer without freeing.
    ///
    /// The caller is responsible for freeing the mbuf.
    #[inline]
    pub fn into_raw(self) -> *mut ffi::rte_mbuf {
        let ptr = self.inner.as_ptr();
        std::mem::forget(self);
        ptr
    }

    #[inline]
    pub fn data_len(&self) -> usize {
        unsafe { ffi::rust_pktmbuf_data_len(self.inner.as_ptr()) as usize }
    }

    #[inline]
    pub fn pkt_len(&self) -> usize {
        unsafe { ffi::rust_pktmbuf_pkt_len(self.inner.as_ptr()) as usize }
    }

    /// RSS hash the NIC stored on receive, 0 if it did not compute one.
    #[inline]
    pub fn rss_hash(&self) -> u32 {
        unsafe { ffi::rust_pktmbuf_rss_hash(self.inner.as_ptr()) }
    }

    /// First segment's data.
    #[inline]
    pub fn data(&self) -> &[u8] {
        let ptr = unsafe { ffi::rust_pktmbuf_mtod(self.inner.as_ptr()) };
        let len = self.data_len();
        if ptr.is_null() || len == 0 {
            &[]
        } else {
            unsafe { slice::from_raw_parts(ptr as *const u8, len) }
        }
    }
}

impl Packet for Mbuf {
    #[inline]
    fn flow_hash(&self) -> u32 {
        self.rss_hash()
    }
}

impl Drop for Mbuf {
    fn drop(&mut self) {
        unsafe {
            ffi::rust_pktmbuf_free(self.inner.as_ptr());
        }
    }
}

impl AsRef<[u8]> for Mbuf {
    fn as_ref(&self) -> &[u8] {
        self.data()
    }
}

impl std::fmt::Debug for Mbuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mbuf")
            .field("data_len", &self.data_len())
            .field("pkt_len", &self.pkt_len())
            .field("rss_hash", &self.rss_hash())
            .finish()
    }
}

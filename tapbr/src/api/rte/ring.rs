// Ring API
// See: /usr/local/include/rte_ring.h

use std::ffi::{CString, c_void};
use std::ptr::NonNull;

use nix::errno::Errno;
use tapbr_sys::ffi;

use super::mbuf::Mbuf;
use crate::api::{Result, rte_errno};
use crate::output::ProducerMode;
use crate::port::{Enqueued, FanoutRing};

/// Named rte_ring carrying mbuf pointers to a consumer process.
pub struct Ring {
    inner: NonNull<ffi::rte_ring>,
    name: String,
}

// rte_ring enqueue is safe from several lcores unless created single-producer;
// `ProducerMode` decides that at creation.
unsafe impl Send for Ring {}
unsafe impl Sync for Ring {}

impl Ring {
    /// `size` must be a power of two; the ring holds `size - 1` entries.
    pub fn create(name: &str, size: u32, socket_id: i32, producer: ProducerMode) -> Result<Self> {
        let c_name = CString::new(name).map_err(|_| Errno::EINVAL)?;
        let flags = match producer {
            ProducerMode::Single => ffi::RING_F_SP_ENQ,
            ProducerMode::Multi => 0,
        };
        let ptr = unsafe { ffi::rte_ring_create(c_name.as_ptr(), size, socket_id, flags) };
        NonNull::new(ptr)
            .map(|inner| Ring {
                inner,
                name: name.to_string(),
            })
            .ok_or_else(rte_errno)
    }

    /// Entries currently queued.
    pub fn count(&self) -> u32 {
        unsafe { ffi::rust_ring_count(self.inner.as_ptr()) }
    }
}

impl FanoutRing for Ring {
    type Packet = Mbuf;

    fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    fn enqueue(&self, pkt: Mbuf) -> std::result::Result<Enqueued, Mbuf> {
        let ret =
            unsafe { ffi::rust_ring_enqueue(self.inner.as_ptr(), pkt.as_ptr() as *mut c_void) };
        if ret == 0 {
            let _ = pkt.into_raw();
            Ok(Enqueued::Accepted)
        } else if ret == -(Errno::EDQUOT as i32) {
            // stored, but above the watermark
            let _ = pkt.into_raw();
            Ok(Enqueued::OverQuota)
        } else {
            Err(pkt)
        }
    }
}

impl Drop for Ring {
    fn drop(&mut self) {
        unsafe { ffi::rte_ring_free(self.inner.as_ptr()) }
    }
}

impl std::fmt::Debug for Ring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ring")
            .field("name", &self.name)
            .field("count", &self.count())
            .finish()
    }
}

//! Lcore (logical core) APIs.
//!
//! DPDK lcores are EAL-managed threads pinned to specific CPU cores. The
//! main lcore coordinates; every worker lcore runs at most one launched
//! closure at a time.

use std::ffi::c_void;

use tapbr_sys::ffi;

use crate::api::{Result, check_neg_errno};
use crate::port::ContextId;

/// A handle to a DPDK logical core (lcore).
///
/// `Copy`, `Send` and `Sync`: it is only an id, not the thread itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lcore {
    id: u32,
}

impl Lcore {
    /// Handle for a known worker id, e.g. one taken from a
    /// [`QueuePlan`](crate::planner::QueuePlan).
    pub fn from_id(id: ContextId) -> Self {
        Self { id }
    }

    /// Worker lcores (excluding main) in id order.
    pub fn workers() -> LcoreIter {
        LcoreIter {
            current: u32::MAX,
            max: max_lcore(),
        }
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Run `f` on this lcore's thread. The lcore must be idle.
    pub fn launch<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() -> i32 + Send + 'static,
    {
        struct LaunchContext<F> {
            func: F,
        }

        unsafe extern "C" fn trampoline<F>(arg: *mut c_void) -> i32
        where
            F: FnOnce() -> i32 + Send,
        {
            let ctx = unsafe { Box::from_raw(arg as *mut LaunchContext<F>) };
            (ctx.func)()
        }

        let ctx = Box::new(LaunchContext { func: f });
        let arg = Box::into_raw(ctx) as *mut c_void;

        let ret = unsafe { ffi::rte_eal_remote_launch(Some(trampoline::<F>), arg, self.id) };
        if ret != 0 {
            // not launched, so the closure is still ours to drop
            unsafe { drop(Box::from_raw(arg as *mut LaunchContext<F>)) };
        }
        check_neg_errno(ret)
    }

    /// Block until the launched closure returns and yield its status.
    pub fn wait(&self) -> i32 {
        unsafe { ffi::rte_eal_wait_lcore(self.id) }
    }
}

/// `RTE_MAX_LCORE` of the linked DPDK build. `rte_get_next_lcore` returns
/// it once no enabled lcore is left.
pub fn max_lcore() -> u32 {
    unsafe { ffi::rust_rte_max_lcore() }
}

/// Iterator over worker lcores.
pub struct LcoreIter {
    current: u32,
    max: u32,
}

impl LcoreIter {
    fn accept(&mut self, next: u32) -> Option<Lcore> {
        if next >= self.max {
            None
        } else {
            self.current = next;
            Some(Lcore { id: next })
        }
    }
}

impl Iterator for LcoreIter {
    type Item = Lcore;

    fn next(&mut self) -> Option<Self::Item> {
        let next = unsafe { ffi::rte_get_next_lcore(self.current, 1, 0) };
        self.accept(next)
    }
}

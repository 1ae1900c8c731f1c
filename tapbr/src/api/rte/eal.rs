// rte EAL (Environment Abstraction Layer) API
// See: /usr/local/include/rte_eal.h

use std::ffi::{CString, c_char};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};

use tapbr_sys::ffi;
use tracing::info;

use crate::api::{Errno, Result, rte_errno};

/// Global flag to track if EAL has been initialized
static EAL_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// RAII guard for the EAL environment.
///
/// When dropped, calls `rte_eal_cleanup()`. EAL cannot be initialized again
/// within the same process after cleanup, so keep the guard alive for the
/// whole run and drop it only after every port, ring and pool is released.
pub struct Eal {
    // EAL is global state; the guard itself carries nothing.
    _marker: PhantomData<()>,
}

impl Eal {
    /// Initialize EAL from an argument vector whose first element is the
    /// program name.
    ///
    /// Returns `EALREADY` if a guard already exists and `EINVAL` if an
    /// argument contains a NUL byte.
    pub fn init<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<CString> = args
            .into_iter()
            .map(|s| CString::new(s.as_ref()).map_err(|_| Errno::EINVAL))
            .collect::<Result<_>>()?;

        if EAL_INITIALIZED.swap(true, Ordering::SeqCst) {
            return Err(Errno::EALREADY);
        }

        info!(args = ?args, "Initializing EAL");

        let argc = args.len() as i32;
        let mut argv: Vec<*mut c_char> = args.iter().map(|s| s.as_ptr() as *mut c_char).collect();
        argv.push(std::ptr::null_mut());

        let ret = unsafe { ffi::rte_eal_init(argc, argv.as_mut_ptr()) };
        if ret < 0 {
            // allow a retry with different arguments
            EAL_INITIALIZED.store(false, Ordering::SeqCst);
            return Err(rte_errno());
        }

        Ok(Eal {
            _marker: PhantomData,
        })
    }

    /// NUMA socket of the calling lcore.
    pub fn socket_id() -> i32 {
        unsafe { ffi::rte_socket_id() as i32 }
    }
}

impl Drop for Eal {
    fn drop(&mut self) {
        let _ = unsafe { ffi::rte_eal_cleanup() };
        EAL_INITIALIZED.store(false, Ordering::SeqCst);
    }
}

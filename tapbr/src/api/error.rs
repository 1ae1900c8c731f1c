use std::ffi::CStr;

use tapbr_sys::ffi;

pub type Errno = nix::errno::Errno;

/// Result type alias using nix's Errno for DPDK operations
pub type Result<T> = std::result::Result<T, Errno>;

pub fn rte_errno() -> Errno {
    let num = unsafe { ffi::rust_get_rte_errno() };
    Errno::from_raw(num)
}

/// Functions that return `-errno` directly instead of setting `rte_errno`.
pub fn check_neg_errno(ret: i32) -> Result<()> {
    if ret < 0 {
        Err(Errno::from_raw(-ret))
    } else {
        Ok(())
    }
}

/// DPDK's description of an error number, including its own codes above
/// the libc range.
pub fn rte_strerror(errno: Errno) -> String {
    let ptr = unsafe { ffi::rte_strerror(errno as i32) };
    if ptr.is_null() {
        return errno.to_string();
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neg_errno_maps_directly() {
        assert_eq!(check_neg_errno(-(Errno::ENOBUFS as i32)), Err(Errno::ENOBUFS));
        assert_eq!(check_neg_errno(0), Ok(()));
    }
}

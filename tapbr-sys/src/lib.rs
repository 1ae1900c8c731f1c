//! Raw DPDK bindings for tapbr.
//!
//! Only the handful of functions the bridge needs are declared. DPDK's
//! `static inline` fast-path functions (burst rx/tx, mbuf clone/free, ring
//! enqueue) are reached through the small C shim in `src/wrapper.c`, which
//! `build.rs` compiles when `libdpdk` is found by pkg-config.

#![allow(non_camel_case_types)]

pub mod ffi;

/// Whether the DPDK shim was compiled into this build.
pub const DPDK_LINKED: bool = cfg!(tapbr_dpdk);

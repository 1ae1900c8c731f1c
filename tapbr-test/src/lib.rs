//! Test support for tapbr: a software packet backend and bridge harness.

pub mod harness;
pub mod mem;

pub use harness::{MemBridge, MemLoop, MemOutput, init_tracing};
pub use mem::{MemPacket, MemPool, MemPort, MemQueue, MemRing};

use std::fmt;

use nix::errno::Errno;

use crate::port::PortId;

/// Error type for tapbr operations.
#[derive(Debug)]
pub enum Error {
    /// Queue count of zero was requested.
    InvalidQueueCount,
    /// Fewer worker contexts than queues.
    InsufficientCores { requested: u16, available: usize },
    /// A tunable that must be a power of two is not.
    NotPowerOfTwo { name: &'static str, value: u32 },
    /// A tunable that must be one less than a power of two is not.
    NotPowerOfTwoMinusOne { name: &'static str, value: u32 },
    /// A tunable exceeds its allowed range.
    OutOfRange {
        name: &'static str,
        value: u32,
        max: u32,
    },
    /// Tap output was combined with ring output flags.
    ConflictingOutput,
    /// The same port was given two roles.
    DuplicatePort(PortId),
    /// Ring output with zero rings.
    NoRings,
    /// A ring name is longer than DPDK accepts.
    RingNameTooLong { name: String, max: usize },
    /// Burst size outside `1..=MAX_BURST_SIZE`.
    InvalidBurstSize(usize),
    /// A queue handle was given to a loop owning a different queue index.
    QueueMismatch { expected: u16, found: u16 },
    /// Not enough ports for the configured output mode.
    InsufficientPorts { required: u16, available: u16 },
    /// A configured port id does not exist.
    NoSuchPort { port: PortId, available: u16 },
    /// A port cannot provide the configured number of queues.
    TooManyQueues {
        port: PortId,
        requested: u16,
        max: u16,
    },
    /// A DPDK call failed.
    Dpdk { op: &'static str, errno: Errno },
    /// A worker lcore returned a non-zero status.
    WorkerFailed { lcore: u32, code: i32 },
    /// Operation needs a feature this build does not have.
    Unsupported(&'static str),
    /// Socket or thread I/O failed.
    Io(std::io::Error),
    /// HTTP transport failed.
    Http(hyper::Error),
    /// HTTP request could not be built.
    Request(hyper::http::Error),
    /// Control plane answered with a non-success status.
    HttpStatus(hyper::StatusCode),
    /// Control plane answer could not be decoded.
    Decode(serde_json::Error),
    /// The control-plane thread panicked.
    ControlPlanePanicked,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidQueueCount => write!(f, "queue count must be at least 1"),
            Error::InsufficientCores {
                requested,
                available,
            } => write!(
                f,
                "{requested} queues requested but only {available} worker lcores available"
            ),
            Error::NotPowerOfTwo { name, value } => {
                write!(f, "{name} must be a power of two, got {value}")
            }
            Error::NotPowerOfTwoMinusOne { name, value } => {
                write!(f, "{name} must be a power of two minus one, got {value}")
            }
            Error::OutOfRange { name, value, max } => {
                write!(f, "{name} must be at most {max}, got {value}")
            }
            Error::ConflictingOutput => {
                write!(f, "tap port cannot be combined with ring output options")
            }
            Error::DuplicatePort(port) => write!(f, "port {port} is used more than once"),
            Error::NoRings => write!(f, "ring output needs at least one ring"),
            Error::RingNameTooLong { name, max } => {
                write!(f, "ring name {name:?} is longer than {max} bytes")
            }
            Error::InvalidBurstSize(n) => write!(f, "invalid burst size {n}"),
            Error::QueueMismatch { expected, found } => {
                write!(f, "queue handle {found} given to loop for queue {expected}")
            }
            Error::InsufficientPorts {
                required,
                available,
            } => write!(
                f,
                "{required} ports required but only {available} available"
            ),
            Error::NoSuchPort { port, available } => {
                write!(f, "port {port} does not exist ({available} ports available)")
            }
            Error::TooManyQueues {
                port,
                requested,
                max,
            } => write!(
                f,
                "port {port} supports at most {max} queues, {requested} requested"
            ),
            Error::Dpdk { op, errno } => write!(f, "{op} failed: {errno}"),
            Error::WorkerFailed { lcore, code } => {
                write!(f, "worker on lcore {lcore} exited with status {code}")
            }
            Error::Unsupported(what) => write!(f, "unsupported: {what}"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Request(e) => write!(f, "HTTP request error: {e}"),
            Error::HttpStatus(s) => write!(f, "control plane returned {s}"),
            Error::Decode(e) => write!(f, "decode error: {e}"),
            Error::ControlPlanePanicked => write!(f, "control plane thread panicked"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Dpdk { errno, .. } => Some(errno),
            Error::Io(e) => Some(e),
            Error::Http(e) => Some(e),
            Error::Request(e) => Some(e),
            Error::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<hyper::Error> for Error {
    fn from(e: hyper::Error) -> Self {
        Error::Http(e)
    }
}

impl From<hyper::http::Error> for Error {
    fn from(e: hyper::http::Error) -> Self {
        Error::Request(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e)
    }
}

/// Attach the failing DPDK operation name to an errno.
pub trait DpdkContext<T> {
    fn op(self, op: &'static str) -> Result<T>;
}

impl<T> DpdkContext<T> for std::result::Result<T, Errno> {
    fn op(self, op: &'static str) -> Result<T> {
        self.map_err(|errno| Error::Dpdk { op, errno })
    }
}

/// Result type alias for tapbr operations.
pub type Result<T> = std::result::Result<T, Error>;

mod error;
pub mod rte;

pub use error::{Errno, Result, check_neg_errno, rte_errno, rte_strerror};

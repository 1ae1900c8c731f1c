//! Cooperative termination.
//!
//! Workers read the flag at the top of every poll iteration. The signal
//! handler is its only writer in production.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::info;

/// Shared "stop now" flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    inner: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.inner.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_triggered(&self) -> bool {
        self.inner.load(Ordering::Relaxed)
    }

    /// Resolve once the flag is set, checking every `poll`.
    pub async fn wait(&self, poll: Duration) {
        while !self.is_triggered() {
            tokio::time::sleep(poll).await;
        }
    }
}

/// Route SIGINT and SIGTERM to `flag`.
///
/// Only one handler can be installed per process.
pub fn install_signal_handler(flag: &ShutdownFlag) -> Result<(), ctrlc::Error> {
    let flag = flag.clone();
    ctrlc::set_handler(move || {
        info!("Received termination signal, shutting down");
        flag.trigger();
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let a = ShutdownFlag::new();
        let b = a.clone();
        assert!(!b.is_triggered());
        a.trigger();
        assert!(b.is_triggered());
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn wait_returns_after_trigger() {
        let flag = ShutdownFlag::new();
        let setter = flag.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            setter.trigger();
        });
        flag.wait(Duration::from_millis(100)).await;
        assert!(flag.is_triggered());
    }
}

//! Signal handling for graceful shutdown.
//!
//! SIGINT (Ctrl-C) and SIGTERM both set a shared stop flag. The run loop
//! checks the flag between passes, so a pass in progress always finishes.

use nix::sys::signal::Signal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};

/// Cooperative stop request shared between signal listeners and the loop.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Register SIGINT and SIGTERM listeners that set `stop`.
///
/// Must be called from within a tokio runtime.
pub fn install(stop: &StopFlag) -> std::io::Result<()> {
    for sig in [Signal::SIGINT, Signal::SIGTERM] {
        let mut stream = signal(SignalKind::from_raw(sig as i32))?;
        let stop = stop.clone();
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                tracing::warn!(signal = %sig, "received signal, stopping after current pass");
                stop.request();
            }
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn flag_starts_unset_and_is_shared() {
        let stop = StopFlag::new();
        let other = stop.clone();
        assert!(!stop.is_set());
        other.request();
        assert!(stop.is_set());
    }

    #[tokio::test]
    async fn sigterm_sets_flag() {
        let stop = StopFlag::new();
        install(&stop).unwrap();

        nix::sys::signal::raise(Signal::SIGTERM).unwrap();

        for _ in 0..100 {
            if stop.is_set() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(stop.is_set());
    }
}

//! Cross-thread wake for the single-threaded event loop.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Something that can nudge the event loop from another thread.
pub trait LoopWaker: Send + Sync {
    fn wake(&self);
}

impl<W: LoopWaker + ?Sized> LoopWaker for Arc<W> {
    fn wake(&self) {
        (**self).wake()
    }
}

/// Coalescing wake flag: any number of [`wake`](LoopWaker::wake) calls before
/// the loop observes them collapse into one.
#[derive(Default)]
pub struct WakeSignal {
    pending: Mutex<bool>,
    cond: Condvar,
}

impl WakeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes a pending wake without waiting.
    pub fn take(&self) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *pending)
    }

    /// Waits up to `timeout` for a wake and consumes it.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut pending, _) = self
            .cond
            .wait_timeout_while(pending, timeout, |p| !*p)
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *pending)
    }
}

impl LoopWaker for WakeSignal {
    fn wake(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        *pending = true;
        self.cond.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn wakes_coalesce() {
        let w = WakeSignal::new();
        w.wake();
        w.wake();
        w.wake();
        assert!(w.take());
        assert!(!w.take());
    }

    #[test]
    fn wait_times_out_without_wake() {
        let w = WakeSignal::new();
        assert!(!w.wait_timeout(Duration::from_millis(5)));
    }

    #[test]
    fn wait_returns_on_remote_wake() {
        let w = Arc::new(WakeSignal::new());
        let remote = Arc::clone(&w);
        let handle = thread::spawn(move || remote.wake());
        assert!(w.wait_timeout(Duration::from_secs(10)));
        handle.join().unwrap();
    }
}

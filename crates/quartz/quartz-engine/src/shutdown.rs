use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Process-wide stop request shared by every thread.
///
/// Cloning is cheap; all clones observe the same flag. [`Shutdown::sleep`]
/// returns early when the flag is raised, so timed waits never delay a stop.
#[derive(Clone, Default)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    flag: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.inner.flag.store(true, Ordering::Release);
        let _guard = self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.inner.wake.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.flag.load(Ordering::Acquire)
    }

    /// The raw flag, for waits that park on another condition variable.
    pub fn flag(&self) -> &AtomicBool {
        &self.inner.flag
    }

    /// Sleeps for `dur` or until triggered. Returns `true` if triggered.
    pub fn sleep(&self, dur: Duration) -> bool {
        let guard = self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let _guard = self
            .inner
            .wake
            .wait_timeout_while(guard, dur, |_| !self.is_triggered())
            .unwrap_or_else(PoisonError::into_inner);
        self.is_triggered()
    }
}

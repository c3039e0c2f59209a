//! Wait queue for blocking on a vertical sync event.
//!
//! A caller arms the queue, publishes that it is waiting, then blocks in
//! `wait()`. The vsync interrupt calls `wake_all()`. The wait is a bounded
//! poll driven by the caller's delay provider; there is no cancellation.

use core::sync::atomic::{fence, AtomicBool, AtomicUsize, Ordering};

use embedded_hal::delay::DelayNs;

/// A simple wait queue for blocking operations.
///
/// Callers use `arm()` + `wait()` to block until `wake_all()` is called.
pub struct WaitQueue {
    /// Flag indicating a wakeup has occurred
    wakeup_pending: AtomicBool,
    /// Number of callers currently waiting
    waiters: AtomicUsize,
}

impl WaitQueue {
    /// Create a new wait queue
    pub const fn new() -> Self {
        Self {
            wakeup_pending: AtomicBool::new(false),
            waiters: AtomicUsize::new(0),
        }
    }

    /// Forget any stale wakeup.
    ///
    /// Must be called before the waiting condition is published, otherwise a
    /// wakeup that lands between the two would be lost.
    pub fn arm(&self) {
        self.wakeup_pending.store(false, Ordering::Release);
    }

    /// Wait until notified or timeout.
    ///
    /// Polls once per millisecond using `delay`.
    ///
    /// ## Returns
    /// * `true` if woken by notification
    /// * `false` if timeout expired
    pub fn wait<D: DelayNs>(&self, timeout_ms: u32, delay: &mut D) -> bool {
        self.waiters.fetch_add(1, Ordering::SeqCst);

        let mut elapsed = 0;
        let woken = loop {
            if self.wakeup_pending.swap(false, Ordering::Acquire) {
                break true;
            }
            if elapsed >= timeout_ms {
                break false;
            }

            fence(Ordering::SeqCst);
            delay.delay_ms(1);
            elapsed += 1;
        };

        self.waiters.fetch_sub(1, Ordering::SeqCst);
        woken
    }

    /// Wake all waiting callers.
    pub fn wake_all(&self) {
        self.wakeup_pending.store(true, Ordering::Release);

        // Memory fence ensures the wakeup is visible
        fence(Ordering::SeqCst);
    }

    /// Check if there are waiters (for debugging)
    pub fn has_waiters(&self) -> bool {
        self.waiters.load(Ordering::Relaxed) > 0
    }
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

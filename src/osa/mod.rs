//! Minimal OS-abstraction pieces shared by host drivers.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::err::{SdmmcError, SdmmcResult};
use crate::host::HostOps;

/// Binary completion signal, created in the taken state.
///
/// The classic driver shape: the command path arms its interrupt
/// sources and blocks in [`wait`](Completion::wait); the ISR latches
/// the peripheral status word, masks the edge-sensitive sources it
/// cannot clear, clears the rest, and calls
/// [`signal`](Completion::signal) exactly once. A signal delivered
/// before the waiter arrives is retained; signalling an
/// already-signalled completion is idempotent.
#[derive(Debug)]
pub struct Completion {
    signalled: AtomicBool,
}

impl Completion {
    pub const fn new() -> Self {
        Completion { signalled: AtomicBool::new(false) }
    }

    /// Release the waiter. Safe to call from interrupt context.
    pub fn signal(&self) {
        self.signalled.store(true, Ordering::Release);
    }

    /// Block until signalled, consuming the signal.
    pub fn wait(&self) {
        while self
            .signalled
            .compare_exchange(true, false, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }
    }

    /// Block until signalled or until `timeout_ms` elapses on the
    /// driver clock. Consumes the signal on success.
    pub fn wait_timeout(&self, timeout_ms: u32, clock: &dyn HostOps) -> SdmmcResult {
        let start = clock.now_ms();
        while self
            .signalled
            .compare_exchange(true, false, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            if clock.now_ms().wrapping_sub(start) > timeout_ms {
                return Err(SdmmcError::Timeout);
            }
            core::hint::spin_loop();
        }
        Ok(())
    }

    /// Consume the signal if present, without blocking.
    pub fn try_wait(&self) -> bool {
        self.signalled
            .compare_exchange(true, false, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }
}

impl Default for Completion {
    fn default() -> Self {
        Completion::new()
    }
}

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, MutexGuard};

use crate::error::MonitorError;
use crate::monitor::{Monitor, MonitorCore, OwnerState};

#[cfg(test)]
thread_local! {
    /// Fault-injection point between condition wakeup and monitor
    /// reacquisition; consumed on use.
    static WAKE_HOOK: std::cell::Cell<Option<fn()>> = const { std::cell::Cell::new(None) };
}

fn wake_hook() {
    #[cfg(test)]
    if let Some(hook) = WAKE_HOOK.with(|h| h.take()) {
        hook();
    }
}

/// A condition variable bound to exactly one [`Monitor`].
///
/// Waiting releases the monitor completely, whatever the reentrancy depth,
/// blocks until signaled, broadcast, or timed out, and reacquires the monitor
/// to the same depth before returning. The classic monitor contract applies:
/// a returning `wait` says nothing about the predicate, so callers loop and
/// re-check it while still holding the monitor.
///
/// Created by [`Monitor::new_cond`]; meaningless detached from its monitor.
pub struct CondVar {
    monitor: Monitor,
    cond: Condvar,
}

impl CondVar {
    pub(crate) fn new(monitor: Monitor) -> Self {
        CondVar {
            monitor,
            cond: Condvar::new(),
        }
    }

    /// Blocks until [`signal`](CondVar::signal) or
    /// [`broadcast`](CondVar::broadcast) wakes this thread.
    ///
    /// Fails with [`MonitorError::NotOwner`] when the calling thread does not
    /// hold the monitor; otherwise always returns `Ok(true)`.
    pub fn wait(&self) -> Result<bool, MonitorError> {
        self.wait_internal(None)
    }

    /// Like [`wait`](CondVar::wait) with an upper bound on the block. A wait
    /// that times out still returns `Ok(true)` with the monitor re-held at
    /// the original depth; only the caller's own predicate can tell the two
    /// wakeups apart.
    pub fn wait_for(&self, timeout: Duration) -> Result<bool, MonitorError> {
        self.wait_internal(Some(timeout))
    }

    fn wait_internal(&self, timeout: Option<Duration>) -> Result<bool, MonitorError> {
        let core = self.monitor.core();
        let mut state = core.state.lock();
        let depth = core.release_all_for_wait(&mut state)?;

        // The state mutex is held from the release above through the block
        // below, so a signal sent after we released the monitor cannot be
        // missed.
        match timeout {
            Some(timeout) => {
                // Expiry is deliberately not surfaced to the caller.
                let _ = self.cond.wait_for(&mut state, timeout);
            }
            None => self.cond.wait(&mut state),
        }

        // From here on the monitor must end up re-held at the saved depth no
        // matter how control leaves this frame, so the reacquisition lives in
        // a drop guard.
        let restore = ReacquireOnDrop {
            core,
            state: Some(state),
            depth,
        };
        wake_hook();
        drop(restore);
        Ok(true)
    }

    /// Wakes one thread blocked in `wait` on this condition variable.
    pub fn signal(&self) {
        self.cond.notify_one();
    }

    /// Wakes every thread blocked in `wait` on this condition variable.
    pub fn broadcast(&self) {
        self.cond.notify_all();
    }
}

struct ReacquireOnDrop<'a> {
    core: &'a Arc<MonitorCore>,
    state: Option<MutexGuard<'a, OwnerState>>,
    depth: usize,
}

impl Drop for ReacquireOnDrop<'_> {
    fn drop(&mut self) {
        if let Some(mut state) = self.state.take() {
            self.core.reacquire_after_wait(&mut state, self.depth);
        }
    }
}

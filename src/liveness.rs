//! Per-thread bookkeeping of held monitors.
//!
//! A thread that dies without matching every `enter` with an `exit` must not
//! wedge the monitor forever. Rust threads run their thread-local destructors
//! on the way out, whether they returned or unwound, so the recovery path
//! lives in the destructor of a thread-local set of currently-owned monitors:
//! any monitor still attributed to the dying thread is reset to the unlocked
//! state and its blocked acquirers are woken.

use std::cell::RefCell;
use std::sync::Arc;
use std::thread::{current, ThreadId};

use crate::monitor::MonitorCore;

thread_local! {
    static HELD: RefCell<HeldSet> = RefCell::new(HeldSet::empty());
}

struct HeldSet {
    /// Captured on first registration. `thread::current` is not usable from
    /// a thread-local destructor, so the id must be taken while the thread
    /// is still live.
    id: Option<ThreadId>,
    monitors: Vec<Arc<MonitorCore>>,
}

impl HeldSet {
    fn empty() -> Self {
        HeldSet {
            id: None,
            monitors: Vec::new(),
        }
    }
}

impl Drop for HeldSet {
    fn drop(&mut self) {
        let id = match self.id {
            Some(id) => id,
            None => return,
        };

        for core in self.monitors.drain(..) {
            core.release_dead_owner(id);
        }
    }
}

/// Records that the current thread took ownership of `core` (the 0 -> 1
/// depth transition, or the reacquire half of a condition wait).
pub(crate) fn register(core: &Arc<MonitorCore>) {
    // try_with: registration from within another thread-local destructor is
    // skipped rather than aborting the process.
    let _ = HELD.try_with(|held| {
        let mut held = held.borrow_mut();
        if held.id.is_none() {
            held.id = Some(current().id());
        }
        held.monitors.push(Arc::clone(core));
    });
}

/// Records that the current thread gave up ownership of `core` (the 1 -> 0
/// depth transition, or the release half of a condition wait).
pub(crate) fn unregister(core: &Arc<MonitorCore>) {
    let _ = HELD.try_with(|held| {
        let mut held = held.borrow_mut();
        if let Some(pos) = held.monitors.iter().position(|m| Arc::ptr_eq(m, core)) {
            held.monitors.swap_remove(pos);
        }
    });
}

#[cfg(test)]
mod tests {
    use crate::monitor::Monitor;
    use std::thread;

    #[test]
    fn dead_thread_releases_every_held_monitor() {
        let a = Monitor::new();
        let b = Monitor::new();

        let th = {
            let a = a.clone();
            let b = b.clone();
            thread::spawn(move || {
                a.enter();
                b.enter();
                b.enter();
                panic!("die holding two monitors");
            })
        };
        assert!(th.join().is_err());

        a.enter();
        a.exit().unwrap();
        assert!(b.try_enter());
        b.exit().unwrap();
        assert!(!a.is_locked());
        assert!(!b.is_locked());
    }
}

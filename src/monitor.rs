use std::fmt;
use std::mem::take;
use std::sync::{Arc, OnceLock};
use std::thread::{current, ThreadId};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::condvar::CondVar;
use crate::error::MonitorError;
use crate::liveness;

/// Mutable monitor state. Only ever read or written while holding
/// `MonitorCore::state`, so every enter/exit transition is observed in a
/// single total order by all threads.
#[derive(Default)]
pub(crate) struct OwnerState {
    /// Thread currently holding the monitor, if any.
    pub(crate) owner: Option<ThreadId>,
    /// Nested `enter` calls by `owner` not yet matched by `exit`.
    /// Zero exactly when `owner` is `None`.
    pub(crate) depth: usize,
}

/// The state machine shared by a [`Monitor`] handle and every [`CondVar`]
/// created from it.
///
/// `state` doubles as the lock that condition variables block against, so it
/// must remain the same object for the monitor's whole lifetime no matter
/// when a condition variable is created.
pub(crate) struct MonitorCore {
    pub(crate) state: Mutex<OwnerState>,
    /// Threads blocked in `enter`, or reacquiring after a condition wait,
    /// park here. Notified on every release of ownership.
    pub(crate) acquire: Condvar,
}

impl MonitorCore {
    fn new() -> Arc<Self> {
        Arc::new(MonitorCore {
            state: Mutex::new(OwnerState::default()),
            acquire: Condvar::new(),
        })
    }

    fn enter(self: &Arc<Self>) {
        let me = current().id();
        let mut state = self.state.lock();

        if state.owner == Some(me) {
            state.depth += 1;
            return;
        }

        while state.owner.is_some() {
            self.acquire.wait(&mut state);
        }

        state.owner = Some(me);
        state.depth = 1;
        liveness::register(self);
    }

    fn try_enter(self: &Arc<Self>) -> bool {
        let me = current().id();
        let mut state = self.state.lock();

        if state.owner == Some(me) {
            state.depth += 1;
            return true;
        }

        if state.owner.is_none() {
            state.owner = Some(me);
            state.depth = 1;
            liveness::register(self);
            return true;
        }

        false
    }

    fn exit(self: &Arc<Self>) -> Result<(), MonitorError> {
        let mut state = self.state.lock();
        check_owner(&state)?;

        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            liveness::unregister(self);
            self.acquire.notify_one();
        }

        Ok(())
    }

    fn is_locked(&self) -> bool {
        self.state.lock().owner.is_some()
    }

    fn is_owned(&self) -> bool {
        self.state.lock().owner == Some(current().id())
    }

    /// Full release for a condition wait: zeroes the depth, wakes one blocked
    /// acquirer, and returns the depth that [`reacquire_after_wait`] must
    /// restore. The caller keeps holding `guard` so the release and the
    /// subsequent condition block form one atomic step.
    ///
    /// [`reacquire_after_wait`]: MonitorCore::reacquire_after_wait
    pub(crate) fn release_all_for_wait(
        self: &Arc<Self>,
        guard: &mut MutexGuard<'_, OwnerState>,
    ) -> Result<usize, MonitorError> {
        check_owner(guard)?;

        let depth = take(&mut guard.depth);
        guard.owner = None;
        liveness::unregister(self);
        self.acquire.notify_one();
        Ok(depth)
    }

    /// Restores ownership at `depth` for the current thread once its
    /// condition wait has returned, blocking until the monitor is free. Sets
    /// the depth directly instead of going through the increment-by-one path.
    pub(crate) fn reacquire_after_wait(
        self: &Arc<Self>,
        guard: &mut MutexGuard<'_, OwnerState>,
        depth: usize,
    ) {
        while guard.owner.is_some() {
            self.acquire.wait(guard);
        }

        guard.owner = Some(current().id());
        guard.depth = depth;
        liveness::register(self);
    }

    /// Recovery path run from thread-local teardown when a thread dies while
    /// owning this monitor. Conditional on the owner still being the dead
    /// thread, so a cleanup that races with a normal `exit` cannot release
    /// twice.
    pub(crate) fn release_dead_owner(&self, dead: ThreadId) {
        let mut state = self.state.lock();
        if state.owner == Some(dead) {
            state.owner = None;
            state.depth = 0;
            self.acquire.notify_all();
        }
    }
}

pub(crate) fn check_owner(state: &OwnerState) -> Result<(), MonitorError> {
    if state.owner == Some(current().id()) {
        Ok(())
    } else {
        Err(MonitorError::NotOwner)
    }
}

/// A reentrant mutual-exclusion lock with attached condition-variable
/// support.
///
/// The thread holding the monitor may enter it again without blocking; the
/// monitor is released once `exit` has matched every `enter`. `Monitor` is a
/// cheap-to-clone handle and clones share one lock, so a type that wants
/// monitor behavior embeds a `Monitor` (or a [`MonitorSlot`]) as a field and
/// brackets its critical sections with [`synchronize`](Monitor::synchronize).
#[derive(Clone)]
pub struct Monitor {
    core: Arc<MonitorCore>,
}

impl Monitor {
    pub fn new() -> Self {
        Monitor {
            core: MonitorCore::new(),
        }
    }

    /// Blocks until the monitor is free or already held by the calling
    /// thread, then takes one level of ownership.
    pub fn enter(&self) {
        self.core.enter();
    }

    /// Non-blocking [`enter`](Monitor::enter). Returns `false`, leaving
    /// owner and depth untouched, when another thread holds the monitor.
    pub fn try_enter(&self) -> bool {
        self.core.try_enter()
    }

    /// Releases one level of ownership, unlocking the monitor and waking one
    /// blocked acquirer when the last level is released.
    ///
    /// Fails with [`MonitorError::NotOwner`] when the calling thread does
    /// not hold the monitor.
    pub fn exit(&self) -> Result<(), MonitorError> {
        self.core.exit()
    }

    /// Whether any thread holds the monitor. A point-in-time snapshot: the
    /// answer was true at some instant during the call and may be stale by
    /// the time the caller acts on it.
    pub fn is_locked(&self) -> bool {
        self.core.is_locked()
    }

    /// Whether the calling thread holds the monitor.
    pub fn is_owned(&self) -> bool {
        self.core.is_owned()
    }

    /// Runs `body` while holding the monitor, releasing on every path out of
    /// it. An unwinding body still releases before the panic continues.
    pub fn synchronize<R>(&self, body: impl FnOnce() -> R) -> R {
        self.core.enter();
        let _release = ExitOnDrop { core: &self.core };
        body()
    }

    /// Creates a condition variable bound to this monitor.
    pub fn new_cond(&self) -> CondVar {
        CondVar::new(self.clone())
    }

    pub(crate) fn core(&self) -> &Arc<MonitorCore> {
        &self.core
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Monitor::new()
    }
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.core.state.lock();
        f.debug_struct("Monitor")
            .field("owner", &state.owner)
            .field("depth", &state.depth)
            .finish()
    }
}

/// Releases one level of the monitor when dropped; the unwind path of
/// [`Monitor::synchronize`].
struct ExitOnDrop<'a> {
    core: &'a Arc<MonitorCore>,
}

impl Drop for ExitOnDrop<'_> {
    fn drop(&mut self) {
        // The enclosing synchronize entered on this thread, so the owner
        // check cannot fail.
        let _ = self.core.exit();
    }
}

/// Deferred monitor storage for embedding in a type whose construction
/// should not pay for a monitor it may never use.
///
/// [`monitor`](MonitorSlot::monitor) creates the monitor on first use;
/// [`init`](MonitorSlot::init) creates it eagerly and reports misuse when
/// monitor state is already live.
#[derive(Debug, Default)]
pub struct MonitorSlot {
    cell: OnceLock<Monitor>,
}

impl MonitorSlot {
    pub const fn new() -> Self {
        MonitorSlot {
            cell: OnceLock::new(),
        }
    }

    /// Eagerly installs a fresh monitor. Fails with
    /// [`MonitorError::AlreadyInitialized`] when one exists, whether from an
    /// earlier `init` or from lazy creation.
    pub fn init(&self) -> Result<&Monitor, MonitorError> {
        let mut fresh = false;
        let monitor = self.cell.get_or_init(|| {
            fresh = true;
            Monitor::new()
        });

        if fresh {
            Ok(monitor)
        } else {
            Err(MonitorError::AlreadyInitialized)
        }
    }

    /// The slot's monitor, created on first use.
    pub fn monitor(&self) -> &Monitor {
        self.cell.get_or_init(Monitor::new)
    }
}

use thiserror::Error;

/// Monitor misuse reported to the caller.
///
/// Both variants indicate a programming error at the call site rather than a
/// timing race, so they are raised synchronously and never retried or
/// swallowed inside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MonitorError {
    /// An owner-only operation (`exit` or a condition wait) was invoked by a
    /// thread that does not currently hold the monitor.
    #[error("current thread not owner")]
    NotOwner,

    /// [`MonitorSlot::init`](crate::monitor::MonitorSlot::init) was called
    /// while the slot already holds a live monitor.
    #[error("already initialized")]
    AlreadyInitialized,
}

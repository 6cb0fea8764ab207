//! A reentrant mutual-exclusion monitor in the classic monitor-pattern
//! shape: a lock the owning thread may enter again without blocking, plus
//! condition variables that release the monitor while waiting and restore the
//! prior reentrancy depth before the waiter resumes.
//!
//! A thread that dies while holding a monitor, at any depth, does not wedge
//! it: ownership is reset through a guaranteed-cleanup path at thread exit
//! and blocked acquirers are woken.
//!
//! ```
//! use reentrant_monitor::Monitor;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::thread;
//!
//! let monitor = Monitor::new();
//! let cond = monitor.new_cond();
//! let ready = AtomicBool::new(false);
//!
//! thread::scope(|s| {
//!     s.spawn(|| {
//!         monitor.synchronize(|| {
//!             ready.store(true, Ordering::Relaxed);
//!             cond.signal();
//!         });
//!     });
//!
//!     monitor.synchronize(|| {
//!         while !ready.load(Ordering::Relaxed) {
//!             cond.wait().unwrap();
//!         }
//!     });
//! });
//! ```

pub mod condvar;
pub mod error;
mod liveness;
pub mod monitor;

pub use condvar::CondVar;
pub use error::MonitorError;
pub use monitor::{Monitor, MonitorSlot};

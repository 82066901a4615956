//! Native synchronization primitives behind one portable interface.
//!
//! Wraps the platform threading model directly — pthreads on Unix, SRW
//! locks / condition variables / Win32 threads on Windows — instead of
//! introducing a scheduler of its own. All waits are indefinite; blocking
//! calls block the native thread that made them.
//!
//! [`Mutex`] and [`Condvar`] are designed for cross-thread use. Every other
//! handle in this crate has single-owner semantics: create it, use it from
//! the owning context, destroy or join it exactly once.

pub mod error;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

pub use error::{Result, SyncError};

#[cfg(unix)]
pub use unix::{current_thread_id, spawn, Condvar, JoinHandle, Mutex, MutexGuard};
#[cfg(windows)]
pub use windows::{current_thread_id, spawn, Condvar, JoinHandle, Mutex, MutexGuard};

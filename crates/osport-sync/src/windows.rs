use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::ptr;

use windows_sys::Win32::Foundation::{CloseHandle, GetLastError, HANDLE, WAIT_OBJECT_0};
use windows_sys::Win32::System::Threading::{
    AcquireSRWLockExclusive, CreateThread, GetCurrentThreadId, InitializeSRWLock,
    ReleaseSRWLockExclusive, WaitForSingleObject, INFINITE, SRWLOCK,
};

use crate::error::{Result, SyncError};

fn fatal(call: &str, code: u32) -> ! {
    tracing::error!(call, code, "unrecoverable sync primitive failure");
    std::process::abort();
}

/// A slim reader/writer lock used in exclusive mode.
pub struct Mutex {
    inner: Box<UnsafeCell<SRWLOCK>>,
}

// SAFETY: SRW locks are cross-thread primitives; the cell is only touched
// through the Win32 calls.
unsafe impl Send for Mutex {}
unsafe impl Sync for Mutex {}

impl Mutex {
    pub fn new() -> Self {
        let inner = Box::new(UnsafeCell::new(SRWLOCK {
            Ptr: ptr::null_mut(),
        }));
        // SAFETY: `inner` points to writable, stable storage.
        unsafe { InitializeSRWLock(inner.get()) };
        Self { inner }
    }

    /// Lock, blocking indefinitely. The returned guard unlocks on drop.
    pub fn lock(&self) -> MutexGuard<'_> {
        // SAFETY: the lock was initialized in `new` and outlives the guard.
        unsafe { AcquireSRWLockExclusive(self.inner.get()) };
        MutexGuard {
            mutex: self,
            _not_send: PhantomData,
        }
    }

    fn raw(&self) -> *mut SRWLOCK {
        self.inner.get()
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII lock ownership. Unlocks when dropped; release must happen on the
/// acquiring thread, so the guard is `!Send`.
pub struct MutexGuard<'a> {
    mutex: &'a Mutex,
    _not_send: PhantomData<*const ()>,
}

impl Drop for MutexGuard<'_> {
    fn drop(&mut self) {
        // SAFETY: this guard holds the lock exclusively.
        unsafe { ReleaseSRWLockExclusive(self.mutex.raw()) };
    }
}

#[cfg(not(feature = "legacy-events"))]
mod condvar {
    use std::cell::UnsafeCell;
    use std::ptr;

    use windows_sys::Win32::System::Threading::{
        InitializeConditionVariable, SleepConditionVariableSRW, WakeAllConditionVariable,
        WakeConditionVariable, CONDITION_VARIABLE, INFINITE,
    };

    use super::{fatal, MutexGuard};
    use windows_sys::Win32::Foundation::GetLastError;

    /// A native Win32 condition variable paired with the SRW mutex.
    pub struct Condvar {
        inner: Box<UnsafeCell<CONDITION_VARIABLE>>,
    }

    // SAFETY: Win32 condition variables are cross-thread primitives.
    unsafe impl Send for Condvar {}
    unsafe impl Sync for Condvar {}

    impl Condvar {
        pub fn new() -> Self {
            let inner = Box::new(UnsafeCell::new(CONDITION_VARIABLE {
                Ptr: ptr::null_mut(),
            }));
            // SAFETY: `inner` points to writable, stable storage.
            unsafe { InitializeConditionVariable(inner.get()) };
            Self { inner }
        }

        /// Atomically release the guarded mutex and block until signaled,
        /// then re-acquire before returning. Spurious wakeups are permitted;
        /// callers must re-check their predicate.
        pub fn wait<'a>(&self, guard: MutexGuard<'a>) -> MutexGuard<'a> {
            // SAFETY: the guard proves the SRW lock is held exclusively by
            // this thread, as SleepConditionVariableSRW requires.
            let ok = unsafe {
                SleepConditionVariableSRW(self.inner.get(), guard.mutex.raw(), INFINITE, 0)
            };
            if ok == 0 {
                // SAFETY: no preconditions.
                fatal("SleepConditionVariableSRW", unsafe { GetLastError() });
            }
            guard
        }

        /// Wake one waiter.
        pub fn signal(&self) {
            // SAFETY: condvar initialized in `new`.
            unsafe { WakeConditionVariable(self.inner.get()) };
        }

        /// Wake all waiters.
        pub fn broadcast(&self) {
            // SAFETY: condvar initialized in `new`.
            unsafe { WakeAllConditionVariable(self.inner.get()) };
        }
    }

    impl Default for Condvar {
        fn default() -> Self {
            Self::new()
        }
    }
}

#[cfg(feature = "legacy-events")]
mod condvar {
    use std::ptr;

    use windows_sys::Win32::Foundation::{CloseHandle, GetLastError, HANDLE};
    use windows_sys::Win32::System::Threading::{
        CreateEventW, SetEvent, WaitForSingleObject, INFINITE,
    };

    use super::{fatal, MutexGuard};

    /// Event-based condition wait for targets without a native condition
    /// variable.
    ///
    /// The release-then-wait sequence is NOT atomic: a signal delivered
    /// between the unlock and the event wait is missed and the waiter blocks
    /// until the next one. No native primitive on these targets closes that
    /// window without extra sequencing this crate does not provide. Callers
    /// that cannot tolerate a lost wakeup must signal under the same mutex
    /// and re-signal after state changes.
    pub struct Condvar {
        event: HANDLE,
    }

    // SAFETY: event handles are process-global kernel objects.
    unsafe impl Send for Condvar {}
    unsafe impl Sync for Condvar {}

    impl Condvar {
        pub fn new() -> Self {
            // SAFETY: no preconditions; auto-reset, initially unsignaled.
            let event = unsafe { CreateEventW(ptr::null(), 0, 0, ptr::null()) };
            if event.is_null() {
                // SAFETY: no preconditions.
                fatal("CreateEventW", unsafe { GetLastError() });
            }
            Self { event }
        }

        pub fn wait<'a>(&self, guard: MutexGuard<'a>) -> MutexGuard<'a> {
            let mutex = guard.mutex;
            drop(guard);
            // Unlock-to-wait gap: see the type-level caveat.
            // SAFETY: `event` is a live handle owned by self.
            unsafe { WaitForSingleObject(self.event, INFINITE) };
            mutex.lock()
        }

        pub fn signal(&self) {
            // SAFETY: `event` is a live handle owned by self.
            unsafe { SetEvent(self.event) };
        }

        /// The auto-reset event releases a single waiter, so broadcast
        /// degrades to signal on this backend.
        pub fn broadcast(&self) {
            self.signal();
        }
    }

    impl Drop for Condvar {
        fn drop(&mut self) {
            // SAFETY: handle owned exclusively by self.
            unsafe { CloseHandle(self.event) };
        }
    }

    impl Default for Condvar {
        fn default() -> Self {
            Self::new()
        }
    }
}

pub use condvar::Condvar;

/// A joinable native thread.
pub struct JoinHandle {
    handle: HANDLE,
}

// SAFETY: thread handles may be waited on from any thread.
unsafe impl Send for JoinHandle {}

impl JoinHandle {
    /// Block until the thread finishes, then release the handle.
    ///
    /// A failed native wait is reported once and not retried.
    pub fn join(self) -> Result<()> {
        // SAFETY: `handle` came from a successful CreateThread and is waited
        // on at most once (join consumes the handle).
        let rc = unsafe { WaitForSingleObject(self.handle, INFINITE) };
        // SAFETY: handle owned exclusively by self.
        unsafe { CloseHandle(self.handle) };
        if rc != WAIT_OBJECT_0 {
            // SAFETY: no preconditions.
            let code = unsafe { GetLastError() };
            tracing::error!(code, "WaitForSingleObject on thread failed");
            return Err(SyncError::Join(code as i32));
        }
        Ok(())
    }
}

unsafe extern "system" fn thread_trampoline(arg: *mut core::ffi::c_void) -> u32 {
    // SAFETY: `arg` was produced by Box::into_raw in `spawn` and is consumed
    // exactly once, here.
    let entry = unsafe { Box::from_raw(arg.cast::<Box<dyn FnOnce() + Send>>()) };
    entry();
    0
}

/// Spawn a native thread running `entry`.
pub fn spawn<F>(entry: F) -> Result<JoinHandle>
where
    F: FnOnce() + Send + 'static,
{
    let boxed: Box<dyn FnOnce() + Send> = Box::new(entry);
    let arg = Box::into_raw(Box::new(boxed));

    // SAFETY: the trampoline takes sole ownership of `arg` on success.
    let handle = unsafe {
        CreateThread(
            ptr::null(),
            0,
            Some(thread_trampoline),
            arg.cast(),
            0,
            ptr::null_mut(),
        )
    };
    if handle.is_null() {
        // SAFETY: on failure the trampoline never ran; reclaim the closure.
        drop(unsafe { Box::from_raw(arg) });
        // SAFETY: no preconditions.
        let code = unsafe { GetLastError() };
        return Err(SyncError::Spawn(code as i32));
    }
    Ok(JoinHandle { handle })
}

/// Identity of the calling thread, as the platform reports it.
pub fn current_thread_id() -> u64 {
    // SAFETY: no preconditions.
    u64::from(unsafe { GetCurrentThreadId() })
}

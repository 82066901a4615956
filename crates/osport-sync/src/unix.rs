use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::mem;
use std::ptr;

use crate::error::{Result, SyncError};

/// Abort on a failed lock primitive call; continuing with a broken lock
/// would corrupt whatever state the lock protects.
fn fatal(call: &str, code: i32) -> ! {
    tracing::error!(call, code, "unrecoverable sync primitive failure");
    std::process::abort();
}

/// A native pthread mutex.
///
/// The raw `pthread_mutex_t` is boxed so its address stays stable for the
/// lifetime of the wrapper, which pthreads requires.
pub struct Mutex {
    inner: Box<UnsafeCell<libc::pthread_mutex_t>>,
}

// SAFETY: pthread mutexes are made for cross-thread lock/unlock; the raw
// cell is only touched through pthread calls.
unsafe impl Send for Mutex {}
unsafe impl Sync for Mutex {}

impl Mutex {
    pub fn new() -> Self {
        let inner = Box::new(UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER));
        // SAFETY: `inner` points to writable, stable storage; default attrs.
        let rc = unsafe { libc::pthread_mutex_init(inner.get(), ptr::null()) };
        if rc != 0 {
            fatal("pthread_mutex_init", rc);
        }
        Self { inner }
    }

    /// Lock, blocking indefinitely. The returned guard unlocks on drop.
    pub fn lock(&self) -> MutexGuard<'_> {
        // SAFETY: the mutex was initialized in `new` and outlives the guard.
        let rc = unsafe { libc::pthread_mutex_lock(self.inner.get()) };
        if rc != 0 {
            fatal("pthread_mutex_lock", rc);
        }
        MutexGuard {
            mutex: self,
            _not_send: PhantomData,
        }
    }

    fn raw(&self) -> *mut libc::pthread_mutex_t {
        self.inner.get()
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Mutex {
    fn drop(&mut self) {
        // SAFETY: exclusive access; nobody can hold a guard while we drop.
        unsafe {
            libc::pthread_mutex_destroy(self.inner.get());
        }
    }
}

/// RAII lock ownership. Unlocks when dropped.
///
/// pthreads requires unlock on the locking thread, so the guard is `!Send`.
pub struct MutexGuard<'a> {
    mutex: &'a Mutex,
    _not_send: PhantomData<*const ()>,
}

impl Drop for MutexGuard<'_> {
    fn drop(&mut self) {
        // SAFETY: this guard holds the lock.
        let rc = unsafe { libc::pthread_mutex_unlock(self.mutex.raw()) };
        if rc != 0 {
            fatal("pthread_mutex_unlock", rc);
        }
    }
}

/// A native pthread condition variable.
pub struct Condvar {
    inner: Box<UnsafeCell<libc::pthread_cond_t>>,
}

// SAFETY: as for Mutex; pthread condvars are cross-thread by contract.
unsafe impl Send for Condvar {}
unsafe impl Sync for Condvar {}

impl Condvar {
    pub fn new() -> Self {
        let inner = Box::new(UnsafeCell::new(libc::PTHREAD_COND_INITIALIZER));
        // SAFETY: `inner` points to writable, stable storage; default attrs.
        let rc = unsafe { libc::pthread_cond_init(inner.get(), ptr::null()) };
        if rc != 0 {
            fatal("pthread_cond_init", rc);
        }
        Self { inner }
    }

    /// Atomically release the guarded mutex and block until signaled, then
    /// re-acquire before returning. Callers must re-check their predicate:
    /// spurious wakeups are permitted by the platform.
    pub fn wait<'a>(&self, guard: MutexGuard<'a>) -> MutexGuard<'a> {
        // SAFETY: the guard proves the mutex is locked by this thread, which
        // is exactly the state pthread_cond_wait requires.
        let rc = unsafe { libc::pthread_cond_wait(self.inner.get(), guard.mutex.raw()) };
        if rc != 0 {
            fatal("pthread_cond_wait", rc);
        }
        guard
    }

    /// Wake one waiter.
    pub fn signal(&self) {
        // SAFETY: condvar initialized in `new`.
        let rc = unsafe { libc::pthread_cond_signal(self.inner.get()) };
        if rc != 0 {
            fatal("pthread_cond_signal", rc);
        }
    }

    /// Wake all waiters.
    pub fn broadcast(&self) {
        // SAFETY: condvar initialized in `new`.
        let rc = unsafe { libc::pthread_cond_broadcast(self.inner.get()) };
        if rc != 0 {
            fatal("pthread_cond_broadcast", rc);
        }
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Condvar {
    fn drop(&mut self) {
        // SAFETY: exclusive access; no waiter can be blocked on a condvar
        // that is being dropped without a dangling reference existing first.
        unsafe {
            libc::pthread_cond_destroy(self.inner.get());
        }
    }
}

/// A joinable native thread.
///
/// Dropping the handle without joining leaves the thread running and its
/// exit status unreaped, mirroring a raw `pthread_t`.
pub struct JoinHandle {
    thread: libc::pthread_t,
}

impl JoinHandle {
    /// Block until the thread finishes.
    ///
    /// A failed native join is reported once and not retried.
    pub fn join(self) -> Result<()> {
        // SAFETY: `thread` came from a successful pthread_create and is
        // joined at most once (join consumes the handle).
        let rc = unsafe { libc::pthread_join(self.thread, ptr::null_mut()) };
        if rc != 0 {
            tracing::error!(code = rc, "pthread_join failed");
            return Err(SyncError::Join(rc));
        }
        Ok(())
    }
}

extern "C" fn thread_trampoline(arg: *mut libc::c_void) -> *mut libc::c_void {
    // SAFETY: `arg` was produced by Box::into_raw in `spawn` and is consumed
    // exactly once, here.
    let entry = unsafe { Box::from_raw(arg.cast::<Box<dyn FnOnce() + Send>>()) };
    entry();
    ptr::null_mut()
}

/// Spawn a native thread running `entry`.
pub fn spawn<F>(entry: F) -> Result<JoinHandle>
where
    F: FnOnce() + Send + 'static,
{
    let boxed: Box<dyn FnOnce() + Send> = Box::new(entry);
    let arg = Box::into_raw(Box::new(boxed));

    // SAFETY: `thread` is a valid out-pointer; the trampoline takes sole
    // ownership of `arg` on success.
    let mut thread: libc::pthread_t = unsafe { mem::zeroed() };
    let rc = unsafe {
        libc::pthread_create(
            &mut thread,
            ptr::null(),
            thread_trampoline,
            arg.cast::<libc::c_void>(),
        )
    };
    if rc != 0 {
        // SAFETY: on failure the trampoline never ran; reclaim the closure.
        drop(unsafe { Box::from_raw(arg) });
        return Err(SyncError::Spawn(rc));
    }
    Ok(JoinHandle { thread })
}

/// Identity of the calling thread, as the platform reports it.
pub fn current_thread_id() -> u64 {
    // SAFETY: pthread_self has no preconditions.
    unsafe { libc::pthread_self() as u64 }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn critical_sections_serialize() {
        let mutex = Arc::new(Mutex::new());
        let in_critical = Arc::new(AtomicBool::new(false));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let mutex = mutex.clone();
            let in_critical = in_critical.clone();
            let overlaps = overlaps.clone();
            let handle = spawn(move || {
                for _ in 0..50 {
                    let guard = mutex.lock();
                    if in_critical.swap(true, Ordering::SeqCst) {
                        overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    std::thread::sleep(Duration::from_micros(20));
                    in_critical.store(false, Ordering::SeqCst);
                    drop(guard);
                }
            })
            .expect("thread should spawn");
            handles.push(handle);
        }
        for handle in handles {
            handle.join().expect("thread should join");
        }

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }

    struct Flag {
        mutex: Mutex,
        cond: Condvar,
        ready: AtomicBool,
    }

    #[test]
    fn condvar_wait_observes_signal() {
        let flag = Arc::new(Flag {
            mutex: Mutex::new(),
            cond: Condvar::new(),
            ready: AtomicBool::new(false),
        });

        let waiter_flag = flag.clone();
        let waiter = spawn(move || {
            let mut guard = waiter_flag.mutex.lock();
            while !waiter_flag.ready.load(Ordering::SeqCst) {
                guard = waiter_flag.cond.wait(guard);
            }
            drop(guard);
        })
        .expect("waiter should spawn");

        std::thread::sleep(Duration::from_millis(20));
        {
            let _guard = flag.mutex.lock();
            flag.ready.store(true, Ordering::SeqCst);
            flag.cond.signal();
        }

        waiter.join().expect("waiter should join");
    }

    #[test]
    fn broadcast_wakes_every_waiter() {
        let flag = Arc::new(Flag {
            mutex: Mutex::new(),
            cond: Condvar::new(),
            ready: AtomicBool::new(false),
        });
        let woken = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let flag = flag.clone();
            let woken = woken.clone();
            let handle = spawn(move || {
                let mut guard = flag.mutex.lock();
                while !flag.ready.load(Ordering::SeqCst) {
                    guard = flag.cond.wait(guard);
                }
                drop(guard);
                woken.fetch_add(1, Ordering::SeqCst);
            })
            .expect("waiter should spawn");
            handles.push(handle);
        }

        std::thread::sleep(Duration::from_millis(20));
        {
            let _guard = flag.mutex.lock();
            flag.ready.store(true, Ordering::SeqCst);
            flag.cond.broadcast();
        }

        for handle in handles {
            handle.join().expect("waiter should join");
        }
        assert_eq!(woken.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn thread_ids_differ_across_threads() {
        let main_id = current_thread_id();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        let handle = spawn(move || {
            if current_thread_id() != main_id {
                seen_clone.store(1, Ordering::SeqCst);
            }
        })
        .expect("thread should spawn");
        handle.join().expect("thread should join");
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}

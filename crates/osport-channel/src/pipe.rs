//! Named pipe backend.
//!
//! Accepting on a named pipe has no timeout or interrupt of its own, so
//! every accept issues an overlapped `ConnectNamedPipe` and waits on two
//! triggers at once: the connect completion event and a waker event raised
//! by server close. Each accepted connection takes ownership of the
//! connected pipe instance; the server immediately provisions a fresh
//! instance and keeps listening.

use std::io::{Read, Write};
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

use tracing::{debug, info, warn};

use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, ERROR_BROKEN_PIPE, ERROR_IO_PENDING, ERROR_PIPE_CONNECTED,
    GENERIC_READ, GENERIC_WRITE, HANDLE, INVALID_HANDLE_VALUE, WAIT_OBJECT_0,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, FlushFileBuffers, ReadFile, WriteFile, FILE_FLAG_FIRST_PIPE_INSTANCE,
    FILE_FLAG_OVERLAPPED, OPEN_EXISTING, PIPE_ACCESS_DUPLEX,
};
use windows_sys::Win32::System::Pipes::{
    ConnectNamedPipe, CreateNamedPipeW, PIPE_READMODE_BYTE, PIPE_TYPE_BYTE,
    PIPE_UNLIMITED_INSTANCES, PIPE_WAIT,
};
use windows_sys::Win32::System::Threading::{
    CreateEventW, ResetEvent, SetEvent, WaitForMultipleObjects, INFINITE,
};
use windows_sys::Win32::System::IO::{CancelIo, GetOverlappedResult, OVERLAPPED};

use crate::error::{ChannelError, Result};
use crate::name::channel_address;
use crate::stream::Channel;

const PIPE_BUFFER_SIZE: u32 = 32 * 1024;

/// An owned pipe handle, closed on drop.
struct OwnedPipe(HANDLE);

// SAFETY: pipe handles are process-global kernel objects.
unsafe impl Send for OwnedPipe {}

impl Drop for OwnedPipe {
    fn drop(&mut self) {
        // SAFETY: handle owned exclusively by self.
        unsafe { CloseHandle(self.0) };
    }
}

/// Process-wide accept interrupt: one manual-reset event per in-flight
/// accept, all raised by any server close.
struct AcceptInterrupt {
    wakers: Mutex<Vec<(u64, HANDLE)>>,
    next_id: AtomicU64,
}

// SAFETY: event handles are process-global kernel objects; access to the
// registry is serialized by the mutex.
unsafe impl Send for AcceptInterrupt {}
unsafe impl Sync for AcceptInterrupt {}

static INTERRUPT: OnceLock<AcceptInterrupt> = OnceLock::new();

fn interrupt() -> &'static AcceptInterrupt {
    INTERRUPT.get_or_init(|| AcceptInterrupt {
        wakers: Mutex::new(Vec::new()),
        next_id: AtomicU64::new(1),
    })
}

impl AcceptInterrupt {
    fn register(&'static self) -> std::io::Result<Waiter> {
        // SAFETY: no preconditions; manual-reset, initially unsignaled.
        let event = unsafe { CreateEventW(ptr::null(), 1, 0, ptr::null()) };
        if event.is_null() {
            return Err(std::io::Error::last_os_error());
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.wakers
            .lock()
            .expect("waker registry poisoned")
            .push((id, event));
        Ok(Waiter { id, event })
    }

    fn raise_all(&self) {
        let wakers = self.wakers.lock().expect("waker registry poisoned");
        for (_, event) in wakers.iter() {
            // SAFETY: registered events stay live until unregistered.
            unsafe { SetEvent(*event) };
        }
    }

    fn unregister(&self, id: u64) {
        self.wakers
            .lock()
            .expect("waker registry poisoned")
            .retain(|(entry, _)| *entry != id);
    }
}

struct Waiter {
    id: u64,
    event: HANDLE,
}

impl Waiter {
    /// Clear a wake that turned out to belong to some other server.
    fn reset(&self) {
        // SAFETY: `event` is a live handle owned by self.
        unsafe { ResetEvent(self.event) };
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        interrupt().unregister(self.id);
        // SAFETY: `event` is a live handle owned by self.
        unsafe { CloseHandle(self.event) };
    }
}

fn wide(address: &str) -> Vec<u16> {
    address.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Named pipe server backend.
pub(crate) struct PipeServer {
    name: String,
    address_w: Vec<u16>,
    /// The next unconnected pipe instance, provisioned ahead of accept.
    pending: Mutex<Option<OwnedPipe>>,
    closed: AtomicBool,
}

impl PipeServer {
    pub(crate) fn bind(name: &str) -> Result<Self> {
        let address = channel_address(name);
        let address_w = wide(&address);

        // The first instance claims the namespace entry exclusively; a
        // second live listener fails here, mapping to the bind error.
        let first = create_instance(&address_w, true).map_err(|e| ChannelError::Bind {
            name: name.to_string(),
            source: e,
        })?;

        info!(name, address, "channel server listening");

        Ok(Self {
            name: name.to_string(),
            address_w,
            pending: Mutex::new(Some(first)),
            closed: AtomicBool::new(false),
        })
    }

    /// Block until a client connects or this server is closed.
    pub(crate) fn accept(&self) -> Result<Channel> {
        let waiter = interrupt().register().map_err(ChannelError::Accept)?;

        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Err(ChannelError::Cancelled);
            }

            let instance = {
                let mut pending = self.pending.lock().expect("pending instance poisoned");
                match pending.take() {
                    Some(instance) => instance,
                    None => create_instance(&self.address_w, false).map_err(ChannelError::Accept)?,
                }
            };

            match self.connect_instance(instance, &waiter)? {
                Some(connected) => {
                    // Provision the replacement so the listener keeps
                    // listening while this connection is serviced.
                    match create_instance(&self.address_w, false) {
                        Ok(next) => {
                            *self.pending.lock().expect("pending instance poisoned") = Some(next);
                        }
                        Err(err) => warn!(name = %self.name, %err, "failed to provision next pipe instance"),
                    }
                    debug!(name = %self.name, "accepted channel connection");
                    return Ok(Channel::from_pipe(PipeStream { handle: connected }));
                }
                // Foreign wake; re-enter the wait.
                None => continue,
            }
        }
    }

    /// Drive one overlapped connect on `instance`. Returns the connected
    /// instance, or None when the wait was interrupted by a wake that was
    /// not for this server.
    fn connect_instance(&self, instance: OwnedPipe, waiter: &Waiter) -> Result<Option<OwnedPipe>> {
        // SAFETY: no preconditions; manual-reset, initially unsignaled.
        let connect_event = unsafe { CreateEventW(ptr::null(), 1, 0, ptr::null()) };
        if connect_event.is_null() {
            return Err(ChannelError::Accept(std::io::Error::last_os_error()));
        }
        let connect_event = OwnedPipe(connect_event);

        // SAFETY: zeroed OVERLAPPED with a live event handle is the
        // documented initial state for an overlapped connect.
        let mut overlapped: OVERLAPPED = unsafe { mem::zeroed() };
        overlapped.hEvent = connect_event.0;

        // SAFETY: `instance` is a live, unconnected pipe handle created
        // with FILE_FLAG_OVERLAPPED; `overlapped` outlives the operation.
        let rc = unsafe { ConnectNamedPipe(instance.0, &mut overlapped) };
        if rc == 0 {
            // SAFETY: no preconditions.
            match unsafe { GetLastError() } {
                ERROR_PIPE_CONNECTED => return Ok(Some(instance)),
                ERROR_IO_PENDING => {}
                _ => return Err(ChannelError::Accept(std::io::Error::last_os_error())),
            }

            let handles = [connect_event.0, waiter.event];
            // SAFETY: both handles are live for the duration of the wait.
            let waited =
                unsafe { WaitForMultipleObjects(2, handles.as_ptr(), 0, INFINITE) };

            if waited == WAIT_OBJECT_0 + 1 {
                // Interrupt wake. Abandon the pending connect and park the
                // instance again; the loop decides whether to cancel.
                // SAFETY: `instance` is the handle the overlapped connect
                // was issued on.
                unsafe { CancelIo(instance.0) };
                if self.closed.load(Ordering::SeqCst) {
                    return Err(ChannelError::Cancelled);
                }
                waiter.reset();
                *self.pending.lock().expect("pending instance poisoned") = Some(instance);
                return Ok(None);
            }
            if waited != WAIT_OBJECT_0 {
                return Err(ChannelError::Accept(std::io::Error::last_os_error()));
            }

            let mut transferred = 0u32;
            // SAFETY: the overlapped operation on `instance` has completed;
            // `overlapped` is the structure it was issued with.
            let ok =
                unsafe { GetOverlappedResult(instance.0, &overlapped, &mut transferred, 0) };
            if ok == 0 {
                return Err(ChannelError::Accept(std::io::Error::last_os_error()));
            }
        }

        Ok(Some(instance))
    }

    /// Close the server and wake in-flight accepts. Idempotent. The pipe
    /// namespace entry disappears with its last instance handle; there is
    /// no filesystem path to unlink.
    pub(crate) fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.pending
            .lock()
            .expect("pending instance poisoned")
            .take();
        interrupt().raise_all();
        info!(name = %self.name, "channel server closed");
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for PipeServer {
    fn drop(&mut self) {
        self.close();
    }
}

fn create_instance(address_w: &[u16], first: bool) -> std::io::Result<OwnedPipe> {
    let mut open_mode = PIPE_ACCESS_DUPLEX | FILE_FLAG_OVERLAPPED;
    if first {
        open_mode |= FILE_FLAG_FIRST_PIPE_INSTANCE;
    }
    // SAFETY: `address_w` is NUL-terminated; default security descriptor
    // restricts the pipe to the creating owner and system.
    let handle = unsafe {
        CreateNamedPipeW(
            address_w.as_ptr(),
            open_mode,
            PIPE_TYPE_BYTE | PIPE_READMODE_BYTE | PIPE_WAIT,
            PIPE_UNLIMITED_INSTANCES,
            PIPE_BUFFER_SIZE,
            PIPE_BUFFER_SIZE,
            0,
            ptr::null(),
        )
    };
    if handle == INVALID_HANDLE_VALUE {
        return Err(std::io::Error::last_os_error());
    }
    Ok(OwnedPipe(handle))
}

/// Connect to a listening pipe as a client.
pub(crate) fn connect(name: &str) -> Result<Channel> {
    let address = channel_address(name);
    let address_w = wide(&address);

    // SAFETY: `address_w` is NUL-terminated; no template or sharing.
    let handle = unsafe {
        CreateFileW(
            address_w.as_ptr(),
            GENERIC_READ | GENERIC_WRITE,
            0,
            ptr::null(),
            OPEN_EXISTING,
            0,
            ptr::null_mut(),
        )
    };
    if handle == INVALID_HANDLE_VALUE {
        return Err(ChannelError::Connect {
            name: name.to_string(),
            source: std::io::Error::last_os_error(),
        });
    }
    debug!(name, "connected to channel");
    Ok(Channel::from_pipe(PipeStream {
        handle: OwnedPipe(handle),
    }))
}

/// A connected pipe end.
pub(crate) struct PipeStream {
    handle: OwnedPipe,
}

impl Read for PipeStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut transferred = 0u32;
        // SAFETY: `buf` is valid for `buf.len()` writable bytes; the handle
        // is a live synchronous pipe end.
        let ok = unsafe {
            ReadFile(
                self.handle.0,
                buf.as_mut_ptr(),
                buf.len() as u32,
                &mut transferred,
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            // A peer that went away cleanly reads as end-of-stream, matching
            // the byte-stream contract of the socket backend.
            // SAFETY: no preconditions.
            return match unsafe { GetLastError() } {
                ERROR_BROKEN_PIPE => Ok(0),
                _ => Err(std::io::Error::last_os_error()),
            };
        }
        Ok(transferred as usize)
    }
}

impl Write for PipeStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut transferred = 0u32;
        // SAFETY: `buf` is valid for `buf.len()` readable bytes; the handle
        // is a live synchronous pipe end.
        let ok = unsafe {
            WriteFile(
                self.handle.0,
                buf.as_ptr(),
                buf.len() as u32,
                &mut transferred,
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(transferred as usize)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        // SAFETY: the handle is a live pipe end.
        let ok = unsafe { FlushFileBuffers(self.handle.0) };
        if ok == 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }
}

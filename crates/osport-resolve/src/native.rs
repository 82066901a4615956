use std::ffi::CString;
use std::ptr;

use crate::error::{ResolveError, Result};
use crate::sys;

/// Call the platform resolver. Returns the raw result chain; the caller
/// owns it and must hand it to an [`crate::AddrList`] (or free it natively).
pub(crate) fn native_getaddrinfo(
    node: Option<&str>,
    service: Option<&str>,
    hints: &sys::addrinfo,
) -> Result<*mut sys::addrinfo> {
    let node_c = node
        .map(CString::new)
        .transpose()
        .map_err(|_| ResolveError::InvalidQuery)?;
    let service_c = service
        .map(CString::new)
        .transpose()
        .map_err(|_| ResolveError::InvalidQuery)?;

    let mut head: *mut sys::addrinfo = ptr::null_mut();
    // SAFETY: pointers are null or NUL-terminated strings live across the
    // call; `head` is a valid out-pointer.
    let rc = unsafe {
        sys::getaddrinfo(
            node_c.as_ref().map_or(ptr::null(), |c| c.as_ptr()),
            service_c.as_ref().map_or(ptr::null(), |c| c.as_ptr()),
            hints,
            &mut head,
        )
    };
    if rc != 0 {
        return Err(ResolveError::Lookup {
            node: node.map(str::to_string),
            service: service.map(str::to_string),
            code: rc,
            message: sys::gai_message(rc),
        });
    }
    Ok(head)
}

/// The production deallocator for natively-allocated chains.
///
/// # Safety
/// `head` must be a chain (or prefix of one, properly terminated) returned
/// by the native resolver, or null, and must not be freed again.
pub(crate) unsafe fn native_free(head: *mut sys::addrinfo) {
    // SAFETY: forwarded contract.
    unsafe { sys::freeaddrinfo(head) }
}

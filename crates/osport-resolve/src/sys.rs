//! Platform resolver types and constants under one set of names.

#[cfg(unix)]
mod imp {
    pub(crate) use libc::{
        addrinfo, c_char, c_int, sockaddr, sockaddr_storage, socklen_t, AF_INET, AF_INET6,
        AF_UNSPEC, AI_ALL, AI_NUMERICHOST, AI_NUMERICSERV, AI_V4MAPPED, NI_NUMERICHOST,
        NI_NUMERICSERV, SOCK_DGRAM, SOCK_STREAM,
    };

    /// # Safety
    /// Standard `getaddrinfo` contract: pointers must be null or valid,
    /// `res` must be a valid out-pointer.
    pub(crate) unsafe fn getaddrinfo(
        node: *const c_char,
        service: *const c_char,
        hints: *const addrinfo,
        res: *mut *mut addrinfo,
    ) -> c_int {
        // SAFETY: forwarded contract.
        unsafe { libc::getaddrinfo(node, service, hints, res) }
    }

    /// # Safety
    /// `head` must be a chain returned by the native resolver, or null.
    pub(crate) unsafe fn freeaddrinfo(head: *mut addrinfo) {
        if !head.is_null() {
            // SAFETY: forwarded contract.
            unsafe { libc::freeaddrinfo(head) }
        }
    }

    /// # Safety
    /// Standard `getnameinfo` contract.
    pub(crate) unsafe fn getnameinfo(
        sa: *const sockaddr,
        salen: socklen_t,
        host: *mut c_char,
        hostlen: socklen_t,
        service: *mut c_char,
        servicelen: socklen_t,
        flags: c_int,
    ) -> c_int {
        // SAFETY: forwarded contract.
        unsafe { libc::getnameinfo(sa, salen, host, hostlen, service, servicelen, flags) }
    }

    /// Diagnostic text for a resolver error code.
    pub(crate) fn gai_message(code: c_int) -> String {
        // SAFETY: gai_strerror returns a pointer to a static string for any
        // code value.
        let text = unsafe { std::ffi::CStr::from_ptr(libc::gai_strerror(code)) };
        text.to_string_lossy().into_owned()
    }
}

#[cfg(windows)]
mod imp {
    use windows_sys::Win32::Networking::WinSock as ws;

    pub(crate) use core::ffi::{c_char, c_int};

    pub(crate) type addrinfo = ws::ADDRINFOA;
    pub(crate) type sockaddr = ws::SOCKADDR;
    pub(crate) type sockaddr_storage = ws::SOCKADDR_STORAGE;
    pub(crate) type socklen_t = c_int;

    pub(crate) const AF_UNSPEC: c_int = ws::AF_UNSPEC as c_int;
    pub(crate) const AF_INET: c_int = ws::AF_INET as c_int;
    pub(crate) const AF_INET6: c_int = ws::AF_INET6 as c_int;
    pub(crate) const SOCK_STREAM: c_int = ws::SOCK_STREAM as c_int;
    pub(crate) const SOCK_DGRAM: c_int = ws::SOCK_DGRAM as c_int;
    pub(crate) const AI_ALL: c_int = ws::AI_ALL as c_int;
    pub(crate) const AI_NUMERICHOST: c_int = ws::AI_NUMERICHOST as c_int;
    pub(crate) const AI_NUMERICSERV: c_int = ws::AI_NUMERICSERV as c_int;
    pub(crate) const AI_V4MAPPED: c_int = ws::AI_V4MAPPED as c_int;
    pub(crate) const NI_NUMERICHOST: c_int = ws::NI_NUMERICHOST as c_int;
    pub(crate) const NI_NUMERICSERV: c_int = ws::NI_NUMERICSERV as c_int;

    /// # Safety
    /// Standard `getaddrinfo` contract.
    pub(crate) unsafe fn getaddrinfo(
        node: *const c_char,
        service: *const c_char,
        hints: *const addrinfo,
        res: *mut *mut addrinfo,
    ) -> c_int {
        // SAFETY: forwarded contract.
        unsafe { ws::getaddrinfo(node.cast(), service.cast(), hints, res) }
    }

    /// # Safety
    /// `head` must be a chain returned by the native resolver, or null.
    pub(crate) unsafe fn freeaddrinfo(head: *mut addrinfo) {
        if !head.is_null() {
            // SAFETY: forwarded contract.
            unsafe { ws::freeaddrinfo(head) }
        }
    }

    /// # Safety
    /// Standard `getnameinfo` contract.
    pub(crate) unsafe fn getnameinfo(
        sa: *const sockaddr,
        salen: socklen_t,
        host: *mut c_char,
        hostlen: socklen_t,
        service: *mut c_char,
        servicelen: socklen_t,
        flags: c_int,
    ) -> c_int {
        // SAFETY: forwarded contract.
        unsafe {
            ws::getnameinfo(
                sa,
                salen,
                host.cast(),
                hostlen as u32,
                service.cast(),
                servicelen as u32,
                flags,
            )
        }
    }

    /// Diagnostic text for a resolver error code. WinSock has no
    /// `gai_strerror` safe to call from multiple threads; report the code.
    pub(crate) fn gai_message(code: c_int) -> String {
        format!("resolver error {code}")
    }
}

pub(crate) use imp::*;

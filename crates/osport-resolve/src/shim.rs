//! Emulation of a compliant v4-mapped resolver.
//!
//! On the defect platforms the native resolver drops the v4-mapped request
//! on the floor. The emulation re-issues the query per family with the
//! unsupported flags stripped, keeps any native IPv6 records verbatim, and
//! rebuilds the IPv4 records as `::ffff:a.b.c.d` IPv6 records of its own.

use std::net::{SocketAddr, SocketAddrV6};
use std::ptr;

use tracing::debug;

use crate::error::Result;
use crate::list::{alloc_synthesized_node, AddrList};
use crate::native::native_getaddrinfo;
use crate::query::AddrQuery;
use crate::sys;

/// Resolve `query` as a compliant resolver would have.
///
/// The result chain is native IPv6 records (when the all-families flag
/// asked for them) followed by the synthesized run. An empty IPv6 pass
/// with a non-empty IPv4 pass is still a success; the consumed IPv4-only
/// chain is released here, since its contents were copied, not reused.
pub(crate) fn resolve_v4mapped(query: &AddrQuery) -> Result<AddrList> {
    debug!(node = ?query.node(), "native resolver ignores v4-mapped request; emulating");

    let mut hints = query.to_hints();
    // Remove the flags the native resolver mishandles.
    hints.ai_flags &= !(sys::AI_ALL | sys::AI_V4MAPPED);

    let mut native6: *mut sys::addrinfo = ptr::null_mut();
    if query.all_families_requested() {
        hints.ai_family = sys::AF_INET6;
        // A host with no IPv6 records is not an error for the combined
        // result; the IPv4 pass decides.
        native6 = native_getaddrinfo(query.node(), query.service(), &hints)
            .unwrap_or(ptr::null_mut());
    }

    hints.ai_family = sys::AF_INET;
    match native_getaddrinfo(query.node(), query.service(), &hints) {
        Ok(native4) => {
            let consumed = AddrList::new(native4);
            let synthesized = convert_to_v4mapped(&consumed);
            drop(consumed);
            Ok(AddrList::new(concat(native6, synthesized)))
        }
        Err(err) => {
            if native6.is_null() {
                Err(err)
            } else {
                Ok(AddrList::new(native6))
            }
        }
    }
}

/// Build a synthesized IPv6 record for every IPv4 record in `source`:
/// the standard mapped prefix ahead of the four address bytes, port
/// copied unchanged.
fn convert_to_v4mapped(source: &AddrList) -> *mut sys::addrinfo {
    let mut head: *mut sys::addrinfo = ptr::null_mut();
    let mut last: *mut sys::addrinfo = ptr::null_mut();

    for endpoint in source.iter() {
        let Some(SocketAddr::V4(v4)) = endpoint.socket_addr() else {
            continue;
        };
        let mapped = SocketAddrV6::new(v4.ip().to_ipv6_mapped(), v4.port(), 0, 0);
        let raw = endpoint.raw();
        let node = alloc_synthesized_node(
            sys::AF_INET6,
            raw.ai_socktype,
            raw.ai_protocol,
            &socket2::SockAddr::from(SocketAddr::V6(mapped)),
            0,
        );
        if last.is_null() {
            head = node;
        } else {
            // SAFETY: `last` is a live node allocated above.
            unsafe { (*last).ai_next = node };
        }
        last = node;
    }

    head
}

fn concat(a: *mut sys::addrinfo, b: *mut sys::addrinfo) -> *mut sys::addrinfo {
    if a.is_null() {
        return b;
    }
    // SAFETY: `a` is a live, exclusively owned chain.
    unsafe {
        let mut it = a;
        while !(*it).ai_next.is_null() {
            it = (*it).ai_next;
        }
        (*it).ai_next = b;
    }
    a
}

//! Numeric address/port text helpers.

use std::ffi::CStr;
use std::net::SocketAddr;

use tracing::warn;

use crate::error::{ResolveError, Result};
use crate::list::{AddrList, Endpoint};
use crate::native::native_getaddrinfo;
use crate::query::{AddrQuery, Family, SocketKind};
use crate::sys;

/// Placeholder substituted for an address that failed to stringify.
pub const INVALID_ADDRESS: &str = "invalid address";

const HOST_BUF: usize = 1025;
const SERVICE_BUF: usize = 32;

/// Numeric `(address, port)` text for an endpoint.
///
/// Fails with [`ResolveError::Format`] carrying the platform diagnostic
/// when the conversion call rejects the address.
pub fn endpoint_text(endpoint: &Endpoint<'_>) -> Result<(String, u16)> {
    let raw = endpoint.raw();
    let mut host = [0 as sys::c_char; HOST_BUF];
    let mut service = [0 as sys::c_char; SERVICE_BUF];

    // SAFETY: `ai_addr` points at `ai_addrlen` valid bytes for the lifetime
    // of the borrowed endpoint; both buffers are writable for their lengths.
    let rc = unsafe {
        sys::getnameinfo(
            raw.ai_addr,
            raw.ai_addrlen as sys::socklen_t,
            host.as_mut_ptr(),
            HOST_BUF as sys::socklen_t,
            service.as_mut_ptr(),
            SERVICE_BUF as sys::socklen_t,
            sys::NI_NUMERICHOST | sys::NI_NUMERICSERV,
        )
    };
    if rc != 0 {
        return Err(ResolveError::Format {
            code: rc,
            message: sys::gai_message(rc),
        });
    }

    // SAFETY: getnameinfo NUL-terminates both buffers on success.
    let host_text = unsafe { CStr::from_ptr(host.as_ptr()) }
        .to_string_lossy()
        .into_owned();
    // SAFETY: as above.
    let port = unsafe { CStr::from_ptr(service.as_ptr()) }
        .to_str()
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(0);

    Ok((host_text, port))
}

/// Infallible display form of an endpoint address, substituting
/// [`INVALID_ADDRESS`] when stringification fails.
pub fn endpoint_display(endpoint: &Endpoint<'_>) -> String {
    match endpoint_text(endpoint) {
        Ok((host, port)) => format!("{host}:{port}"),
        Err(err) => {
            warn!(%err, "address stringification failed");
            INVALID_ADDRESS.to_string()
        }
    }
}

/// Resolve a numeric address literal (with an optional numeric service)
/// into an endpoint chain, without consulting any name service.
pub fn parse_numeric(
    node: &str,
    service: Option<&str>,
    family: Family,
    kind: SocketKind,
) -> Result<AddrList> {
    let mut query = AddrQuery::new(node)
        .with_family(family)
        .with_kind(kind)
        .numeric_host(true);
    if let Some(service) = service {
        query = query.with_service(service).numeric_service(true);
    }
    // Literals need no defect handling; forward directly.
    let hints = query.to_hints();
    native_getaddrinfo(query.node(), query.service(), &hints).map(AddrList::new)
}

/// Whether an address is an IPv4 address carried in IPv6 mapped form.
pub fn is_v4_mapped(addr: &SocketAddr) -> bool {
    match addr {
        SocketAddr::V6(v6) => v6.ip().to_ipv4_mapped().is_some(),
        SocketAddr::V4(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    #[test]
    fn endpoint_text_round_trips_a_literal() {
        let list = parse_numeric("127.0.0.1", Some("8080"), Family::V4, SocketKind::Stream)
            .expect("literal should parse");
        let endpoint = list.iter().next().expect("one endpoint");
        let (host, port) = endpoint_text(&endpoint).expect("numeric conversion should work");
        assert_eq!(host, "127.0.0.1");
        assert_eq!(port, 8080);
    }

    #[test]
    fn endpoint_display_formats_v6() {
        let list = parse_numeric("::1", Some("53"), Family::V6, SocketKind::Datagram)
            .expect("literal should parse");
        let endpoint = list.iter().next().expect("one endpoint");
        assert_eq!(endpoint_display(&endpoint), "::1:53");
    }

    #[test]
    fn parse_numeric_rejects_hostnames() {
        let err = parse_numeric("localhost.example", None, Family::Unspec, SocketKind::Any)
            .expect_err("hostnames must not hit the resolver");
        assert!(matches!(err, ResolveError::Lookup { .. }));
    }

    #[test]
    fn v4_mapped_recognizer() {
        let mapped = SocketAddr::new(Ipv4Addr::new(192, 0, 2, 7).to_ipv6_mapped().into(), 1);
        assert!(is_v4_mapped(&mapped));

        let plain_v4 = SocketAddr::new(Ipv4Addr::new(192, 0, 2, 7).into(), 1);
        assert!(!is_v4_mapped(&plain_v4));

        let plain_v6 = SocketAddr::new(std::net::Ipv6Addr::LOCALHOST.into(), 1);
        assert!(!is_v4_mapped(&plain_v6));
    }
}

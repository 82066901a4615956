use crate::error::Result;
use crate::list::AddrList;
use crate::native::native_getaddrinfo;
use crate::query::{AddrQuery, Family};
use crate::shim;

/// Platforms whose native resolver accepts the v4-mapped request flag but
/// silently returns unmapped IPv4 records instead.
const NATIVE_IGNORES_V4MAPPED: bool = cfg!(any(target_os = "android", windows));

/// Resolve a query into an ordered endpoint chain.
///
/// On compliant platforms this is a direct forward to the native resolver.
/// On the defect platforms, a query that asks for v4-mapped results for a
/// family other than plain IPv4 is routed through the emulation instead
/// (see the crate docs); everywhere else the two paths are identical.
pub fn resolve(query: &AddrQuery) -> Result<AddrList> {
    if NATIVE_IGNORES_V4MAPPED && query.family() != Family::V4 && query.v4_mapped_requested() {
        return shim::resolve_v4mapped(query);
    }
    let hints = query.to_hints();
    native_getaddrinfo(query.node(), query.service(), &hints).map(AddrList::new)
}

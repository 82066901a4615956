//! Name resolution over the platform resolver, with a compatibility shim
//! for the IPv4-mapped-IPv6 defect.
//!
//! Some platform resolvers (bionic, WinSock) accept the "map IPv4 results
//! into IPv6 space" request flag but silently ignore it and hand back plain
//! IPv4 records. [`resolve`] detects that case and emulates a compliant
//! resolver: it re-queries per family and synthesizes the `::ffff:a.b.c.d`
//! records the caller asked for.
//!
//! The price of the emulation is a result chain of mixed provenance —
//! records allocated by the native resolver spliced together with records
//! allocated here. [`AddrList`] owns that chain and releases each run
//! through its matching deallocator; callers never inspect provenance to
//! free a result.

pub mod error;

mod list;
mod native;
mod query;
mod resolver;
mod shim;
mod sys;
mod text;

pub use error::{ResolveError, Result};
pub use list::{AddrList, Endpoint, Endpoints, Provenance};
pub use query::{AddrQuery, Family, SocketKind};
pub use resolver::resolve;
pub use text::{endpoint_display, endpoint_text, is_v4_mapped, parse_numeric, INVALID_ADDRESS};

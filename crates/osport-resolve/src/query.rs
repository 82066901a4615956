use std::mem;

use crate::sys;

/// Address family selector for a resolution query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Family {
    /// Any family the resolver can produce.
    #[default]
    Unspec,
    V4,
    V6,
}

impl Family {
    pub(crate) fn to_raw(self) -> sys::c_int {
        match self {
            Family::Unspec => sys::AF_UNSPEC,
            Family::V4 => sys::AF_INET,
            Family::V6 => sys::AF_INET6,
        }
    }

    pub(crate) fn from_raw(raw: sys::c_int) -> Self {
        if raw == sys::AF_INET {
            Family::V4
        } else if raw == sys::AF_INET6 {
            Family::V6
        } else {
            Family::Unspec
        }
    }
}

/// Socket type hint for a resolution query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SocketKind {
    /// No preference; the resolver may return one record per type.
    #[default]
    Any,
    Stream,
    Datagram,
}

impl SocketKind {
    pub(crate) fn to_raw(self) -> sys::c_int {
        match self {
            SocketKind::Any => 0,
            SocketKind::Stream => sys::SOCK_STREAM,
            SocketKind::Datagram => sys::SOCK_DGRAM,
        }
    }

    pub(crate) fn from_raw(raw: sys::c_int) -> Self {
        if raw == sys::SOCK_STREAM {
            SocketKind::Stream
        } else if raw == sys::SOCK_DGRAM {
            SocketKind::Datagram
        } else {
            SocketKind::Any
        }
    }
}

/// One resolution request.
///
/// ```
/// use osport_resolve::{AddrQuery, Family, SocketKind};
///
/// let query = AddrQuery::new("localhost")
///     .with_service("5060")
///     .with_family(Family::Unspec)
///     .with_kind(SocketKind::Datagram)
///     .v4_mapped(true);
/// assert!(query.v4_mapped_requested());
/// ```
#[derive(Clone, Debug, Default)]
pub struct AddrQuery {
    node: Option<String>,
    service: Option<String>,
    family: Family,
    kind: SocketKind,
    numeric_host: bool,
    numeric_service: bool,
    all_families: bool,
    v4_mapped: bool,
}

impl AddrQuery {
    /// Query for a hostname or literal address.
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: Some(node.into()),
            ..Self::default()
        }
    }

    /// Query with no node (service/port lookup only).
    pub fn service_only(service: impl Into<String>) -> Self {
        Self {
            service: Some(service.into()),
            ..Self::default()
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn with_family(mut self, family: Family) -> Self {
        self.family = family;
        self
    }

    pub fn with_kind(mut self, kind: SocketKind) -> Self {
        self.kind = kind;
        self
    }

    /// The node is a numeric literal; never consult a name service.
    pub fn numeric_host(mut self, on: bool) -> Self {
        self.numeric_host = on;
        self
    }

    /// The service is a numeric port; never consult the services database.
    pub fn numeric_service(mut self, on: bool) -> Self {
        self.numeric_service = on;
        self
    }

    /// Request records for all families, not just configured ones.
    pub fn all_families(mut self, on: bool) -> Self {
        self.all_families = on;
        self
    }

    /// Request IPv4 results mapped into IPv6 space (`::ffff:a.b.c.d`).
    pub fn v4_mapped(mut self, on: bool) -> Self {
        self.v4_mapped = on;
        self
    }

    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn kind(&self) -> SocketKind {
        self.kind
    }

    pub fn all_families_requested(&self) -> bool {
        self.all_families
    }

    pub fn v4_mapped_requested(&self) -> bool {
        self.v4_mapped
    }

    /// Build the native hints structure, with every requested flag set.
    pub(crate) fn to_hints(&self) -> sys::addrinfo {
        // SAFETY: addrinfo is a plain C struct; all-zero is its documented
        // empty-hints state.
        let mut hints: sys::addrinfo = unsafe { mem::zeroed() };
        hints.ai_family = self.family.to_raw();
        hints.ai_socktype = self.kind.to_raw();
        let mut flags = 0;
        if self.numeric_host {
            flags |= sys::AI_NUMERICHOST;
        }
        if self.numeric_service {
            flags |= sys::AI_NUMERICSERV;
        }
        if self.all_families {
            flags |= sys::AI_ALL;
        }
        if self.v4_mapped {
            flags |= sys::AI_V4MAPPED;
        }
        hints.ai_flags = flags;
        hints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hints_carry_requested_flags() {
        let query = AddrQuery::new("example.org")
            .with_family(Family::V6)
            .with_kind(SocketKind::Stream)
            .numeric_service(true)
            .all_families(true)
            .v4_mapped(true);
        let hints = query.to_hints();

        assert_eq!(hints.ai_family, sys::AF_INET6);
        assert_eq!(hints.ai_socktype, sys::SOCK_STREAM);
        assert_ne!(hints.ai_flags & sys::AI_NUMERICSERV, 0);
        assert_ne!(hints.ai_flags & sys::AI_ALL, 0);
        assert_ne!(hints.ai_flags & sys::AI_V4MAPPED, 0);
        assert_eq!(hints.ai_flags & sys::AI_NUMERICHOST, 0);
    }

    #[test]
    fn family_raw_round_trip() {
        for family in [Family::Unspec, Family::V4, Family::V6] {
            assert_eq!(Family::from_raw(family.to_raw()), family);
        }
    }
}

use std::marker::PhantomData;
use std::mem;
use std::net::SocketAddr;
use std::ptr;

use crate::native;
use crate::query::{Family, SocketKind};
use crate::sys;

/// Who allocated a result record, and therefore which deallocator owns it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provenance {
    /// Allocated by the platform resolver; freed through it.
    Native,
    /// Allocated by the compatibility shim; freed element by element.
    Synthesized,
}

/// Marker distinguishing synthesized records inside a chain. The shim
/// strips this flag from every query it forwards natively, so no native
/// record can carry it.
pub(crate) const SYNTHESIZED_FLAG: sys::c_int = sys::AI_V4MAPPED;

pub(crate) type NativeFree = unsafe fn(*mut sys::addrinfo);

/// An ordered resolution result chain of possibly mixed provenance.
///
/// Ownership of the raw chain is exclusive. Dropping the list walks it
/// once: the leading native run is released through the native
/// deallocator, the synthesized tail element by element through the shim's
/// own. Callers never dispatch on provenance themselves.
pub struct AddrList {
    head: *mut sys::addrinfo,
    native_free: NativeFree,
}

// SAFETY: the chain is uniquely owned and carries no thread affinity.
unsafe impl Send for AddrList {}

impl AddrList {
    /// Take ownership of a raw chain, freeing native records through the
    /// platform deallocator.
    pub(crate) fn new(head: *mut sys::addrinfo) -> Self {
        Self {
            head,
            native_free: native::native_free,
        }
    }

    /// Take ownership with an explicit native deallocator. Lets tests track
    /// exactly which records reach the native release path.
    pub(crate) fn with_native_free(head: *mut sys::addrinfo, native_free: NativeFree) -> Self {
        Self { head, native_free }
    }

    pub fn iter(&self) -> Endpoints<'_> {
        Endpoints {
            next: self.head,
            _list: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_null()
    }
}

impl Drop for AddrList {
    fn drop(&mut self) {
        let mut prev: *mut sys::addrinfo = ptr::null_mut();
        let mut it = self.head;
        // SAFETY: every node is live until released below, and each node is
        // released exactly once through the deallocator matching its
        // provenance.
        unsafe {
            // Synthesis always appends a contiguous run, so the first
            // synthesized node starts the tail.
            while !it.is_null() && (*it).ai_flags & SYNTHESIZED_FLAG == 0 {
                prev = it;
                it = (*it).ai_next;
            }
            if !prev.is_null() {
                (*prev).ai_next = ptr::null_mut();
            }
            if it != self.head {
                (self.native_free)(self.head);
            }
            let mut tail = it;
            while !tail.is_null() {
                let next = (*tail).ai_next;
                free_synthesized_node(tail);
                tail = next;
            }
        }
    }
}

impl<'a> IntoIterator for &'a AddrList {
    type Item = Endpoint<'a>;
    type IntoIter = Endpoints<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl std::fmt::Debug for AddrList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddrList").field("len", &self.len()).finish()
    }
}

/// One resolved endpoint, borrowed from an [`AddrList`].
#[derive(Clone, Copy)]
pub struct Endpoint<'a> {
    node: &'a sys::addrinfo,
}

impl Endpoint<'_> {
    pub fn family(&self) -> Family {
        Family::from_raw(self.node.ai_family)
    }

    pub fn kind(&self) -> SocketKind {
        SocketKind::from_raw(self.node.ai_socktype)
    }

    /// Raw transport protocol number (`IPPROTO_*`).
    pub fn protocol(&self) -> i32 {
        self.node.ai_protocol as i32
    }

    pub fn provenance(&self) -> Provenance {
        if self.node.ai_flags & SYNTHESIZED_FLAG != 0 {
            Provenance::Synthesized
        } else {
            Provenance::Native
        }
    }

    /// The endpoint's socket address, when it is an inet address.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        if self.node.ai_addr.is_null() {
            return None;
        }
        let len = self.node.ai_addrlen as usize;
        if len == 0 || len > mem::size_of::<sys::sockaddr_storage>() {
            return None;
        }
        // SAFETY: all-zero is a valid value for the plain C storage struct.
        let mut storage: sys::sockaddr_storage = unsafe { mem::zeroed() };
        // SAFETY: `ai_addr` points at `ai_addrlen` valid bytes and the
        // destination storage is at least that large (checked above).
        unsafe {
            ptr::copy_nonoverlapping(
                self.node.ai_addr.cast::<u8>(),
                (&mut storage as *mut sys::sockaddr_storage).cast::<u8>(),
                len,
            );
        }
        // SAFETY: the storage holds a valid sockaddr of `len` bytes.
        let addr = unsafe { socket2::SockAddr::new(storage, len as sys::socklen_t) };
        addr.as_socket()
    }

    pub(crate) fn raw(&self) -> &sys::addrinfo {
        self.node
    }
}

impl std::fmt::Debug for Endpoint<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("family", &self.family())
            .field("kind", &self.kind())
            .field("addr", &self.socket_addr())
            .field("provenance", &self.provenance())
            .finish()
    }
}

/// Iterator over the endpoints of an [`AddrList`], in chain order.
pub struct Endpoints<'a> {
    next: *const sys::addrinfo,
    _list: PhantomData<&'a AddrList>,
}

impl<'a> Iterator for Endpoints<'a> {
    type Item = Endpoint<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next.is_null() {
            return None;
        }
        // SAFETY: non-null chain nodes stay live for the borrow of the list.
        let node = unsafe { &*self.next };
        self.next = node.ai_next;
        Some(Endpoint { node })
    }
}

/// Allocate a shim-owned record. The sockaddr is copied into its own
/// allocation so the record's lifetime is independent of `addr`.
pub(crate) fn alloc_synthesized_node(
    family: sys::c_int,
    socktype: sys::c_int,
    protocol: sys::c_int,
    addr: &socket2::SockAddr,
    extra_flags: sys::c_int,
) -> *mut sys::addrinfo {
    // SAFETY: all-zero is a valid value for both plain C structs.
    let mut storage: Box<sys::sockaddr_storage> = Box::new(unsafe { mem::zeroed() });
    let addr_len = addr.len() as usize;
    debug_assert!(addr_len <= mem::size_of::<sys::sockaddr_storage>());
    // SAFETY: `addr` is valid for `addr.len()` bytes; the destination box
    // is at least sockaddr_storage sized.
    unsafe {
        ptr::copy_nonoverlapping(
            addr.as_ptr().cast::<u8>(),
            (&mut *storage as *mut sys::sockaddr_storage).cast::<u8>(),
            addr_len,
        );
    }

    // SAFETY: as above.
    let mut node: Box<sys::addrinfo> = Box::new(unsafe { mem::zeroed() });
    node.ai_flags = SYNTHESIZED_FLAG | extra_flags;
    node.ai_family = family;
    node.ai_socktype = socktype;
    node.ai_protocol = protocol;
    node.ai_addrlen = addr_len as _;
    node.ai_addr = Box::into_raw(storage).cast::<sys::sockaddr>();
    Box::into_raw(node)
}

#[cfg(test)]
pub(crate) static SYNTH_FREES: std::sync::atomic::AtomicUsize =
    std::sync::atomic::AtomicUsize::new(0);

/// Release one shim-owned record.
///
/// # Safety
/// `node` must come from [`alloc_synthesized_node`] and not be freed again.
pub(crate) unsafe fn free_synthesized_node(node: *mut sys::addrinfo) {
    // SAFETY: per contract, both allocations were produced by Box::into_raw
    // in `alloc_synthesized_node` and are consumed exactly once.
    unsafe {
        let node = Box::from_raw(node);
        if !node.ai_addr.is_null() {
            drop(Box::from_raw(node.ai_addr.cast::<sys::sockaddr_storage>()));
        }
    }
    #[cfg(test)]
    SYNTH_FREES.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn synthesized(addr: SocketAddr) -> *mut sys::addrinfo {
        alloc_synthesized_node(
            sys::AF_INET6,
            sys::SOCK_STREAM,
            0,
            &socket2::SockAddr::from(addr),
            0,
        )
    }

    /// A fake "native" record: same layout, no provenance marker, and
    /// releasable by the element-wise deallocator because the tests'
    /// counting native-free uses it underneath.
    fn fake_native(addr: SocketAddr) -> *mut sys::addrinfo {
        let node = alloc_synthesized_node(
            sys::AF_INET6,
            sys::SOCK_STREAM,
            0,
            &socket2::SockAddr::from(addr),
            0,
        );
        // SAFETY: freshly allocated, exclusively owned.
        unsafe { (*node).ai_flags &= !SYNTHESIZED_FLAG };
        node
    }

    fn link(nodes: &[*mut sys::addrinfo]) -> *mut sys::addrinfo {
        for pair in nodes.windows(2) {
            // SAFETY: all nodes are live and exclusively owned.
            unsafe { (*pair[0]).ai_next = pair[1] };
        }
        nodes[0]
    }

    fn v6(port: u16) -> SocketAddr {
        SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::LOCALHOST, port, 0, 0))
    }

    fn v4(port: u16) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port))
    }

    #[test]
    fn fully_synthesized_chain_skips_native_free() {
        static NATIVE_CALLS: AtomicUsize = AtomicUsize::new(0);
        unsafe fn counting(head: *mut sys::addrinfo) {
            NATIVE_CALLS.fetch_add(1, Ordering::SeqCst);
            let mut it = head;
            while !it.is_null() {
                // SAFETY: test chains are built from element-wise nodes.
                unsafe {
                    let next = (*it).ai_next;
                    free_synthesized_node(it);
                    it = next;
                }
            }
        }

        let head = link(&[synthesized(v6(80)), synthesized(v6(81))]);
        let before = SYNTH_FREES.load(Ordering::SeqCst);
        drop(AddrList::with_native_free(head, counting));

        assert_eq!(NATIVE_CALLS.load(Ordering::SeqCst), 0);
        assert!(SYNTH_FREES.load(Ordering::SeqCst) >= before + 2);
    }

    #[test]
    fn mixed_chain_splits_at_first_synthesized_node() {
        static NATIVE_CALLS: AtomicUsize = AtomicUsize::new(0);
        static NATIVE_NODES: AtomicUsize = AtomicUsize::new(0);
        unsafe fn counting(head: *mut sys::addrinfo) {
            NATIVE_CALLS.fetch_add(1, Ordering::SeqCst);
            let mut it = head;
            while !it.is_null() {
                // SAFETY: test chains are built from element-wise nodes.
                unsafe {
                    assert_eq!(
                        (*it).ai_flags & SYNTHESIZED_FLAG,
                        0,
                        "a synthesized record reached the native deallocator"
                    );
                    let next = (*it).ai_next;
                    NATIVE_NODES.fetch_add(1, Ordering::SeqCst);
                    free_synthesized_node(it);
                    it = next;
                }
            }
        }

        let head = link(&[
            fake_native(v6(10)),
            fake_native(v6(11)),
            synthesized(v4(12)),
            synthesized(v4(13)),
        ]);
        drop(AddrList::with_native_free(head, counting));

        assert_eq!(NATIVE_CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(NATIVE_NODES.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn fully_native_chain_is_freed_in_one_native_call() {
        static NATIVE_CALLS: AtomicUsize = AtomicUsize::new(0);
        unsafe fn counting(head: *mut sys::addrinfo) {
            NATIVE_CALLS.fetch_add(1, Ordering::SeqCst);
            let mut it = head;
            while !it.is_null() {
                // SAFETY: test chains are built from element-wise nodes.
                unsafe {
                    let next = (*it).ai_next;
                    free_synthesized_node(it);
                    it = next;
                }
            }
        }

        let head = link(&[fake_native(v6(20)), fake_native(v6(21))]);
        drop(AddrList::with_native_free(head, counting));
        assert_eq!(NATIVE_CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_list_drops_without_any_free() {
        static NATIVE_CALLS: AtomicUsize = AtomicUsize::new(0);
        unsafe fn counting(_head: *mut sys::addrinfo) {
            NATIVE_CALLS.fetch_add(1, Ordering::SeqCst);
        }

        let list = AddrList::with_native_free(ptr::null_mut(), counting);
        assert!(list.is_empty());
        drop(list);
        assert_eq!(NATIVE_CALLS.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn iteration_preserves_chain_order() {
        unsafe fn unused_native_free(_head: *mut sys::addrinfo) {}

        let head = link(&[synthesized(v6(1)), synthesized(v6(2)), synthesized(v6(3))]);
        let list = AddrList::with_native_free(head, unused_native_free);
        let ports: Vec<u16> = list
            .iter()
            .filter_map(|ep| ep.socket_addr())
            .map(|addr| addr.port())
            .collect();
        assert_eq!(ports, vec![1, 2, 3]);
    }
}

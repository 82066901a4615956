use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::error::{ChannelError, Result};
use crate::name::channel_path;
use crate::stop::interrupt;
use crate::stream::Channel;

/// Permission mode for created socket paths: owner read/write only.
const SOCKET_MODE: u32 = 0o600;

/// Maximum socket path length.
/// `sockaddr_un.sun_path` is 108 bytes on Linux, 104 on macOS.
#[cfg(target_os = "linux")]
const MAX_ADDRESS_LEN: usize = 108;
#[cfg(not(target_os = "linux"))]
const MAX_ADDRESS_LEN: usize = 104;

/// Unix domain socket server backend.
pub(crate) struct UdsServer {
    listener: UnixListener,
    name: String,
    path: PathBuf,
    closed: AtomicBool,
}

impl UdsServer {
    pub(crate) fn bind(name: &str) -> Result<Self> {
        let path = channel_path(name);

        let address_len = path.as_os_str().len();
        if address_len >= MAX_ADDRESS_LEN {
            return Err(ChannelError::NameTooLong {
                name: name.to_string(),
                len: address_len,
                max: MAX_ADDRESS_LEN,
            });
        }

        // Remove a stale socket left by an unclean prior shutdown, but never
        // remove a path of any other file type.
        if path.exists() {
            let metadata = std::fs::symlink_metadata(&path).map_err(|e| ChannelError::Bind {
                name: name.to_string(),
                source: e,
            })?;
            if metadata.file_type().is_socket() {
                debug!(?path, "removing stale channel socket");
                std::fs::remove_file(&path).map_err(|e| ChannelError::Bind {
                    name: name.to_string(),
                    source: e,
                })?;
            } else {
                return Err(ChannelError::Bind {
                    name: name.to_string(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        "existing path is not a channel socket",
                    ),
                });
            }
        }

        let listener = UnixListener::bind(&path).map_err(|e| ChannelError::Bind {
            name: name.to_string(),
            source: e,
        })?;

        // Owner read/write only, applied before the first accept.
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(SOCKET_MODE)).map_err(
            |e| ChannelError::Bind {
                name: name.to_string(),
                source: e,
            },
        )?;

        // Non-blocking so accept can be multiplexed with the stop signal.
        listener
            .set_nonblocking(true)
            .map_err(|e| ChannelError::Bind {
                name: name.to_string(),
                source: e,
            })?;

        info!(name, ?path, "channel server listening");

        Ok(Self {
            listener,
            name: name.to_string(),
            path,
            closed: AtomicBool::new(false),
        })
    }

    /// Block until a client connects or this server is closed.
    pub(crate) fn accept(&self) -> Result<Channel> {
        use std::os::fd::AsRawFd;

        let waiter = interrupt().register().map_err(ChannelError::Accept)?;

        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Err(ChannelError::Cancelled);
            }

            let mut fds = [
                libc::pollfd {
                    fd: self.listener.as_raw_fd(),
                    events: libc::POLLIN,
                    revents: 0,
                },
                libc::pollfd {
                    fd: waiter.fd(),
                    events: libc::POLLIN,
                    revents: 0,
                },
            ];
            // SAFETY: `fds` is a valid pollfd array for the given length;
            // both descriptors outlive the call.
            let rc = unsafe { libc::poll(fds.as_mut_ptr(), 2, -1) };
            if rc < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(ChannelError::Accept(err));
            }

            if fds[1].revents != 0 {
                // Woken by some server close in this process; the loop head
                // decides whether it was ours.
                waiter.drain();
                continue;
            }

            if fds[0].revents != 0 {
                match self.listener.accept() {
                    Ok((stream, _addr)) => {
                        // The listener is non-blocking; the accepted stream
                        // must not be.
                        stream.set_nonblocking(false).map_err(ChannelError::Accept)?;
                        debug!(name = %self.name, "accepted channel connection");
                        return Ok(Channel::from_unix(stream));
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
                    Err(e) => return Err(ChannelError::Accept(e)),
                }
            }
        }
    }

    /// Close the server: unlink the backing socket and wake in-flight
    /// accepts. Idempotent; the descriptor itself is released on drop.
    pub(crate) fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        // Unlink the path the live handle is actually bound to, not the one
        // the name derived at bind time, so a renamed socket is still removed.
        match self.listener.local_addr() {
            Ok(addr) => {
                if let Some(path) = addr.as_pathname() {
                    debug!(?path, "unlinking channel socket");
                    if let Err(err) = std::fs::remove_file(path) {
                        if err.kind() != std::io::ErrorKind::NotFound {
                            warn!(?path, %err, "failed to unlink channel socket");
                        }
                    }
                }
            }
            Err(err) => warn!(name = %self.name, %err, "getsockname on close failed"),
        }

        interrupt().raise_all();
        info!(name = %self.name, "channel server closed");
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UdsServer {
    fn drop(&mut self) {
        self.close();
    }
}

/// Connect to a listening channel as a client.
pub(crate) fn connect(name: &str) -> Result<Channel> {
    let path = channel_path(name);

    // SAFETY: getuid has no preconditions and cannot fail.
    verify_owner(&path, unsafe { libc::getuid() })?;

    let stream = UnixStream::connect(&path).map_err(|e| ChannelError::Connect {
        name: name.to_string(),
        source: e,
    })?;
    debug!(name, "connected to channel");
    Ok(Channel::from_unix(stream))
}

/// Refuse to connect to a backing resource created by another principal; a
/// different user could have pre-created a like-named socket. A missing path
/// falls through so the connect itself reports the real error.
fn verify_owner(path: &Path, expected_uid: u32) -> Result<()> {
    let Ok(metadata) = std::fs::metadata(path) else {
        return Ok(());
    };
    let owner = metadata.uid();
    if owner != expected_uid {
        warn!(?path, owner, expected_uid, "channel owner mismatch");
        return Err(ChannelError::UntrustedPeer {
            path: path.to_path_buf(),
            owner,
            expected: expected_uid,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_name(tag: &str) -> String {
        format!(
            "osport-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        )
    }

    #[test]
    fn bind_then_close_leaves_no_socket_file() {
        let name = unique_name("cleanup");
        let server = UdsServer::bind(&name).expect("server should bind");
        let path = server.path().to_path_buf();
        assert!(path.exists());

        server.close();
        assert!(!path.exists(), "close must unlink the backing socket");
    }

    #[test]
    fn close_is_idempotent() {
        let name = unique_name("twice");
        let server = UdsServer::bind(&name).expect("server should bind");
        server.close();
        server.close();
        drop(server);
    }

    #[test]
    fn bind_sets_owner_only_permissions() {
        let name = unique_name("perms");
        let server = UdsServer::bind(&name).expect("server should bind");
        let mode = std::fs::metadata(server.path())
            .expect("socket should stat")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn bind_replaces_stale_socket() {
        let name = unique_name("stale");
        let first = UdsServer::bind(&name).expect("first bind should succeed");
        let path = first.path().to_path_buf();
        // Simulate an unclean shutdown: the file stays, the listener goes.
        std::mem::forget(first);
        assert!(path.exists());

        let second = UdsServer::bind(&name).expect("stale socket should be replaced");
        second.close();
        assert!(!path.exists());
    }

    #[test]
    fn bind_rejects_existing_non_socket_file() {
        let name = unique_name("regular");
        let path = channel_path(&name);
        std::fs::write(&path, b"regular-file").expect("file should be writable");

        let result = UdsServer::bind(&name);
        assert!(matches!(result, Err(ChannelError::Bind { .. })));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn bind_rejects_overlong_name() {
        let name = "x".repeat(MAX_ADDRESS_LEN + 8);
        let result = UdsServer::bind(&name);
        assert!(matches!(result, Err(ChannelError::NameTooLong { .. })));
    }

    #[test]
    fn owner_mismatch_is_untrusted() {
        let name = unique_name("owner");
        let path = channel_path(&name);
        std::fs::write(&path, b"pre-created").expect("file should be writable");

        // SAFETY: getuid has no preconditions.
        let our_uid = unsafe { libc::getuid() };
        let err = verify_owner(&path, our_uid + 1).expect_err("owner mismatch should fail");
        assert!(matches!(err, ChannelError::UntrustedPeer { owner, expected, .. }
            if owner == our_uid && expected == our_uid + 1));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_path_passes_owner_check() {
        let path = channel_path(&unique_name("absent"));
        // SAFETY: getuid has no preconditions.
        verify_owner(&path, unsafe { libc::getuid() }).expect("missing path should pass");
    }
}

//! Named local IPC channels.
//!
//! One interface over two local transport mechanisms:
//! - Unix domain sockets under a well-known directory (Linux/macOS)
//! - Named pipes (Windows)
//!
//! A [`ChannelServer`] listens under a channel name; [`Channel::connect`]
//! reaches it from another process under the same name. Accepting is
//! cancellable: closing a server wakes its in-flight [`ChannelServer::accept`]
//! with [`ChannelError::Cancelled`] instead of leaving it blocked forever.
//!
//! Channel names are opaque identifiers. They map deterministically to a
//! platform address (a socket path or a pipe namespace entry), but callers
//! must not treat the name itself as a filesystem path.

pub mod error;
pub mod name;

mod server;
mod stream;

#[cfg(unix)]
mod stop;
#[cfg(unix)]
mod uds;

#[cfg(windows)]
mod pipe;

pub use error::{ChannelError, Result};
pub use server::ChannelServer;
pub use stream::Channel;

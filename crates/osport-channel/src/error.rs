use std::path::PathBuf;

/// Errors that can occur on local IPC channels.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Failed to bind the server address derived from a channel name.
    #[error("failed to bind channel {name:?}: {source}")]
    Bind {
        name: String,
        source: std::io::Error,
    },

    /// Failed to connect to a channel (usually: no live listener).
    #[error("failed to connect to channel {name:?}: {source}")]
    Connect {
        name: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// The server was closed while an accept was in flight.
    #[error("accept cancelled by server close")]
    Cancelled,

    /// The backing resource is owned by a different security principal
    /// than the connecting process.
    #[error("channel resource {path} is owned by uid {owner}, expected {expected}")]
    UntrustedPeer {
        path: PathBuf,
        owner: u32,
        expected: u32,
    },

    /// The derived platform address is too long for the transport.
    #[error("channel name maps to an address of {len} bytes (max {max}): {name:?}")]
    NameTooLong {
        name: String,
        len: usize,
        max: usize,
    },

    /// An I/O error occurred on a connected channel.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ChannelError>;

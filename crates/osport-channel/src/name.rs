//! Deterministic channel-name → platform-address mapping.
//!
//! The mapping is a pure function: the same name on the same host always
//! resolves to the same backing resource, for every process.

#[cfg(unix)]
use std::path::PathBuf;

/// Root directory for channel sockets on Unix-like systems.
#[cfg(unix)]
pub const CHANNEL_ROOT: &str = "/tmp";

/// Derive the socket path backing a channel name.
#[cfg(unix)]
pub fn channel_path(name: &str) -> PathBuf {
    PathBuf::from(CHANNEL_ROOT).join(name)
}

/// Derive the pipe-namespace address backing a channel name.
#[cfg(windows)]
pub fn channel_address(name: &str) -> String {
    format!(r"\\.\pipe\{name}")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn mapping_is_deterministic() {
        assert_eq!(channel_path("ctl"), channel_path("ctl"));
        assert_eq!(channel_path("ctl"), PathBuf::from("/tmp/ctl"));
    }

    #[test]
    fn distinct_names_map_to_distinct_paths() {
        assert_ne!(channel_path("a"), channel_path("b"));
    }
}

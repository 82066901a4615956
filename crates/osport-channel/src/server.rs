use crate::error::Result;
use crate::stream::Channel;

/// A listening channel server.
///
/// Owned exclusively by its creator. `accept` may run on one thread while
/// another thread calls `close`; the in-flight accept then returns
/// [`ChannelError::Cancelled`](crate::ChannelError::Cancelled).
pub struct ChannelServer {
    inner: ServerInner,
}

enum ServerInner {
    #[cfg(unix)]
    Unix(crate::uds::UdsServer),
    #[cfg(windows)]
    Pipe(crate::pipe::PipeServer),
}

impl ChannelServer {
    /// Derive the platform address for `name`, clear any stale backing
    /// resource, and start listening with owner-only permissions.
    pub fn bind(name: &str) -> Result<Self> {
        #[cfg(unix)]
        {
            Ok(Self {
                inner: ServerInner::Unix(crate::uds::UdsServer::bind(name)?),
            })
        }
        #[cfg(windows)]
        {
            Ok(Self {
                inner: ServerInner::Pipe(crate::pipe::PipeServer::bind(name)?),
            })
        }
    }

    /// Block until a client connects or the server is closed, whichever
    /// comes first. The listening server is unaffected by a successful
    /// accept and keeps listening.
    pub fn accept(&self) -> Result<Channel> {
        match &self.inner {
            #[cfg(unix)]
            ServerInner::Unix(server) => server.accept(),
            #[cfg(windows)]
            ServerInner::Pipe(server) => server.accept(),
        }
    }

    /// Close the server: remove the backing resource and cancel in-flight
    /// accepts. Idempotent. Also runs on drop.
    pub fn close(&self) {
        match &self.inner {
            #[cfg(unix)]
            ServerInner::Unix(server) => server.close(),
            #[cfg(windows)]
            ServerInner::Pipe(server) => server.close(),
        }
    }

    /// The channel name this server was bound under.
    pub fn name(&self) -> &str {
        match &self.inner {
            #[cfg(unix)]
            ServerInner::Unix(server) => server.name(),
            #[cfg(windows)]
            ServerInner::Pipe(server) => server.name(),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{Read, Write};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::error::ChannelError;
    use crate::name::channel_path;

    fn unique_name(tag: &str) -> String {
        format!(
            "osport-srv-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        )
    }

    /// Connect with a few retries so the client thread can start before the
    /// server reaches accept.
    fn connect_with_retry(name: &str) -> Channel {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match Channel::connect(name) {
                Ok(channel) => return channel,
                Err(_) if Instant::now() < deadline => {
                    thread::sleep(Duration::from_millis(10));
                }
                Err(err) => panic!("connect should eventually succeed: {err}"),
            }
        }
    }

    #[test]
    fn concurrent_close_cancels_blocked_accept() {
        let name = unique_name("cancel");
        let server = Arc::new(ChannelServer::bind(&name).expect("server should bind"));

        let acceptor = {
            let server = server.clone();
            thread::spawn(move || server.accept())
        };

        // Give the acceptor time to block in the wait.
        thread::sleep(Duration::from_millis(50));
        let start = Instant::now();
        server.close();

        let result = acceptor.join().expect("acceptor thread should finish");
        assert!(matches!(result, Err(ChannelError::Cancelled)));
        assert!(
            start.elapsed() < Duration::from_secs(2),
            "cancellation must be prompt"
        );
        assert!(!channel_path(&name).exists());
    }

    #[test]
    fn connect_without_listener_fails_fast() {
        let name = unique_name("nolistener");
        let err = Channel::connect(&name).expect_err("connect should fail");
        assert!(matches!(err, ChannelError::Connect { .. }));
    }

    #[test]
    fn bytes_round_trip_and_shutdown_reads_zero() {
        let name = unique_name("roundtrip");
        let server = ChannelServer::bind(&name).expect("server should bind");

        let client_name = name.clone();
        let client = thread::spawn(move || {
            let mut channel = connect_with_retry(&client_name);
            for payload in [&b"a"[..], &b"hello channel"[..], &[0xA5u8; 4096][..]] {
                channel.write_all(payload).expect("write should succeed");
            }
            // Dropping the channel is the orderly shutdown signal.
        });

        let mut accepted = server.accept().expect("accept should succeed");
        let mut received = Vec::new();
        accepted
            .read_to_end(&mut received)
            .expect("read should run to peer shutdown");

        let mut expected = Vec::new();
        expected.extend_from_slice(b"a");
        expected.extend_from_slice(b"hello channel");
        expected.extend_from_slice(&[0xA5u8; 4096]);
        assert_eq!(received, expected);

        client.join().expect("client thread should finish");
        server.close();
    }

    #[test]
    fn listener_survives_accepted_connections() {
        let name = unique_name("multi");
        let server = ChannelServer::bind(&name).expect("server should bind");

        for round in 0..3u8 {
            let client_name = name.clone();
            let client = thread::spawn(move || {
                let mut channel = connect_with_retry(&client_name);
                channel.write_all(&[round]).expect("write should succeed");
            });

            let mut accepted = server.accept().expect("accept should succeed");
            let mut buf = [0u8; 1];
            accepted.read_exact(&mut buf).expect("read should succeed");
            assert_eq!(buf[0], round);
            client.join().expect("client thread should finish");
        }

        server.close();
    }

    #[test]
    fn foreign_close_does_not_cancel_other_servers() {
        let name_a = unique_name("foreign-a");
        let name_b = unique_name("foreign-b");
        let server_a = Arc::new(ChannelServer::bind(&name_a).expect("server a should bind"));
        let server_b = ChannelServer::bind(&name_b).expect("server b should bind");

        let acceptor = {
            let server_a = server_a.clone();
            thread::spawn(move || server_a.accept())
        };

        thread::sleep(Duration::from_millis(50));
        // Closing B raises the process-wide signal; A must treat the wake as
        // spurious and keep listening.
        server_b.close();
        thread::sleep(Duration::from_millis(50));

        let mut client = connect_with_retry(&name_a);
        client.write_all(b"ok").expect("write should succeed");

        let mut accepted = acceptor
            .join()
            .expect("acceptor thread should finish")
            .expect("accept should still succeed after foreign close");
        let mut buf = [0u8; 2];
        accepted.read_exact(&mut buf).expect("read should succeed");
        assert_eq!(&buf, b"ok");

        server_a.close();
    }
}

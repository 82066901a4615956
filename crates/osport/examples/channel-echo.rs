//! Minimal channel demo: a server thread echoes one client connection.
//!
//! Run with `cargo run --example channel-echo`.

use std::io::{Read, Write};
use std::thread;

use osport::channel::{Channel, ChannelError, ChannelServer};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let name = format!("osport-echo-{}", std::process::id());
    let server = ChannelServer::bind(&name)?;
    println!("serving channel {name}");

    let echo = thread::spawn(move || -> Result<(), ChannelError> {
        let mut peer = server.accept()?;
        let mut buf = [0u8; 256];
        loop {
            let n = peer.read(&mut buf)?;
            if n == 0 {
                break;
            }
            peer.write_all(&buf[..n])?;
        }
        server.close();
        Ok(())
    });

    let mut client = Channel::connect(&name)?;
    client.write_all(b"hello over the channel")?;

    let mut reply = [0u8; 256];
    let n = client.read(&mut reply)?;
    println!("echoed: {}", String::from_utf8_lossy(&reply[..n]));

    drop(client);
    echo.join().expect("echo thread should finish")?;
    Ok(())
}

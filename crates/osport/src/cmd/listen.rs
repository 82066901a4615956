use std::io::{Read, Write};
use std::sync::Arc;

use osport_channel::{ChannelError, ChannelServer};

use crate::cmd::ListenArgs;
use crate::exit::{channel_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_data, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let server = Arc::new(
        ChannelServer::bind(&args.name).map_err(|err| channel_error("bind failed", err))?,
    );

    install_ctrlc_handler(server.clone())?;

    let mut served = 0usize;
    loop {
        let mut channel = match server.accept() {
            Ok(channel) => channel,
            // Ctrl-C closed the server under us; that is the normal exit.
            Err(ChannelError::Cancelled) => return Ok(SUCCESS),
            Err(err) => return Err(channel_error("accept failed", err)),
        };

        let mut buf = [0u8; 4096];
        loop {
            let n = channel
                .read(&mut buf)
                .map_err(|err| CliError::new(INTERNAL, format!("read failed: {err}")))?;
            if n == 0 {
                break;
            }
            print_data(&buf[..n], format);
            if args.echo {
                channel
                    .write_all(&buf[..n])
                    .map_err(|err| CliError::new(INTERNAL, format!("echo failed: {err}")))?;
            }
        }

        served = served.saturating_add(1);
        if let Some(count) = args.count {
            if served >= count {
                server.close();
                return Ok(SUCCESS);
            }
        }
    }
}

fn install_ctrlc_handler(server: Arc<ChannelServer>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        server.close();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

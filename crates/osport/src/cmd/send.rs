use std::io::{Read, Write};

use osport_channel::Channel;

use crate::cmd::SendArgs;
use crate::exit::{channel_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_data, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = match (&args.data, &args.file) {
        (Some(data), None) => data.clone().into_bytes(),
        (None, Some(path)) => {
            std::fs::read(path).map_err(|err| io_error("payload file read failed", err))?
        }
        (None, None) => return Err(CliError::new(USAGE, "one of --data or --file is required")),
        (Some(_), Some(_)) => unreachable!("clap rejects conflicting payload args"),
    };

    let mut channel =
        Channel::connect(&args.name).map_err(|err| channel_error("connect failed", err))?;
    channel
        .write_all(&payload)
        .and_then(|()| channel.flush())
        .map_err(|err| io_error("send failed", err))?;

    if args.wait {
        let mut buf = [0u8; 4096];
        let n = channel
            .read(&mut buf)
            .map_err(|err| io_error("reply read failed", err))?;
        print_data(&buf[..n], format);
    }

    Ok(SUCCESS)
}

use serde::Serialize;

use crate::cmd::EnvinfoArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Debug, Serialize)]
struct EnvinfoOutput {
    schema_id: &'static str,
    version: &'static str,
    build_target: &'static str,
    os: &'static str,
    arch: &'static str,
    channel_transport: &'static str,
    v4_mapped_emulation: bool,
}

pub fn run(_args: EnvinfoArgs, format: OutputFormat) -> CliResult<i32> {
    let output = EnvinfoOutput {
        schema_id: "https://osport.dev/schemas/cli/v1/envinfo.json",
        version: env!("CARGO_PKG_VERSION"),
        build_target: option_env!("OSPORT_BUILD_TARGET").unwrap_or("unknown"),
        os: std::env::consts::OS,
        arch: std::env::consts::ARCH,
        channel_transport: if cfg!(windows) {
            "named-pipe"
        } else {
            "unix-domain-socket"
        },
        v4_mapped_emulation: cfg!(any(target_os = "android", windows)),
    };

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&output).unwrap_or_else(|_| "{}".to_string())
        ),
        _ => {
            println!("osport {}", output.version);
            println!("  build target:        {}", output.build_target);
            println!("  os/arch:             {}/{}", output.os, output.arch);
            println!("  channel transport:   {}", output.channel_transport);
            println!("  v4-mapped emulation: {}", output.v4_mapped_emulation);
        }
    }

    Ok(SUCCESS)
}

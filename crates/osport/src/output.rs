use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use osport_resolve::{endpoint_display, is_v4_mapped, AddrList, Provenance};
use serde::Serialize;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct EndpointOutput {
    family: String,
    kind: String,
    address: String,
    port: u16,
    provenance: &'static str,
    v4_mapped: bool,
}

#[derive(Serialize)]
struct ResolveOutput {
    schema_id: &'static str,
    endpoints: Vec<EndpointOutput>,
}

pub fn print_endpoints(list: &AddrList, format: OutputFormat) {
    let rows: Vec<EndpointOutput> = list
        .iter()
        .map(|ep| {
            let (address, port) = match osport_resolve::endpoint_text(&ep) {
                Ok((address, port)) => (address, port),
                Err(_) => (osport_resolve::INVALID_ADDRESS.to_string(), 0),
            };
            let mapped = ep.socket_addr().is_some_and(|addr| is_v4_mapped(&addr));
            EndpointOutput {
                family: format!("{:?}", ep.family()),
                kind: format!("{:?}", ep.kind()),
                address,
                port,
                provenance: match ep.provenance() {
                    Provenance::Native => "native",
                    Provenance::Synthesized => "synthesized",
                },
                v4_mapped: mapped,
            }
        })
        .collect();

    match format {
        OutputFormat::Json => {
            let out = ResolveOutput {
                schema_id: "https://osport.dev/schemas/cli/v1/resolve-result.json",
                endpoints: rows,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FAMILY", "TYPE", "ADDRESS", "PORT", "SOURCE"]);
            for row in &rows {
                table.add_row(vec![
                    row.family.clone(),
                    row.kind.clone(),
                    row.address.clone(),
                    row.port.to_string(),
                    row.provenance.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for (endpoint, row) in list.iter().zip(&rows) {
                println!(
                    "{:?} {:?} {} ({})",
                    endpoint.family(),
                    endpoint.kind(),
                    endpoint_display(&endpoint),
                    row.provenance
                );
            }
        }
    }
}

/// Print bytes received on a channel.
pub fn print_data(data: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Raw => {
            let mut out = std::io::stdout();
            let _ = out.write_all(data);
            let _ = out.flush();
        }
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct DataOutput<'a> {
                schema_id: &'static str,
                size: usize,
                payload: &'a str,
            }
            let preview = payload_preview(data);
            let out = DataOutput {
                schema_id: "https://osport.dev/schemas/cli/v1/channel-data.json",
                size: data.len(),
                payload: &preview,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("{}", payload_preview(data));
        }
    }
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

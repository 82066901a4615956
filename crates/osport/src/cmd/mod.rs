use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use osport_resolve::{Family, SocketKind};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod envinfo;
pub mod listen;
pub mod resolve;
pub mod send;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve a named channel and print received bytes.
    Listen(ListenArgs),
    /// Connect to a named channel and send a payload.
    Send(SendArgs),
    /// Resolve a node/service query and print the endpoints.
    Resolve(ResolveArgs),
    /// Print build and environment diagnostics.
    Envinfo(EnvinfoArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Resolve(args) => resolve::run(args, format),
        Command::Envinfo(args) => envinfo::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Channel name to serve.
    pub name: String,
    /// Echo received bytes back to the client.
    #[arg(long)]
    pub echo: bool,
    /// Exit after serving N connections.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Channel name to connect to.
    pub name: String,
    /// Payload string.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read the payload from a file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Wait for one reply and print it.
    #[arg(long)]
    pub wait: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum FamilyArg {
    Any,
    V4,
    V6,
}

impl From<FamilyArg> for Family {
    fn from(value: FamilyArg) -> Self {
        match value {
            FamilyArg::Any => Family::Unspec,
            FamilyArg::V4 => Family::V4,
            FamilyArg::V6 => Family::V6,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum KindArg {
    Any,
    Stream,
    Datagram,
}

impl From<KindArg> for SocketKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Any => SocketKind::Any,
            KindArg::Stream => SocketKind::Stream,
            KindArg::Datagram => SocketKind::Datagram,
        }
    }
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Hostname or address literal.
    pub node: String,
    /// Service name or port.
    #[arg(long, short = 's')]
    pub service: Option<String>,
    /// Address family.
    #[arg(long, value_enum, default_value = "any")]
    pub family: FamilyArg,
    /// Socket type hint.
    #[arg(long, value_enum, default_value = "any")]
    pub kind: KindArg,
    /// Treat node and service as numeric literals.
    #[arg(long)]
    pub numeric: bool,
    /// Request records for all address families.
    #[arg(long)]
    pub all: bool,
    /// Request IPv4 results in IPv6 mapped form.
    #[arg(long)]
    pub v4_mapped: bool,
}

#[derive(Args, Debug, Default)]
pub struct EnvinfoArgs {}

use clap::{Args, Subcommand};
use directwire_frame::{DEFAULT_MAX_FRAME_LENGTH, DEFAULT_MAX_PAYLOAD};
use std::path::PathBuf;
use uuid::Uuid;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod headers;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a response frame and write it out.
    Encode(EncodeArgs),
    /// Decode response frames and print them.
    Decode(DecodeArgs),
    /// List the known response headers.
    Headers(HeadersArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args),
        Command::Decode(args) => decode::run(args, format),
        Command::Headers(args) => headers::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Response status code (100-599).
    #[arg(long, default_value_t = 200)]
    pub status: u32,
    /// Correlation id. Default: random.
    #[arg(long, value_name = "UUID")]
    pub correlation_id: Option<Uuid>,
    /// Transport request id header value.
    #[arg(long, default_value_t = 1)]
    pub request_id: u32,
    /// Extra header by registry or HTTP name (repeatable).
    #[arg(long = "header", short = 'H', value_name = "NAME=VALUE")]
    pub headers: Vec<String>,
    /// JSON payload.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub json: Option<String>,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["json", "file"])]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["json", "data"])]
    pub file: Option<PathBuf>,
    /// Write lowercase hex instead of raw bytes.
    #[arg(long)]
    pub hex: bool,
    /// Write to a file instead of stdout.
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// File holding one or more frames. Default: stdin.
    #[arg(conflicts_with = "hex")]
    pub input: Option<PathBuf>,
    /// Frames as a hex string instead of a file.
    #[arg(long, value_name = "HEX")]
    pub hex: Option<String>,
    /// Print envelope diagnostics instead of assembled response records.
    #[arg(long)]
    pub envelope: bool,
    /// Server agent attached to assembled records.
    #[arg(long, env = "DIRECTWIRE_SERVER_AGENT", default_value = "")]
    pub server_agent: String,
    /// Server version attached to assembled records.
    #[arg(long, env = "DIRECTWIRE_SERVER_VERSION", default_value = "")]
    pub server_version: String,
    /// Maximum frame length (frame header plus headers) in bytes.
    #[arg(long, env = "DIRECTWIRE_MAX_FRAME_LENGTH", default_value_t = DEFAULT_MAX_FRAME_LENGTH)]
    pub max_frame_length: usize,
    /// Maximum payload size in bytes.
    #[arg(long, env = "DIRECTWIRE_MAX_PAYLOAD", default_value_t = DEFAULT_MAX_PAYLOAD)]
    pub max_payload: usize,
}

#[derive(Args, Debug, Default)]
pub struct HeadersArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use serialprims_schema::MessageKind;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Answer test_info, echo and ping requests.
    Serve(ServeArgs),
    /// Send one request and print the verified response.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// What `serve` does with a frame that fails verification.
#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub enum InvalidPolicy {
    /// Log and discard.
    #[default]
    Drop,
    /// Answer with an `error` envelope.
    Reply,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Endpoint to bind: unix:<path>, tcp:<host:port> or <host:port>.
    pub endpoint: String,
    /// Handling of frames that fail verification.
    #[arg(long, value_enum, default_value_t = InvalidPolicy::Drop)]
    pub on_invalid: InvalidPolicy,
    /// Exit after the first connection closes.
    #[arg(long)]
    pub once: bool,
    /// Directory of payload schemas (<kind>.schema.json).
    #[arg(long, value_name = "DIR", env = "SERIALPRIMS_SCHEMA_DIR")]
    pub schemas: Option<PathBuf>,
    /// Reject payload properties the loaded schemas do not declare.
    #[arg(long, requires = "schemas")]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Endpoint to connect to: unix:<path>, tcp:<host:port> or <host:port>.
    pub endpoint: String,
    /// Message kind (test_info, echo, ping, error or its number).
    #[arg(long, short = 'k')]
    pub kind: MessageKind,
    /// JSON object payload. Default: {}.
    #[arg(long)]
    pub json: Option<String>,
    /// Maximum time to wait for the response (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

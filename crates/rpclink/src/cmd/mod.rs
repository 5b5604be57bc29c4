use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use rpclink_client::{CodecRegistry, CodecType, Dialer, Options};
use rpclink_codec::JsonCodec;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod probe;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Perform one call and print the reply.
    Call(CallArgs),
    /// Connect, negotiate options and report the result.
    Probe(ProbeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub async fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Call(args) => call::run(args, format).await,
        Command::Probe(args) => probe::run(args, format).await,
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum CodecArg {
    Binary,
    Json,
}

impl CodecArg {
    pub fn codec_type(self) -> CodecType {
        match self {
            CodecArg::Binary => CodecType::BINARY,
            CodecArg::Json => CodecType::JSON,
        }
    }
}

#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// Server to dial, as protocol@address (tcp, tcp4, tcp6, unix or http).
    pub target: String,
    /// Header codec to negotiate.
    #[arg(long, value_enum, default_value = "binary")]
    pub codec: CodecArg,
    /// Limit on connecting plus handshake (e.g. 5s, 500ms; 0 waits forever).
    #[arg(long, default_value = "10s")]
    pub connect_timeout: String,
}

impl ConnectionArgs {
    pub fn options(&self) -> CliResult<Options> {
        let connect_timeout = parse_duration(&self.connect_timeout, true)?;
        Ok(Options::default()
            .with_codec_type(self.codec.codec_type())
            .with_connect_timeout(connect_timeout))
    }
}

#[derive(Args, Debug)]
pub struct CallArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
    /// Method to invoke, as Service.Method.
    pub service_method: String,
    /// JSON request body, encoded with the negotiated codec; the reply is decoded and printed as JSON.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub json: Option<String>,
    /// Raw string request body.
    #[arg(long, conflicts_with_all = ["json", "file"])]
    pub data: Option<String>,
    /// Read the request body from a file.
    #[arg(long, conflicts_with_all = ["json", "data"])]
    pub file: Option<PathBuf>,
    /// Give up waiting for the reply after this long (e.g. 5s, 500ms).
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Dialer knowing every codec the CLI can negotiate.
pub fn dialer() -> Dialer {
    Dialer::new(CodecRegistry::default().with(CodecType::JSON, || Box::new(JsonCodec)))
}

pub fn parse_duration(input: &str, allow_zero: bool) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 && !allow_zero {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

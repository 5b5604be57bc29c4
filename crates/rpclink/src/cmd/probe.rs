use std::time::Instant;

use rpclink_client::parse_target;
use tracing::debug;

use crate::cmd::{dialer, ProbeArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{millis, print_probe, OutputFormat, ProbeOutput};

pub async fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let target = args.connection.target.as_str();
    let (protocol, address) =
        parse_target(target).map_err(|err| client_error("invalid target", err))?;
    let options = args.connection.options()?;

    let started = Instant::now();
    let client = dialer()
        .xdial(target, &[options])
        .await
        .map_err(|err| client_error("dial failed", err))?;
    let connect_ms = millis(started.elapsed());

    let negotiated = client.options();
    let out = ProbeOutput {
        target,
        protocol,
        address,
        codec_type: negotiated.codec_type.as_str(),
        magic_number: negotiated.magic_number,
        connect_timeout_ms: negotiated.connect_timeout.as_millis(),
        connect_ms,
        connected: client.is_available(),
    };
    print_probe(&out, format);

    if let Err(err) = client.close().await {
        debug!(error = %err, "close failed");
    }
    Ok(SUCCESS)
}

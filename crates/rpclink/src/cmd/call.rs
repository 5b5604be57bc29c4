use std::fs;
use std::time::Instant;

use rpclink_client::{Client, ClientError};
use rpclink_codec::CodecError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cmd::{dialer, parse_duration, CallArgs};
use crate::exit::{client_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{millis, print_reply, OutputFormat, ReplyOutput};

pub async fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let options = args.connection.options()?;
    let timeout = args
        .timeout
        .as_deref()
        .map(|t| parse_duration(t, false))
        .transpose()?;
    let payload = resolve_payload(&args)?;

    let target = args.connection.target.as_str();
    let client = dialer()
        .xdial(target, &[options])
        .await
        .map_err(|err| client_error("dial failed", err))?;
    debug!(target, "connected");

    // Ctrl-C abandons the wait; the connection is still closed cleanly.
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted");
            interrupt.cancel();
        }
    });

    let started = Instant::now();
    let call = async {
        tokio::select! {
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            result = invoke(&client, &args.service_method, payload) => result,
        }
    };
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(ClientError::CallTimeout(limit))),
        None => call.await,
    };
    let elapsed = started.elapsed();

    if let Err(err) = client.close().await {
        debug!(error = %err, "close failed");
    }

    let reply = result.map_err(|err| client_error("call failed", err))?;
    let codec_type = client.options().codec_type.as_str();
    let out = ReplyOutput::new(
        target,
        &args.service_method,
        codec_type,
        &reply,
        millis(elapsed),
    );
    print_reply(&out, &reply, format);

    Ok(SUCCESS)
}

/// Request body for one call.
#[derive(Debug, PartialEq)]
enum Payload {
    /// Encoded by the negotiated codec; the reply is decoded the same way.
    Json(serde_json::Value),
    Raw(Vec<u8>),
}

/// Run the call. A JSON reply is re-serialized as JSON text for printing.
async fn invoke(
    client: &Client,
    service_method: &str,
    payload: Payload,
) -> Result<Vec<u8>, ClientError> {
    match payload {
        Payload::Json(value) => {
            let reply: serde_json::Value = client.call_typed(service_method, &value).await?;
            serde_json::to_vec(&reply)
                .map_err(|err| ClientError::from(CodecError::InvalidBody(err.to_string())))
        }
        Payload::Raw(body) => Ok(client.call(service_method, body).await?.to_vec()),
    }
}

fn resolve_payload(args: &CallArgs) -> CliResult<Payload> {
    if let Some(json) = &args.json {
        let value = serde_json::from_str(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        return Ok(Payload::Json(value));
    }
    if let Some(data) = &args.data {
        return Ok(Payload::Raw(data.as_bytes().to_vec()));
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map(Payload::Raw)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), &err));
    }
    Ok(Payload::Raw(Vec::new()))
}

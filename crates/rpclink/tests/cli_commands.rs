#![cfg(feature = "cli")]

use std::process::{Command, Output};

use support::reply_server;

fn rpclink(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rpclink"))
        .args(args)
        .output()
        .expect("rpclink binary should run")
}

async fn run(args: Vec<String>) -> Output {
    tokio::task::spawn_blocking(move || {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        rpclink(&args)
    })
    .await
    .expect("blocking task should finish")
}

mod support {
    use rpclink_client::handshake::read_options;
    use rpclink_client::{CodecRegistry, CodecType, Header};
    use rpclink_codec::JsonCodec;
    use tokio::io::BufReader;
    use tokio::net::TcpListener;

    /// One-connection-at-a-time server echoing bodies, failing `Fail.Now` and
    /// answering `Bad.Body` with bytes that are not a valid body.
    pub async fn reply_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let address = listener.local_addr().expect("address").to_string();

        tokio::spawn(async move {
            let registry = CodecRegistry::default().with(CodecType::JSON, || Box::new(JsonCodec));
            while let Ok((stream, _)) = listener.accept().await {
                let mut stream = BufReader::new(stream);
                let Ok(options) = read_options(&mut stream).await else {
                    continue;
                };
                let Ok((mut reader, mut writer)) =
                    registry.open(&options.codec_type, Box::new(stream))
                else {
                    continue;
                };
                while let Ok(header) = reader.read_header().await {
                    let mut body = bytes::Bytes::new();
                    if reader.read_body(Some(&mut body)).await.is_err() {
                        break;
                    }
                    let mut reply = Header::new(header.service_method.clone(), header.seq);
                    match header.service_method.as_str() {
                        "Fail.Now" => {
                            reply.error = "requested failure".to_string();
                            body = bytes::Bytes::new();
                        }
                        "Bad.Body" => body = bytes::Bytes::from_static(&[0xff, 0xff]),
                        _ => {}
                    }
                    if writer.write(&reply, &body).await.is_err() {
                        break;
                    }
                }
            }
        });

        address
    }
}

#[test]
fn version_prints_package_version() {
    let out = rpclink(&["version"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert_eq!(stdout.trim(), format!("rpclink {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn malformed_target_exits_with_usage() {
    let out = rpclink(&["call", "no-at-sign", "Echo.Say", "--data", "x"]);
    assert_eq!(out.status.code(), Some(64));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("wrong format 'no-at-sign', expect protocol@addr"), "{stderr}");
}

#[tokio::test(flavor = "multi_thread")]
async fn call_prints_raw_reply() {
    let address = reply_server().await;
    let out = run(vec![
        "call".into(),
        format!("tcp@{address}"),
        "Echo.Say".into(),
        "--data".into(),
        "hello rpclink".into(),
        "--format".into(),
        "raw".into(),
    ])
    .await;

    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(out.stdout, b"hello rpclink");
}

#[tokio::test(flavor = "multi_thread")]
async fn call_with_json_codec_prints_json_summary() {
    let address = reply_server().await;
    let out = run(vec![
        "call".into(),
        format!("tcp@{address}"),
        "Arith.Add".into(),
        "--json".into(),
        "[1,2]".into(),
        "--codec".into(),
        "json".into(),
        "--format".into(),
        "json".into(),
    ])
    .await;

    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let json: serde_json::Value =
        serde_json::from_slice(&out.stdout).expect("stdout should be JSON");
    assert_eq!(json["service_method"], "Arith.Add");
    assert_eq!(json["codec_type"], "application/json");
    assert_eq!(json["reply"], "[1,2]");
}

#[tokio::test(flavor = "multi_thread")]
async fn json_call_over_binary_codec_decodes_reply() {
    let address = reply_server().await;
    let out = run(vec![
        "call".into(),
        format!("tcp@{address}"),
        "Echo.Say".into(),
        "--json".into(),
        r#"{"a":[1,2]}"#.into(),
        "--format".into(),
        "raw".into(),
    ])
    .await;

    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(out.stdout, br#"{"a":[1,2]}"#);
}

#[tokio::test(flavor = "multi_thread")]
async fn undecodable_reply_exits_with_data_invalid() {
    let address = reply_server().await;
    let out = run(vec![
        "call".into(),
        format!("tcp@{address}"),
        "Bad.Body".into(),
        "--json".into(),
        "1".into(),
    ])
    .await;

    assert_eq!(out.status.code(), Some(60));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("invalid body"), "{stderr}");
}

#[tokio::test(flavor = "multi_thread")]
async fn remote_error_exits_with_failure() {
    let address = reply_server().await;
    let out = run(vec!["call".into(), format!("tcp@{address}"), "Fail.Now".into()]).await;

    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("call failed: requested failure"), "{stderr}");
}

#[tokio::test(flavor = "multi_thread")]
async fn probe_reports_negotiated_options() {
    let address = reply_server().await;
    let out = run(vec![
        "probe".into(),
        format!("tcp@{address}"),
        "--connect-timeout".into(),
        "2s".into(),
        "--format".into(),
        "json".into(),
    ])
    .await;

    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let json: serde_json::Value =
        serde_json::from_slice(&out.stdout).expect("stdout should be JSON");
    assert_eq!(json["protocol"], "tcp");
    assert_eq!(json["codec_type"], "application/binary");
    assert_eq!(json["connect_timeout_ms"], 2000);
    assert_eq!(json["magic_number"], 0x3bef5c);
    assert_eq!(json["connected"], true);
}

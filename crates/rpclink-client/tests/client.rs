mod support;

use std::collections::HashSet;
use std::time::{Duration, Instant};

use rpclink_client::{
    dial, dial_http, xdial, ClientError, CodecRegistry, CodecType, Dialer, Done, Options,
};
use rpclink_codec::JsonCodec;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use support::{arith_handler, Bootstrap, MockServer};

async fn plain_server() -> MockServer {
    MockServer::start(Bootstrap::Plain, arith_handler()).await
}

#[tokio::test]
async fn concurrent_calls_get_distinct_seqs_and_one_completion_each() {
    const N: usize = 64;
    let server = plain_server().await;
    let client = dial("tcp", &server.address, &[]).await.expect("dial should succeed");

    let mut done = Done::new(N).expect("capacity is positive");
    let mut seqs = HashSet::new();
    for i in 0..N {
        let submitted = client.go("Echo.Say", format!("payload-{i}"), Some(&done)).await;
        assert!(submitted.is_registered());
        assert!(seqs.insert(submitted.seq()), "seq {} reused", submitted.seq());
    }

    let mut completed = HashSet::new();
    for _ in 0..N {
        let call = done.recv().await.expect("done stays open");
        assert!(completed.insert(call.seq), "seq {} completed twice", call.seq);
        assert_eq!(call.reply.as_deref(), Some(call.args.as_ref()));
    }
    assert_eq!(completed, seqs);
    assert!(done.try_recv().is_none());
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test]
async fn concurrent_callers_share_one_connection() {
    let server = plain_server().await;
    let client = dial("tcp", &server.address, &[]).await.expect("dial should succeed");

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                let args = format!("caller-{i}");
                let reply = client.call("Echo.Say", args.clone()).await.expect("call should succeed");
                assert_eq!(reply.as_ref(), args.as_bytes());
            })
        })
        .collect();
    for task in tasks {
        task.await.expect("caller should not panic");
    }
}

#[tokio::test]
async fn out_of_order_replies_resolve_to_their_calls() {
    let server = plain_server().await;
    let client = dial("tcp", &server.address, &[]).await.expect("dial should succeed");

    // The server sleeps for the first operand in milliseconds, so the second
    // call is answered first.
    let (slow, fast) = tokio::join!(
        client.call("Arith.Add", "[150,2]"),
        client.call("Arith.Add", "[1,20]"),
    );
    assert_eq!(slow.expect("slow add").as_ref(), b"152");
    assert_eq!(fast.expect("fast add").as_ref(), b"21");
}

#[tokio::test]
async fn remote_error_leaves_connection_usable() {
    let server = plain_server().await;
    let client = dial("tcp", &server.address, &[]).await.expect("dial should succeed");

    match client.call("Arith.Div", "[1,0]").await {
        Err(ClientError::Remote(msg)) => assert_eq!(msg, "division by zero"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(
        client.call("Arith.Div", "[9,3]").await.expect("division").as_ref(),
        b"3"
    );
    assert!(client.is_available());
}

#[tokio::test]
async fn server_hangup_flushes_every_pending_call_once() {
    let server = plain_server().await;
    let client = dial("tcp", &server.address, &[]).await.expect("dial should succeed");

    let mut done = Done::new(4).expect("capacity is positive");
    for _ in 0..3 {
        client.go("Slow.Op", "", Some(&done)).await;
    }
    let err = client.call("Kill.Conn", "").await.unwrap_err();
    assert!(err.is_shutdown(), "unexpected error: {err}");

    for _ in 0..3 {
        let call = done.recv().await.expect("done stays open");
        let err = call.error.expect("flushed calls carry an error");
        assert!(err.is_shutdown(), "unexpected error: {err}");
    }
    assert!(done.try_recv().is_none());
    assert!(!client.is_available());

    let late = client.go("Slow.Op", "", Some(&done)).await;
    assert!(!late.is_registered());
    let call = done.recv().await.expect("done stays open");
    assert!(matches!(call.error, Some(ClientError::Shutdown)));
}

#[tokio::test]
async fn close_flushes_pending_calls_with_shutdown() {
    let server = plain_server().await;
    let client = dial("tcp", &server.address, &[]).await.expect("dial should succeed");

    let mut done = Done::new(2).expect("capacity is positive");
    client.go("Slow.Op", "a", Some(&done)).await;
    client.go("Slow.Op", "b", Some(&done)).await;

    client.close().await.expect("first close succeeds");
    for _ in 0..2 {
        let call = done.recv().await.expect("done stays open");
        assert!(matches!(call.error, Some(ClientError::Shutdown)));
    }
    assert!(matches!(client.close().await, Err(ClientError::Shutdown)));
    assert!(!client.is_available());
}

#[tokio::test]
async fn cancelled_call_returns_promptly_and_late_reply_is_dropped() {
    let server = plain_server().await;
    let client = dial("tcp", &server.address, &[]).await.expect("dial should succeed");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let started = Instant::now();
    let result = client.call_with_cancel(&cancel, "Arith.Add", "[200,1]").await;
    assert!(matches!(result, Err(ClientError::Cancelled)));
    assert!(started.elapsed() < Duration::from_millis(200));
    assert_eq!(client.pending_calls(), 0);

    // Let the late reply arrive; it must be discarded without harm.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(client.pending_calls(), 0);
    assert_eq!(
        client.call("Echo.Say", "still here").await.expect("echo").as_ref(),
        b"still here"
    );
}

#[tokio::test]
async fn call_timeout_abandons_the_wait() {
    let server = plain_server().await;
    let client = dial("tcp", &server.address, &[]).await.expect("dial should succeed");

    let result = client
        .call_timeout(Duration::from_millis(50), "Slow.Op", "")
        .await;
    assert!(matches!(result, Err(ClientError::CallTimeout(_))));
    assert_eq!(client.pending_calls(), 0);
    assert!(client.is_available());
}

#[tokio::test]
async fn zero_connect_timeout_waits_for_slow_handshake() {
    let server = MockServer::start(
        Bootstrap::Http {
            status: rpclink_client::CONNECTED,
            delay: Duration::from_millis(300),
        },
        arith_handler(),
    )
    .await;

    let options = Options::default().with_connect_timeout(Duration::ZERO);
    let client = dial_http("tcp", &server.address, &[options])
        .await
        .expect("unbounded dial should succeed");
    assert_eq!(client.call("Echo.Say", "ok").await.expect("echo").as_ref(), b"ok");
}

#[tokio::test]
async fn positive_connect_timeout_fires_when_handshake_stalls() {
    let server = MockServer::start(Bootstrap::Stall, arith_handler()).await;

    let options = Options::default().with_connect_timeout(Duration::from_millis(100));
    let started = Instant::now();
    match dial_http("tcp", &server.address, &[options]).await {
        Err(ClientError::ConnectTimeout(timeout)) => {
            assert_eq!(timeout, Duration::from_millis(100));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn unexpected_tunnel_status_is_rejected() {
    let server = MockServer::start(
        Bootstrap::Http {
            status: "404 Not Found",
            delay: Duration::ZERO,
        },
        arith_handler(),
    )
    .await;

    match dial_http("tcp", &server.address, &[]).await {
        Err(ClientError::Tunnel(msg)) => assert!(msg.contains("404 Not Found"), "{msg}"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn xdial_routes_http_through_the_tunnel() {
    let server = MockServer::start(Bootstrap::http(), arith_handler()).await;

    let client = xdial(&server.target("http"), &[]).await.expect("xdial http");
    assert_eq!(
        client.call("Arith.Add", "[1,2]").await.expect("add").as_ref(),
        b"3"
    );
}

#[tokio::test]
async fn xdial_uses_protocol_as_network() {
    let server = plain_server().await;

    let client = xdial(&server.target("tcp"), &[]).await.expect("xdial tcp");
    assert_eq!(client.call("Echo.Say", "hi").await.expect("echo").as_ref(), b"hi");
}

#[tokio::test]
async fn xdial_without_at_sign_fails_before_io() {
    match xdial("no-at-sign", &[]).await {
        Err(ClientError::InvalidAddress(target)) => assert_eq!(target, "no-at-sign"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn unknown_codec_writes_only_the_options_line() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("listener should bind");
    let address = listener.local_addr().expect("address").to_string();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut stream = BufReader::new(stream);
        let mut line = String::new();
        stream.read_line(&mut line).await.expect("options line");
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).await.expect("read to end");
        (line, rest)
    });

    let options = Options::default().with_codec_type(CodecType::new("application/gob"));
    match dial("tcp", &address, &[options]).await {
        Err(ClientError::InvalidCodecType(codec_type)) => {
            assert_eq!(codec_type.as_str(), "application/gob");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let (line, rest) = server.await.expect("server task");
    let sent: Options = serde_json::from_str(line.trim_end()).expect("options JSON");
    assert_eq!(sent.codec_type.as_str(), "application/gob");
    assert!(rest.is_empty(), "unexpected bytes after options: {rest:?}");
}

#[tokio::test]
async fn registered_json_codec_is_negotiated() {
    let server = plain_server().await;
    let dialer = Dialer::new(CodecRegistry::default().with(CodecType::JSON, || Box::new(JsonCodec)));

    let options = Options::default().with_codec_type(CodecType::JSON);
    let client = dialer
        .dial("tcp", &server.address, &[options])
        .await
        .expect("json dial");
    assert_eq!(client.options().codec_type, CodecType::JSON);
    assert_eq!(
        client.call("Arith.Add", "[40,2]").await.expect("add").as_ref(),
        b"42"
    );
}

#[tokio::test]
async fn malformed_reply_body_fails_only_that_typed_call() {
    let server = plain_server().await;
    let dialer = Dialer::new(CodecRegistry::default().with(CodecType::JSON, || Box::new(JsonCodec)));
    let options = Options::default().with_codec_type(CodecType::JSON);
    let client = dialer
        .dial("tcp", &server.address, &[options])
        .await
        .expect("json dial should succeed");

    let mut done = Done::new(3).expect("done should be created");
    let sum = client.go_typed("Arith.Add", &[1u64, 2], Some(&done)).await.seq();
    let bad = client.go_typed("Bad.Body", "x", Some(&done)).await.seq();
    let echo = client.go_typed("Echo.Say", "still here", Some(&done)).await.seq();

    for _ in 0..3 {
        let call = done.recv().await.expect("every call should complete");
        if call.seq == sum {
            assert_eq!(call.into_typed::<u64>().expect("sum should decode"), 3);
        } else if call.seq == bad {
            let err = call.into_typed::<String>().expect_err("garbage body should fail");
            assert!(matches!(err, ClientError::Codec(_)), "unexpected error: {err}");
        } else {
            assert_eq!(call.seq, echo);
            assert_eq!(
                call.into_typed::<String>().expect("echo should decode"),
                "still here"
            );
        }
    }
    assert!(client.is_available());
    assert_eq!(
        client
            .call_typed::<_, u64>("Arith.Add", &[40u64, 2])
            .await
            .expect("connection should stay usable"),
        42
    );
}

#[tokio::test]
async fn dial_refused_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("listener should bind");
    let address = listener.local_addr().expect("address").to_string();
    drop(listener);

    let err = dial("tcp", &address, &[]).await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)), "unexpected error: {err}");
}

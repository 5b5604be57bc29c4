use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rpclink_client::handshake::read_options;
use rpclink_client::{CodecRegistry, CodecType, Header, CONNECTED};
use rpclink_codec::JsonCodec;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// What the server does with one request.
pub enum Reply {
    Ok { body: Vec<u8>, delay: Duration },
    Error(String),
    /// Never answer.
    Silent,
    /// Drop the connection.
    HangUp,
}

impl Reply {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Reply::Ok {
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(body: impl Into<Vec<u8>>, delay: Duration) -> Self {
        Reply::Ok {
            body: body.into(),
            delay,
        }
    }
}

pub type Handler = Arc<dyn Fn(&Header, &Bytes) -> Reply + Send + Sync>;

/// How the server treats a new connection before the options line.
#[derive(Debug, Clone, Copy)]
pub enum Bootstrap {
    Plain,
    /// Answer a CONNECT with `status` after `delay`.
    Http { status: &'static str, delay: Duration },
    /// Accept and never say anything.
    Stall,
}

impl Bootstrap {
    pub fn http() -> Self {
        Bootstrap::Http {
            status: CONNECTED,
            delay: Duration::ZERO,
        }
    }
}

pub struct MockServer {
    pub address: String,
    task: JoinHandle<()>,
}

impl MockServer {
    pub async fn start(bootstrap: Bootstrap, handler: Handler) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let address = listener
            .local_addr()
            .expect("listener should have an address")
            .to_string();

        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, bootstrap, Arc::clone(&handler)));
            }
        });

        Self { address, task }
    }

    pub fn target(&self, protocol: &str) -> String {
        format!("{protocol}@{}", self.address)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Echo every body; `Arith.Add` sums a JSON pair and sleeps for the first
/// operand in milliseconds; `Arith.Div` reports division by zero; `Slow.Op`
/// never answers; `Kill.Conn` hangs up; `Bad.Body` replies with bytes no
/// codec accepts as a body.
pub fn arith_handler() -> Handler {
    Arc::new(|header: &Header, body: &Bytes| match header.service_method.as_str() {
        "Arith.Add" => {
            let [a, b]: [u64; 2] = serde_json::from_slice(body).expect("args should be a pair");
            Reply::delayed((a + b).to_string(), Duration::from_millis(a))
        }
        "Arith.Div" => {
            let [a, b]: [u64; 2] = serde_json::from_slice(body).expect("args should be a pair");
            if b == 0 {
                Reply::Error("division by zero".to_string())
            } else {
                Reply::ok((a / b).to_string())
            }
        }
        "Slow.Op" => Reply::Silent,
        "Kill.Conn" => Reply::HangUp,
        "Bad.Body" => Reply::ok(vec![0xff, 0xff]),
        _ => Reply::ok(body.to_vec()),
    })
}

pub fn server_registry() -> CodecRegistry {
    CodecRegistry::default().with(CodecType::JSON, || Box::new(JsonCodec))
}

async fn serve(stream: TcpStream, bootstrap: Bootstrap, handler: Handler) {
    let mut stream = BufReader::new(stream);

    match bootstrap {
        Bootstrap::Plain => {}
        Bootstrap::Stall => {
            std::future::pending::<()>().await;
        }
        Bootstrap::Http { status, delay } => {
            let mut line = String::new();
            loop {
                line.clear();
                match stream.read_line(&mut line).await {
                    Ok(0) | Err(_) => return,
                    Ok(_) if line == "\r\n" => break,
                    Ok(_) => {}
                }
            }
            tokio::time::sleep(delay).await;
            let response = format!("HTTP/1.0 {status}\r\n\r\n");
            if stream.get_mut().write_all(response.as_bytes()).await.is_err() {
                return;
            }
        }
    }

    let Ok(options) = read_options(&mut stream).await else {
        return;
    };
    let Ok((mut reader, writer)) = server_registry().open(&options.codec_type, Box::new(stream))
    else {
        return;
    };
    let writer = Arc::new(Mutex::new(writer));

    loop {
        let Ok(header) = reader.read_header().await else {
            return;
        };
        let mut body = Bytes::new();
        if reader.read_body(Some(&mut body)).await.is_err() {
            return;
        }

        let (body, error, delay) = match handler(&header, &body) {
            Reply::Ok { body, delay } => (body, String::new(), delay),
            Reply::Error(error) => (Vec::new(), error, Duration::ZERO),
            Reply::Silent => continue,
            Reply::HangUp => return,
        };

        let writer = Arc::clone(&writer);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut reply = Header::new(header.service_method, header.seq);
            reply.error = error;
            let _ = writer.lock().await.write(&reply, &body).await;
        });
    }
}

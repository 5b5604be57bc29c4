use std::future::Future;
use std::sync::Arc;

use rpclink_codec::CodecRegistry;
use rpclink_transport::BoxedStream;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::Client;
use crate::error::{ClientError, Result};
use crate::http::new_http_client;
use crate::options::Options;

/// Opens connections and performs the client handshake.
///
/// Holds the codec registry every client it creates resolves against.
#[derive(Debug, Clone, Default)]
pub struct Dialer {
    registry: Arc<CodecRegistry>,
}

impl Dialer {
    /// A dialer resolving codecs against `registry`.
    pub fn new(registry: CodecRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// The registry clients are resolved against.
    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    /// Connect to `address` over `network` and start a client.
    ///
    /// At most one [`Options`] may be given; none means the defaults.
    pub async fn dial(&self, network: &str, address: &str, options: &[Options]) -> Result<Client> {
        self.dial_timeout(network, address, options, |stream, options, registry| async move {
            Client::new(stream, options, &registry).await
        })
        .await
    }

    /// Like [`dial`](Self::dial), tunnelling through an HTTP CONNECT first.
    pub async fn dial_http(
        &self,
        network: &str,
        address: &str,
        options: &[Options],
    ) -> Result<Client> {
        self.dial_timeout(network, address, options, |stream, options, registry| async move {
            new_http_client(stream, options, &registry).await
        })
        .await
    }

    /// Dial a `protocol@address` target. `http` tunnels over TCP; any other
    /// protocol is used as the transport network.
    pub async fn xdial(&self, target: &str, options: &[Options]) -> Result<Client> {
        let (protocol, address) = parse_target(target)?;
        match protocol {
            "http" => self.dial_http("tcp", address, options).await,
            network => self.dial(network, address, options).await,
        }
    }

    async fn dial_timeout<F, Fut>(
        &self,
        network: &str,
        address: &str,
        options: &[Options],
        new_client: F,
    ) -> Result<Client>
    where
        F: FnOnce(BoxedStream, Options, Arc<CodecRegistry>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Client>> + Send + 'static,
    {
        let options = Options::resolve(options)?;
        let connect_timeout = options.connect_timeout;
        let stream = rpclink_transport::dial(network, address, connect_timeout).await?;

        let abandon = CancellationToken::new();
        let (tx, rx) = oneshot::channel();
        let registry = Arc::clone(&self.registry);
        let task_abandon = abandon.clone();
        tokio::spawn(async move {
            // Abandoning drops the construction future, and the stream with it.
            let result = tokio::select! {
                _ = task_abandon.cancelled() => {
                    debug!("client construction abandoned");
                    return;
                }
                result = new_client(stream, options, registry) => result,
            };
            // A client nobody received closes itself on drop.
            let _ = tx.send(result);
        });
        let _abandon_on_exit = abandon.drop_guard();

        let received = if connect_timeout.is_zero() {
            rx.await
        } else {
            match tokio::time::timeout(connect_timeout, rx).await {
                Ok(received) => received,
                Err(_) => {
                    warn!(network, address, timeout = ?connect_timeout, "rpc client: connect timeout");
                    return Err(ClientError::ConnectTimeout(connect_timeout));
                }
            }
        };

        let client = received.map_err(|_| {
            ClientError::Handshake("client construction aborted".to_string())
        })??;
        debug!(network, address, "rpc client connected");
        Ok(client)
    }
}

/// Split a `protocol@address` target.
///
/// Exactly one `@` is required.
pub fn parse_target(target: &str) -> Result<(&str, &str)> {
    let mut parts = target.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(protocol), Some(address), None) => Ok((protocol, address)),
        _ => Err(ClientError::InvalidAddress(target.to_string())),
    }
}

/// [`Dialer::dial`] with the default codec registry.
pub async fn dial(network: &str, address: &str, options: &[Options]) -> Result<Client> {
    Dialer::default().dial(network, address, options).await
}

/// [`Dialer::dial_http`] with the default codec registry.
pub async fn dial_http(network: &str, address: &str, options: &[Options]) -> Result<Client> {
    Dialer::default().dial_http(network, address, options).await
}

/// [`Dialer::xdial`] with the default codec registry.
pub async fn xdial(target: &str, options: &[Options]) -> Result<Client> {
    Dialer::default().xdial(target, options).await
}

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use rpclink_codec::{Codec, CodecError, CodecReader, CodecRegistry, CodecWriter, Header};
use rpclink_transport::BoxedStream;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, trace, warn};

use crate::call::{Call, Done, DoneSender, Submitted};
use crate::error::{ClientError, Result};
use crate::handshake::write_options;
use crate::options::Options;

/// An RPC client multiplexing calls over one connection.
///
/// Cloning is cheap and every clone drives the same connection. When the
/// last clone is dropped the dispatch task stops and pending calls are
/// completed with [`ClientError::Shutdown`].
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
    _close_on_drop: Arc<DropGuard>,
}

struct Inner {
    options: Options,
    /// Negotiated codec, for typed bodies.
    codec: Arc<dyn Codec>,
    /// Send lock: serializes every header+body write.
    sending: tokio::sync::Mutex<SendState>,
    /// Registry lock: never held across an `.await`.
    state: Mutex<State>,
    closed: CancellationToken,
    dispatch: Mutex<Option<JoinHandle<()>>>,
}

struct SendState {
    writer: CodecWriter,
    header: Header,
}

struct State {
    seq: u64,
    pending: HashMap<u64, Call>,
    closing: bool,
    shutdown: bool,
}

impl Client {
    /// Perform the options handshake on `stream` and start the client.
    ///
    /// The options frame is written before the codec is resolved, so an
    /// unregistered codec type fails after that single write and nothing else
    /// reaches the peer.
    pub async fn new(
        mut stream: BoxedStream,
        options: Options,
        registry: &CodecRegistry,
    ) -> Result<Self> {
        write_options(&mut stream, &options).await?;

        let (reader, writer) = registry
            .open(&options.codec_type, stream)
            .map_err(|err| {
                warn!(codec_type = %options.codec_type, error = %err, "rpc client: codec error");
                ClientError::from(err)
            })?;

        debug!(codec_type = %options.codec_type, "rpc client ready");
        Ok(Self::with_codec(reader, writer, options))
    }

    /// Start a client over an already negotiated codec.
    ///
    /// Spawns the dispatch task, so this must run inside a tokio runtime.
    pub fn with_codec(reader: CodecReader, writer: CodecWriter, options: Options) -> Self {
        let closed = CancellationToken::new();
        let inner = Arc::new(Inner {
            options,
            codec: Arc::clone(writer.codec().codec()),
            sending: tokio::sync::Mutex::new(SendState {
                writer,
                header: Header::default(),
            }),
            state: Mutex::new(State {
                seq: 1,
                pending: HashMap::new(),
                closing: false,
                shutdown: false,
            }),
            closed: closed.clone(),
            dispatch: Mutex::new(None),
        });

        let handle = tokio::spawn(Arc::clone(&inner).dispatch(reader));
        *inner.lock_dispatch() = Some(handle);

        Self {
            inner,
            _close_on_drop: Arc::new(closed.drop_guard()),
        }
    }

    /// Submit a call without waiting for its reply.
    ///
    /// The request is written before this returns. The completed [`Call`] is
    /// delivered on `done`, or on a fresh [`Done`] of capacity
    /// [`crate::DEFAULT_DONE_CAPACITY`] returned in [`Submitted::into_done`]
    /// when `done` is `None`. A call that cannot be registered (client closed
    /// or shut down) is delivered immediately with [`ClientError::Shutdown`].
    pub async fn go(
        &self,
        service_method: impl Into<String>,
        args: impl Into<Bytes>,
        done: Option<&Done>,
    ) -> Submitted {
        let (sender, created) = completion(done);
        let call = Call::new(service_method.into(), args.into(), sender);
        let seq = self.inner.send(call).await;
        Submitted::new(seq, created)
    }

    /// Like [`Client::go`], with `args` encoded by the negotiated codec.
    ///
    /// The reply body is decoded by the same codec into [`Call::value`]. A
    /// reply that fails to decode fails this call only. Arguments that fail
    /// to encode are delivered immediately with the encoding error.
    pub async fn go_typed<A>(
        &self,
        service_method: impl Into<String>,
        args: &A,
        done: Option<&Done>,
    ) -> Submitted
    where
        A: Serialize + ?Sized,
    {
        let (sender, created) = completion(done);
        let service_method = service_method.into();
        let call = match self.inner.encode_body(args) {
            Ok(body) => Call::new(service_method, body, sender).decoding_reply(),
            Err(err) => {
                debug!(%service_method, error = %err, "rpc client: args encoding failed");
                Call::new(service_method, Bytes::new(), sender).fail(err);
                return Submitted::new(0, created);
            }
        };
        let seq = self.inner.send(call).await;
        Submitted::new(seq, created)
    }

    /// Invoke `service_method` and wait for the reply.
    pub async fn call(
        &self,
        service_method: impl Into<String>,
        args: impl Into<Bytes>,
    ) -> Result<Bytes> {
        self.call_until(service_method, args, std::future::pending())
            .await
    }

    /// Invoke `service_method`, giving up when `cancel` fires.
    ///
    /// Cancelling abandons the wait only: the request has already been sent
    /// and a late reply is discarded.
    pub async fn call_with_cancel(
        &self,
        cancel: &CancellationToken,
        service_method: impl Into<String>,
        args: impl Into<Bytes>,
    ) -> Result<Bytes> {
        self.call_until(service_method, args, async {
            cancel.cancelled().await;
            ClientError::Cancelled
        })
        .await
    }

    /// Invoke `service_method`, giving up after `timeout`.
    pub async fn call_timeout(
        &self,
        timeout: Duration,
        service_method: impl Into<String>,
        args: impl Into<Bytes>,
    ) -> Result<Bytes> {
        let deadline = tokio::time::Instant::now() + timeout;
        self.call_until(service_method, args, async move {
            tokio::time::sleep_until(deadline).await;
            ClientError::CallTimeout(timeout)
        })
        .await
    }

    /// Invoke `service_method` with typed arguments and decode the reply.
    pub async fn call_typed<A, R>(&self, service_method: impl Into<String>, args: &A) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut done = Done::new(1)?;
        let submitted = self.go_typed(service_method, args, Some(&done)).await;
        self.wait(&mut done, submitted.seq(), std::future::pending())
            .await?
            .into_typed()
    }

    async fn call_until<F>(
        &self,
        service_method: impl Into<String>,
        args: impl Into<Bytes>,
        interrupted: F,
    ) -> Result<Bytes>
    where
        F: Future<Output = ClientError>,
    {
        let mut done = Done::new(1)?;
        let submitted = self.go(service_method, args, Some(&done)).await;
        self.wait(&mut done, submitted.seq(), interrupted)
            .await?
            .into_result()
    }

    /// Wait for call `seq` on `done`, or until `interrupted` resolves.
    async fn wait<F>(&self, done: &mut Done, seq: u64, interrupted: F) -> Result<Call>
    where
        F: Future<Output = ClientError>,
    {
        // Dropping this future, or an interruption, de-registers the call.
        let mut guard = PendingGuard::new(&self.inner, seq);

        tokio::select! {
            biased;
            err = interrupted => {
                debug!(seq, error = %err, "call abandoned");
                Err(err)
            }
            call = done.recv() => {
                guard.disarm();
                call.ok_or(ClientError::Shutdown)
            }
        }
    }

    /// Close the connection.
    ///
    /// Pending calls are completed with [`ClientError::Shutdown`] before this
    /// returns, including a call whose write is stalled on a peer that stopped
    /// reading. Closing twice returns [`ClientError::Shutdown`].
    pub async fn close(&self) -> Result<()> {
        {
            let mut state = self.inner.lock_state();
            if state.closing {
                return Err(ClientError::Shutdown);
            }
            state.closing = true;
        }
        self.inner.closed.cancel();

        let result = self.inner.sending.lock().await.writer.close().await;

        let dispatch = self.inner.lock_dispatch().take();
        if let Some(handle) = dispatch {
            if let Err(err) = handle.await {
                warn!(error = %err, "dispatch task failed");
            }
        }

        result.map_err(ClientError::from)
    }

    /// Whether new calls can still be registered.
    pub fn is_available(&self) -> bool {
        let state = self.inner.lock_state();
        !state.closing && !state.shutdown
    }

    /// Number of calls sent and not yet completed.
    pub fn pending_calls(&self) -> usize {
        self.inner.lock_state().pending.len()
    }

    /// Options negotiated for this connection.
    pub fn options(&self) -> &Options {
        &self.inner.options
    }
}

fn completion(done: Option<&Done>) -> (DoneSender, Option<Done>) {
    match done {
        Some(done) => (done.sender(), None),
        None => {
            let done = Done::default();
            (done.sender(), Some(done))
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock_state();
        f.debug_struct("Client")
            .field("codec_type", &self.inner.options.codec_type)
            .field("next_seq", &state.seq)
            .field("pending", &state.pending.len())
            .field("closing", &state.closing)
            .field("shutdown", &state.shutdown)
            .finish()
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_dispatch(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.dispatch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Assign the next seq and insert into pending, or hand the call back if
    /// the client no longer accepts calls.
    fn register_call(&self, mut call: Call) -> std::result::Result<u64, Call> {
        let mut state = self.lock_state();
        if state.closing || state.shutdown {
            return Err(call);
        }
        let seq = state.seq;
        call.seq = seq;
        state.pending.insert(seq, call);
        state.seq += 1;
        Ok(seq)
    }

    fn remove_call(&self, seq: u64) -> Option<Call> {
        self.lock_state().pending.remove(&seq)
    }

    /// Stop accepting calls and stop the dispatch loop, which flushes the
    /// pending table. Used once the outgoing stream may hold a partial frame.
    fn mark_broken(&self) {
        self.lock_state().shutdown = true;
        self.closed.cancel();
    }

    fn encode_body<A: Serialize + ?Sized>(&self, args: &A) -> Result<Bytes> {
        let value = serde_json::to_value(args)
            .map_err(|err| CodecError::InvalidBody(err.to_string()))?;
        let mut body = BytesMut::new();
        self.codec.encode_body(&value, &mut body)?;
        Ok(body.freeze())
    }

    /// Register and write one call. Returns its seq, or 0 if it was never
    /// registered.
    async fn send(&self, call: Call) -> u64 {
        let mut sending = self.sending.lock().await;

        let args = call.args.clone();
        let service_method = call.service_method.clone();
        let seq = match self.register_call(call) {
            Ok(seq) => seq,
            Err(call) => {
                call.fail(ClientError::Shutdown);
                return 0;
            }
        };
        // Covers this future being dropped mid-write.
        let mut guard = WriteGuard::new(self, seq);

        let SendState { writer, header } = &mut *sending;
        header.service_method = service_method;
        header.seq = seq;
        header.error.clear();

        // A peer that stops reading must not keep close() waiting on the lock.
        let written = tokio::select! {
            biased;
            result = writer.write(header, &args) => Some(result),
            _ = self.closed.cancelled() => None,
        };
        guard.disarm();

        match written {
            Some(Ok(())) => {}
            Some(Err(err)) => {
                debug!(seq, error = %err, "rpc client: write failed");
                if matches!(err, CodecError::Io(_)) {
                    self.mark_broken();
                }
                if let Some(call) = self.remove_call(seq) {
                    call.fail(err.into());
                }
            }
            None => {
                debug!(seq, "rpc client: write abandoned on shutdown");
                self.mark_broken();
                if let Some(call) = self.remove_call(seq) {
                    call.fail(ClientError::Shutdown);
                }
            }
        }
        seq
    }

    async fn dispatch(self: Arc<Self>, mut reader: CodecReader) {
        let err = tokio::select! {
            err = self.receive(&mut reader) => {
                match err.as_ref() {
                    CodecError::ConnectionClosed => debug!("connection closed by peer"),
                    other => warn!(error = %other, "rpc client: receive failed"),
                }
                ClientError::ConnectionLost(err)
            }
            _ = self.closed.cancelled() => ClientError::Shutdown,
        };
        self.terminate_calls(err).await;
    }

    /// Read replies until the stream fails, resolving pending calls.
    async fn receive(&self, reader: &mut CodecReader) -> Arc<CodecError> {
        loop {
            let header = match reader.read_header().await {
                Ok(header) => header,
                Err(err) => return Arc::new(err),
            };

            let result = match self.remove_call(header.seq) {
                None => {
                    trace!(seq = header.seq, "reply for unknown call; discarding body");
                    reader.read_body(None).await
                }
                Some(call) if header.is_error() => {
                    let result = reader.read_body(None).await;
                    call.fail(ClientError::Remote(header.error));
                    result
                }
                Some(mut call) => {
                    let mut body = Bytes::new();
                    if let Err(err) = reader.read_body(Some(&mut body)).await {
                        let err = Arc::new(err);
                        call.fail(ClientError::Codec(Arc::clone(&err)));
                        return err;
                    }
                    if call.decodes_reply() {
                        match self.codec.decode_body(&body) {
                            Ok(value) => call.value = Some(value),
                            Err(err) => {
                                debug!(seq = call.seq, error = %err, "rpc client: reply body rejected");
                                call.error = Some(err.into());
                            }
                        }
                    }
                    call.reply = Some(body);
                    call.complete();
                    Ok(())
                }
            };

            if let Err(err) = result {
                return Arc::new(err);
            }
        }
    }

    /// Mark the client shut down and fail every pending call with `err`.
    ///
    /// Takes the send lock before the registry lock so no send can register a
    /// call while the table is being flushed.
    async fn terminate_calls(&self, err: ClientError) {
        let _sending = self.sending.lock().await;
        let mut state = self.lock_state();
        state.shutdown = true;

        let flushed = state.pending.len();
        for (_, call) in state.pending.drain() {
            call.fail(err.clone());
        }
        info!(flushed, error = %err, "rpc client shut down");
    }
}

/// Removes a pending call when dropped while armed.
struct PendingGuard<'a> {
    inner: &'a Inner,
    seq: u64,
    armed: bool,
}

impl<'a> PendingGuard<'a> {
    fn new(inner: &'a Inner, seq: u64) -> Self {
        Self {
            inner,
            seq,
            armed: seq != 0,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Some(call) = self.inner.remove_call(self.seq) {
                call.fail(ClientError::Cancelled);
            }
        }
    }
}

/// Armed while a frame is being written. Dropping it armed means the frame
/// may be torn, so the connection is marked broken.
struct WriteGuard<'a> {
    inner: &'a Inner,
    seq: u64,
    armed: bool,
}

impl<'a> WriteGuard<'a> {
    fn new(inner: &'a Inner, seq: u64) -> Self {
        Self {
            inner,
            seq,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!(seq = self.seq, "rpc client: write interrupted; connection unusable");
            self.inner.mark_broken();
            if let Some(call) = self.inner.remove_call(self.seq) {
                call.fail(ClientError::Cancelled);
            }
        }
    }
}

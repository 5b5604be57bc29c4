use bytes::Bytes;
use rpclink_codec::CodecError;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};

/// Capacity of the completion channel `go` creates when none is supplied.
pub const DEFAULT_DONE_CAPACITY: usize = 10;

/// One in-flight invocation.
///
/// Created by [`crate::Client::go`], held in the client's pending table
/// while outstanding, and delivered exactly once on its [`Done`] channel.
/// After delivery the receiver owns it.
#[derive(Debug)]
pub struct Call {
    /// Sequence number; 0 if the call was never registered.
    pub seq: u64,
    /// Target method in `Service.Method` form.
    pub service_method: String,
    /// Request payload as sent.
    pub args: Bytes,
    /// Reply payload as received.
    pub reply: Option<Bytes>,
    /// Reply body decoded by the negotiated codec, for typed calls.
    pub value: Option<serde_json::Value>,
    /// Failure, set when the call did not succeed.
    pub error: Option<ClientError>,
    decode_reply: bool,
    done: DoneSender,
}

impl Call {
    pub(crate) fn new(service_method: String, args: Bytes, done: DoneSender) -> Self {
        Self {
            seq: 0,
            service_method,
            args,
            reply: None,
            value: None,
            error: None,
            decode_reply: false,
            done,
        }
    }

    /// Mark the reply body for decoding by the dispatch loop.
    pub(crate) fn decoding_reply(mut self) -> Self {
        self.decode_reply = true;
        self
    }

    pub(crate) fn decodes_reply(&self) -> bool {
        self.decode_reply
    }

    /// Convert the completed call into its outcome.
    pub fn into_result(self) -> Result<Bytes> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.reply.unwrap_or_default()),
        }
    }

    /// Convert a completed typed call into its decoded reply.
    pub fn into_typed<R: DeserializeOwned>(self) -> Result<R> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let value = self.value.ok_or_else(|| {
            ClientError::from(CodecError::InvalidBody(
                "reply was not decoded; submit with go_typed".to_string(),
            ))
        })?;
        serde_json::from_value(value)
            .map_err(|err| ClientError::from(CodecError::InvalidBody(err.to_string())))
    }

    /// Complete the call with `err` and deliver it.
    pub(crate) fn fail(mut self, err: ClientError) {
        self.error = Some(err);
        self.complete();
    }

    /// Deliver the call on its completion channel.
    ///
    /// Never blocks. A full channel means the caller sized it smaller than
    /// its number of outstanding calls; the completion is dropped.
    pub(crate) fn complete(self) {
        let done = self.done.clone();
        match done.inner.try_send(self) {
            Ok(()) => {}
            Err(TrySendError::Full(call)) => {
                warn!(
                    seq = call.seq,
                    service_method = %call.service_method,
                    "done channel full; dropping completion"
                );
            }
            Err(TrySendError::Closed(call)) => {
                debug!(seq = call.seq, "done receiver dropped; discarding completion");
            }
        }
    }
}

/// Completion channel for [`Call`]s.
///
/// One `Done` may collect the completions of many calls; give it at least as
/// much capacity as the number of calls that can be outstanding on it.
#[derive(Debug)]
pub struct Done {
    tx: DoneSender,
    rx: mpsc::Receiver<Call>,
}

impl Done {
    /// Create a completion channel holding up to `capacity` undelivered calls.
    ///
    /// A zero capacity is rejected: delivery never blocks, so an unbuffered
    /// channel could never receive anything.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ClientError::UnbufferedDone);
        }
        let (tx, rx) = mpsc::channel(capacity);
        Ok(Self {
            tx: DoneSender { inner: tx },
            rx,
        })
    }

    /// A sender handle for submitting calls against this channel.
    pub fn sender(&self) -> DoneSender {
        self.tx.clone()
    }

    /// Wait for the next completed call.
    ///
    /// Never resolves to `None` while this `Done` is alive, since it holds a
    /// sender itself.
    pub async fn recv(&mut self) -> Option<Call> {
        self.rx.recv().await
    }

    /// Take a completed call if one is ready.
    pub fn try_recv(&mut self) -> Option<Call> {
        self.rx.try_recv().ok()
    }

    /// Maximum number of undelivered calls.
    pub fn capacity(&self) -> usize {
        self.tx.inner.max_capacity()
    }
}

impl Default for Done {
    fn default() -> Self {
        let (tx, rx) = mpsc::channel(DEFAULT_DONE_CAPACITY);
        Self {
            tx: DoneSender { inner: tx },
            rx,
        }
    }
}

/// Cloneable sending side of a [`Done`].
#[derive(Debug, Clone)]
pub struct DoneSender {
    inner: mpsc::Sender<Call>,
}

/// Result of [`crate::Client::go`].
#[derive(Debug)]
pub struct Submitted {
    seq: u64,
    done: Option<Done>,
}

impl Submitted {
    pub(crate) fn new(seq: u64, done: Option<Done>) -> Self {
        Self { seq, done }
    }

    /// Sequence number assigned to the call, or 0 if registration failed.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Whether the call made it into the pending table.
    pub fn is_registered(&self) -> bool {
        self.seq != 0
    }

    /// The completion channel `go` created, if the caller supplied none.
    pub fn into_done(self) -> Option<Done> {
        self.done
    }
}

//! Multiplexing RPC client runtime.
//!
//! A [`Client`] owns one connection. Many calls can be outstanding at once;
//! each is tagged with a sequence number and resolved by a background
//! dispatch task when its reply arrives. Connections are opened with
//! [`dial`], [`dial_http`] (CONNECT tunnel) or [`xdial`] (`protocol@address`).

pub mod call;
pub mod client;
pub mod dial;
pub mod error;
pub mod handshake;
pub mod http;
pub mod options;

pub use call::{Call, Done, DoneSender, Submitted, DEFAULT_DONE_CAPACITY};
pub use client::Client;
pub use dial::{dial, dial_http, parse_target, xdial, Dialer};
pub use error::{ClientError, Result};
pub use http::{CONNECTED, DEFAULT_RPC_PATH};
pub use options::{Options, MAGIC_NUMBER};
pub use rpclink_codec::{CodecRegistry, CodecType, Header};

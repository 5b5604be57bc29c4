use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Correlation envelope sent immediately before each body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Target method in `Service.Method` form.
    pub service_method: String,
    /// Sequence number correlating a reply with its request.
    pub seq: u64,
    /// Remote error message; empty on success.
    #[serde(default)]
    pub error: String,
}

impl Header {
    /// Create a request header with an empty error.
    pub fn new(service_method: impl Into<String>, seq: u64) -> Self {
        Self {
            service_method: service_method.into(),
            seq,
            error: String::new(),
        }
    }

    /// True when the peer reported an error for this sequence number.
    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}

/// Content-type token naming a codec in a [`crate::CodecRegistry`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodecType(Cow<'static, str>);

impl CodecType {
    /// Length-prefixed binary headers. Registered by default.
    pub const BINARY: CodecType = CodecType(Cow::Borrowed("application/binary"));
    /// JSON headers. Recognized, but must be registered explicitly.
    pub const JSON: CodecType = CodecType(Cow::Borrowed("application/json"));

    /// Build a codec type from an arbitrary token.
    pub fn new(token: impl Into<Cow<'static, str>>) -> Self {
        Self(token.into())
    }

    /// The token string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the empty token, which option resolution replaces with the default.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for CodecType {
    fn default() -> Self {
        Self::new("")
    }
}

impl From<&'static str> for CodecType {
    fn from(token: &'static str) -> Self {
        Self::new(token)
    }
}

impl From<String> for CodecType {
    fn from(token: String) -> Self {
        Self::new(token)
    }
}

impl fmt::Display for CodecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CodecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CodecType({:?})", self.as_str())
    }
}

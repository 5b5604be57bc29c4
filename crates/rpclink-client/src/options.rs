use std::time::Duration;

use rpclink_codec::CodecType;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Protocol constant carried in every handshake.
pub const MAGIC_NUMBER: u32 = 0x3bef5c;

/// Connection options sent as the first frame of every connection.
///
/// On the wire this is one JSON object:
/// `{"magic_number":..,"codec_type":"..","connect_timeout_ms":..,"handle_timeout_ms":..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// Protocol constant; always forced to [`MAGIC_NUMBER`] on resolution.
    pub magic_number: u32,
    /// Codec used for every message after the handshake.
    #[serde(default)]
    pub codec_type: CodecType,
    /// Bound on dialing plus client construction. Zero waits indefinitely.
    #[serde(rename = "connect_timeout_ms", with = "millis", default)]
    pub connect_timeout: Duration,
    /// Per-call processing budget advertised to the server. Zero means none.
    #[serde(rename = "handle_timeout_ms", with = "millis", default)]
    pub handle_timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            magic_number: MAGIC_NUMBER,
            codec_type: CodecType::BINARY,
            connect_timeout: Duration::from_secs(10),
            handle_timeout: Duration::ZERO,
        }
    }
}

impl Options {
    /// Override the codec type.
    pub fn with_codec_type(mut self, codec_type: CodecType) -> Self {
        self.codec_type = codec_type;
        self
    }

    /// Override the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Override the handle timeout.
    pub fn with_handle_timeout(mut self, timeout: Duration) -> Self {
        self.handle_timeout = timeout;
        self
    }

    /// Resolve the options a caller supplied to a dial function.
    ///
    /// No options yields the defaults; more than one is rejected. An empty
    /// codec type inherits the default codec, and the magic number is always
    /// reset to [`MAGIC_NUMBER`].
    pub fn resolve(options: &[Options]) -> Result<Options> {
        match options {
            [] => Ok(Options::default()),
            [single] => {
                let mut resolved = single.clone();
                resolved.magic_number = MAGIC_NUMBER;
                if resolved.codec_type.is_empty() {
                    resolved.codec_type = Options::default().codec_type;
                }
                Ok(resolved)
            }
            more => Err(ClientError::Config(format!(
                "number of options is more than one ({})",
                more.len()
            ))),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_options_resolve_to_default() {
        assert_eq!(Options::resolve(&[]).unwrap(), Options::default());
    }

    #[test]
    fn more_than_one_option_is_rejected() {
        let result = Options::resolve(&[Options::default(), Options::default()]);
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[test]
    fn empty_codec_inherits_default_and_magic_is_forced() {
        let supplied = Options {
            magic_number: 42,
            codec_type: CodecType::default(),
            connect_timeout: Duration::ZERO,
            handle_timeout: Duration::from_secs(2),
        };
        let resolved = Options::resolve(&[supplied]).unwrap();
        assert_eq!(resolved.magic_number, MAGIC_NUMBER);
        assert_eq!(resolved.codec_type, CodecType::BINARY);
        assert_eq!(resolved.connect_timeout, Duration::ZERO);
        assert_eq!(resolved.handle_timeout, Duration::from_secs(2));
    }

    #[test]
    fn explicit_codec_is_kept() {
        let supplied = Options::default().with_codec_type(CodecType::JSON);
        let resolved = Options::resolve(&[supplied]).unwrap();
        assert_eq!(resolved.codec_type, CodecType::JSON);
    }

    #[test]
    fn wire_format_uses_millisecond_fields() {
        let options = Options::default().with_handle_timeout(Duration::from_millis(1500));
        let json: serde_json::Value = serde_json::to_value(&options).unwrap();
        assert_eq!(json["magic_number"], MAGIC_NUMBER);
        assert_eq!(json["codec_type"], "application/binary");
        assert_eq!(json["connect_timeout_ms"], 10_000);
        assert_eq!(json["handle_timeout_ms"], 1500);

        let parsed: Options = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, options);
    }
}

use std::fmt;
use std::str::FromStr;

use crate::error::TransportError;

/// Network families accepted by [`crate::dial`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    /// TCP over IPv4 or IPv6, whichever the address resolves to first.
    Tcp,
    /// TCP restricted to IPv4 addresses.
    Tcp4,
    /// TCP restricted to IPv6 addresses.
    Tcp6,
    /// Unix domain socket; the address is a filesystem path.
    Unix,
}

impl Network {
    /// The network token as written in dial targets.
    pub fn name(self) -> &'static str {
        match self {
            Network::Tcp => "tcp",
            Network::Tcp4 => "tcp4",
            Network::Tcp6 => "tcp6",
            Network::Unix => "unix",
        }
    }
}

impl FromStr for Network {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Network::Tcp),
            "tcp4" => Ok(Network::Tcp4),
            "tcp6" => Ok(Network::Tcp6),
            "unix" => Ok(Network::Unix),
            other => Err(TransportError::UnsupportedNetwork(other.to_string())),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

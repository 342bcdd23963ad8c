//! Decoded PROXY header

use std::fmt;
use std::net::SocketAddr;

use bytes::Bytes;

use super::error::ProxyError;
use super::transport::TransportProtocol;

/// PROXY protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyVersion {
    V1,
    V2,
}

/// Command carried by the header.
///
/// v1 has no command byte: `UNKNOWN` maps to `Local`, everything else to
/// `Proxy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Health check or proxy-originated connection, no usable addresses
    Local,
    /// Relayed connection, source and destination are the real endpoints
    Proxy,
}

impl Command {
    pub fn is_local(self) -> bool {
        self == Command::Local
    }
}

impl TryFrom<u8> for Command {
    type Error = ProxyError;

    fn try_from(b: u8) -> Result<Self, Self::Error> {
        match b {
            0x20 => Ok(Command::Local),
            0x21 => Ok(Command::Proxy),
            other => Err(ProxyError::UnsupportedCommand(other)),
        }
    }
}

/// Socket type of a Unix-domain endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnixKind {
    Stream,
    Datagram,
}

impl UnixKind {
    /// Network name: `unix` or `unixgram`
    pub fn network(self) -> &'static str {
        match self {
            UnixKind::Stream => "unix",
            UnixKind::Datagram => "unixgram",
        }
    }
}

/// Unix-domain socket address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnixEndpoint {
    pub kind: UnixKind,
    /// Socket path; empty for unnamed sockets
    pub path: String,
}

/// Connection endpoint, either from a PROXY header or from the socket itself
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Tcp(SocketAddr),
    Udp(SocketAddr),
    Unix(UnixEndpoint),
}

impl Endpoint {
    /// Network name in the style of `tcp`, `udp`, `unix`, `unixgram`
    pub fn network(&self) -> &'static str {
        match self {
            Endpoint::Tcp(_) => "tcp",
            Endpoint::Udp(_) => "udp",
            Endpoint::Unix(u) => u.kind.network(),
        }
    }

    /// IP socket address, if this is a TCP or UDP endpoint
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self {
            Endpoint::Tcp(addr) | Endpoint::Udp(addr) => Some(*addr),
            Endpoint::Unix(_) => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) | Endpoint::Udp(addr) => write!(f, "{}", addr),
            Endpoint::Unix(u) => write!(f, "{}", u.path),
        }
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Endpoint::Tcp(addr)
    }
}

/// Information extracted from a PROXY protocol header.
///
/// Built once by the v1 or v2 parser and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    version: ProxyVersion,
    command: Command,
    transport: TransportProtocol,
    source: Option<Endpoint>,
    destination: Option<Endpoint>,
    raw_tlvs: Bytes,
}

impl Header {
    pub(crate) fn new(
        version: ProxyVersion,
        command: Command,
        transport: TransportProtocol,
        addresses: Option<(Endpoint, Endpoint)>,
        raw_tlvs: Bytes,
    ) -> Self {
        let (source, destination) = match addresses {
            Some((src, dst)) => (Some(src), Some(dst)),
            None => (None, None),
        };
        Self {
            version,
            command,
            transport,
            source,
            destination,
            raw_tlvs,
        }
    }

    /// Protocol version used (v1 or v2)
    pub fn version(&self) -> ProxyVersion {
        self.version
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn transport(&self) -> TransportProtocol {
        self.transport
    }

    /// Original client address
    pub fn source(&self) -> Option<&Endpoint> {
        self.source.as_ref()
    }

    /// Address the client connected to
    pub fn destination(&self) -> Option<&Endpoint> {
        self.destination.as_ref()
    }

    /// Undecoded TLV vector following the v2 address block
    pub fn raw_tlvs(&self) -> &Bytes {
        &self.raw_tlvs
    }
}

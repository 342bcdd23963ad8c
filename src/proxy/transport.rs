//! Address family and transport protocol byte
//!
//! The v2 header carries one byte whose high nibble is the address family
//! and whose low nibble is the socket type. v1 headers map onto the same
//! values (`TCP4`, `TCP6`, `UNKNOWN`).

use super::error::ProxyError;

const FAMILY_MASK: u8 = 0xF0;
const PROTOCOL_MASK: u8 = 0x0F;

const FAMILY_UNSPEC: u8 = 0x00;
const FAMILY_INET: u8 = 0x10;
const FAMILY_INET6: u8 = 0x20;
const FAMILY_UNIX: u8 = 0x30;

const PROTOCOL_UNSPEC: u8 = 0x00;
const PROTOCOL_STREAM: u8 = 0x01;
const PROTOCOL_DGRAM: u8 = 0x02;

/// Address block sizes in a v2 payload
pub const IPV4_ADDRESS_LEN: u16 = 12;
pub const IPV6_ADDRESS_LEN: u16 = 36;
pub const UNIX_ADDRESS_LEN: u16 = 216;

/// Length of one Unix path field in a v2 address block
pub const UNIX_PATH_LEN: usize = 108;

/// Transport protocol and address family of a PROXY header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TransportProtocol {
    Unspec = FAMILY_UNSPEC | PROTOCOL_UNSPEC,
    Tcp4 = FAMILY_INET | PROTOCOL_STREAM,
    Udp4 = FAMILY_INET | PROTOCOL_DGRAM,
    Tcp6 = FAMILY_INET6 | PROTOCOL_STREAM,
    Udp6 = FAMILY_INET6 | PROTOCOL_DGRAM,
    UnixStream = FAMILY_UNIX | PROTOCOL_STREAM,
    UnixDatagram = FAMILY_UNIX | PROTOCOL_DGRAM,
}

impl TransportProtocol {
    /// Wire encoding of this transport
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn is_ipv4(self) -> bool {
        classify(self.as_byte()).is_ipv4()
    }

    pub fn is_ipv6(self) -> bool {
        classify(self.as_byte()).is_ipv6()
    }

    pub fn is_unix(self) -> bool {
        classify(self.as_byte()).is_unix()
    }

    pub fn is_unspecified_family(self) -> bool {
        classify(self.as_byte()).is_unspecified_family()
    }

    pub fn is_stream(self) -> bool {
        classify(self.as_byte()).is_stream()
    }

    pub fn is_datagram(self) -> bool {
        classify(self.as_byte()).is_datagram()
    }

    /// True if either the family or the protocol is unspecified
    pub fn is_unspecified(self) -> bool {
        classify(self.as_byte()).is_unspecified()
    }

    /// Minimum v2 payload length able to hold this transport's addresses
    pub fn min_address_len(self) -> u16 {
        if self.is_ipv4() {
            IPV4_ADDRESS_LEN
        } else if self.is_ipv6() {
            IPV6_ADDRESS_LEN
        } else if self.is_unix() {
            UNIX_ADDRESS_LEN
        } else {
            0
        }
    }
}

impl TryFrom<u8> for TransportProtocol {
    type Error = ProxyError;

    fn try_from(b: u8) -> Result<Self, Self::Error> {
        match b {
            0x00 => Ok(TransportProtocol::Unspec),
            0x11 => Ok(TransportProtocol::Tcp4),
            0x12 => Ok(TransportProtocol::Udp4),
            0x21 => Ok(TransportProtocol::Tcp6),
            0x22 => Ok(TransportProtocol::Udp6),
            0x31 => Ok(TransportProtocol::UnixStream),
            0x32 => Ok(TransportProtocol::UnixDatagram),
            _ => Err(ProxyError::UnsupportedAddressFamily),
        }
    }
}

/// Raw nibble view of an arbitrary transport byte.
///
/// Reserved family or protocol values answer false to every positive
/// predicate; it is up to the caller to reject them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportBits(u8);

/// Classify a raw transport byte without validating it.
pub fn classify(b: u8) -> TransportBits {
    TransportBits(b)
}

impl TransportBits {
    pub fn is_ipv4(self) -> bool {
        self.0 & FAMILY_MASK == FAMILY_INET
    }

    pub fn is_ipv6(self) -> bool {
        self.0 & FAMILY_MASK == FAMILY_INET6
    }

    pub fn is_unix(self) -> bool {
        self.0 & FAMILY_MASK == FAMILY_UNIX
    }

    pub fn is_unspecified_family(self) -> bool {
        self.0 & FAMILY_MASK == FAMILY_UNSPEC
    }

    pub fn is_stream(self) -> bool {
        self.0 & PROTOCOL_MASK == PROTOCOL_STREAM
    }

    pub fn is_datagram(self) -> bool {
        self.0 & PROTOCOL_MASK == PROTOCOL_DGRAM
    }

    pub fn is_unspecified(self) -> bool {
        self.is_unspecified_family() || self.0 & PROTOCOL_MASK == PROTOCOL_UNSPEC
    }
}

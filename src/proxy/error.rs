//! PROXY Protocol Errors

/// Coarse grouping of [`ProxyError`] variants.
///
/// Lets callers decide what to do with a connection without matching on
/// every variant: `AbsenceOfHeader` is the normal outcome for a connection
/// that was not proxied, everything else means the connection should be
/// closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No PROXY signature at the start of the stream
    AbsenceOfHeader,
    /// Stream ended before the header was complete
    Truncation,
    /// v1 line structure violated
    MalformedSyntax,
    /// Command or address family not supported
    UnsupportedField,
    /// Address, port or length failed validation
    InvalidValue,
    /// Header presence conflicts with the configured policy
    Policy,
    /// Timeout or transport error
    Io,
}

/// Errors that can occur during PROXY header parsing
#[derive(Debug)]
pub enum ProxyError {
    /// PROXY protocol not detected (no signature)
    NoProxyProtocolHeader,
    /// v1 line ended before the CRLF terminator was received
    CannotReadHeader,
    /// v1 line exceeds 107 bytes
    HeaderTooLong,
    /// v1 line not terminated by CRLF
    MalformedLineEnding,
    /// v2 stream ended while reading the named field
    Truncated(&'static str),
    /// v2 version/command byte is not LOCAL or PROXY
    UnsupportedCommand(u8),
    /// Unknown or disallowed address family and protocol
    UnsupportedAddressFamily,
    /// v2 length field too small for the address family, too large, or
    /// not backed by enough bytes
    InvalidLength(u16),
    /// Address does not match the declared family
    InvalidAddress,
    /// Port outside 0..=65535 or not a number
    InvalidPort,
    /// Peer sent a PROXY header but the listener rejects them
    SuperfluousHeader,
    /// Timeout waiting for PROXY header
    Timeout,
    /// IO error reading from socket
    Io(std::io::Error),
}

impl ProxyError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProxyError::NoProxyProtocolHeader => ErrorKind::AbsenceOfHeader,
            ProxyError::CannotReadHeader | ProxyError::Truncated(_) => ErrorKind::Truncation,
            ProxyError::HeaderTooLong | ProxyError::MalformedLineEnding => {
                ErrorKind::MalformedSyntax
            }
            ProxyError::UnsupportedCommand(_) | ProxyError::UnsupportedAddressFamily => {
                ErrorKind::UnsupportedField
            }
            ProxyError::InvalidLength(_) | ProxyError::InvalidAddress | ProxyError::InvalidPort => {
                ErrorKind::InvalidValue
            }
            ProxyError::SuperfluousHeader => ErrorKind::Policy,
            ProxyError::Timeout | ProxyError::Io(_) => ErrorKind::Io,
        }
    }

    /// True when the stream simply carried no PROXY header.
    pub fn is_absence(&self) -> bool {
        self.kind() == ErrorKind::AbsenceOfHeader
    }
}

impl std::fmt::Display for ProxyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProxyError::NoProxyProtocolHeader => write!(f, "no PROXY protocol signature"),
            ProxyError::CannotReadHeader => write!(f, "can't read PROXY v1 header"),
            ProxyError::HeaderTooLong => write!(f, "PROXY v1 header must be 107 bytes or less"),
            ProxyError::MalformedLineEnding => write!(f, "PROXY v1 header must end with \\r\\n"),
            ProxyError::Truncated(field) => write!(f, "PROXY v2 header truncated reading {}", field),
            ProxyError::UnsupportedCommand(b) => {
                write!(f, "unsupported PROXY version and command: {:#04x}", b)
            }
            ProxyError::UnsupportedAddressFamily => {
                write!(f, "unsupported PROXY address family and protocol")
            }
            ProxyError::InvalidLength(len) => write!(f, "invalid PROXY v2 length: {}", len),
            ProxyError::InvalidAddress => write!(f, "invalid PROXY address"),
            ProxyError::InvalidPort => write!(f, "invalid PROXY port number"),
            ProxyError::SuperfluousHeader => {
                write!(f, "peer sent a PROXY header but isn't allowed to send one")
            }
            ProxyError::Timeout => write!(f, "PROXY header timeout"),
            ProxyError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for ProxyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProxyError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ProxyError {
    fn from(e: std::io::Error) -> Self {
        ProxyError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_grouping() {
        assert!(ProxyError::NoProxyProtocolHeader.is_absence());
        assert_eq!(ProxyError::CannotReadHeader.kind(), ErrorKind::Truncation);
        assert_eq!(ProxyError::Truncated("length").kind(), ErrorKind::Truncation);
        assert_eq!(ProxyError::MalformedLineEnding.kind(), ErrorKind::MalformedSyntax);
        assert_eq!(ProxyError::UnsupportedCommand(0x22).kind(), ErrorKind::UnsupportedField);
        assert_eq!(ProxyError::InvalidLength(4).kind(), ErrorKind::InvalidValue);
        assert_eq!(ProxyError::SuperfluousHeader.kind(), ErrorKind::Policy);
        assert!(!ProxyError::Timeout.is_absence());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ProxyError::UnsupportedCommand(0x22).to_string(),
            "unsupported PROXY version and command: 0x22"
        );
        assert_eq!(
            ProxyError::InvalidLength(4).to_string(),
            "invalid PROXY v2 length: 4"
        );
    }
}

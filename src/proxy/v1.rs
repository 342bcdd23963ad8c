//! PROXY v1 (text) header parser
//!
//! Format: `PROXY <TCP4|TCP6|UNKNOWN> <SRC_ADDR> <DST_ADDR> <SRC_PORT> <DST_PORT>\r\n`

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use bytes::Bytes;
use smallvec::SmallVec;
use tokio::io::AsyncRead;

use super::error::ProxyError;
use super::header::{Command, Endpoint, Header, ProxyVersion};
use super::reader::PeekReader;
use super::transport::TransportProtocol;

/// PROXY v1 signature
pub const SIGNATURE: &[u8] = b"PROXY";

/// Maximum v1 line length, CRLF included
pub const MAX_LINE_LEN: usize = 107;

/// Read and parse a v1 header. The reader must be positioned at `PROXY`.
///
/// Reads one byte at a time so that nothing past the terminating `\n` is
/// consumed.
pub async fn parse<R: AsyncRead + Unpin>(reader: &mut PeekReader<R>) -> Result<Header, ProxyError> {
    let mut line = Vec::with_capacity(MAX_LINE_LEN);
    loop {
        let b = reader
            .next_byte()
            .await?
            .ok_or(ProxyError::CannotReadHeader)?;
        line.push(b);
        if b == b'\n' {
            break;
        }
        if line.len() == MAX_LINE_LEN {
            return Err(ProxyError::HeaderTooLong);
        }
    }

    parse_line(&line)
}

/// Parse a complete v1 line, terminator included.
fn parse_line(line: &[u8]) -> Result<Header, ProxyError> {
    let body = line
        .strip_suffix(b"\r\n")
        .ok_or(ProxyError::MalformedLineEnding)?;

    let tokens: SmallVec<[&[u8]; 6]> = body.split(|&b| b == b' ').collect();
    if tokens.len() < 2 {
        return Err(ProxyError::UnsupportedAddressFamily);
    }

    let transport = match tokens[1] {
        b"TCP4" => TransportProtocol::Tcp4,
        b"TCP6" => TransportProtocol::Tcp6,
        b"UNKNOWN" => TransportProtocol::Unspec,
        _ => return Err(ProxyError::UnsupportedAddressFamily),
    };

    // Anything after UNKNOWN is ignored
    if transport == TransportProtocol::Unspec {
        return Ok(Header::new(
            ProxyVersion::V1,
            Command::Local,
            transport,
            None,
            Bytes::new(),
        ));
    }

    if tokens.len() != 6 {
        return Err(ProxyError::UnsupportedAddressFamily);
    }

    let src_ip = parse_ip(transport, tokens[2])?;
    let dst_ip = parse_ip(transport, tokens[3])?;
    let src_port = parse_port(tokens[4])?;
    let dst_port = parse_port(tokens[5])?;

    Ok(Header::new(
        ProxyVersion::V1,
        Command::Proxy,
        transport,
        Some((
            Endpoint::Tcp(SocketAddr::new(src_ip, src_port)),
            Endpoint::Tcp(SocketAddr::new(dst_ip, dst_port)),
        )),
        Bytes::new(),
    ))
}

fn parse_ip(transport: TransportProtocol, token: &[u8]) -> Result<IpAddr, ProxyError> {
    let text = std::str::from_utf8(token).map_err(|_| ProxyError::InvalidAddress)?;
    match transport {
        TransportProtocol::Tcp4 => text
            .parse::<Ipv4Addr>()
            .map(IpAddr::V4)
            .map_err(|_| ProxyError::InvalidAddress),
        // Any IPv6 literal, IPv4-mapped included
        TransportProtocol::Tcp6 => text
            .parse::<Ipv6Addr>()
            .map(IpAddr::V6)
            .map_err(|_| ProxyError::InvalidAddress),
        _ => Err(ProxyError::InvalidAddress),
    }
}

fn parse_port(token: &[u8]) -> Result<u16, ProxyError> {
    std::str::from_utf8(token)
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or(ProxyError::InvalidPort)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;
    use tokio::io::AsyncReadExt;
    use tokio_test::io::Builder;

    async fn parse_bytes(input: &[u8]) -> (Result<Header, ProxyError>, Vec<u8>) {
        let mut reader = PeekReader::new(std::io::Cursor::new(input.to_vec()));
        let result = parse(&mut reader).await;
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).await.unwrap();
        (result, rest)
    }

    #[tokio::test]
    async fn test_parse_v1_tcp4() {
        let (result, rest) = parse_bytes(b"PROXY TCP4 1.2.3.4 5.6.7.8 1111 2222\r\nGET /").await;
        let header = result.unwrap();

        assert_eq!(header.version(), ProxyVersion::V1);
        assert_eq!(header.command(), Command::Proxy);
        assert_eq!(header.transport(), TransportProtocol::Tcp4);
        assert_eq!(
            header.source(),
            Some(&Endpoint::Tcp("1.2.3.4:1111".parse().unwrap()))
        );
        assert_eq!(
            header.destination(),
            Some(&Endpoint::Tcp("5.6.7.8:2222".parse().unwrap()))
        );
        assert!(header.raw_tlvs().is_empty());
        assert_eq!(rest, b"GET /");
    }

    #[tokio::test]
    async fn test_parse_v1_tcp6() {
        let (result, _) = parse_bytes(b"PROXY TCP6 2001:db8::1 ::1 52953 25\r\n").await;
        let header = result.unwrap();

        assert_eq!(header.transport(), TransportProtocol::Tcp6);
        assert_eq!(
            header.source(),
            Some(&Endpoint::Tcp("[2001:db8::1]:52953".parse().unwrap()))
        );
        assert_eq!(
            header.destination(),
            Some(&Endpoint::Tcp("[::1]:25".parse().unwrap()))
        );
    }

    #[tokio::test]
    async fn test_parse_v1_tcp6_ipv4_mapped() {
        let (result, _) =
            parse_bytes(b"PROXY TCP6 ::ffff:10.0.0.1 ::ffff:10.0.0.2 1000 2000\r\n").await;
        let header = result.unwrap();
        assert_eq!(
            header.source(),
            Some(&Endpoint::Tcp("[::ffff:10.0.0.1]:1000".parse().unwrap()))
        );
    }

    #[tokio::test]
    async fn test_parse_v1_unknown() {
        let (result, rest) = parse_bytes(b"PROXY UNKNOWN\r\npayload").await;
        let header = result.unwrap();

        assert_eq!(header.command(), Command::Local);
        assert_eq!(header.transport(), TransportProtocol::Unspec);
        assert_eq!(header.source(), None);
        assert_eq!(header.destination(), None);
        assert_eq!(rest, b"payload");
    }

    #[tokio::test]
    async fn test_parse_v1_unknown_ignores_trailing_fields() {
        let (result, _) =
            parse_bytes(b"PROXY UNKNOWN ffff::1 ffff::2 65535 65535\r\n").await;
        let header = result.unwrap();
        assert_eq!(header.command(), Command::Local);
        assert_eq!(header.source(), None);
    }

    #[tokio::test]
    async fn test_parse_v1_split_across_reads() {
        let mock = Builder::new()
            .read(b"PROXY TCP4 10.0.")
            .read(b"0.1 10.0.0.2 80")
            .read(b" 443\r\n")
            .build();
        let mut reader = PeekReader::new(mock);

        let header = parse(&mut reader).await.unwrap();
        assert_eq!(
            header.source(),
            Some(&Endpoint::Tcp("10.0.0.1:80".parse().unwrap()))
        );
    }

    #[tokio::test]
    async fn test_header_too_long() {
        let mut input = b"PROXY TCP4 ".to_vec();
        input.resize(108, b'1');
        let (result, _) = parse_bytes(&input).await;
        assert!(matches!(result, Err(ProxyError::HeaderTooLong)));
    }

    #[tokio::test]
    async fn test_max_length_line_accepted() {
        // 107 bytes with CRLF is still legal
        let mut input = b"PROXY UNKNOWN ".to_vec();
        input.resize(105, b'x');
        input.extend_from_slice(b"\r\n");
        assert_eq!(input.len(), MAX_LINE_LEN);

        let (result, _) = parse_bytes(&input).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_missing_cr() {
        let (result, _) = parse_bytes(b"PROXY TCP4 1.2.3.4 5.6.7.8 1111 2222\n").await;
        assert!(matches!(result, Err(ProxyError::MalformedLineEnding)));
    }

    #[tokio::test]
    async fn test_eof_before_terminator() {
        let (result, _) = parse_bytes(b"PROXY TCP4 1.2.3.4").await;
        assert!(matches!(result, Err(ProxyError::CannotReadHeader)));
    }

    #[test_case(b"PROXY\r\n"; "no family")]
    #[test_case(b"PROXY TCP5 1.2.3.4 5.6.7.8 1 2\r\n"; "unknown family")]
    #[test_case(b"PROXY UDP4 1.2.3.4 5.6.7.8 1 2\r\n"; "udp not in v1")]
    #[test_case(b"PROXY TCP4 1.2.3.4 5.6.7.8 1111\r\n"; "too few fields")]
    #[test_case(b"PROXY TCP4 1.2.3.4 5.6.7.8 1111 2222 extra\r\n"; "too many fields")]
    #[test_case(b"PROXY  TCP4 1.2.3.4 5.6.7.8 1111 2222\r\n"; "double space")]
    fn test_unsupported_family(input: &[u8]) {
        let result = parse_line(input);
        assert!(
            matches!(result, Err(ProxyError::UnsupportedAddressFamily)),
            "{:?}",
            result
        );
    }

    #[test_case(b"PROXY TCP4 ::1 5.6.7.8 1111 2222\r\n"; "v6 source under tcp4")]
    #[test_case(b"PROXY TCP6 1.2.3.4 ::1 1111 2222\r\n"; "v4 source under tcp6")]
    #[test_case(b"PROXY TCP4 1.2.3 5.6.7.8 1111 2222\r\n"; "short v4")]
    #[test_case(b"PROXY TCP4 1.2.3.4 localhost 1111 2222\r\n"; "hostname")]
    #[test_case(b"PROXY TCP4 1.2.3.256 5.6.7.8 1111 2222\r\n"; "octet overflow")]
    fn test_invalid_address(input: &[u8]) {
        let result = parse_line(input);
        assert!(matches!(result, Err(ProxyError::InvalidAddress)), "{:?}", result);
    }

    #[test_case(b"PROXY TCP4 1.2.3.4 5.6.7.8 65536 2222\r\n"; "above range")]
    #[test_case(b"PROXY TCP4 1.2.3.4 5.6.7.8 1111 -1\r\n"; "negative")]
    #[test_case(b"PROXY TCP4 1.2.3.4 5.6.7.8 http 2222\r\n"; "not a number")]
    #[test_case(b"PROXY TCP4 1.2.3.4 5.6.7.8 1111 \r\n"; "empty")]
    fn test_invalid_port(input: &[u8]) {
        let result = parse_line(input);
        assert!(matches!(result, Err(ProxyError::InvalidPort)), "{:?}", result);
    }

    #[test]
    fn test_port_bounds() {
        let header = parse_line(b"PROXY TCP4 1.2.3.4 5.6.7.8 0 65535\r\n").unwrap();
        assert_eq!(header.source().and_then(Endpoint::socket_addr).map(|a| a.port()), Some(0));
        assert_eq!(
            header.destination().and_then(Endpoint::socket_addr).map(|a| a.port()),
            Some(65535)
        );
    }
}

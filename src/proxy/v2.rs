//! PROXY v2 (binary) header parser
//!
//! Layout:
//! - 12 bytes: signature
//! - 1 byte: version (high nibble, always 2) and command (low nibble)
//! - 1 byte: address family and transport protocol
//! - 2 bytes: big-endian length of everything that follows
//! - address block (12/36/216 bytes depending on family), then TLVs

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use bytes::{Buf, Bytes};
use tokio::io::AsyncRead;
use tracing::trace;

use super::error::ProxyError;
use super::header::{Command, Endpoint, Header, ProxyVersion, UnixEndpoint, UnixKind};
use super::reader::PeekReader;
use super::transport::{TransportProtocol, UNIX_PATH_LEN};

/// PROXY v2 signature (12 bytes)
pub const SIGNATURE: &[u8] = b"\r\n\r\n\x00\r\nQUIT\n";

/// Largest payload (addresses + TLVs) accepted after the fixed 16 bytes.
///
/// Bounds how much the parser will buffer while waiting for a declared
/// length to arrive.
pub const MAX_PAYLOAD_LEN: u16 = 4096;

/// Read and parse a v2 header. The reader must be positioned at the
/// signature.
pub async fn parse<R: AsyncRead + Unpin>(reader: &mut PeekReader<R>) -> Result<Header, ProxyError> {
    if reader.peek(SIGNATURE.len()).await?.len() < SIGNATURE.len() {
        return Err(ProxyError::Truncated("signature"));
    }
    reader.consume(SIGNATURE.len());

    let command = reader
        .next_byte()
        .await?
        .ok_or(ProxyError::Truncated("version and command"))?;
    let command = Command::try_from(command)?;

    let transport = reader
        .next_byte()
        .await?
        .ok_or(ProxyError::Truncated("address family and protocol"))?;
    let transport = TransportProtocol::try_from(transport)?;
    // UNSPEC is only allowed for LOCAL
    if transport == TransportProtocol::Unspec && command != Command::Local {
        return Err(ProxyError::UnsupportedAddressFamily);
    }

    let len_bytes = reader.peek(2).await?;
    if len_bytes.len() < 2 {
        return Err(ProxyError::Truncated("length"));
    }
    let length = u16::from_be_bytes([len_bytes[0], len_bytes[1]]);
    reader.consume(2);

    if length < transport.min_address_len() || length > MAX_PAYLOAD_LEN {
        return Err(ProxyError::InvalidLength(length));
    }

    if length == 0 {
        return Ok(Header::new(
            ProxyVersion::V2,
            command,
            transport,
            None,
            Bytes::new(),
        ));
    }

    // Never consume past the declared boundary, and fail rather than wait
    // for bytes a closed stream will never deliver.
    let available = reader.peek(usize::from(length)).await?.len();
    if available < usize::from(length) {
        return Err(ProxyError::InvalidLength(length));
    }
    let mut payload = reader.split_to(usize::from(length));

    let addresses = decode_addresses(transport, &mut payload)?;
    trace!(
        ?command,
        ?transport,
        tlv_len = payload.len(),
        "decoded PROXY v2 payload"
    );

    Ok(Header::new(
        ProxyVersion::V2,
        command,
        transport,
        addresses,
        payload,
    ))
}

/// Decode the fixed address block at the start of `payload`, leaving the
/// TLV bytes behind.
fn decode_addresses(
    transport: TransportProtocol,
    payload: &mut Bytes,
) -> Result<Option<(Endpoint, Endpoint)>, ProxyError> {
    if transport.is_unspecified() {
        return Ok(None);
    }
    if payload.remaining() < usize::from(transport.min_address_len()) {
        return Err(ProxyError::InvalidAddress);
    }

    let addresses = if transport.is_ipv4() {
        let src = Ipv4Addr::from(payload.get_u32());
        let dst = Ipv4Addr::from(payload.get_u32());
        let src_port = payload.get_u16();
        let dst_port = payload.get_u16();
        (
            ip_endpoint(transport, SocketAddr::new(IpAddr::V4(src), src_port)),
            ip_endpoint(transport, SocketAddr::new(IpAddr::V4(dst), dst_port)),
        )
    } else if transport.is_ipv6() {
        let src = Ipv6Addr::from(payload.get_u128());
        let dst = Ipv6Addr::from(payload.get_u128());
        let src_port = payload.get_u16();
        let dst_port = payload.get_u16();
        (
            ip_endpoint(transport, SocketAddr::new(IpAddr::V6(src), src_port)),
            ip_endpoint(transport, SocketAddr::new(IpAddr::V6(dst), dst_port)),
        )
    } else {
        let kind = if transport.is_datagram() {
            UnixKind::Datagram
        } else {
            UnixKind::Stream
        };
        let src = payload.split_to(UNIX_PATH_LEN);
        let dst = payload.split_to(UNIX_PATH_LEN);
        (
            Endpoint::Unix(UnixEndpoint {
                kind,
                path: unix_path(&src),
            }),
            Endpoint::Unix(UnixEndpoint {
                kind,
                path: unix_path(&dst),
            }),
        )
    };

    Ok(Some(addresses))
}

fn ip_endpoint(transport: TransportProtocol, addr: SocketAddr) -> Endpoint {
    if transport.is_datagram() {
        Endpoint::Udp(addr)
    } else {
        Endpoint::Tcp(addr)
    }
}

/// NUL-padded path field; the whole field is the path if no NUL is present.
fn unix_path(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

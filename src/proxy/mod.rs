//! PROXY Protocol Module
//!
//! Handles HAProxy PROXY protocol v1/v2 header parsing for accepted
//! connections. Detects the protocol version from the first bytes, decodes
//! the original source and destination endpoints, and keeps any v2 TLVs as
//! raw bytes.

mod error;
mod header;
mod parser;
mod reader;
mod stream;
mod transport;
mod v1;
mod v2;

pub use error::{ErrorKind, ProxyError};
pub use header::{Command, Endpoint, Header, ProxyVersion, UnixEndpoint, UnixKind};
pub use parser::{parse_proxy_header, read_header};
pub use reader::PeekReader;
pub use stream::{ProxiedStream, SocketEndpoints};
pub use transport::{classify, TransportBits, TransportProtocol};
pub use v1::MAX_LINE_LEN as V1_MAX_LINE_LEN;
pub use v2::{MAX_PAYLOAD_LEN as V2_MAX_PAYLOAD_LEN, SIGNATURE as V2_SIGNATURE};

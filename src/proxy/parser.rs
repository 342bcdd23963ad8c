//! PROXY Protocol Parser
//!
//! Auto-detects PROXY v1 (text) and v2 (binary) headers at the start of a
//! stream and hands off to the matching decoder.

use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::error::ProxyError;
use super::header::Header;
use super::reader::PeekReader;
use super::{v1, v2};
use crate::config::{Policy, ProxyProtocolConfig};

/// Detect and parse a PROXY header.
///
/// Returns [`ProxyError::NoProxyProtocolHeader`] without consuming anything
/// when the stream does not start with either signature, including when the
/// stream ends before a full signature could be compared. Callers should
/// treat that as "no header, everything is payload".
///
/// Detection only waits for more bytes while what has arrived is still a
/// prefix of one of the signatures, so a short first message such as `"PI"`
/// is recognized as payload without waiting for the timeout.
pub async fn read_header<R: AsyncRead + Unpin>(
    reader: &mut PeekReader<R>,
) -> Result<Header, ProxyError> {
    let mut wanted = 1;
    loop {
        let available = reader.peek(wanted).await?.len();
        let seen = reader.buffered();
        let len = seen.len();
        let maybe_v1 = shares_prefix(seen, v1::SIGNATURE);
        let maybe_v2 = shares_prefix(seen, v2::SIGNATURE);

        if maybe_v1 && len >= v1::SIGNATURE.len() {
            return v1::parse(reader).await;
        }
        if maybe_v2 && len >= v2::SIGNATURE.len() {
            return v2::parse(reader).await;
        }
        // Diverged from both, or the stream ended mid-signature
        if !(maybe_v1 || maybe_v2) || available < wanted {
            return Err(ProxyError::NoProxyProtocolHeader);
        }
        wanted = len + 1;
    }
}

fn shares_prefix(seen: &[u8], signature: &[u8]) -> bool {
    let n = seen.len().min(signature.len());
    seen[..n] == signature[..n]
}

/// Parse a PROXY header according to the listener configuration.
///
/// Applies the configured timeout and policy:
/// - `Use`: a missing header yields `Ok(None)`
/// - `Require`: a missing header is an error
/// - `Reject`: a present header is an error
/// - `Skip`: nothing is read
pub async fn parse_proxy_header<R: AsyncRead + Unpin>(
    reader: &mut PeekReader<R>,
    config: &ProxyProtocolConfig,
) -> Result<Option<Header>, ProxyError> {
    parse_with_policy(reader, config.policy, config.timeout_duration()).await
}

pub(crate) async fn parse_with_policy<R: AsyncRead + Unpin>(
    reader: &mut PeekReader<R>,
    policy: Policy,
    timeout_duration: Duration,
) -> Result<Option<Header>, ProxyError> {
    if policy == Policy::Skip {
        return Ok(None);
    }

    let result = match timeout(timeout_duration, read_header(reader)).await {
        Ok(result) => result,
        Err(_) => {
            warn!("PROXY header not received within {:?}", timeout_duration);
            return Err(ProxyError::Timeout);
        }
    };

    match (result, policy) {
        (Ok(_), Policy::Reject) => {
            warn!("PROXY header received on a listener that rejects them");
            Err(ProxyError::SuperfluousHeader)
        }
        (Ok(header), _) => {
            debug!(
                version = ?header.version(),
                command = ?header.command(),
                source = ?header.source(),
                destination = ?header.destination(),
                "PROXY header parsed"
            );
            Ok(Some(header))
        }
        (Err(ProxyError::NoProxyProtocolHeader), Policy::Require) => {
            warn!("PROXY header required but not present");
            Err(ProxyError::NoProxyProtocolHeader)
        }
        (Err(ProxyError::NoProxyProtocolHeader), _) => {
            debug!("no PROXY header, passing stream through");
            Ok(None)
        }
        (Err(e), _) => {
            warn!("invalid PROXY header: {}", e);
            Err(e)
        }
    }
}

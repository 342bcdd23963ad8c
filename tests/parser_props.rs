//! Property tests for header detection on arbitrary input.

use proptest::prelude::*;
use proxyproto::proxy::V2_SIGNATURE;
use proxyproto::{read_header, PeekReader, ProxyError};
use tokio::io::AsyncReadExt;

fn run<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(fut)
}

/// Parse `input`, returning the outcome and every byte left for the
/// application.
fn parse(input: Vec<u8>) -> (Result<proxyproto::Header, ProxyError>, Vec<u8>) {
    run(async move {
        let mut reader = PeekReader::new(std::io::Cursor::new(input));
        let result = read_header(&mut reader).await;
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).await.unwrap();
        (result, rest)
    })
}

proptest! {
    #[test]
    fn arbitrary_bytes_never_panic(input in proptest::collection::vec(any::<u8>(), 0..600)) {
        let _ = parse(input);
    }

    #[test]
    fn arbitrary_v1_lines_never_panic(line in "PROXY [ -~]{0,120}\r\n") {
        let _ = parse(line.into_bytes());
    }

    #[test]
    fn absent_header_leaves_payload_intact(
        input in proptest::collection::vec(any::<u8>(), 0..256)
            .prop_filter("must not start with a signature byte", |v| {
                v.first().map_or(true, |&b| b != b'P' && b != 0x0D)
            })
    ) {
        let (result, rest) = parse(input.clone());
        prop_assert!(matches!(result, Err(ProxyError::NoProxyProtocolHeader)));
        prop_assert_eq!(rest, input);
    }

    #[test]
    fn v2_consumes_exactly_declared_length(
        tlvs in proptest::collection::vec(any::<u8>(), 0..200),
        payload in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let mut input = V2_SIGNATURE.to_vec();
        input.extend_from_slice(&[0x21, 0x11]);
        input.extend_from_slice(&((12 + tlvs.len()) as u16).to_be_bytes());
        input.extend_from_slice(&[127, 0, 0, 1, 127, 0, 0, 2, 0, 1, 0, 2]);
        input.extend_from_slice(&tlvs);
        input.extend_from_slice(&payload);

        let (result, rest) = parse(input);
        let header = result.unwrap();
        prop_assert_eq!(header.raw_tlvs().as_ref(), &tlvs[..]);
        prop_assert_eq!(rest, payload);
    }
}

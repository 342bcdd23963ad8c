//! Buffered reader with bounded look-ahead.
//!
//! Header detection needs to look at the first bytes of a connection
//! without consuming them. Bytes pulled from the socket but not consumed by
//! the parser stay buffered here and are returned first by `AsyncRead`.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

/// Bytes requested from the socket per fill
const READ_CHUNK: usize = 512;

/// A reader that can peek at upcoming bytes before consuming them.
pub struct PeekReader<R> {
    inner: R,
    buffer: BytesMut,
    eof: bool,
}

impl<R> PeekReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            eof: false,
        }
    }

    /// Bytes read from the socket but not yet consumed
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Drop `n` buffered bytes.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.buffer.len());
        self.buffer.advance(n);
    }

    /// Remove up to `n` buffered bytes and return them.
    pub fn split_to(&mut self, n: usize) -> Bytes {
        let n = n.min(self.buffer.len());
        self.buffer.split_to(n).freeze()
    }

    /// Consume the wrapper, returning the inner reader and unread bytes.
    pub fn into_parts(self) -> (R, BytesMut) {
        (self.inner, self.buffer)
    }
}

impl<R: AsyncRead + Unpin> PeekReader<R> {
    async fn fill(&mut self) -> io::Result<usize> {
        if self.eof {
            return Ok(0);
        }
        self.buffer.reserve(READ_CHUNK);
        let n = self.inner.read_buf(&mut self.buffer).await?;
        if n == 0 {
            self.eof = true;
        }
        Ok(n)
    }

    /// Look at the next `n` bytes without consuming them.
    ///
    /// Reads from the inner stream until `n` bytes are buffered or the
    /// stream ends. The returned slice is shorter than `n` only at end of
    /// stream.
    pub async fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        while self.buffer.len() < n {
            if self.fill().await? == 0 {
                break;
            }
        }
        let len = n.min(self.buffer.len());
        Ok(&self.buffer[..len])
    }

    /// Consume one byte, or `None` at end of stream.
    pub async fn next_byte(&mut self) -> io::Result<Option<u8>> {
        if self.buffer.is_empty() && self.fill().await? == 0 {
            return Ok(None);
        }
        Ok(Some(self.buffer.get_u8()))
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for PeekReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        // First, drain any buffered bytes
        if !self.buffer.is_empty() {
            let to_copy = self.buffer.len().min(buf.remaining());
            buf.put_slice(&self.buffer[..to_copy]);
            self.buffer.advance(to_copy);
            return Poll::Ready(Ok(()));
        }

        // Buffer exhausted, read from inner stream
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

//! PROXY-aware connection wrapper
//!
//! [`ProxiedStream`] wraps an accepted connection and reports the endpoints
//! carried by its PROXY header instead of the socket's own. The header is
//! read lazily, exactly once, on the first address query or payload read.
//! Header bytes are never returned as payload.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::BytesMut;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use futures_util::ready;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf, ReadHalf, WriteHalf};
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use super::error::ProxyError;
use super::header::{Endpoint, Header};
use super::parser::parse_with_policy;
use super::reader::PeekReader;
use crate::config::{Policy, ProxyProtocolConfig};

type Outcome = Result<Option<Header>, ProxyError>;

/// The connection's single header read. Clones poll the same future, so
/// dropping one caller leaves the read where it was for the next.
type HeaderTask = Shared<BoxFuture<'static, Arc<Outcome>>>;

type SharedReader<S> = Arc<Mutex<PeekReader<ReadHalf<S>>>>;

/// Native addresses of a connected socket
pub trait SocketEndpoints {
    fn local_endpoint(&self) -> io::Result<Endpoint>;
    fn peer_endpoint(&self) -> io::Result<Endpoint>;
}

impl SocketEndpoints for tokio::net::TcpStream {
    fn local_endpoint(&self) -> io::Result<Endpoint> {
        self.local_addr().map(Endpoint::Tcp)
    }

    fn peer_endpoint(&self) -> io::Result<Endpoint> {
        self.peer_addr().map(Endpoint::Tcp)
    }
}

#[cfg(unix)]
impl SocketEndpoints for tokio::net::UnixStream {
    fn local_endpoint(&self) -> io::Result<Endpoint> {
        self.local_addr().map(|addr| unix_endpoint(&addr))
    }

    fn peer_endpoint(&self) -> io::Result<Endpoint> {
        self.peer_addr().map(|addr| unix_endpoint(&addr))
    }
}

#[cfg(unix)]
fn unix_endpoint(addr: &tokio::net::unix::SocketAddr) -> Endpoint {
    use super::header::{UnixEndpoint, UnixKind};

    Endpoint::Unix(UnixEndpoint {
        kind: UnixKind::Stream,
        path: addr
            .as_pathname()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default(),
    })
}

/// A connection that may start with a PROXY protocol header.
///
/// Address queries take `&self` and may run concurrently; they all drive
/// the same header read and observe the same cached outcome. Cancelling a
/// query part-way through the header does not lose the bytes already
/// consumed: the next query or payload read picks the read up where it
/// stopped. A failed parse is never retried. Writes go straight to the
/// socket and do not wait for the header.
pub struct ProxiedStream<S> {
    reader: SharedReader<S>,
    writer: WriteHalf<S>,
    outcome: OnceCell<Arc<Outcome>>,
    /// Created by whichever caller needs the header first
    task: parking_lot::Mutex<Option<HeaderTask>>,
    /// Clone polled by `poll_read`, kept so its waker stays registered
    read_wait: Option<HeaderTask>,
    policy: Policy,
    timeout: Duration,
    native_local: Option<Endpoint>,
    native_remote: Option<Endpoint>,
}

impl<S: AsyncRead + AsyncWrite + SocketEndpoints> ProxiedStream<S> {
    /// Wrap an accepted socket, remembering its own addresses as fallback.
    pub fn new(stream: S, config: &ProxyProtocolConfig) -> Self {
        let local = stream
            .local_endpoint()
            .map_err(|e| debug!("local address unavailable: {}", e))
            .ok();
        let remote = stream
            .peer_endpoint()
            .map_err(|e| debug!("peer address unavailable: {}", e))
            .ok();
        Self::with_endpoints(stream, config, local, remote)
    }
}

impl<S: AsyncRead + AsyncWrite> ProxiedStream<S> {
    /// Wrap any stream, supplying the fallback addresses explicitly.
    pub fn with_endpoints(
        stream: S,
        config: &ProxyProtocolConfig,
        local: Option<Endpoint>,
        remote: Option<Endpoint>,
    ) -> Self {
        let (read_half, writer) = tokio::io::split(stream);
        Self {
            reader: Arc::new(Mutex::new(PeekReader::new(read_half))),
            writer,
            outcome: OnceCell::new(),
            task: parking_lot::Mutex::new(None),
            read_wait: None,
            policy: config.policy,
            timeout: config.timeout_duration(),
            native_local: local,
            native_remote: remote,
        }
    }

    /// Unwrap into the underlying stream and any bytes already read from it
    /// but not yet returned as payload.
    ///
    /// Bytes consumed by a header read that was started but never finished
    /// are not returned.
    pub fn into_parts(self) -> io::Result<(S, BytesMut)>
    where
        S: Unpin,
    {
        let Self {
            reader,
            writer,
            task,
            read_wait,
            ..
        } = self;
        drop(read_wait);
        drop(task);
        let reader = Arc::try_unwrap(reader).map_err(|_| {
            io::Error::new(io::ErrorKind::Other, "PROXY header read still in progress")
        })?;
        let (read_half, buffered) = reader.into_inner().into_parts();
        Ok((read_half.unsplit(writer), buffered))
    }
}

impl<S: AsyncRead + AsyncWrite + Send + 'static> ProxiedStream<S> {
    /// The parsed header, reading it first if needed.
    ///
    /// `Ok(None)` means the connection carried no header and the policy
    /// allows that.
    pub async fn header(&self) -> Result<Option<&Header>, &ProxyError> {
        let outcome: &Outcome = self.outcome.get_or_init(|| self.header_task()).await;
        outcome.as_ref().map(Option::as_ref)
    }

    /// Address the client connected to.
    ///
    /// The header's destination for proxied connections, the socket's own
    /// local address otherwise (no header, LOCAL command, or parse failure).
    pub async fn local_addr(&self) -> Option<&Endpoint> {
        match self.header().await {
            Ok(Some(header)) if !header.command().is_local() => {
                header.destination().or(self.native_local.as_ref())
            }
            _ => self.native_local.as_ref(),
        }
    }

    /// Original client address.
    ///
    /// The header's source for proxied connections, the socket's peer
    /// address otherwise.
    pub async fn remote_addr(&self) -> Option<&Endpoint> {
        match self.header().await {
            Ok(Some(header)) if !header.command().is_local() => {
                header.source().or(self.native_remote.as_ref())
            }
            _ => self.native_remote.as_ref(),
        }
    }

    fn header_task(&self) -> HeaderTask {
        self.task
            .lock()
            .get_or_insert_with(|| new_header_task(&self.reader, self.policy, self.timeout))
            .clone()
    }

    /// Drive the header read from a poll context.
    fn poll_outcome(&mut self, cx: &mut Context<'_>) -> Poll<Arc<Outcome>> {
        if let Some(outcome) = self.outcome.get() {
            self.read_wait = None;
            return Poll::Ready(Arc::clone(outcome));
        }

        let task = self.task.get_mut();
        let (reader, policy, timeout) = (&self.reader, self.policy, self.timeout);
        let wait = self.read_wait.get_or_insert_with(|| {
            task.get_or_insert_with(|| new_header_task(reader, policy, timeout))
                .clone()
        });
        let outcome = ready!(wait.poll_unpin(cx));
        self.read_wait = None;
        // Only fails if already set, and then to this same value
        let _ = self.outcome.set(Arc::clone(&outcome));
        Poll::Ready(outcome)
    }
}

fn new_header_task<S>(reader: &SharedReader<S>, policy: Policy, timeout: Duration) -> HeaderTask
where
    S: AsyncRead + Send + 'static,
{
    let reader = Arc::clone(reader);
    async move {
        let mut reader = reader.lock().await;
        Arc::new(parse_with_policy(&mut *reader, policy, timeout).await)
    }
    .boxed()
    .shared()
}

impl<S: AsyncRead + AsyncWrite + Send + 'static> AsyncRead for ProxiedStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let outcome = ready!(this.poll_outcome(cx));
        if let Err(e) = &*outcome {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::InvalidData,
                e.to_string(),
            )));
        }

        // The header task drops its guard before its output exists, and
        // address queries borrow `&self`, so the lock is always free here.
        match this.reader.try_lock() {
            Ok(mut reader) => Pin::new(&mut *reader).poll_read(cx, buf),
            Err(_) => {
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }
}

impl<S: AsyncRead + AsyncWrite> AsyncWrite for ProxiedStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().writer).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().writer).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().writer).poll_shutdown(cx)
    }
}

//! PROXY protocol v1/v2 support for accepted connections.
//!
//! Wrap an accepted socket in [`ProxiedStream`] to read a PROXY header
//! lazily and report the original client endpoints, or call
//! [`read_header`] on a [`PeekReader`] to parse one directly.
//!
//! ```no_run
//! use proxyproto::{ProxiedStream, ProxyProtocolConfig};
//! use tokio::net::TcpListener;
//!
//! # async fn run() -> std::io::Result<()> {
//! let listener = TcpListener::bind("127.0.0.1:9876").await?;
//! let (socket, _) = listener.accept().await?;
//! let conn = ProxiedStream::new(socket, &ProxyProtocolConfig::default());
//! if let Some(client) = conn.remote_addr().await {
//!     println!("client: {}", client);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod proxy;

pub use config::{Policy, ProxyProtocolConfig};
pub use proxy::{
    parse_proxy_header, read_header, Command, Endpoint, ErrorKind, Header, PeekReader,
    ProxiedStream, ProxyError, ProxyVersion, TransportProtocol,
};

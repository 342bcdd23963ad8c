//! Configuration
//!
//! Listener-side settings, deserialized with serde from whatever format the
//! embedding application uses.

mod proxy;

pub use proxy::{Policy, ProxyProtocolConfig};

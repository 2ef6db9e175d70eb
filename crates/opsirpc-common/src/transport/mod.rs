//! Transport layer
//!
//! A [`Transport`] owns exactly one physical connection to one endpoint and
//! moves literal HTTP requests over it. [`ConnectionManager`] is the real
//! implementation (TCP, optional TLS, HTTP/1.1 via hyper); tests substitute
//! scripted fakes.
//!
//! # Components
//!
//! - **[`Endpoint`]**: parsed backend address
//! - **[`ConnectionManager`]** / **[`ConnectionConfig`]**: bounded connect, TLS, send
//! - **[`TlsConfig`]**: certificate verification settings
//! - **[`RawRequest`]** / **[`RawResponse`]**: what goes over the wire
//!
//! # Example
//!
//! ```no_run
//! use opsirpc_common::transport::{
//!     ConnectionConfig, ConnectionManager, Endpoint, RawRequest, Transport,
//! };
//! use hyper::Method;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let endpoint = Endpoint::parse("https://configserver:4447/rpc")?;
//! let config = ConnectionConfig::default();
//! let mut connection = ConnectionManager::new(endpoint, config);
//! let timeout = connection.connect_timeout();
//! connection.connect(timeout).await?;
//!
//! let response = connection.send(RawRequest::new(Method::GET, "/rpc")).await?;
//! println!("{}", response.status);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;

use crate::protocol::error::Result;

pub mod connection;
pub mod endpoint;
pub mod http;
pub mod tls;

pub use connection::{ConnectionConfig, ConnectionManager};
pub use endpoint::{expand_address, Endpoint, Scheme, DEFAULT_HTTPS_PORT, DEFAULT_HTTP_PORT};
pub use http::{RawRequest, RawResponse};
pub use tls::TlsConfig;

/// One physical connection to one endpoint.
#[async_trait]
pub trait Transport: Send {
    /// The endpoint this transport talks to.
    fn endpoint(&self) -> &Endpoint;

    /// Whether a usable connection is currently held.
    fn is_connected(&self) -> bool;

    /// (Re-)establishes the connection, giving up after `timeout`.
    ///
    /// Any previously held connection is closed first.
    async fn connect(&mut self, timeout: Duration) -> Result<()>;

    /// Closes the connection. Closing a closed connection is a no-op.
    async fn disconnect(&mut self);

    /// Sends one request and reads the complete response.
    async fn send(&mut self, request: RawRequest) -> Result<RawResponse>;
}

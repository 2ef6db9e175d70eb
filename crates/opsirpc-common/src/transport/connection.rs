use std::io;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1::{self, SendRequest};
use hyper::header::{HeaderValue, HOST};
use hyper::Request;
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{lookup_host, TcpStream};
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;
use tracing::{debug, info, warn};

use crate::protocol::error::{BackendError, Result};
use crate::transport::endpoint::Endpoint;
use crate::transport::http::{RawRequest, RawResponse};
use crate::transport::tls::TlsConfig;
use crate::transport::Transport;

/// Default budget for establishing a connection (30 seconds)
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause between connect attempts that failed transiently
const CONNECT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Per-connection transport settings.
///
/// # Default Configuration
///
/// - `connect_timeout`: 30 seconds
/// - `io_timeout`: none (a send waits as long as the server takes)
/// - `tls`: no certificate verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Budget for TCP connect plus TLS handshake
    pub connect_timeout: Duration,
    /// Optional bound on one request/response exchange
    pub io_timeout: Option<Duration>,
    pub tls: TlsConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: None,
            tls: TlsConfig::default(),
        }
    }
}

/// An established HTTP/1.1 connection and the task driving it.
struct HttpConnection {
    sender: SendRequest<Full<Bytes>>,
    driver: JoinHandle<()>,
}

impl Drop for HttpConnection {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

/// Owner of the single physical connection to a backend endpoint.
///
/// The manager performs a bounded connect (polling on transient failures),
/// upgrades to TLS for `https` endpoints and layers an HTTP/1.1 client
/// connection on top. It never holds more than one connection; connecting
/// again replaces the previous one.
///
/// Sending on a broken connection fails with `BackendError::Transport` and
/// drops the connection, so the caller can reconnect.
pub struct ConnectionManager {
    endpoint: Endpoint,
    config: ConnectionConfig,
    connection: Option<HttpConnection>,
}

impl ConnectionManager {
    pub fn new(endpoint: Endpoint, config: ConnectionConfig) -> Self {
        Self {
            endpoint,
            config,
            connection: None,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// The configured connect budget.
    pub fn connect_timeout(&self) -> Duration {
        self.config.connect_timeout
    }

    /// Opens a TCP connection, retrying transient failures until `budget`
    /// is spent.
    ///
    /// Every resolved address is tried in turn. A refused or unreachable
    /// endpoint fails immediately with `BackendError::Connection`; running
    /// out of budget fails with `BackendError::TransportTimeout`.
    async fn connect_tcp(&self, budget: Duration) -> Result<TcpStream> {
        let authority = self.endpoint.authority();
        let started = Instant::now();
        let timed_out = || BackendError::TransportTimeout(budget.as_millis() as u64);

        loop {
            let remaining = budget
                .checked_sub(started.elapsed())
                .filter(|d| !d.is_zero())
                .ok_or_else(timed_out)?;

            match tokio::time::timeout(remaining, Self::try_connect(&authority)).await {
                Err(_) => return Err(timed_out()),
                Ok(Ok(stream)) => return Ok(stream),
                Ok(Err(e)) if is_transient(&e) => {
                    debug!(addr = %authority, error = %e, "Connect attempt failed, polling again");
                    tokio::time::sleep(CONNECT_POLL_INTERVAL.min(remaining)).await;
                }
                Ok(Err(e)) => {
                    return Err(BackendError::Connection(format!(
                        "Failed to connect to {}: {}",
                        authority, e
                    )))
                }
            }
        }
    }

    async fn try_connect(authority: &str) -> io::Result<TcpStream> {
        let mut last_err = None;
        for addr in lookup_host(authority).await? {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    stream.set_nodelay(true).ok();
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "address resolved to nothing")
        }))
    }

    /// Performs the TLS handshake on an established TCP stream.
    async fn upgrade_tls(
        &self,
        stream: TcpStream,
        budget: Duration,
    ) -> Result<tokio_rustls::client::TlsStream<TcpStream>> {
        let tls = &self.config.tls;
        if !tls.verifies_server() {
            warn!(
                host = %self.endpoint.host(),
                "No CA certificate configured, server certificate is not verified"
            );
        }

        let connector = TlsConnector::from(tls.client_config()?);
        let server_name = ServerName::try_from(self.endpoint.host().to_string()).map_err(|e| {
            BackendError::Configuration(format!(
                "Invalid TLS server name '{}': {}",
                self.endpoint.host(),
                e
            ))
        })?;

        tokio::time::timeout(budget, connector.connect(server_name, stream))
            .await
            .map_err(|_| BackendError::TransportTimeout(budget.as_millis() as u64))?
            .map_err(|e| {
                BackendError::Connection(format!(
                    "TLS handshake with {} failed: {}",
                    self.endpoint.authority(),
                    e
                ))
            })
    }

    async fn handshake<S>(stream: S) -> Result<HttpConnection>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sender, connection) = http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| BackendError::Connection(format!("HTTP handshake failed: {}", e)))?;

        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!(error = %e, "HTTP connection closed with error");
            }
        });

        Ok(HttpConnection { sender, driver })
    }

    fn build_request(&self, request: RawRequest) -> Result<Request<Full<Bytes>>> {
        let mut http_request = Request::builder()
            .method(request.method)
            .uri(request.target.as_str())
            .body(Full::new(request.body))?;

        *http_request.headers_mut() = request.headers;
        let host = HeaderValue::from_str(&self.endpoint.authority())
            .map_err(|e| BackendError::Configuration(format!("Invalid host: {}", e)))?;
        http_request.headers_mut().insert(HOST, host);

        Ok(http_request)
    }

    async fn round_trip(
        sender: &mut SendRequest<Full<Bytes>>,
        request: Request<Full<Bytes>>,
    ) -> Result<RawResponse> {
        sender
            .ready()
            .await
            .map_err(|e| BackendError::Transport(format!("Connection not usable: {}", e)))?;

        let response = sender.send_request(request).await?;
        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| BackendError::Transport(format!("Failed to read response: {}", e)))?
            .to_bytes();

        Ok(RawResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

#[async_trait]
impl Transport for ConnectionManager {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .map(|c| !c.sender.is_closed())
            .unwrap_or(false)
    }

    async fn connect(&mut self, timeout: Duration) -> Result<()> {
        self.disconnect().await;

        let started = Instant::now();
        let secure = self.endpoint.scheme().is_secure();
        info!(
            "Opening {} connection to {}",
            self.endpoint.scheme().as_str(),
            self.endpoint.authority()
        );

        let stream = self.connect_tcp(timeout).await?;
        let connection = if secure {
            let remaining = timeout.saturating_sub(started.elapsed());
            let stream = self.upgrade_tls(stream, remaining).await?;
            Self::handshake(stream).await?
        } else {
            Self::handshake(stream).await?
        };

        self.connection = Some(connection);
        debug!(
            addr = %self.endpoint.authority(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Connection established"
        );
        Ok(())
    }

    async fn disconnect(&mut self) {
        if self.connection.take().is_some() {
            debug!(addr = %self.endpoint.authority(), "Connection closed");
        }
    }

    async fn send(&mut self, request: RawRequest) -> Result<RawResponse> {
        let request = self.build_request(request)?;
        let io_timeout = self.config.io_timeout;
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| BackendError::Transport("Not connected".to_string()))?;

        let exchange = Self::round_trip(&mut connection.sender, request);
        let result = match io_timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .unwrap_or_else(|_| Err(BackendError::TransportTimeout(limit.as_millis() as u64))),
            None => exchange.await,
        };

        if matches!(&result, Err(e) if e.is_transport()) {
            self.disconnect().await;
        }
        result
    }
}

/// Connect failures worth polling again within the budget.
fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::body::Incoming;
    use hyper::server::conn::http1 as server_http1;
    use hyper::service::service_fn;
    use hyper::{Method, Response, StatusCode};
    use tokio::net::TcpListener;

    /// Serves every connection with a handler that echoes the Host header.
    async fn spawn_echo_host_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let service = service_fn(|req: Request<Incoming>| async move {
                        let host = req
                            .headers()
                            .get(HOST)
                            .map(|h| h.to_str().unwrap().to_string())
                            .unwrap_or_default();
                        Ok::<_, hyper::Error>(
                            Response::builder()
                                .status(StatusCode::OK)
                                .body(Full::new(Bytes::from(host)))
                                .unwrap(),
                        )
                    });
                    let _ = server_http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        addr
    }

    fn manager_for(addr: &str) -> ConnectionManager {
        let endpoint = Endpoint::parse(&format!("http://{}/rpc", addr)).unwrap();
        ConnectionManager::new(endpoint, ConnectionConfig::default())
    }

    #[test]
    fn test_config_default() {
        let config = ConnectionConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.io_timeout, None);
        assert!(!config.tls.verifies_server());
    }

    #[tokio::test]
    async fn test_connect_and_send() {
        let addr = spawn_echo_host_server().await;
        let mut manager = manager_for(&addr);
        assert!(!manager.is_connected());

        manager.connect(Duration::from_secs(5)).await.unwrap();
        assert!(manager.is_connected());

        let response = manager.send(RawRequest::new(Method::GET, "/rpc")).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, Bytes::from(addr.clone()));

        // The same connection carries the next request.
        let response = manager.send(RawRequest::new(Method::GET, "/rpc")).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_send_without_connect_is_transport_error() {
        let mut manager = manager_for("127.0.0.1:1");
        let err = manager.send(RawRequest::new(Method::GET, "/rpc")).await.unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let mut manager = manager_for(&addr);
        let err = manager.connect(Duration::from_secs(2)).await.unwrap_err();
        assert!(matches!(err, BackendError::Connection(_)), "got {:?}", err);
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_zero_budget_times_out() {
        let addr = spawn_echo_host_server().await;
        let mut manager = manager_for(&addr);
        let err = manager.connect(Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, BackendError::TransportTimeout(0)));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let addr = spawn_echo_host_server().await;
        let mut manager = manager_for(&addr);
        manager.connect(Duration::from_secs(5)).await.unwrap();

        manager.disconnect().await;
        assert!(!manager.is_connected());
        manager.disconnect().await;
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_reconnect_replaces_connection() {
        let addr = spawn_echo_host_server().await;
        let mut manager = manager_for(&addr);
        manager.connect(Duration::from_secs(5)).await.unwrap();
        manager.connect(Duration::from_secs(5)).await.unwrap();
        assert!(manager.is_connected());

        let response = manager.send(RawRequest::new(Method::GET, "/rpc")).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
    }
}

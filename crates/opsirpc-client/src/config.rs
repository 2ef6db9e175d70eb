use std::path::PathBuf;
use std::time::Duration;

use opsirpc_common::auth::Credentials;
use opsirpc_common::protocol::error::Result;
use opsirpc_common::transport::{ConnectionConfig, Endpoint, TlsConfig};

/// Default wall-clock window for retrying a failed call (5 seconds)
pub const DEFAULT_RETRY_BUDGET: Duration = Duration::from_secs(5);

/// Default cap on the request target of a GET call
pub const DEFAULT_MAX_GET_URL_LEN: usize = 8192;

/// How the JSON-RPC envelope is transmitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RpcMethod {
    /// JSON body with `content-type: application/json-rpc`
    #[default]
    Post,
    /// URL-encoded JSON in the query string
    Get,
}

/// Configuration of a [`JsonRpcBackend`](crate::JsonRpcBackend).
///
/// # Default Configuration
///
/// - `address`: `localhost` (expands to `https://localhost:4447/rpc`)
/// - `method`: POST
/// - `connect_timeout`: 30 seconds
/// - `io_timeout`: none
/// - `retry`: enabled, within a 5 second `retry_budget`
/// - `connect_on_init`: true
/// - `max_get_url_len`: 8192 bytes
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use opsirpc_client::{JsonRpcConfig, RpcMethod};
///
/// let config = JsonRpcConfig::new("configserver.uib.local", "adminuser", "secret")
///     .with_method(RpcMethod::Get)
///     .with_connect_timeout(Duration::from_secs(5));
/// assert_eq!(config.endpoint().unwrap().to_string(), "https://configserver.uib.local:4447/rpc");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonRpcConfig {
    /// Backend address, full URL or bare `host[:port]`
    pub address: String,
    pub username: String,
    pub password: String,
    pub method: RpcMethod,
    /// Budget for connect plus TLS handshake
    pub connect_timeout: Duration,
    /// Optional bound on one request/response exchange
    pub io_timeout: Option<Duration>,
    /// Whether failed calls are retried within `retry_budget`
    pub retry: bool,
    pub retry_budget: Duration,
    /// Connect and discover during construction rather than on first call
    pub connect_on_init: bool,
    pub tls: TlsConfig,
    /// Longest GET request target before falling back to POST
    pub max_get_url_len: usize,
}

impl Default for JsonRpcConfig {
    fn default() -> Self {
        Self {
            address: "localhost".to_string(),
            username: String::new(),
            password: String::new(),
            method: RpcMethod::default(),
            connect_timeout: ConnectionConfig::default().connect_timeout,
            io_timeout: None,
            retry: true,
            retry_budget: DEFAULT_RETRY_BUDGET,
            connect_on_init: true,
            tls: TlsConfig::default(),
            max_get_url_len: DEFAULT_MAX_GET_URL_LEN,
        }
    }
}

impl JsonRpcConfig {
    pub fn new(
        address: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            username: username.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: RpcMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_retry_budget(mut self, budget: Duration) -> Self {
        self.retry_budget = budget;
        self
    }

    pub fn with_connect_on_init(mut self, connect_on_init: bool) -> Self {
        self.connect_on_init = connect_on_init;
        self
    }

    pub fn with_ca_cert_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.tls = self.tls.with_ca_cert_file(path);
        self
    }

    pub fn with_max_get_url_len(mut self, len: usize) -> Self {
        self.max_get_url_len = len;
        self
    }

    /// Parses the (possibly shorthand) address.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Configuration` for a malformed address.
    pub fn endpoint(&self) -> Result<Endpoint> {
        Endpoint::from_address(&self.address)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
            tls: self.tls.clone(),
        }
    }
}

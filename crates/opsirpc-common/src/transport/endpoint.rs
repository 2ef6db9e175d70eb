//! Backend address parsing
//!
//! Addresses look like `<scheme>://<host>[:<port>]/<base-path...>` with
//! scheme `http` or `https`. A bare host name (no `/`, no `=`) is shorthand
//! for the default https service at `https://<host>:4447/rpc`.

use std::fmt;

use crate::protocol::error::{BackendError, Result};

/// Default port of the plain http service
pub const DEFAULT_HTTP_PORT: u16 = 4444;

/// Default port of the https service
pub const DEFAULT_HTTPS_PORT: u16 = 4447;

/// Base path used when expanding a bare host name
const DEFAULT_BASE_PATH: &str = "/rpc";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => DEFAULT_HTTP_PORT,
            Scheme::Https => DEFAULT_HTTPS_PORT,
        }
    }

    pub fn is_secure(self) -> bool {
        matches!(self, Scheme::Https)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// A parsed, immutable backend endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    scheme: Scheme,
    host: String,
    port: u16,
    base_path: String,
}

impl Endpoint {
    /// Parses a full address.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Configuration` when the address has fewer than
    /// three `/`-separated parts, an unknown scheme, an empty host or a port
    /// that is not a number.
    ///
    /// # Example
    ///
    /// ```
    /// use opsirpc_common::transport::Endpoint;
    ///
    /// let endpoint = Endpoint::parse("https://config.example.org/rpc").unwrap();
    /// assert_eq!(endpoint.port(), 4447);
    /// assert_eq!(endpoint.base_path(), "/rpc");
    /// ```
    pub fn parse(address: &str) -> Result<Self> {
        let bad = || BackendError::Configuration(format!("Bad address: '{}'", address));

        let parts: Vec<&str> = address.split('/').collect();
        if parts.len() < 3 {
            return Err(bad());
        }
        let scheme = match parts[0] {
            "http:" => Scheme::Http,
            "https:" => Scheme::Https,
            _ => return Err(bad()),
        };

        let (host, port) = split_host_port(parts[2]).ok_or_else(bad)?;
        if host.is_empty() {
            return Err(bad());
        }
        let port = match port {
            Some(port) => port.parse::<u16>().map_err(|_| bad())?,
            None => scheme.default_port(),
        };

        let base_path = format!("/{}", parts[3..].join("/"));

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
            base_path,
        })
    }

    /// Expands address shorthand, then parses.
    ///
    /// ```
    /// use opsirpc_common::transport::Endpoint;
    ///
    /// let endpoint = Endpoint::from_address("configserver").unwrap();
    /// assert_eq!(endpoint.to_string(), "https://configserver:4447/rpc");
    /// ```
    pub fn from_address(address: &str) -> Result<Self> {
        Self::parse(&expand_address(address))
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// `host:port` as used for name resolution and the `Host` header.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme.as_str(), self.authority(), self.base_path)
    }
}

/// Turns a bare host (optionally with port) into a full https address.
///
/// Addresses containing `/` or `=` are returned unchanged.
pub fn expand_address(address: &str) -> String {
    if address.contains('/') || address.contains('=') {
        return address.to_string();
    }
    match split_host_port(address) {
        Some((_, Some(_))) => format!("https://{}{}", address, DEFAULT_BASE_PATH),
        _ => format!(
            "https://{}:{}{}",
            address, DEFAULT_HTTPS_PORT, DEFAULT_BASE_PATH
        ),
    }
}

/// Splits `host[:port]`, accepting bracketed IPv6 literals.
fn split_host_port(authority: &str) -> Option<(&str, Option<&str>)> {
    if let Some(rest) = authority.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        return match after {
            "" => Some((host, None)),
            _ => Some((host, Some(after.strip_prefix(':')?))),
        };
    }
    match authority.split_once(':') {
        Some((host, port)) => Some((host, Some(port))),
        None => Some((authority, None)),
    }
}

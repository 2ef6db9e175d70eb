//! Client-side authentication and session state
//!
//! Every request carries HTTP Basic credentials. Servers additionally hand
//! out a session cookie; replaying it lets the server skip re-authenticating
//! and keeps the request on the same server-side session.
//!
//! # Session Model
//!
//! - Credentials are sent on every request, cookie or not
//! - The cookie is taken from the first `Set-Cookie` header of a response,
//!   cut at the first `;`
//! - The cookie is dropped on reconnect; the next response re-establishes it
//!
//! # Example
//!
//! ```
//! use opsirpc_common::auth::{Credentials, Session};
//!
//! let mut session = Session::new(Credentials::new("adminuser", "secret"));
//! assert!(session.cookie().is_none());
//!
//! session.capture_cookie("OPSISID=abc123; Path=/; HttpOnly");
//! assert_eq!(session.cookie(), Some("OPSISID=abc123"));
//! ```

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hyper::header::{HeaderMap, HeaderValue, AUTHORIZATION, COOKIE, SET_COOKIE};

use crate::protocol::error::{BackendError, Result};

/// Username and password used for HTTP Basic authentication.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Builds the `Authorization` header value, `Basic base64(user:pass)`.
    ///
    /// # Example
    ///
    /// ```
    /// use opsirpc_common::auth::Credentials;
    ///
    /// let creds = Credentials::new("Aladdin", "open sesame");
    /// assert_eq!(creds.basic_auth(), "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    /// ```
    pub fn basic_auth(&self) -> String {
        let raw = format!("{}:{}", self.username, self.password);
        format!("Basic {}", STANDARD.encode(raw.as_bytes()))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"*****")
            .finish()
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:*****", self.username)
    }
}

/// Credentials plus the cached session cookie of one connection.
#[derive(Debug, Clone, Default)]
pub struct Session {
    credentials: Credentials,
    cookie: Option<String>,
}

impl Session {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            cookie: None,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// The cached cookie, exactly as it will be replayed.
    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    /// Stores the cookie carried by a `Set-Cookie` header value.
    ///
    /// Attributes after the first `;` are discarded. An empty cookie is
    /// ignored.
    pub fn capture_cookie(&mut self, set_cookie: &str) {
        let cookie = set_cookie.split(';').next().unwrap_or_default().trim();
        if cookie.is_empty() {
            return;
        }
        if self.cookie.as_deref() != Some(cookie) {
            tracing::debug!(cookie = %cookie, "Session cookie updated");
        }
        self.cookie = Some(cookie.to_string());
    }

    /// Captures the cookie of the first `Set-Cookie` header, if any.
    pub fn capture_from_headers(&mut self, headers: &HeaderMap) {
        if let Some(value) = headers.get(SET_COOKIE).and_then(|v| v.to_str().ok()) {
            self.capture_cookie(value);
        }
    }

    /// Forgets the cookie; called whenever the connection is re-established.
    pub fn clear_cookie(&mut self) {
        self.cookie = None;
    }

    /// Adds the `Authorization` header and, if cached, the `Cookie` header.
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<()> {
        let auth = HeaderValue::from_str(&self.credentials.basic_auth())
            .map_err(|e| BackendError::Configuration(format!("Invalid credentials: {}", e)))?;
        headers.insert(AUTHORIZATION, auth);

        if let Some(cookie) = &self.cookie {
            let value = HeaderValue::from_str(cookie).map_err(|e| {
                BackendError::InvalidResponse(format!("Unusable session cookie: {}", e))
            })?;
            headers.insert(COOKIE, value);
        }
        Ok(())
    }
}

//! HTTP request/response values exchanged with a [`Transport`](super::Transport)
//!
//! These are deliberately plain: the transport sends exactly what it is
//! given (plus `Host`) and hands back the fully read response.

use bytes::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use hyper::{Method, StatusCode};

/// A literal HTTP request.
#[derive(Debug, Clone)]
pub struct RawRequest {
    pub method: Method,
    /// Origin-form request target, e.g. `/rpc` or `/rpc?%7B...%7D`
    pub target: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawRequest {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Appends a header; repeated names produce repeated header lines.
    pub fn append_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.append(name, value);
    }
}

/// A fully received HTTP response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }
}

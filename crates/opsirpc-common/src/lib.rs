//! opsirpc Common Types and Transport
//!
//! This crate provides the protocol definitions, transport layer and object
//! model shared by the opsirpc backend client and dispatcher.
//!
//! # Overview
//!
//! opsi management servers expose their backend as JSON-RPC over HTTP(S).
//! The client discovers the callable methods at runtime, so this crate
//! carries no method definitions; it carries what every call needs:
//!
//! - **Protocol Layer**: request envelope, response, interface descriptor
//!   and the error taxonomy
//! - **Transport Layer**: endpoint parsing, bounded connect, TLS and HTTP/1.1
//!   over one owned connection
//! - **Object Model**: type-tagged domain objects and their marshalling
//! - **Auth**: Basic credentials and the replayed session cookie
//!
//! # Architecture
//!
//! - **Transport**: HTTP/1.1 over TCP, optionally TLS, one connection per client
//! - **Serialization**: JSON
//! - **Message Format**: `{"id": 1, "method": "...", "params": [...]}`
//!
//! # Components
//!
//! - [`protocol`] - Wire types and [`BackendError`]
//! - [`transport`] - [`Transport`](transport::Transport) seam and [`ConnectionManager`]
//! - [`objects`] - [`RpcValue`], [`ObjectRegistry`], [`ObjectMarshaller`]
//! - [`auth`] - [`Credentials`] and [`Session`]
//! - [`backend`] - [`Backend`] trait and [`Kwargs`]
//!
//! # Example
//!
//! ```
//! use opsirpc_common::{BackendError, RpcEnvelope, RpcResponse};
//! use serde_json::json;
//!
//! let envelope = RpcEnvelope::new("host_getIdents", vec![json!("str")]);
//! assert_eq!(
//!     envelope.to_json().unwrap(),
//!     r#"{"id":1,"method":"host_getIdents","params":["str"]}"#
//! );
//!
//! let response = RpcResponse::error(json!({"class": "ValueError", "message": "bad"}));
//! let err = BackendError::RemoteExecution(response.error.unwrap());
//! assert_eq!(err.to_string(), "Remote execution error: ValueError: bad");
//! ```

pub mod auth;
pub mod backend;
pub mod objects;
pub mod protocol;
pub mod transport;

pub use auth::{Credentials, Session};
pub use backend::{Backend, Kwargs};
pub use objects::{DomainObject, HashObject, ObjectMarshaller, ObjectRegistry, RpcValue};
pub use protocol::*;
pub use transport::{ConnectionConfig, ConnectionManager, Endpoint, TlsConfig};

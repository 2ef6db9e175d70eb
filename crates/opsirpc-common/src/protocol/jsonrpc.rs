//! opsi JSON-RPC wire types
//!
//! The opsi dialect predates JSON-RPC 2.0 and carries no `jsonrpc` member:
//!
//! - Request format: `{"id": 1, "method": "...", "params": [...]}`
//! - Response format: `{"id": ..., "result": ..., "error": ...}`
//!
//! Parameters are always positional. The client never has more than one call
//! in flight per connection, so every request uses the same id.
//!
//! # Example
//!
//! ```
//! use opsirpc_common::protocol::jsonrpc::{RpcEnvelope, RpcResponse};
//! use serde_json::json;
//!
//! let envelope = RpcEnvelope::new("getHostIds", vec![json!({"type": "OpsiClient"})]);
//! assert_eq!(envelope.id, 1);
//!
//! let body = r#"{"id":1,"result":["a"],"error":null}"#;
//! let response: RpcResponse = serde_json::from_str(body).unwrap();
//! assert!(response.error.is_none());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Id used for every request issued by the client.
pub const ENVELOPE_ID: u64 = 1;

/// A request envelope as sent over the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcEnvelope {
    /// Request identifier, always [`ENVELOPE_ID`] for client requests
    pub id: u64,
    /// Name of the remote method
    pub method: String,
    /// Marshalled parameters in declared order
    pub params: Vec<Value>,
}

impl RpcEnvelope {
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            id: ENVELOPE_ID,
            method: method.into(),
            params,
        }
    }

    /// Serializes the envelope to UTF-8 JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// A response envelope as received from the server.
///
/// `error` is `None` both when the member is absent and when it is `null`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcResponse {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub result: Value,
    #[serde(default, deserialize_with = "deserialize_error")]
    pub error: Option<Value>,
}

/// Maps `"error": null` to `None` rather than `Some(Value::Null)`.
fn deserialize_error<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => None,
        other => Some(other),
    })
}

impl RpcResponse {
    pub fn success(result: Value) -> Self {
        Self {
            id: Value::from(ENVELOPE_ID),
            result,
            error: None,
        }
    }

    pub fn error(error: Value) -> Self {
        Self {
            id: Value::from(ENVELOPE_ID),
            result: Value::Null,
            error: Some(error),
        }
    }
}

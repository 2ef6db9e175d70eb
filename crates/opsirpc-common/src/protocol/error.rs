use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Transport timeout after {0}ms")]
    TransportTimeout(u64),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Backend I/O error: {0}")]
    BackendIo(String),

    #[error("Remote execution error: {}", remote_message(.0))]
    RemoteExecution(Value),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    /// Returns `true` for failures of the transport itself, the class of
    /// errors a reconnect may cure.
    ///
    /// Application-level failures (`RemoteExecution`), malformed responses
    /// and configuration problems are permanent for the call.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            BackendError::Transport(_)
                | BackendError::Connection(_)
                | BackendError::TransportTimeout(_)
                | BackendError::Io(_)
        )
    }

    /// The error payload reported by the server, if this is a remote error.
    pub fn remote_payload(&self) -> Option<&Value> {
        match self {
            BackendError::RemoteExecution(payload) => Some(payload),
            _ => None,
        }
    }
}

/// Extracts a readable message from a remote error payload.
///
/// opsi servers report either a bare string or an object carrying
/// `message` (and usually `class`).
fn remote_message(payload: &Value) -> String {
    match payload {
        Value::String(message) => message.clone(),
        Value::Object(map) => {
            let message = map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| payload.to_string());
            match map.get("class").and_then(Value::as_str) {
                Some(class) => format!("{}: {}", class, message),
                None => message,
            }
        }
        other => other.to_string(),
    }
}

impl From<rustls::Error> for BackendError {
    fn from(err: rustls::Error) -> Self {
        BackendError::Connection(err.to_string())
    }
}

impl From<hyper::Error> for BackendError {
    fn from(err: hyper::Error) -> Self {
        BackendError::Transport(err.to_string())
    }
}

impl From<hyper::http::Error> for BackendError {
    fn from(err: hyper::http::Error) -> Self {
        BackendError::Transport(format!("Failed to build request: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;

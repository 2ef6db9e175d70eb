//! Scripted transport for unit tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hyper::StatusCode;
use opsirpc_common::protocol::error::{BackendError, Result};
use opsirpc_common::protocol::jsonrpc::{RpcEnvelope, RpcResponse};
use opsirpc_common::transport::{Endpoint, RawRequest, RawResponse, Transport};
use serde_json::Value;

/// Shared state of a [`ScriptedTransport`], inspected by tests.
#[derive(Default)]
pub(crate) struct Script {
    /// Answers for upcoming sends, in order
    pub responses: VecDeque<Result<RawResponse>>,
    /// Fail every send not covered by `responses`
    pub fail_sends: bool,
    pub refuse_connect: bool,
    /// Time spent between the begin and end marker of a send
    pub send_delay: Duration,
    pub connected: bool,
    pub connects: usize,
    pub requests: Vec<RawRequest>,
    pub events: Vec<String>,
}

pub(crate) type ScriptHandle = Arc<Mutex<Script>>;

/// A transport that answers from a script and records what it was sent.
///
/// Unscripted sends echo the envelope's method name back as the result.
pub(crate) struct ScriptedTransport {
    endpoint: Endpoint,
    script: ScriptHandle,
}

impl ScriptedTransport {
    pub fn new() -> (Self, ScriptHandle) {
        let script = ScriptHandle::default();
        let transport = Self {
            endpoint: Endpoint::parse("http://fake.uib.local:4444/rpc").unwrap(),
            script: script.clone(),
        };
        (transport, script)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn is_connected(&self) -> bool {
        self.script.lock().unwrap().connected
    }

    async fn connect(&mut self, _timeout: Duration) -> Result<()> {
        let mut script = self.script.lock().unwrap();
        script.connects += 1;
        script.events.push("connect".to_string());
        if script.refuse_connect {
            script.connected = false;
            return Err(BackendError::Connection("connection refused".to_string()));
        }
        script.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.script.lock().unwrap().connected = false;
    }

    async fn send(&mut self, request: RawRequest) -> Result<RawResponse> {
        let label = method_of(&request);
        let delay = {
            let mut script = self.script.lock().unwrap();
            if !script.connected {
                return Err(BackendError::Transport("Not connected".to_string()));
            }
            script.events.push(format!("begin:{}", label));
            script.requests.push(request);
            script.send_delay
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.script.lock().unwrap();
        script.events.push(format!("end:{}", label));
        let outcome = match script.responses.pop_front() {
            Some(outcome) => outcome,
            None if script.fail_sends => {
                Err(BackendError::Transport("connection reset by peer".to_string()))
            }
            None => Ok(rpc_ok(Value::String(label))),
        };
        if matches!(&outcome, Err(e) if e.is_transport()) {
            script.connected = false;
        }
        outcome
    }
}

/// Method name of the envelope carried in a request body, or the target.
fn method_of(request: &RawRequest) -> String {
    serde_json::from_slice::<RpcEnvelope>(&request.body)
        .map(|envelope| envelope.method)
        .unwrap_or_else(|_| request.target.clone())
}

pub(crate) fn rpc_ok(result: Value) -> RawResponse {
    let body = serde_json::to_vec(&RpcResponse::success(result)).unwrap();
    RawResponse::new(StatusCode::OK, body)
}

pub(crate) fn rpc_error(error: Value) -> RawResponse {
    let body = serde_json::to_vec(&RpcResponse::error(error)).unwrap();
    RawResponse::new(StatusCode::OK, body)
}

pub(crate) fn transport_error() -> Result<RawResponse> {
    Err(BackendError::Transport("broken pipe".to_string()))
}

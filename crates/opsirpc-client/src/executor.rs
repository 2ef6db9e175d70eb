//! One logical JSON-RPC call: marshal, transmit, retry, unmarshal
//!
//! # Retry Policy
//!
//! Transport failures (see [`BackendError::is_transport`]) are retried within
//! a wall-clock budget measured from the first attempt of the call:
//!
//! - Every retry reconnects first; the reconnect's timeout is capped by
//!   what is left of the budget
//! - A reconnect that fails counts as a failed attempt
//! - The number of attempts is unbounded, only elapsed time counts
//! - Once the budget is spent the call fails with `BackendError::BackendIo`
//!
//! Application errors reported by the server, malformed responses and
//! configuration problems are never retried.
//!
//! # Mutual Exclusion
//!
//! The connection and session are held behind one fair async mutex for the
//! whole call, so requests of one client reach the server strictly in the
//! order they were issued and never interleave on the wire.

use std::time::{Duration, Instant};

use bytes::Bytes;
use hyper::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use hyper::Method;
use opsirpc_common::auth::Session;
use opsirpc_common::objects::{ObjectMarshaller, RpcValue};
use opsirpc_common::protocol::error::{BackendError, Result};
use opsirpc_common::protocol::jsonrpc::{RpcEnvelope, RpcResponse};
use opsirpc_common::transport::{Endpoint, RawRequest, RawResponse, Transport};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::RpcMethod;

/// Bytes left unescaped in a GET query besides alphanumerics.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'/')
    .remove(b'~');

const JSON_RPC_CONTENT_TYPE: &str = "application/json-rpc";

/// Pause between a failed attempt and the next one.
const RETRY_PAUSE: Duration = Duration::from_millis(100);

/// Transmission settings of an executor.
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub method: RpcMethod,
    pub retry: bool,
    pub retry_budget: Duration,
    pub connect_timeout: Duration,
    pub max_get_url_len: usize,
}

struct ExecutorState<T> {
    transport: T,
    session: Session,
}

/// Executes JSON-RPC calls over one [`Transport`].
pub struct RequestExecutor<T: Transport> {
    endpoint: Endpoint,
    state: Mutex<ExecutorState<T>>,
    marshaller: ObjectMarshaller,
    options: ExecutorOptions,
}

impl<T: Transport> RequestExecutor<T> {
    pub fn new(
        transport: T,
        session: Session,
        marshaller: ObjectMarshaller,
        options: ExecutorOptions,
    ) -> Self {
        Self {
            endpoint: transport.endpoint().clone(),
            state: Mutex::new(ExecutorState { transport, session }),
            marshaller,
            options,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    pub fn marshaller(&self) -> &ObjectMarshaller {
        &self.marshaller
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.transport.is_connected()
    }

    /// The session cookie currently replayed, if any.
    pub async fn session_cookie(&self) -> Option<String> {
        self.state.lock().await.session.cookie().map(str::to_string)
    }

    /// (Re-)establishes the connection within the configured connect timeout.
    pub async fn connect(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        Self::reconnect(&mut state, self.options.connect_timeout).await
    }

    pub async fn disconnect(&self) {
        let mut state = self.state.lock().await;
        state.transport.disconnect().await;
    }

    /// Calls `method` with positional `params`, retrying per configuration.
    pub async fn execute(&self, method: &str, params: &[RpcValue]) -> Result<RpcValue> {
        self.run(method, params, self.options.retry).await
    }

    /// Calls `method` once; a transport failure is not retried.
    pub async fn execute_once(&self, method: &str, params: &[RpcValue]) -> Result<RpcValue> {
        self.run(method, params, false).await
    }

    async fn run(&self, method: &str, params: &[RpcValue], retry: bool) -> Result<RpcValue> {
        let params = params.iter().map(|p| self.marshaller.to_hash(p)).collect();
        let payload = RpcEnvelope::new(method, params).to_json()?;
        debug!(method = %method, "Executing JSON-RPC method");

        let mut state = self.state.lock().await;
        let response = self.transmit(&mut state, &payload, retry).await?;
        self.decode(method, response)
    }

    async fn transmit(
        &self,
        state: &mut ExecutorState<T>,
        payload: &str,
        retry: bool,
    ) -> Result<RawResponse> {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let remaining = self.options.retry_budget.saturating_sub(started.elapsed());
            let connect_timeout = if retry {
                self.options.connect_timeout.min(remaining)
            } else {
                self.options.connect_timeout
            };

            let outcome = if state.transport.is_connected() {
                self.send(state, payload).await
            } else {
                match Self::reconnect(state, connect_timeout).await {
                    Ok(()) => self.send(state, payload).await,
                    Err(e) => Err(e),
                }
            };

            let err = match outcome {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transport() => e,
                Err(e) => return Err(e),
            };

            let elapsed = started.elapsed();
            debug!(
                addr = %self.endpoint,
                attempt,
                retry,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %err,
                "Request failed"
            );
            if !retry || elapsed >= self.options.retry_budget {
                return Err(BackendError::BackendIo(format!(
                    "Request to '{}' failed: {}",
                    self.endpoint, err
                )));
            }
            warn!("Request to '{}' failed: {}, trying to reconnect", self.endpoint, err);
            state.transport.disconnect().await;
            tokio::time::sleep(RETRY_PAUSE.min(self.options.retry_budget - elapsed)).await;
        }
    }

    async fn reconnect(state: &mut ExecutorState<T>, timeout: Duration) -> Result<()> {
        state.session.clear_cookie();
        state.transport.connect(timeout).await
    }

    async fn send(&self, state: &mut ExecutorState<T>, payload: &str) -> Result<RawResponse> {
        let request = self.build_request(&state.session, payload)?;
        let response = state.transport.send(request).await?;
        state.session.capture_from_headers(&response.headers);
        Ok(response)
    }

    /// Builds the literal HTTP request for a serialized envelope.
    fn build_request(&self, session: &Session, payload: &str) -> Result<RawRequest> {
        let base_path = self.endpoint.base_path();
        let mut request = match self.options.method {
            RpcMethod::Get => {
                let target = format!(
                    "{}?{}",
                    base_path,
                    utf8_percent_encode(payload, QUERY_ENCODE_SET)
                );
                if target.len() <= self.options.max_get_url_len {
                    debug!("Using method GET");
                    RawRequest::new(Method::GET, target)
                } else {
                    debug!(
                        len = target.len(),
                        max = self.options.max_get_url_len,
                        "GET request target too long, using method POST"
                    );
                    Self::post_request(base_path, payload)
                }
            }
            RpcMethod::Post => {
                debug!("Using method POST");
                Self::post_request(base_path, payload)
            }
        };

        request.append_header(ACCEPT, HeaderValue::from_static(JSON_RPC_CONTENT_TYPE));
        request.append_header(ACCEPT, HeaderValue::from_static("text/plain"));
        session.apply(&mut request.headers)?;
        Ok(request)
    }

    fn post_request(base_path: &str, payload: &str) -> RawRequest {
        let mut request = RawRequest::new(Method::POST, base_path)
            .with_body(Bytes::copy_from_slice(payload.as_bytes()));
        request.append_header(CONTENT_TYPE, HeaderValue::from_static(JSON_RPC_CONTENT_TYPE));
        request
    }

    fn decode(&self, method: &str, response: RawResponse) -> Result<RpcValue> {
        let status = response.status;
        let rpc: RpcResponse = serde_json::from_slice(&response.body).map_err(|e| {
            BackendError::InvalidResponse(format!(
                "Bad response to '{}' (HTTP {}): {}",
                method, status, e
            ))
        })?;

        if let Some(error) = rpc.error {
            return Err(BackendError::RemoteExecution(error));
        }
        Ok(self.marshaller.from_hash(rpc.result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{rpc_error, rpc_ok, transport_error, ScriptHandle, ScriptedTransport};
    use hyper::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
    use hyper::StatusCode;
    use opsirpc_common::auth::Credentials;
    use opsirpc_common::objects::{ObjectRegistry, OpsiClient};
    use serde_json::json;
    use std::sync::Arc;

    fn options() -> ExecutorOptions {
        ExecutorOptions {
            method: RpcMethod::Post,
            retry: true,
            retry_budget: Duration::from_millis(500),
            connect_timeout: Duration::from_secs(1),
            max_get_url_len: 8192,
        }
    }

    fn executor_with(
        options: ExecutorOptions,
    ) -> (RequestExecutor<ScriptedTransport>, ScriptHandle) {
        let (transport, script) = ScriptedTransport::new();
        let executor = RequestExecutor::new(
            transport,
            Session::new(Credentials::new("adminuser", "secret")),
            ObjectMarshaller::new(Arc::new(ObjectRegistry::builtin())),
            options,
        );
        (executor, script)
    }

    fn executor() -> (RequestExecutor<ScriptedTransport>, ScriptHandle) {
        executor_with(options())
    }

    #[tokio::test]
    async fn test_post_request_shape() {
        let (executor, script) = executor();
        let result = executor
            .execute("getHostIds", &[RpcValue::from(json!({"type": "Client"}))])
            .await
            .unwrap();
        assert_eq!(result, RpcValue::from("getHostIds"));

        let script = script.lock().unwrap();
        let request = &script.requests[0];
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.target, "/rpc");
        assert_eq!(
            request.body,
            Bytes::from_static(br#"{"id":1,"method":"getHostIds","params":[{"type":"Client"}]}"#)
        );
        assert_eq!(request.headers.get(CONTENT_TYPE).unwrap(), "application/json-rpc");
        let accept: Vec<_> = request.headers.get_all(ACCEPT).iter().collect();
        assert_eq!(accept, vec!["application/json-rpc", "text/plain"]);
        assert_eq!(
            request.headers.get(AUTHORIZATION).unwrap(),
            "Basic YWRtaW51c2VyOnNlY3JldA=="
        );
        assert!(request.headers.get(COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_get_request_encodes_query() {
        let (executor, script) = executor_with(ExecutorOptions {
            method: RpcMethod::Get,
            ..options()
        });
        executor
            .execute("host_getIdents", &[RpcValue::from("str")])
            .await
            .unwrap();

        let script = script.lock().unwrap();
        let request = &script.requests[0];
        assert_eq!(request.method, Method::GET);
        assert_eq!(
            request.target,
            "/rpc?%7B%22id%22%3A1%2C%22method%22%3A%22host_getIdents%22%2C%22params%22%3A%5B%22str%22%5D%7D"
        );
        assert!(request.body.is_empty());
        assert!(request.headers.get(CONTENT_TYPE).is_none());
    }

    #[tokio::test]
    async fn test_long_get_falls_back_to_post() {
        let (executor, script) = executor_with(ExecutorOptions {
            method: RpcMethod::Get,
            max_get_url_len: 64,
            ..options()
        });
        let long = "x".repeat(100);
        executor
            .execute("host_getObjects", &[RpcValue::from(long)])
            .await
            .unwrap();

        let script = script.lock().unwrap();
        assert_eq!(script.requests[0].method, Method::POST);
        assert_eq!(script.requests[0].target, "/rpc");
    }

    #[tokio::test]
    async fn test_objects_are_sent_as_hashes_and_hydrated() {
        let (executor, script) = executor();
        script.lock().unwrap().responses.push_back(Ok(rpc_ok(json!([
            {"type": "OpsiClient", "id": "pc01.uib.local"},
            {"type": "NoSuchClass", "a": 1}
        ]))));

        let result = executor
            .execute("host_createObjects", &[RpcValue::object(OpsiClient::new("pc01.uib.local"))])
            .await
            .unwrap();

        let items = result.as_list().unwrap();
        assert_eq!(items[0].downcast_ref::<OpsiClient>().unwrap().id, "pc01.uib.local");
        assert_eq!(items[1].as_plain(), Some(&json!({"type": "NoSuchClass", "a": 1})));

        let script = script.lock().unwrap();
        let sent: serde_json::Value = serde_json::from_slice(&script.requests[0].body).unwrap();
        assert_eq!(sent["params"][0]["type"], "OpsiClient");
        assert_eq!(sent["params"][0]["id"], "pc01.uib.local");
    }

    #[tokio::test]
    async fn test_retry_succeeds_on_second_attempt() {
        let (executor, script) = executor();
        {
            let mut script = script.lock().unwrap();
            script.responses.push_back(transport_error());
            script.responses.push_back(Ok(rpc_ok(json!("second"))));
        }

        let result = executor.execute("backend_info", &[]).await.unwrap();
        assert_eq!(result, RpcValue::from("second"));

        let script = script.lock().unwrap();
        assert_eq!(script.requests.len(), 2);
        assert_eq!(script.connects, 2);
    }

    #[tokio::test]
    async fn test_retry_budget_bounds_failing_call() {
        let (executor, script) = executor();
        script.lock().unwrap().fail_sends = true;

        let started = Instant::now();
        let err = executor.execute("backend_info", &[]).await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, BackendError::BackendIo(_)), "got {:?}", err);
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_millis(500) + Duration::from_secs(1));
        assert!(script.lock().unwrap().requests.len() > 1);
    }

    #[tokio::test]
    async fn test_refused_reconnects_count_as_attempts() {
        let (executor, script) = executor();
        script.lock().unwrap().refuse_connect = true;

        let started = Instant::now();
        let err = executor.execute("backend_info", &[]).await.unwrap_err();
        assert!(matches!(err, BackendError::BackendIo(_)));
        assert!(started.elapsed() < Duration::from_millis(500) + Duration::from_secs(1));

        let script = script.lock().unwrap();
        assert!(script.connects > 1);
        assert!(script.requests.is_empty());
    }

    #[tokio::test]
    async fn test_no_retry_when_disabled() {
        let (executor, script) = executor_with(ExecutorOptions {
            retry: false,
            ..options()
        });
        {
            let mut script = script.lock().unwrap();
            script.responses.push_back(transport_error());
            script.responses.push_back(Ok(rpc_ok(json!("unused"))));
        }

        let err = executor.execute("backend_info", &[]).await.unwrap_err();
        assert!(matches!(err, BackendError::BackendIo(_)));
        assert_eq!(script.lock().unwrap().requests.len(), 1);
    }

    #[tokio::test]
    async fn test_execute_once_ignores_retry_setting() {
        let (executor, script) = executor();
        script.lock().unwrap().responses.push_back(transport_error());

        let err = executor.execute_once("getInterface", &[]).await.unwrap_err();
        assert!(matches!(err, BackendError::BackendIo(_)));
        assert_eq!(script.lock().unwrap().requests.len(), 1);
    }

    #[tokio::test]
    async fn test_remote_error_is_not_retried() {
        let (executor, script) = executor();
        script.lock().unwrap().responses.push_back(Ok(rpc_error(json!({
            "class": "BackendMissingDataError",
            "message": "Host 'x' not found"
        }))));

        let err = executor.execute("host_delete", &[]).await.unwrap_err();
        assert_eq!(
            err.remote_payload().unwrap()["class"],
            "BackendMissingDataError"
        );
        assert_eq!(script.lock().unwrap().requests.len(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_body_is_invalid_response() {
        let (executor, script) = executor();
        script
            .lock()
            .unwrap()
            .responses
            .push_back(Ok(RawResponse::new(StatusCode::UNAUTHORIZED, "<html>denied</html>")));

        let err = executor.execute("backend_info", &[]).await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidResponse(_)));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_cookie_replayed_then_cleared_on_reconnect() {
        let (executor, script) = executor();
        {
            let mut script = script.lock().unwrap();
            script.responses.push_back(Ok(rpc_ok(json!(null)).with_header(
                SET_COOKIE,
                HeaderValue::from_static("OPSISID=abc123; Path=/; HttpOnly"),
            )));
            script.responses.push_back(Ok(rpc_ok(json!(null))));
            script.responses.push_back(transport_error());
            script.responses.push_back(Ok(rpc_ok(json!(null))));
        }

        executor.execute("backend_info", &[]).await.unwrap();
        assert_eq!(executor.session_cookie().await.as_deref(), Some("OPSISID=abc123"));

        executor.execute("backend_info", &[]).await.unwrap();
        executor.execute("backend_info", &[]).await.unwrap();

        let script = script.lock().unwrap();
        let cookies: Vec<_> = script
            .requests
            .iter()
            .map(|r| r.headers.get(COOKIE).map(|c| c.to_str().unwrap().to_string()))
            .collect();
        assert_eq!(
            cookies,
            vec![
                None,
                Some("OPSISID=abc123".to_string()),
                Some("OPSISID=abc123".to_string()),
                None,
            ]
        );
        assert!(script
            .requests
            .iter()
            .all(|r| r.headers.get(AUTHORIZATION).is_some()));
    }

    #[tokio::test]
    async fn test_queued_calls_run_in_issuance_order() {
        let (executor, script) = executor();
        script.lock().unwrap().send_delay = Duration::from_millis(50);
        let executor = Arc::new(executor);

        // Each call is spawned only after the previous one is queued on the lock.
        let mut calls = Vec::new();
        for i in 0..5 {
            let executor = executor.clone();
            calls.push(tokio::spawn(async move {
                executor.execute(&format!("method_{}", i), &[]).await
            }));
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        for call in futures::future::join_all(calls).await {
            call.unwrap().unwrap();
        }

        let script = script.lock().unwrap();
        let begins: Vec<_> = script
            .events
            .iter()
            .filter_map(|e| e.strip_prefix("begin:"))
            .collect();
        assert_eq!(
            begins,
            vec!["method_0", "method_1", "method_2", "method_3", "method_4"]
        );
    }

    #[tokio::test]
    async fn test_concurrent_calls_do_not_interleave() {
        let (executor, script) = executor();
        script.lock().unwrap().send_delay = Duration::from_millis(20);
        let executor = Arc::new(executor);

        let calls = (0..4).map(|i| {
            let executor = executor.clone();
            tokio::spawn(async move { executor.execute(&format!("method_{}", i), &[]).await })
        });
        for call in futures::future::join_all(calls).await {
            call.unwrap().unwrap();
        }

        let script = script.lock().unwrap();
        let events: Vec<_> = script.events.iter().filter(|e| *e != "connect").collect();
        assert_eq!(events.len(), 8);
        for pair in events.chunks(2) {
            let begin = pair[0].strip_prefix("begin:").unwrap();
            let end = pair[1].strip_prefix("end:").unwrap();
            assert_eq!(begin, end);
        }
    }
}

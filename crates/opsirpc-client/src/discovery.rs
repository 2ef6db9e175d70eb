//! Interface discovery and the capability table
//!
//! The client compiles in no remote methods. On first connect it asks the
//! server for its catalogue (`getInterface`) and builds a [`CapabilityTable`]
//! with one [`Invoker`] per advertised method. An invoker maps keyword
//! arguments onto the method's declared parameter order.

use std::collections::HashMap;

use opsirpc_common::backend::Kwargs;
use opsirpc_common::objects::RpcValue;
use opsirpc_common::protocol::error::{BackendError, Result};
use opsirpc_common::protocol::interface::{InterfaceDescriptor, MethodSignature, GET_INTERFACE};
use opsirpc_common::transport::Transport;
use tracing::{debug, info};

use crate::executor::RequestExecutor;

/// Fetches the server's interface descriptor.
///
/// The bootstrap call is made without retries. Any failure, including an
/// answer that is not a method list, is reported as
/// `BackendError::BackendUnavailable`.
pub async fn discover<T: Transport>(executor: &RequestExecutor<T>) -> Result<InterfaceDescriptor> {
    let result = executor.execute_once(GET_INTERFACE, &[]).await.map_err(|e| {
        BackendError::BackendUnavailable(format!(
            "Failed to get interface from '{}': {}",
            executor.endpoint(),
            e
        ))
    })?;

    let interface: InterfaceDescriptor = serde_json::from_value(result.to_json()).map_err(|e| {
        BackendError::BackendUnavailable(format!(
            "Invalid interface description from '{}': {}",
            executor.endpoint(),
            e
        ))
    })?;

    info!(
        addr = %executor.endpoint(),
        methods = interface.len(),
        "Interface discovered"
    );
    Ok(interface)
}

/// Forwarding entry point for one remote method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoker {
    signature: MethodSignature,
}

impl Invoker {
    pub fn new(signature: MethodSignature) -> Self {
        Self { signature }
    }

    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    /// Packs keyword arguments into positional parameters.
    ///
    /// Declared parameters the caller leaves out are sent as `null`. Omitted
    /// pass-through (`*name`) parameters keep their slot as `null` too, unless
    /// no later parameter is sent, in which case they are trimmed.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::InvalidArguments` for a keyword that matches no
    /// declared parameter.
    pub fn pack(&self, mut kwargs: Kwargs) -> Result<Vec<RpcValue>> {
        let mut params = Vec::with_capacity(self.signature.params.len());
        let mut sent = 0;
        for parameter in self.signature.parameters() {
            match kwargs.remove(parameter.name) {
                Some(value) => params.push(value),
                None if parameter.pass_through => {
                    params.push(RpcValue::null());
                    continue;
                }
                None => params.push(RpcValue::null()),
            }
            sent = params.len();
        }
        params.truncate(sent);

        if let Some(unknown) = kwargs.names().next() {
            return Err(BackendError::InvalidArguments(format!(
                "{}() got an unexpected keyword argument '{}'",
                self.signature.name, unknown
            )));
        }
        Ok(params)
    }
}

/// Remote method name to invoker, in interface order.
#[derive(Debug, Clone, Default)]
pub struct CapabilityTable {
    invokers: Vec<Invoker>,
    index: HashMap<String, usize>,
}

impl CapabilityTable {
    /// Builds the table, skipping every name in `concrete`.
    ///
    /// Names implemented locally are never replaced by a forwarding entry.
    pub fn build(interface: &InterfaceDescriptor, concrete: &[&str]) -> Self {
        let mut table = Self::default();
        for signature in interface.methods() {
            if concrete.contains(&signature.name.as_str()) {
                debug!(method = %signature.name, "Not overwriting concrete method");
                continue;
            }
            if table.index.contains_key(&signature.name) {
                continue;
            }
            table
                .index
                .insert(signature.name.clone(), table.invokers.len());
            table.invokers.push(Invoker::new(signature.clone()));
        }
        table
    }

    pub fn get(&self, name: &str) -> Option<&Invoker> {
        self.index.get(name).map(|&i| &self.invokers[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.invokers.iter().map(Invoker::name)
    }

    pub fn len(&self) -> usize {
        self.invokers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invokers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RpcMethod;
    use crate::executor::ExecutorOptions;
    use crate::testing::{rpc_error, rpc_ok, transport_error, ScriptedTransport};
    use opsirpc_common::auth::{Credentials, Session};
    use opsirpc_common::objects::{ObjectMarshaller, ObjectRegistry};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn signature(name: &str, params: &[&str]) -> MethodSignature {
        MethodSignature::new(name, params.iter().map(|p| p.to_string()).collect())
    }

    fn executor() -> (
        RequestExecutor<ScriptedTransport>,
        crate::testing::ScriptHandle,
    ) {
        let (transport, script) = ScriptedTransport::new();
        let executor = RequestExecutor::new(
            transport,
            Session::new(Credentials::new("adminuser", "secret")),
            ObjectMarshaller::new(Arc::new(ObjectRegistry::builtin())),
            ExecutorOptions {
                method: RpcMethod::Post,
                retry: true,
                retry_budget: Duration::from_secs(1),
                connect_timeout: Duration::from_secs(1),
                max_get_url_len: 8192,
            },
        );
        (executor, script)
    }

    #[test]
    fn test_pack_orders_and_fills_missing() {
        let invoker = Invoker::new(signature("host_getObjects", &["attributes", "*filter"]));

        let params = invoker
            .pack(Kwargs::new().arg("filter", json!({"id": "pc01"})))
            .unwrap();
        assert_eq!(params, vec![RpcValue::null(), RpcValue::from(json!({"id": "pc01"}))]);

        let params = invoker.pack(Kwargs::new()).unwrap();
        assert_eq!(params, vec![RpcValue::null()]);
    }

    #[test]
    fn test_pack_keeps_position_after_omitted_pass_through() {
        let invoker = Invoker::new(signature("host_getObjects", &["*attributes", "*filter"]));

        let params = invoker
            .pack(Kwargs::new().arg("filter", json!({"id": "pc01"})))
            .unwrap();
        assert_eq!(params, vec![RpcValue::null(), RpcValue::from(json!({"id": "pc01"}))]);

        let params = invoker
            .pack(Kwargs::new().arg("attributes", json!(["id"])))
            .unwrap();
        assert_eq!(params, vec![RpcValue::from(json!(["id"]))]);

        assert!(invoker.pack(Kwargs::new()).unwrap().is_empty());
    }

    #[test]
    fn test_pack_fills_gap_between_sent_parameters() {
        let invoker = Invoker::new(signature(
            "productOnClient_getObjects",
            &["attributes", "*productId", "*clientId", "*filter"],
        ));

        let params = invoker
            .pack(
                Kwargs::new()
                    .arg("clientId", "pc01.uib.local")
                    .arg("attributes", json!([])),
            )
            .unwrap();
        assert_eq!(
            params,
            vec![
                RpcValue::from(json!([])),
                RpcValue::null(),
                RpcValue::from("pc01.uib.local"),
            ]
        );
    }

    #[test]
    fn test_pack_rejects_unknown_keyword() {
        let invoker = Invoker::new(signature("host_delete", &["id"]));
        let err = invoker
            .pack(Kwargs::new().arg("id", "pc01").arg("force", true))
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidArguments(_)));
        assert!(err.to_string().contains("'force'"));
    }

    #[test]
    fn test_concrete_methods_are_not_overridden() {
        let interface = InterfaceDescriptor::new(vec![
            signature("backend_info", &[]),
            signature("exit", &[]),
            signature("host_getIdents", &["returnType", "*filter"]),
        ]);
        let table = CapabilityTable::build(&interface, &["exit"]);

        assert_eq!(table.len(), 2);
        assert!(!table.contains("exit"));
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["backend_info", "host_getIdents"]);
        assert_eq!(table.get("host_getIdents").unwrap().signature().params.len(), 2);
    }

    #[tokio::test]
    async fn test_discover_then_forward() {
        let (executor, script) = executor();
        script
            .lock()
            .unwrap()
            .responses
            .push_back(Ok(rpc_ok(json!([{"name": "getHostIds", "params": ["*filter"]}]))));

        let interface = discover(&executor).await.unwrap();
        let table = CapabilityTable::build(&interface, &["exit"]);
        let invoker = table.get("getHostIds").unwrap();

        let params = invoker
            .pack(Kwargs::new().arg("filter", json!({"type": "Client"})))
            .unwrap();
        executor.execute(invoker.name(), &params).await.unwrap();

        let script = script.lock().unwrap();
        assert_eq!(
            std::str::from_utf8(&script.requests[1].body).unwrap(),
            r#"{"id":1,"method":"getHostIds","params":[{"type":"Client"}]}"#
        );
    }

    #[tokio::test]
    async fn test_discover_failure_is_backend_unavailable() {
        let (executor, script) = executor();
        script.lock().unwrap().responses.push_back(transport_error());

        let err = discover(&executor).await.unwrap_err();
        assert!(matches!(err, BackendError::BackendUnavailable(_)));
        // Bootstrap is never retried.
        assert_eq!(script.lock().unwrap().requests.len(), 1);
    }

    #[tokio::test]
    async fn test_discover_remote_error_is_backend_unavailable() {
        let (executor, script) = executor();
        script
            .lock()
            .unwrap()
            .responses
            .push_back(Ok(rpc_error(json!("Authentication failed"))));

        let err = discover(&executor).await.unwrap_err();
        assert!(matches!(err, BackendError::BackendUnavailable(_)));
        assert!(err.to_string().contains("Authentication failed"));
    }

    #[tokio::test]
    async fn test_discover_rejects_non_list() {
        let (executor, script) = executor();
        script
            .lock()
            .unwrap()
            .responses
            .push_back(Ok(rpc_ok(json!({"name": "oops"}))));

        let err = discover(&executor).await.unwrap_err();
        assert!(matches!(err, BackendError::BackendUnavailable(_)));
    }
}

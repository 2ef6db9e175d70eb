use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use opsirpc_common::backend::{Backend, Kwargs};
use opsirpc_common::objects::RpcValue;
use opsirpc_common::protocol::error::{BackendError, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::DispatchConfig;

/// Methods answered by the dispatcher itself.
pub const DISPATCHER_METHODS: &[&str] =
    &["exit", "dispatcher_getConfig", "dispatcher_getBackendNames"];

/// Routes calls to one or more named backends.
///
/// # Routing
///
/// The method table is built once, over every public method of every
/// available backend:
///
/// 1. If the part of the method name before the first `_` is a backend
///    name, the method goes to that backend only (`file_getHosts` to `file`)
/// 2. Otherwise the first rule whose regex matches decides; of its backends,
///    those that are available and implement the method are used, in rule
///    order
///
/// Methods without any target backend are not exposed.
///
/// # Merging
///
/// With several targets, results are folded in target order: lists are
/// concatenated, maps are updated (later keys win), and otherwise the latest
/// non-null result wins.
pub struct BackendDispatcher {
    config: DispatchConfig,
    backends: Vec<(String, Arc<dyn Backend>)>,
    methods: Vec<String>,
    routes: HashMap<String, Vec<usize>>,
}

impl BackendDispatcher {
    /// Creates a dispatcher over `backends`.
    ///
    /// Backends the config never mentions are dropped.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Configuration` when the config has no rules or
    /// none of its backends is available.
    pub fn new<I, S>(config: DispatchConfig, backends: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Arc<dyn Backend>)>,
        S: Into<String>,
    {
        if config.is_empty() {
            return Err(BackendError::Configuration("Dispatcher not configured".to_string()));
        }

        let referenced = config.backend_names();
        let mut available: Vec<(String, Arc<dyn Backend>)> = Vec::new();
        for (name, backend) in backends {
            let name = name.into();
            if !referenced.contains(&name.as_str()) {
                debug!(backend = %name, "Ignoring backend not referenced by dispatch config");
                continue;
            }
            if available.iter().any(|(n, _)| *n == name) {
                continue;
            }
            available.push((name, backend));
        }

        if available.is_empty() {
            return Err(BackendError::Configuration(format!(
                "None of the dispatch backends is available: {}",
                referenced.join(", ")
            )));
        }
        info!(
            "Dispatcher backends: {}",
            available.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>().join(", ")
        );

        let mut dispatcher = Self {
            config,
            backends: available,
            methods: Vec::new(),
            routes: HashMap::new(),
        };
        dispatcher.build_routes();
        Ok(dispatcher)
    }

    fn build_routes(&mut self) {
        let candidates: Vec<String> = self
            .backends
            .iter()
            .flat_map(|(_, backend)| backend.method_names())
            .collect();

        for method in candidates {
            if method.starts_with('_')
                || DISPATCHER_METHODS.contains(&method.as_str())
                || self.routes.contains_key(&method)
            {
                continue;
            }

            let targets = self.targets_for(&method);
            if targets.is_empty() {
                continue;
            }
            self.methods.push(method.clone());
            self.routes.insert(method, targets);
        }
    }

    fn backend_index(&self, name: &str) -> Option<usize> {
        self.backends.iter().position(|(n, _)| n == name)
    }

    fn targets_for(&self, method: &str) -> Vec<usize> {
        let prefix = method.split('_').next().unwrap_or(method);
        if let Some(index) = self.backend_index(prefix) {
            debug!(method = %method, backend = %prefix, "Dispatching by method prefix");
            return vec![index];
        }

        let Some(rule) = self.config.rules().iter().find(|r| r.matches(method)) else {
            return Vec::new();
        };

        let mut targets = Vec::new();
        for backend in rule.backends() {
            let Some(index) = self.backend_index(backend) else {
                debug!(backend = %backend, "Ignoring backend: backend not available");
                continue;
            };
            if !self.backends[index].1.has_method(method) {
                debug!(backend = %backend, method = %method, "Ignoring backend: method not found");
                continue;
            }
            targets.push(index);
        }
        if !targets.is_empty() {
            debug!(method = %method, rule = %rule.pattern(), "Dispatching by rule");
        }
        targets
    }

    pub fn dispatch_config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Names of the backends `method` is routed to.
    pub fn targets(&self, method: &str) -> Option<Vec<&str>> {
        self.routes.get(method).map(|targets| {
            targets
                .iter()
                .map(|&i| self.backends[i].0.as_str())
                .collect()
        })
    }

    pub fn has_method(&self, name: &str) -> bool {
        DISPATCHER_METHODS.contains(&name) || self.routes.contains_key(name)
    }

    pub fn methods(&self) -> Vec<String> {
        DISPATCHER_METHODS
            .iter()
            .map(|m| m.to_string())
            .chain(self.methods.iter().cloned())
            .collect()
    }

    /// Calls `name` on every target backend and merges the results.
    pub async fn call(&self, name: &str, kwargs: Kwargs) -> Result<RpcValue> {
        match name {
            "exit" => {
                self.exit().await?;
                return Ok(RpcValue::null());
            }
            "dispatcher_getConfig" => return Ok(RpcValue::Plain(self.config.to_json())),
            "dispatcher_getBackendNames" => {
                let names = self.backend_names().into_iter().map(Value::from).collect();
                return Ok(RpcValue::Plain(Value::Array(names)));
            }
            _ => {}
        }

        let targets = self
            .routes
            .get(name)
            .ok_or_else(|| BackendError::MethodNotFound(name.to_string()))?;

        debug!(method = %name, backends = ?self.targets(name), "Dispatching method");
        let mut result = RpcValue::null();
        for &index in targets {
            let value = self.backends[index].1.call(name, kwargs.clone()).await?;
            result = merge(result, value);
        }
        Ok(result)
    }

    /// Exits every backend. All are attempted; the first failure is returned.
    pub async fn exit(&self) -> Result<()> {
        let mut first_error = None;
        for (name, backend) in &self.backends {
            if let Err(e) = backend.exit().await {
                warn!(backend = %name, error = %e, "Failed to exit backend");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[async_trait]
impl Backend for BackendDispatcher {
    fn method_names(&self) -> Vec<String> {
        self.methods()
    }

    fn has_method(&self, name: &str) -> bool {
        BackendDispatcher::has_method(self, name)
    }

    async fn call(&self, name: &str, kwargs: Kwargs) -> Result<RpcValue> {
        BackendDispatcher::call(self, name, kwargs).await
    }

    async fn exit(&self) -> Result<()> {
        BackendDispatcher::exit(self).await
    }
}

/// Folds one backend result into the accumulated one.
///
/// `Plain` JSON arrays and objects take part like `List` and `Map`.
pub fn merge(accumulated: RpcValue, next: RpcValue) -> RpcValue {
    if is_list(&accumulated) && is_list(&next) {
        let mut items = list_items(accumulated);
        items.extend(list_items(next));
        return RpcValue::List(items);
    }
    if is_map(&accumulated) && is_map(&next) {
        let mut entries = map_entries(accumulated);
        entries.extend(map_entries(next));
        return RpcValue::Map(entries);
    }
    if next.is_null() {
        accumulated
    } else {
        next
    }
}

fn is_list(value: &RpcValue) -> bool {
    matches!(value, RpcValue::List(_) | RpcValue::Plain(Value::Array(_)))
}

fn is_map(value: &RpcValue) -> bool {
    matches!(value, RpcValue::Map(_) | RpcValue::Plain(Value::Object(_)))
}

fn list_items(value: RpcValue) -> Vec<RpcValue> {
    match value {
        RpcValue::List(items) => items,
        RpcValue::Plain(Value::Array(items)) => items.into_iter().map(RpcValue::Plain).collect(),
        other => vec![other],
    }
}

fn map_entries(value: RpcValue) -> BTreeMap<String, RpcValue> {
    match value {
        RpcValue::Map(map) => map,
        RpcValue::Plain(Value::Object(map)) => map
            .into_iter()
            .map(|(k, v)| (k, RpcValue::Plain(v)))
            .collect(),
        _ => BTreeMap::new(),
    }
}

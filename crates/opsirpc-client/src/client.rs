use std::sync::Arc;

use async_trait::async_trait;
use opsirpc_common::auth::Session;
use opsirpc_common::backend::{Backend, Kwargs};
use opsirpc_common::objects::{ObjectMarshaller, ObjectRegistry, RpcValue};
use opsirpc_common::protocol::error::{BackendError, Result};
use opsirpc_common::protocol::interface::InterfaceDescriptor;
use opsirpc_common::transport::{ConnectionManager, Endpoint, Transport};
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::JsonRpcConfig;
use crate::discovery::{discover, CapabilityTable};
use crate::executor::{ExecutorOptions, RequestExecutor};

/// Methods implemented by the client itself. The server's versions of these
/// are never installed in the capability table.
pub const CONCRETE_METHODS: &[&str] = &["exit"];

/// Interface and capability table, fixed after the first discovery.
#[derive(Debug)]
struct Discovered {
    interface: InterfaceDescriptor,
    capabilities: CapabilityTable,
}

/// Client backend for an opsi JSON-RPC server.
///
/// Holds exactly one connection. Remote methods become callable once the
/// server's interface has been discovered; [`call`](Self::call) dispatches
/// to them by name with keyword arguments.
///
/// Calls from concurrent tasks are serialized: at most one request is in
/// flight per client.
///
/// # Example
///
/// ```rust,no_run
/// use opsirpc_client::{JsonRpcBackend, JsonRpcConfig};
/// use opsirpc_common::Kwargs;
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = JsonRpcConfig::new("configserver.uib.local", "adminuser", "secret");
/// let backend = JsonRpcBackend::new(config).await?;
///
/// let idents = backend
///     .call("host_getIdents", Kwargs::new().arg("returnType", "str"))
///     .await?;
/// println!("{:?}", idents);
///
/// backend.exit().await?;
/// # Ok(())
/// # }
/// ```
pub struct JsonRpcBackend<T: Transport = ConnectionManager> {
    executor: RequestExecutor<T>,
    discovered: OnceCell<Discovered>,
}

impl JsonRpcBackend<ConnectionManager> {
    /// Creates a client with the built-in object types.
    ///
    /// With `connect_on_init` set (the default) this connects and discovers
    /// the interface before returning.
    ///
    /// # Errors
    ///
    /// - `BackendError::Configuration` for a malformed address or CA file
    /// - `BackendError::Connection` / `BackendError::TransportTimeout` when
    ///   the server cannot be reached
    /// - `BackendError::BackendUnavailable` when discovery fails
    pub async fn new(config: JsonRpcConfig) -> Result<Self> {
        Self::with_registry(config, ObjectRegistry::builtin()).await
    }

    /// Creates a client hydrating results with `registry`.
    pub async fn with_registry(config: JsonRpcConfig, registry: ObjectRegistry) -> Result<Self> {
        let endpoint = config.endpoint()?;
        let transport = ConnectionManager::new(endpoint, config.connection_config());
        Self::with_transport(transport, &config, registry).await
    }
}

impl<T: Transport> JsonRpcBackend<T> {
    /// Creates a client over an existing transport.
    ///
    /// The transport's endpoint is used; `config.address` is not consulted.
    pub async fn with_transport(
        transport: T,
        config: &JsonRpcConfig,
        registry: ObjectRegistry,
    ) -> Result<Self> {
        let options = ExecutorOptions {
            method: config.method,
            retry: config.retry,
            retry_budget: config.retry_budget,
            connect_timeout: config.connect_timeout,
            max_get_url_len: config.max_get_url_len,
        };
        let executor = RequestExecutor::new(
            transport,
            Session::new(config.credentials()),
            ObjectMarshaller::new(Arc::new(registry)),
            options,
        );

        let backend = Self {
            executor,
            discovered: OnceCell::new(),
        };
        if config.connect_on_init {
            backend.connect().await?;
        }
        Ok(backend)
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.executor.endpoint()
    }

    pub async fn is_connected(&self) -> bool {
        self.executor.is_connected().await
    }

    pub async fn session_cookie(&self) -> Option<String> {
        self.executor.session_cookie().await
    }

    /// Connects if not connected, then discovers the interface once.
    pub async fn connect(&self) -> Result<()> {
        if !self.executor.is_connected().await {
            self.executor.connect().await?;
        }
        self.discovered().await?;
        info!("Successfully connected to '{}'", self.endpoint());
        Ok(())
    }

    async fn discovered(&self) -> Result<&Discovered> {
        self.discovered
            .get_or_try_init(|| async {
                let interface = discover(&self.executor).await?;
                let capabilities = CapabilityTable::build(&interface, CONCRETE_METHODS);
                Ok(Discovered {
                    interface,
                    capabilities,
                })
            })
            .await
    }

    /// The discovered interface, if discovery has happened.
    pub fn interface(&self) -> Option<&InterfaceDescriptor> {
        self.discovered.get().map(|d| &d.interface)
    }

    /// Whether `name` is callable: concrete, or advertised by the server.
    pub fn has_method(&self, name: &str) -> bool {
        CONCRETE_METHODS.contains(&name)
            || self
                .discovered
                .get()
                .is_some_and(|d| d.capabilities.contains(name))
    }

    /// All callable method names, concrete ones first.
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = CONCRETE_METHODS.iter().map(|m| m.to_string()).collect();
        if let Some(discovered) = self.discovered.get() {
            names.extend(discovered.capabilities.names().map(str::to_string));
        }
        names
    }

    /// Calls a remote method by name.
    ///
    /// # Errors
    ///
    /// - `BackendError::MethodNotFound` if the server does not advertise `name`
    /// - `BackendError::InvalidArguments` for an undeclared keyword
    /// - `BackendError::RemoteExecution` when the server reports an error
    /// - `BackendError::BackendIo` when the retry budget is exhausted
    pub async fn call(&self, name: &str, kwargs: Kwargs) -> Result<RpcValue> {
        if name == "exit" {
            self.exit().await?;
            return Ok(RpcValue::null());
        }

        let discovered = self.discovered().await?;
        let invoker = discovered
            .capabilities
            .get(name)
            .ok_or_else(|| BackendError::MethodNotFound(name.to_string()))?;
        let params = invoker.pack(kwargs)?;
        self.executor.execute(name, &params).await
    }

    /// Tells the server the session is over, then disconnects.
    ///
    /// The connection is closed even if the remote call fails; that failure
    /// is returned.
    pub async fn exit(&self) -> Result<()> {
        let result = self.executor.execute("exit", &[]).await;
        self.executor.disconnect().await;
        result.map(|_| ())
    }
}

#[async_trait]
impl<T: Transport> Backend for JsonRpcBackend<T> {
    fn method_names(&self) -> Vec<String> {
        self.methods()
    }

    fn has_method(&self, name: &str) -> bool {
        JsonRpcBackend::has_method(self, name)
    }

    async fn call(&self, name: &str, kwargs: Kwargs) -> Result<RpcValue> {
        JsonRpcBackend::call(self, name, kwargs).await
    }

    async fn exit(&self) -> Result<()> {
        JsonRpcBackend::exit(self).await
    }
}

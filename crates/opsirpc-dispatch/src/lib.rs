//! opsirpc Dispatcher
//!
//! Presents several [`Backend`](opsirpc_common::Backend)s as one. Calls are
//! routed by method-name prefix or by regex rules from a [`DispatchConfig`];
//! results from several backends are merged.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use opsirpc_client::{JsonRpcBackend, JsonRpcConfig};
//! use opsirpc_common::{Backend, Kwargs};
//! use opsirpc_dispatch::{BackendDispatcher, DispatchConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DispatchConfig::parse("host_.* : main, depot\n.* : main")?;
//! let main = JsonRpcBackend::new(JsonRpcConfig::new("config01", "admin", "secret")).await?;
//! let depot = JsonRpcBackend::new(JsonRpcConfig::new("depot01", "admin", "secret")).await?;
//! let main: Arc<dyn Backend> = Arc::new(main);
//! let depot: Arc<dyn Backend> = Arc::new(depot);
//!
//! let dispatcher = BackendDispatcher::new(config, [("main", main), ("depot", depot)])?;
//! let hosts = dispatcher.call("host_getIdents", Kwargs::new()).await?;
//! println!("{:?}", hosts);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatcher;

pub use config::{DispatchConfig, DispatchRule};
pub use dispatcher::{merge, BackendDispatcher, DISPATCHER_METHODS};

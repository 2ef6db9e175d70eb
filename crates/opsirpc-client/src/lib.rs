//! opsirpc Client Library
//!
//! JSON-RPC client backend for opsi management servers.
//!
//! # Overview
//!
//! [`JsonRpcBackend`] connects to one server, discovers the methods it
//! offers and forwards calls to them by name:
//!
//! - **[`JsonRpcConfig`]**: address, credentials, timeouts, retry settings
//! - **[`RequestExecutor`]**: one call end to end, with retry and
//!   per-client mutual exclusion
//! - **[`discovery`]**: `getInterface` bootstrap and the capability table
//!
//! # Example
//!
//! ```rust,no_run
//! use opsirpc_client::{JsonRpcBackend, JsonRpcConfig};
//! use opsirpc_common::Kwargs;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = JsonRpcConfig::new("configserver", "adminuser", "secret");
//! let backend = JsonRpcBackend::new(config).await?;
//! let info = backend.call("backend_info", Kwargs::new()).await?;
//! println!("{:?}", info);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod discovery;
pub mod executor;

#[cfg(test)]
mod testing;

pub use client::{JsonRpcBackend, CONCRETE_METHODS};
pub use config::{JsonRpcConfig, RpcMethod, DEFAULT_MAX_GET_URL_LEN, DEFAULT_RETRY_BUDGET};
pub use discovery::{CapabilityTable, Invoker};
pub use executor::{ExecutorOptions, RequestExecutor};

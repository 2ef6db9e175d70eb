pub mod error;
pub mod interface;
pub mod jsonrpc;

pub use error::{BackendError, Result};
pub use interface::{InterfaceDescriptor, MethodSignature, Parameter, GET_INTERFACE};
pub use jsonrpc::{RpcEnvelope, RpcResponse, ENVELOPE_ID};

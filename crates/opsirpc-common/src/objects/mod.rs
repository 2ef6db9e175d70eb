//! Domain object model
//!
//! Management objects (hosts, configs, product states) travel over the wire
//! as *hashes*: JSON objects carrying a `type` discriminator next to their
//! fields. This module holds the Rust side of that contract.
//!
//! # Components
//!
//! - **[`DomainObject`]**: object-safe view of a hydrated object
//! - **[`HashObject`]**: serde-backed implementation helper; implementing it
//!   is all a type needs to become a [`DomainObject`]
//! - **[`ObjectRegistry`]**: `type` name to constructor lookup
//! - **[`RpcValue`]**: call arguments and results, plain JSON or hydrated
//! - **[`ObjectMarshaller`]**: the two directions of the conversion
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use opsirpc_common::objects::{ObjectMarshaller, ObjectRegistry, OpsiClient};
//! use serde_json::json;
//!
//! let marshaller = ObjectMarshaller::new(Arc::new(ObjectRegistry::builtin()));
//! let value = marshaller.from_hash(json!({"type": "OpsiClient", "id": "pc01.uib.local"}));
//!
//! let client = value.downcast_ref::<OpsiClient>().unwrap();
//! assert_eq!(client.id, "pc01.uib.local");
//! ```

use std::any::Any;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

pub mod marshal;
pub mod registry;
pub mod types;
pub mod value;

pub use marshal::ObjectMarshaller;
pub use registry::ObjectRegistry;
pub use types::{
    BoolConfig, ConfigState, OpsiClient, OpsiConfigserver, OpsiDepotserver, ProductOnClient,
    UnicodeConfig,
};
pub use value::RpcValue;

/// Key of the type discriminator inside an object hash.
pub const TYPE_KEY: &str = "type";

/// A hydrated management object.
pub trait DomainObject: Any + Send + Sync + fmt::Debug {
    /// The discriminator this object is serialized under.
    fn object_type(&self) -> &'static str;

    /// Hash projection, always including the `type` discriminator.
    fn to_hash(&self) -> Map<String, Value>;

    /// Identity of the object, e.g. `pc01.uib.local` or
    /// `firefox;LocalbootProduct;pc01.uib.local`.
    fn ident(&self) -> String;

    fn as_any(&self) -> &dyn Any;

    fn clone_box(&self) -> Box<dyn DomainObject>;
}

impl dyn DomainObject {
    /// Returns the concrete object if it is a `T`.
    pub fn downcast_ref<T: DomainObject>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

impl Clone for Box<dyn DomainObject> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A domain type whose hash is its serde representation plus `type`.
///
/// Unknown fields in an incoming hash (including `type` itself) are ignored
/// on deserialization.
pub trait HashObject: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {
    /// Discriminator value, also the registry key.
    const TYPE: &'static str;

    fn ident(&self) -> String;
}

impl<T: HashObject> DomainObject for T {
    fn object_type(&self) -> &'static str {
        T::TYPE
    }

    fn to_hash(&self) -> Map<String, Value> {
        let mut hash = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        hash.insert(TYPE_KEY.to_string(), Value::String(T::TYPE.to_string()));
        hash
    }

    fn ident(&self) -> String {
        HashObject::ident(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_box(&self) -> Box<dyn DomainObject> {
        Box::new(self.clone())
    }
}

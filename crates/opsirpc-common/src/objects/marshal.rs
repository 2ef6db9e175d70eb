//! Type-tagged conversion between [`RpcValue`]s and wire data
//!
//! Outbound, every domain object is replaced by its hash. Inbound, every
//! mapping whose `type` names a registered type is hydrated; everything else
//! keeps its structure. Hydration never fails a call: a hash the registered
//! constructor rejects comes back as the raw mapping.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::objects::{ObjectRegistry, RpcValue, TYPE_KEY};

/// Converts values to and from their wire form using a shared registry.
#[derive(Debug, Clone)]
pub struct ObjectMarshaller {
    registry: Arc<ObjectRegistry>,
}

impl ObjectMarshaller {
    pub fn new(registry: Arc<ObjectRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    /// Projects a value to wire data.
    pub fn to_hash(&self, value: &RpcValue) -> Value {
        value.to_json()
    }

    /// Hydrates wire data.
    pub fn from_hash(&self, value: Value) -> RpcValue {
        match value {
            Value::Object(map) => match map.get(TYPE_KEY).and_then(Value::as_str) {
                Some(object_type) => self.hydrate(object_type.to_string(), map),
                None => RpcValue::Map(
                    map.into_iter()
                        .map(|(key, value)| (key, self.from_hash(value)))
                        .collect(),
                ),
            },
            Value::Array(items) => {
                RpcValue::List(items.into_iter().map(|item| self.from_hash(item)).collect())
            }
            other => RpcValue::Plain(other),
        }
    }

    fn hydrate(&self, object_type: String, map: Map<String, Value>) -> RpcValue {
        let Some(constructor) = self.registry.resolve(&object_type) else {
            return RpcValue::Plain(Value::Object(map));
        };

        match constructor(&map) {
            Ok(object) => RpcValue::Object(object),
            Err(e) => {
                debug!(
                    object_type = %object_type,
                    error = %e,
                    "Failed to hydrate object, keeping raw hash"
                );
                RpcValue::Plain(Value::Object(map))
            }
        }
    }
}

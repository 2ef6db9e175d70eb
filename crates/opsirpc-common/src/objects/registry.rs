//! Discriminator to constructor lookup

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};

use crate::objects::types::{
    BoolConfig, ConfigState, OpsiClient, OpsiConfigserver, OpsiDepotserver, ProductOnClient,
    UnicodeConfig,
};
use crate::objects::{DomainObject, HashObject, TYPE_KEY};

/// Builds a domain object from its hash.
pub type HashConstructor =
    fn(&Map<String, Value>) -> Result<Box<dyn DomainObject>, serde_json::Error>;

fn construct<T: HashObject>(
    hash: &Map<String, Value>,
) -> Result<Box<dyn DomainObject>, serde_json::Error> {
    let mut fields = hash.clone();
    fields.remove(TYPE_KEY);
    let object: T = serde_json::from_value(Value::Object(fields))?;
    Ok(Box::new(object))
}

/// Maps `type` discriminators to hash constructors.
#[derive(Clone, Default)]
pub struct ObjectRegistry {
    constructors: HashMap<&'static str, HashConstructor>,
}

impl ObjectRegistry {
    /// An empty registry. Every hash stays plain data.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in management types.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register::<OpsiClient>();
        registry.register::<OpsiDepotserver>();
        registry.register::<OpsiConfigserver>();
        registry.register::<UnicodeConfig>();
        registry.register::<BoolConfig>();
        registry.register::<ConfigState>();
        registry.register::<ProductOnClient>();
        registry
    }

    /// Registers `T` under `T::TYPE`, replacing any earlier registration.
    pub fn register<T: HashObject>(&mut self) -> &mut Self {
        self.constructors.insert(T::TYPE, construct::<T>);
        self
    }

    pub fn resolve(&self, object_type: &str) -> Option<HashConstructor> {
        self.constructors.get(object_type).copied()
    }

    pub fn contains(&self, object_type: &str) -> bool {
        self.constructors.contains_key(object_type)
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.constructors.keys().collect();
        types.sort();
        f.debug_struct("ObjectRegistry").field("types", &types).finish()
    }
}

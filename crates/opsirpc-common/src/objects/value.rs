//! Call argument and result values

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::objects::{DomainObject, HashObject};

/// A value passed to or returned from a remote call.
///
/// Hydrated objects may sit anywhere inside lists and maps; everything else
/// is plain JSON.
#[derive(Clone)]
pub enum RpcValue {
    Plain(Value),
    Object(Box<dyn DomainObject>),
    List(Vec<RpcValue>),
    Map(BTreeMap<String, RpcValue>),
}

impl RpcValue {
    pub fn null() -> Self {
        RpcValue::Plain(Value::Null)
    }

    pub fn object<T: HashObject>(object: T) -> Self {
        RpcValue::Object(Box::new(object))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RpcValue::Plain(Value::Null))
    }

    pub fn as_object(&self) -> Option<&dyn DomainObject> {
        match self {
            RpcValue::Object(object) => Some(object.as_ref()),
            _ => None,
        }
    }

    pub fn as_plain(&self) -> Option<&Value> {
        match self {
            RpcValue::Plain(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[RpcValue]> {
        match self {
            RpcValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the hydrated object if it is a `T`.
    pub fn downcast_ref<T: DomainObject>(&self) -> Option<&T> {
        self.as_object()?.downcast_ref::<T>()
    }

    /// The wire form of this value, with every object projected to its hash.
    pub fn to_json(&self) -> Value {
        match self {
            RpcValue::Plain(value) => value.clone(),
            RpcValue::Object(object) => Value::Object(object.to_hash()),
            RpcValue::List(items) => Value::Array(items.iter().map(RpcValue::to_json).collect()),
            RpcValue::Map(map) => Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl Default for RpcValue {
    fn default() -> Self {
        RpcValue::null()
    }
}

impl fmt::Debug for RpcValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcValue::Plain(value) => write!(f, "Plain({})", value),
            RpcValue::Object(object) => f.debug_tuple("Object").field(object).finish(),
            RpcValue::List(items) => f.debug_list().entries(items).finish(),
            RpcValue::Map(map) => f.debug_map().entries(map).finish(),
        }
    }
}

/// Values are equal when their wire forms are.
impl PartialEq for RpcValue {
    fn eq(&self, other: &Self) -> bool {
        self.to_json() == other.to_json()
    }
}

impl From<Value> for RpcValue {
    fn from(value: Value) -> Self {
        RpcValue::Plain(value)
    }
}

impl From<Box<dyn DomainObject>> for RpcValue {
    fn from(object: Box<dyn DomainObject>) -> Self {
        RpcValue::Object(object)
    }
}

impl From<Vec<RpcValue>> for RpcValue {
    fn from(items: Vec<RpcValue>) -> Self {
        RpcValue::List(items)
    }
}

impl From<BTreeMap<String, RpcValue>> for RpcValue {
    fn from(map: BTreeMap<String, RpcValue>) -> Self {
        RpcValue::Map(map)
    }
}

impl From<&str> for RpcValue {
    fn from(value: &str) -> Self {
        RpcValue::Plain(Value::String(value.to_string()))
    }
}

impl From<String> for RpcValue {
    fn from(value: String) -> Self {
        RpcValue::Plain(Value::String(value))
    }
}

impl From<bool> for RpcValue {
    fn from(value: bool) -> Self {
        RpcValue::Plain(Value::Bool(value))
    }
}

impl From<i64> for RpcValue {
    fn from(value: i64) -> Self {
        RpcValue::Plain(Value::from(value))
    }
}

impl From<f64> for RpcValue {
    fn from(value: f64) -> Self {
        RpcValue::Plain(Value::from(value))
    }
}

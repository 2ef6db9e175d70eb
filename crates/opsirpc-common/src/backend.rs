//! The backend abstraction
//!
//! A [`Backend`] is anything that answers management calls by name: a
//! remote JSON-RPC server, or a dispatcher routing over several backends.
//! Calls take keyword arguments ([`Kwargs`]); the callee maps them onto its
//! declared parameter order.

use async_trait::async_trait;

use crate::objects::RpcValue;
use crate::protocol::error::Result;

/// Ordered keyword arguments of one call.
///
/// Inserting an existing name replaces its value in place.
///
/// # Example
///
/// ```
/// use opsirpc_common::backend::Kwargs;
/// use serde_json::json;
///
/// let kwargs = Kwargs::new()
///     .arg("attributes", json!(["id"]))
///     .arg("id", "pc01.uib.local");
/// assert_eq!(kwargs.names().collect::<Vec<_>>(), vec!["attributes", "id"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Kwargs {
    entries: Vec<(String, RpcValue)>,
}

impl Kwargs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<RpcValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<RpcValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&RpcValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) -> Option<RpcValue> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RpcValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<RpcValue>> FromIterator<(K, V)> for Kwargs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut kwargs = Kwargs::new();
        for (name, value) in iter {
            kwargs.insert(name, value);
        }
        kwargs
    }
}

/// Something that answers management calls by method name.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Names of all callable methods.
    fn method_names(&self) -> Vec<String>;

    fn has_method(&self, name: &str) -> bool {
        self.method_names().iter().any(|m| m == name)
    }

    /// Calls `name` with keyword arguments.
    async fn call(&self, name: &str, kwargs: Kwargs) -> Result<RpcValue>;

    /// Releases the backend. Further calls may fail.
    async fn exit(&self) -> Result<()>;
}

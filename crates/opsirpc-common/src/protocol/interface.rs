//! Interface descriptor returned by the `getInterface` bootstrap call.

use serde::{Deserialize, Serialize};

/// Name of the bootstrap method every server must expose.
pub const GET_INTERFACE: &str = "getInterface";

/// One advertised remote method.
///
/// Parameter tokens keep the server's spelling: a leading `*` marks a
/// pass-through capture (`*filter`, `**kwargs`). Any further members the
/// server sends per method are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MethodSignature {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
}

impl MethodSignature {
    pub fn new(name: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Iterates the declared parameters in order.
    pub fn parameters(&self) -> impl Iterator<Item = Parameter<'_>> {
        self.params.iter().map(|token| Parameter::parse(token))
    }
}

/// A parsed parameter token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parameter<'a> {
    pub name: &'a str,
    pub pass_through: bool,
}

impl<'a> Parameter<'a> {
    fn parse(token: &'a str) -> Self {
        let name = token.trim_start_matches('*');
        Self {
            name,
            pass_through: name.len() != token.len(),
        }
    }
}

/// The ordered method catalogue of a server.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct InterfaceDescriptor {
    methods: Vec<MethodSignature>,
}

impl InterfaceDescriptor {
    pub fn new(methods: Vec<MethodSignature>) -> Self {
        Self { methods }
    }

    pub fn methods(&self) -> &[MethodSignature] {
        &self.methods
    }

    pub fn get(&self, name: &str) -> Option<&MethodSignature> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

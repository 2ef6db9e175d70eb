//! Built-in management object types
//!
//! Identity and descriptive fields are modelled. Every other attribute the
//! server sends is kept in `extra` and sent back unchanged; no field is
//! validated.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::objects::HashObject;

/// A managed client host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpsiClient {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub hardware_address: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub inventory_number: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub last_seen: Option<String>,
    /// Attributes without a typed field
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OpsiClient {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: None,
            notes: None,
            hardware_address: None,
            ip_address: None,
            inventory_number: None,
            created: None,
            last_seen: None,
            extra: Map::new(),
        }
    }
}

impl HashObject for OpsiClient {
    const TYPE: &'static str = "OpsiClient";

    fn ident(&self) -> String {
        self.id.clone()
    }
}

/// A depot server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpsiDepotserver {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub depot_local_url: Option<String>,
    #[serde(default)]
    pub depot_remote_url: Option<String>,
    #[serde(default)]
    pub repository_remote_url: Option<String>,
    #[serde(default)]
    pub network_address: Option<String>,
    #[serde(default)]
    pub is_master_depot: Option<bool>,
    #[serde(default)]
    pub master_depot_id: Option<String>,
    /// Attributes without a typed field
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OpsiDepotserver {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: None,
            notes: None,
            ip_address: None,
            depot_local_url: None,
            depot_remote_url: None,
            repository_remote_url: None,
            network_address: None,
            is_master_depot: None,
            master_depot_id: None,
            extra: Map::new(),
        }
    }
}

impl HashObject for OpsiDepotserver {
    const TYPE: &'static str = "OpsiDepotserver";

    fn ident(&self) -> String {
        self.id.clone()
    }
}

/// The config server. Carries the same fields as a depot server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpsiConfigserver(pub OpsiDepotserver);

impl HashObject for OpsiConfigserver {
    const TYPE: &'static str = "OpsiConfigserver";

    fn ident(&self) -> String {
        self.0.id.clone()
    }
}

/// A string-valued configuration entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnicodeConfig {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub possible_values: Option<Vec<Value>>,
    #[serde(default)]
    pub default_values: Option<Vec<Value>>,
    #[serde(default)]
    pub editable: Option<bool>,
    #[serde(default)]
    pub multi_value: Option<bool>,
    /// Attributes without a typed field
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HashObject for UnicodeConfig {
    const TYPE: &'static str = "UnicodeConfig";

    fn ident(&self) -> String {
        self.id.clone()
    }
}

/// A boolean configuration entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoolConfig {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default_values: Option<Vec<Value>>,
    /// Attributes without a typed field
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HashObject for BoolConfig {
    const TYPE: &'static str = "BoolConfig";

    fn ident(&self) -> String {
        self.id.clone()
    }
}

/// Per-object override of a configuration entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigState {
    pub config_id: String,
    pub object_id: String,
    #[serde(default)]
    pub values: Option<Vec<Value>>,
    /// Attributes without a typed field
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HashObject for ConfigState {
    const TYPE: &'static str = "ConfigState";

    fn ident(&self) -> String {
        format!("{};{}", self.config_id, self.object_id)
    }
}

/// Installation state of one product on one client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductOnClient {
    pub product_id: String,
    pub product_type: String,
    pub client_id: String,
    #[serde(default)]
    pub installation_status: Option<String>,
    #[serde(default)]
    pub action_request: Option<String>,
    #[serde(default)]
    pub action_result: Option<String>,
    #[serde(default)]
    pub last_action: Option<String>,
    #[serde(default)]
    pub product_version: Option<String>,
    #[serde(default)]
    pub package_version: Option<String>,
    #[serde(default)]
    pub modification_time: Option<String>,
    /// Attributes without a typed field
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HashObject for ProductOnClient {
    const TYPE: &'static str = "ProductOnClient";

    fn ident(&self) -> String {
        format!("{};{};{}", self.product_id, self.product_type, self.client_id)
    }
}

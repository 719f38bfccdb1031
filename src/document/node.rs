use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use super::is_absent;
use super::is_false;
use super::is_zero;

/// Settings of one cluster member, keyed by `node_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<GeoConfig>,
    /// Free-form extension data owned by the deployment
    #[serde(rename = "generic", default, skip_serializing_if = "is_absent")]
    pub private: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mgt_iface: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data_iface: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices_md: Vec<String>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub max_count: i32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub max_drive_set_count: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raid_level: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raid_level_md: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub async_io: bool,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub num_threads: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rack: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub zone: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region: String,
}

/// Result of enumerating every node document, ordered by node id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodesConfig(pub Vec<NodeConfig>);

impl NodeConfig {
    /// Returns a document for `node_id` whose nested sections are present and empty.
    pub fn init(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            network: Some(NetworkConfig::default()),
            storage: Some(StorageConfig::default()),
            geo: Some(GeoConfig::default()),
            private: None,
        }
    }
}

impl NodesConfig {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NodeConfig> {
        self.0.iter()
    }

    pub fn get(
        &self,
        node_id: &str,
    ) -> Option<&NodeConfig> {
        self.0.iter().find(|n| n.node_id == node_id)
    }
}

impl IntoIterator for NodesConfig {
    type Item = NodeConfig;
    type IntoIter = std::vec::IntoIter<NodeConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

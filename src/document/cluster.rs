use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use super::is_absent;
use super::is_false;

/// Cluster-wide settings. One instance per cluster, stored under a fixed key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mode: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster_id: String,
    /// Ids of the nodes known to belong to this cluster
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub node_id: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub logging_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alerting_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scheduler: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub multicontainer: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub nolh: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub callhome: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub bootstrap: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tunnel_end_point: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tunnel_certs: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub driver: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub debug_level: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<SecretsConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kvdb: Option<KvdbConfig>,
    /// Free-form extension data owned by the deployment
    #[serde(rename = "generic", default, skip_serializing_if = "is_absent")]
    pub private: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretsConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster_secret_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault: Option<VaultConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vault_token: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vault_addr: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vault_cacert: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vault_capath: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vault_client_cert: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vault_client_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vault_skip_verify: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vault_tls_server_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vault_base_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AwsConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub aws_access_key_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub aws_secret_access_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub aws_secret_token_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub aws_cmk: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub aws_region: String,
}

/// Connection settings of the key-value database backing the cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KvdbConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ca_file: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cert_file: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub trusted_ca_file: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub client_cert_auth: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub acl_token: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kvdb_addr: Vec<String>,
}

impl ClusterConfig {
    /// Returns a document whose nested sections are all present and empty.
    pub fn init() -> Self {
        Self {
            secrets: Some(SecretsConfig::init()),
            kvdb: Some(KvdbConfig::default()),
            ..Default::default()
        }
    }
}

impl SecretsConfig {
    pub fn init() -> Self {
        Self {
            vault: Some(VaultConfig::default()),
            aws: Some(AwsConfig::default()),
            ..Default::default()
        }
    }
}

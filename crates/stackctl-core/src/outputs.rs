//! Typed Terraform outputs.
//!
//! Output values are decoded at the boundary: well-known names must have
//! the expected shape, anything else is kept as raw JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterOutputs {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urn: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryOutputs {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseOutputs {
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urn: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One named output of a stack.
///
/// Serializes as the bare value so persisted state stays a plain
/// `{name: object}` map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StackOutput {
    Cluster(ClusterOutputs),
    Registry(RegistryOutputs),
    Database(DatabaseOutputs),
    Other(Value),
}

impl StackOutput {
    /// Decode `value` according to the output's name.
    pub fn decode(name: &str, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match name {
            "cluster" => StackOutput::Cluster(serde_json::from_value(value)?),
            "registry" => StackOutput::Registry(serde_json::from_value(value)?),
            "db" | "database" | "postgres" | "mysql" | "redis" => {
                StackOutput::Database(serde_json::from_value(value)?)
            }
            _ => StackOutput::Other(value),
        })
    }
}

/// Outputs of one or more stacks keyed by output name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WorkspaceOutputs(pub BTreeMap<String, StackOutput>);

impl WorkspaceOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode raw `(name, value)` pairs. Fails on the first well-known
    /// output with the wrong shape, returning its name.
    pub fn decode<I>(pairs: I) -> Result<Self, (String, serde_json::Error)>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut map = BTreeMap::new();
        for (name, value) in pairs {
            match StackOutput::decode(&name, value) {
                Ok(output) => {
                    map.insert(name, output);
                }
                Err(e) => return Err((name, e)),
            }
        }
        Ok(Self(map))
    }

    /// Parse persisted state JSON.
    pub fn from_json(json: &str) -> Result<Self, (String, serde_json::Error)> {
        let raw: BTreeMap<String, Value> =
            serde_json::from_str(json).map_err(|e| ("<state>".to_string(), e))?;
        Self::decode(raw)
    }

    /// Merge `other` into `self`; keys from `other` win.
    pub fn merge(&mut self, other: WorkspaceOutputs) {
        self.0.extend(other.0);
    }

    pub fn cluster(&self) -> Option<&ClusterOutputs> {
        match self.0.get("cluster") {
            Some(StackOutput::Cluster(c)) => Some(c),
            _ => None,
        }
    }

    pub fn registry(&self) -> Option<&RegistryOutputs> {
        match self.0.get("registry") {
            Some(StackOutput::Registry(r)) => Some(r),
            _ => None,
        }
    }

    pub fn get(&self, name: &str) -> Option<&StackOutput> {
        self.0.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

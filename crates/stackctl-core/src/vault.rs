//! Application secrets stored as a Kubernetes `Secret` named
//! `{env}-{type}` on the environment's cluster.

use crate::cluster::ClusterAccess;
use crate::error::{Result, StackError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;
use serde_json::{Map, Value};
use stackctl_exec::{run_checked, OutputMode};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Literal every new vault is seeded with.
pub const DEFAULT_ENTRY: (&str, &str) = ("PORT", "3000");

pub fn secret_name(scope: &str, stack_type: &str) -> String {
    format!("{scope}-{stack_type}")
}

static KEY_RE: OnceLock<Regex> = OnceLock::new();

fn key_re() -> &'static Regex {
    KEY_RE.get_or_init(|| Regex::new(r"^[-._a-zA-Z0-9]+$").expect("static regex"))
}

pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.len() > 253 || !key_re().is_match(key) {
        return Err(StackError::Usage(format!(
            "invalid secret key '{key}': use letters, digits, '-', '_' or '.'"
        )));
    }
    Ok(())
}

/// Parse a `KEY=VALUE` file. Blank lines and `#` comments are skipped and
/// matching surrounding quotes are removed from values.
pub fn parse_env_file(content: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    for (n, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            return Err(StackError::Usage(format!(
                "line {}: expected KEY=VALUE",
                n + 1
            )));
        };
        let key = key.trim();
        validate_key(key)?;
        let value = value.trim();
        let value = ['"', '\'']
            .iter()
            .find_map(|&q| {
                value
                    .strip_prefix(q)
                    .and_then(|v| v.strip_suffix(q))
            })
            .unwrap_or(value);
        pairs.push((key.to_string(), value.to_string()));
    }
    Ok(pairs)
}

// ---------------------------------------------------------------------------
// Secret document edits
// ---------------------------------------------------------------------------

fn data_mut(doc: &mut Value) -> Result<&mut Map<String, Value>> {
    let obj = doc
        .as_object_mut()
        .ok_or_else(|| StackError::Usage("secret is not a JSON object".into()))?;
    let data = obj
        .entry("data")
        .or_insert_with(|| Value::Object(Map::new()));
    if data.is_null() {
        *data = Value::Object(Map::new());
    }
    data.as_object_mut()
        .ok_or_else(|| StackError::Usage("secret 'data' is not an object".into()))
}

/// Drop fields that make `kubectl apply` reject or fight a fetched object.
fn strip_server_fields(doc: &mut Value) {
    if let Some(meta) = doc.get_mut("metadata").and_then(Value::as_object_mut) {
        meta.remove("annotations");
    }
}

pub fn set_entries(doc: &mut Value, pairs: &[(String, String)]) -> Result<()> {
    let data = data_mut(doc)?;
    for (k, v) in pairs {
        data.insert(k.clone(), Value::String(STANDARD.encode(v)));
    }
    strip_server_fields(doc);
    Ok(())
}

/// Returns `false` if `key` was not present.
pub fn remove_entry(doc: &mut Value, key: &str) -> Result<bool> {
    let removed = data_mut(doc)?.remove(key).is_some();
    strip_server_fields(doc);
    Ok(removed)
}

/// Decoded secret values. Values that are not UTF-8 text are shown as
/// `base64:<encoded>` instead of failing the listing.
pub fn decode_entries(doc: &Value) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    if let Some(data) = doc.get("data").and_then(Value::as_object) {
        for (k, v) in data {
            let encoded = v.as_str().unwrap_or_default();
            let bytes = STANDARD.decode(encoded)?;
            let value = match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => format!("base64:{encoded}"),
            };
            out.insert(k.clone(), value);
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

pub struct Vault {
    access: ClusterAccess,
    name: String,
}

impl Vault {
    pub fn new(access: ClusterAccess, name: impl Into<String>) -> Self {
        Self {
            access,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn init(&self) -> Result<()> {
        let (k, v) = DEFAULT_ENTRY;
        let cmd = self
            .access
            .kubectl()
            .label("vault init")
            .args(["create", "secret", "generic", self.name.as_str()])
            .arg(format!("--from-literal={k}={v}"));
        run_checked(&cmd).await?;
        Ok(())
    }

    async fn fetch(&self) -> Result<Value> {
        let cmd = self
            .access
            .kubectl()
            .label("vault read")
            .args(["get", "secret", self.name.as_str(), "-o", "json"])
            .output(OutputMode::Capture);
        let result = run_checked(&cmd).await?;
        Ok(serde_json::from_str(&result.stdout)?)
    }

    async fn apply(&self, doc: &Value) -> Result<()> {
        let cmd = self
            .access
            .kubectl()
            .label("vault write")
            .args(["apply", "-f", "-"])
            .stdin(serde_json::to_string(doc)?)
            .output(OutputMode::Capture);
        run_checked(&cmd).await?;
        Ok(())
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        self.set_many(&[(key.to_string(), value.to_string())]).await
    }

    pub async fn set_many(&self, pairs: &[(String, String)]) -> Result<()> {
        if pairs.is_empty() {
            return Ok(());
        }
        let mut doc = self.fetch().await?;
        set_entries(&mut doc, pairs)?;
        self.apply(&doc).await
    }

    pub async fn list(&self) -> Result<BTreeMap<String, String>> {
        decode_entries(&self.fetch().await?)
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        let mut doc = self.fetch().await?;
        if !remove_entry(&mut doc, key)? {
            return Err(StackError::SecretKeyNotFound {
                secret: self.name.clone(),
                key: key.to_string(),
            });
        }
        self.apply(&doc).await
    }

    pub async fn destroy(&self) -> Result<()> {
        let cmd = self
            .access
            .kubectl()
            .label("vault destroy")
            .args(["delete", "secret", self.name.as_str()]);
        run_checked(&cmd).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

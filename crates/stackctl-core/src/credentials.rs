//! Terraform CLI credentials file (`credentials.tfrc.json`).

use crate::error::{Result, StackError};
use crate::io;
use serde_json::{json, Value};
use std::path::Path;

pub const TOKEN_PLACEHOLDER: &str = "{{token}}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsUpdate {
    /// The `{{token}}` placeholder was substituted.
    Substituted,
    /// A token entry for the host was added or replaced.
    Written,
    /// The file already carried this token.
    Unchanged,
}

/// Make sure the Terraform CLI can authenticate against `host`.
///
/// A template containing `{{token}}` has the placeholder replaced in place;
/// otherwise the `credentials.<host>.token` entry is set, creating the file
/// if needed.
pub fn ensure_credentials(path: &Path, host: &str, token: &str) -> Result<CredentialsUpdate> {
    if token.trim().is_empty() {
        return Err(StackError::Unauthenticated("TFC_TOKEN"));
    }
    let existing = io::read_optional(path)?;

    if let Some(content) = &existing {
        if content.contains(TOKEN_PLACEHOLDER) {
            let updated = content.replace(TOKEN_PLACEHOLDER, token);
            io::atomic_write_private(path, updated.as_bytes())?;
            return Ok(CredentialsUpdate::Substituted);
        }
    }

    let mut doc: Value = match existing.as_deref().map(str::trim) {
        Some(c) if !c.is_empty() => serde_json::from_str(c)?,
        _ => json!({ "credentials": {} }),
    };
    if doc.pointer(&format!("/credentials/{host}/token")).and_then(Value::as_str) == Some(token)
    {
        return Ok(CredentialsUpdate::Unchanged);
    }

    let Some(root) = doc.as_object_mut() else {
        return Err(StackError::Config {
            var: path.display().to_string(),
            message: "expected a JSON object".into(),
        });
    };
    let credentials = root
        .entry("credentials")
        .or_insert_with(|| json!({}));
    let Some(credentials) = credentials.as_object_mut() else {
        return Err(StackError::Config {
            var: path.display().to_string(),
            message: "'credentials' must be an object".into(),
        });
    };
    credentials.insert(host.to_string(), json!({ "token": token }));

    io::atomic_write_private(path, serde_json::to_string_pretty(&doc)?.as_bytes())?;
    Ok(CredentialsUpdate::Written)
}

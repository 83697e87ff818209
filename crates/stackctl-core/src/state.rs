//! Persisted stack state.
//!
//! Merged workspace outputs live in the team config store under
//! `{ENV}_{TYPE}_STATE`; the matching kubeconfig lives in the secret store
//! under `{ENV}_{TYPE}_KUBE_CONFIG`.

use crate::config::Settings;
use crate::error::{Result, StackError};
use crate::outputs::WorkspaceOutputs;
use crate::store::TeamStore;

fn derive_key(scope: &str, stack_type: &str, suffix: &str) -> String {
    format!("{scope}_{stack_type}_{suffix}")
        .to_uppercase()
        .replace('-', "_")
}

/// `derive_state_key("stg", "do-k8s-cdktf") == "STG_DO_K8S_CDKTF_STATE"`.
pub fn derive_state_key(scope: &str, stack_type: &str) -> String {
    derive_key(scope, stack_type, "STATE")
}

pub fn derive_kube_config_key(scope: &str, stack_type: &str) -> String {
    derive_key(scope, stack_type, "KUBE_CONFIG")
}

/// Read the persisted outputs for `scope`.
///
/// The team store is consulted first; a variable of the same name in the
/// settings is accepted as a fallback so CI can inject state directly.
pub fn load_state(
    settings: &Settings,
    store: &dyn TeamStore,
    scope: &str,
    stack_type: &str,
) -> Result<Option<WorkspaceOutputs>> {
    let key = derive_state_key(scope, stack_type);
    let raw = match store.get_config(&key)? {
        Some(v) => Some(v),
        None => settings.get(&key).map(str::to_string),
    };
    match raw {
        Some(json) if !json.trim().is_empty() => parse_state(&key, &json).map(Some),
        _ => Ok(None),
    }
}

/// Like [`load_state`] but absence is an error.
pub fn require_state(
    settings: &Settings,
    store: &dyn TeamStore,
    scope: &str,
    stack_type: &str,
) -> Result<WorkspaceOutputs> {
    load_state(settings, store, scope, stack_type)?
        .ok_or_else(|| StackError::StateUnavailable(derive_state_key(scope, stack_type)))
}

pub fn parse_state(key: &str, json: &str) -> Result<WorkspaceOutputs> {
    WorkspaceOutputs::from_json(json).map_err(|(output, e)| StackError::Decode {
        key: format!("{key}.{output}"),
        message: e.to_string(),
    })
}

pub fn save_state(store: &dyn TeamStore, key: &str, outputs: &WorkspaceOutputs) -> Result<()> {
    let json = serde_json::to_string(outputs)?;
    store.set_config(key, &json)
}

//! State Sync: merge every stack's outputs and persist them for later runs.

use crate::cluster::ClusterAccess;
use crate::error::Result;
use crate::outputs::WorkspaceOutputs;
use crate::state::{derive_kube_config_key, derive_state_key, save_state};
use crate::store::TeamStore;
use crate::tfc::TfcClient;
use crate::types::Scope;
use futures::future::join_all;
use serde::Serialize;

/// What to sync: the stacks of one plan.
#[derive(Debug, Clone, Copy)]
pub struct SyncRequest<'a> {
    pub org: &'a str,
    pub scope: Scope,
    pub stack_type: &'a str,
    pub stacks: &'a [String],
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub state_key: String,
    /// Stacks whose outputs were merged, in plan order.
    pub fetched: Vec<String>,
    /// Stacks with no state yet.
    pub missing: Vec<String>,
    pub outputs: WorkspaceOutputs,
    /// Whether the one-time kubeconfig and registry bootstrap ran.
    pub bootstrapped: bool,
}

/// Fetch, merge and persist outputs for `req.stacks`.
///
/// Outputs are fetched concurrently and merged in plan order, so a later
/// stack wins on a key collision. Stacks without state are reported in
/// [`SyncReport::missing`] rather than failing the sync.
///
/// With `access`, a merged `cluster` output and no kubeconfig stored yet
/// under `{ENV}_{TYPE}_KUBE_CONFIG` triggers the kubeconfig fetch and
/// registry auth, and the resulting kubeconfig is stored.
pub async fn sync(
    client: &TfcClient,
    store: &dyn TeamStore,
    access: Option<&ClusterAccess>,
    req: SyncRequest<'_>,
) -> Result<SyncReport> {
    let fetches = req
        .stacks
        .iter()
        .map(|stack| client.get_outputs(req.org, stack));
    let results = join_all(fetches).await;

    let mut report = SyncReport {
        state_key: derive_state_key(req.scope.as_str(), req.stack_type),
        ..SyncReport::default()
    };
    for (stack, result) in req.stacks.iter().zip(results) {
        match result {
            Ok(outputs) => {
                report.outputs.merge(outputs);
                report.fetched.push(stack.clone());
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("no state for {stack} yet; skipping");
                report.missing.push(stack.clone());
            }
            Err(e) => return Err(e.into()),
        }
    }

    save_state(store, &report.state_key, &report.outputs)?;
    tracing::info!(
        "saved {} output(s) to {}",
        report.outputs.len(),
        report.state_key
    );

    if let Some(access) = access {
        report.bootstrapped = bootstrap_once(access, store, &req, &report.outputs).await?;
    }
    Ok(report)
}

async fn bootstrap_once(
    access: &ClusterAccess,
    store: &dyn TeamStore,
    req: &SyncRequest<'_>,
    outputs: &WorkspaceOutputs,
) -> Result<bool> {
    let Some(cluster) = outputs.cluster() else {
        return Ok(false);
    };
    let kube_key = derive_kube_config_key(req.scope.as_str(), req.stack_type);
    if store.get_secret(&kube_key)?.is_some() {
        tracing::debug!("{kube_key} already stored; skipping bootstrap");
        return Ok(false);
    }

    access.connect(&cluster.name).await?;
    access.registry_auth().await?;
    match access.read_kubeconfig()? {
        Some(kubeconfig) => {
            store.set_secret(&kube_key, &kubeconfig)?;
            tracing::info!("stored kubeconfig as {kube_key}");
        }
        None => tracing::warn!(
            "kubeconfig not found at {}; {kube_key} not stored",
            access.kubeconfig_path().display()
        ),
    }
    Ok(true)
}

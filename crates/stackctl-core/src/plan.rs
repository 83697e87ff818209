//! Stack name planning.
//!
//! Stack names double as Terraform Cloud workspace names, so they must be
//! stable across runs for the same identity and scope.

use crate::error::{Result, StackError};
use crate::types::{Env, Scope, StackIdentity, Variant};
use serde::Serialize;

pub fn registry_stack(key: &str) -> String {
    format!("registry-{key}")
}

pub fn cluster_stack(env: Env, key: &str) -> String {
    format!("{env}-{key}")
}

pub fn service_stack(env: Env, repo: &str, key: &str) -> String {
    format!("{env}-{repo}-{key}")
}

/// Ordered stack names for one scope, in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackPlan {
    pub scope: Scope,
    pub variant: Variant,
    pub stacks: Vec<String>,
}

impl StackPlan {
    /// Teardown order: the exact reverse of creation order.
    pub fn destroy_order(&self) -> Vec<String> {
        self.stacks.iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }
}

/// Compute the stacks `scope` covers.
///
/// Scope `all` always plans the registry followed by every environment's
/// cluster stack, whatever the variant. Teardown uses [`destroy_plan`].
pub fn plan(identity: &StackIdentity, scope: Scope, variant: Variant) -> Result<StackPlan> {
    let key = identity.key();
    let stacks = match (scope, variant) {
        (Scope::All, _) => std::iter::once(registry_stack(key))
            .chain(Env::all().iter().map(|&env| cluster_stack(env, key)))
            .collect(),
        (Scope::Env(env), Variant::Cluster) => vec![registry_stack(key), cluster_stack(env, key)],
        (Scope::Env(env), Variant::Service) => vec![service_stack(env, identity.repo(), key)],
    };
    if stacks.is_empty() {
        return Err(StackError::Usage(format!(
            "scope '{scope}' selects no stacks"
        )));
    }
    Ok(StackPlan {
        scope,
        variant,
        stacks,
    })
}

/// Stacks removed by a teardown. Same as [`plan`] except that a service
/// teardown across `all` covers only the service stack of each environment
/// and leaves clusters and the registry alone.
pub fn destroy_plan(identity: &StackIdentity, scope: Scope, variant: Variant) -> Result<StackPlan> {
    match (scope, variant) {
        (Scope::All, Variant::Service) => Ok(StackPlan {
            scope,
            variant,
            stacks: Env::all()
                .iter()
                .map(|&env| service_stack(env, identity.repo(), identity.key()))
                .collect(),
        }),
        _ => plan(identity, scope, variant),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

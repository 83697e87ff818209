use super::{Context, Flags};
use crate::output::{print_json, print_table};
use anyhow::Context as _;
use stackctl_core::outputs::StackOutput;
use stackctl_core::state::{derive_kube_config_key, derive_state_key, load_state};

pub fn run(flags: Flags) -> anyhow::Result<()> {
    let ctx = Context::load(flags, false)?;
    let scope = ctx.scope.as_str();
    let key = derive_state_key(scope, ctx.identity.key());
    let kube_key = derive_kube_config_key(scope, ctx.identity.key());
    let outputs = load_state(&ctx.settings, &ctx.store, scope, ctx.identity.key())
        .with_context(|| format!("failed to read {key}"))?;
    let updated_at = ctx
        .store
        .config_entries()?
        .into_iter()
        .find(|(k, _)| *k == key)
        .map(|(_, entry)| entry.updated_at);
    let kubeconfig_stored = ctx.store.secret_keys()?.contains(&kube_key);

    if ctx.json {
        return print_json(&serde_json::json!({
            "team": ctx.store.team(),
            "key": key,
            "updated_at": updated_at,
            "kubeconfig_stored": kubeconfig_stored,
            "outputs": outputs,
        }));
    }

    let Some(outputs) = outputs else {
        println!("No state saved under {key}. Run `stackctl setup --env {scope}` first.");
        return Ok(());
    };

    match updated_at {
        Some(at) => println!("{key} (team {}, updated {})", ctx.store.team(), at.to_rfc3339()),
        None => println!("{key} (from environment)"),
    }
    println!(
        "kubeconfig: {}\n",
        if kubeconfig_stored { "stored" } else { "not stored" }
    );
    let rows = outputs
        .0
        .iter()
        .map(|(name, output)| {
            let (kind, summary) = match output {
                StackOutput::Cluster(c) => ("cluster", c.name.clone()),
                StackOutput::Registry(r) => ("registry", r.name.clone()),
                StackOutput::Database(d) => ("database", d.host.clone()),
                StackOutput::Other(v) => ("value", v.to_string()),
            };
            vec![name.clone(), kind.to_string(), summary]
        })
        .collect();
    print_table(&["OUTPUT", "KIND", "VALUE"], rows);
    Ok(())
}

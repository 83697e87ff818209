use super::{Context, Flags};
use crate::output::{print_batch, print_json, print_warnings};
use crate::prompt;
use stackctl_core::istio::{self, IstioAction};

pub async fn run(flags: Flags, action: &str) -> anyhow::Result<()> {
    let action: IstioAction = action.parse()?;
    let ctx = Context::load(flags, false)?;
    let env = ctx.env()?;
    if action == IstioAction::Uninstall {
        prompt::confirm(&format!("Remove Istio from the {env} cluster?"), ctx.yes)?;
    }

    let access = ctx.connect().await?;
    let batch = istio::run(action, &ctx.settings.tools(), &access).await?;
    if ctx.json {
        return print_json(&batch);
    }
    print_batch(&batch);
    let warnings: Vec<String> = batch
        .warnings()
        .map(|r| format!("{}: {}", r.name, r.failure_reason()))
        .collect();
    print_warnings(&warnings, None);
    Ok(())
}

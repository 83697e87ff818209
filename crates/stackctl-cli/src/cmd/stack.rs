use super::{Context, Flags};
use crate::output::{print_batch, print_json, print_warnings};
use crate::prompt;
use stackctl_core::orchestrator::{Orchestrator, RunOptions, RunReport};
use stackctl_core::types::Variant;
use stackctl_core::StackError;

const REQUIRED_TOOLS: &[&str] = &["cdktf", "doctl", "kubectl"];

fn options(ctx: &Context, synth: bool) -> anyhow::Result<RunOptions> {
    Ok(RunOptions {
        synth,
        parallelism: ctx.settings.parallelism()?,
    })
}

fn preflight(ctx: &Context) {
    let tools = ctx.settings.tools();
    let missing = tools.missing(REQUIRED_TOOLS);
    if !missing.is_empty() {
        tracing::warn!("not found on PATH: {}", missing.join(", "));
    }
}

fn first_run_hint(ctx: &Context) -> String {
    format!(
        "on a first run, check that TFC_TOKEN can create workspaces in organization '{}'",
        ctx.identity.org()
    )
}

fn report(ctx: &Context, report: &RunReport) -> anyhow::Result<()> {
    if ctx.json {
        return print_json(report);
    }
    print_batch(&report.batch);
    if let Some(sync) = &report.sync {
        println!(
            "\nSaved {} output(s) to {}",
            sync.outputs.len(),
            sync.state_key
        );
    }
    let hint = (!report.workspaces.errors.is_empty()).then(|| first_run_hint(ctx));
    print_warnings(&report.warnings(), hint.as_deref());
    Ok(())
}

/// Report the outcome of a run. Workspace errors are still shown when the
/// batch failed, since they often explain the failure.
fn finish(ctx: &Context, outcome: Result<RunReport, StackError>) -> anyhow::Result<()> {
    match outcome {
        Ok(result) => report(ctx, &result),
        Err(err) => {
            if let StackError::BatchFailed {
                workspace_errors, ..
            } = &err
            {
                let lines: Vec<String> = workspace_errors
                    .iter()
                    .map(|(ws, e)| format!("workspace {ws}: {e}"))
                    .collect();
                let hint = (!lines.is_empty()).then(|| first_run_hint(ctx));
                print_warnings(&lines, hint.as_deref());
            }
            Err(err.into())
        }
    }
}

pub async fn setup(flags: Flags, synth: bool) -> anyhow::Result<()> {
    let ctx = Context::load(flags, false)?;
    preflight(&ctx);
    let orchestrator = Orchestrator::new(&ctx.settings, &ctx.store, ctx.identity.clone(), ctx.scope)?;
    let outcome = orchestrator.setup(options(&ctx, synth)?).await;
    finish(&ctx, outcome)
}

pub async fn deploy(flags: Flags, synth: bool) -> anyhow::Result<()> {
    let ctx = Context::load(flags, true)?;
    preflight(&ctx);
    let orchestrator = Orchestrator::new(&ctx.settings, &ctx.store, ctx.identity.clone(), ctx.scope)?;
    let outcome = orchestrator.deploy(options(&ctx, synth)?).await;
    finish(&ctx, outcome)
}

pub async fn destroy(flags: Flags, operation: &str) -> anyhow::Result<()> {
    let variant: Variant = operation.parse()?;
    let ctx = Context::load(flags, variant == Variant::Service)?;
    let orchestrator = Orchestrator::new(&ctx.settings, &ctx.store, ctx.identity.clone(), ctx.scope)?;
    let plan = orchestrator.destroy_plan(variant)?;
    prompt::confirm(
        &format!("Destroy {} ({})?", plan.destroy_order().join(", "), ctx.scope),
        ctx.yes,
    )?;
    preflight(&ctx);
    let outcome = orchestrator.destroy(variant, options(&ctx, false)?).await;
    finish(&ctx, outcome)
}

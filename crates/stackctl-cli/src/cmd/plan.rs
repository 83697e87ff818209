use super::{Context, Flags};
use crate::output::{print_json, print_table};
use stackctl_core::plan::plan;
use stackctl_core::types::Variant;

pub fn run(flags: Flags, operation: &str) -> anyhow::Result<()> {
    let variant: Variant = operation.parse()?;
    let ctx = Context::load(flags, false)?;
    let plan = plan(&ctx.identity, ctx.scope, variant)?;

    if ctx.json {
        return print_json(&plan);
    }
    let rows = plan
        .stacks
        .iter()
        .enumerate()
        .map(|(i, stack)| vec![(i + 1).to_string(), stack.clone()])
        .collect();
    print_table(&["#", "STACK"], rows);
    Ok(())
}

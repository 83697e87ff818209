use anyhow::bail;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use stackctl_core::types::{Env, Scope};
use std::io::IsTerminal;

/// Prompts only run when a person is at the keyboard.
pub fn interactive() -> bool {
    std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
}

/// Scope from `--env`, else a picker, else `dev`.
pub fn scope(explicit: Option<&str>) -> anyhow::Result<Scope> {
    if let Some(value) = explicit {
        return Ok(value.parse()?);
    }
    if !interactive() {
        return Ok(Scope::Env(Env::Dev));
    }
    let choices = Scope::choices();
    let picked = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Environment")
        .items(choices)
        .default(0)
        .interact()?;
    Ok(choices[picked].parse()?)
}

/// One of `choices`, asked only when not given on the command line.
/// Falls back to `default` without a terminal or without choices.
pub fn select(
    label: &str,
    explicit: Option<String>,
    choices: &[&str],
    default: &str,
) -> anyhow::Result<String> {
    if let Some(value) = explicit {
        return Ok(value);
    }
    if !interactive() || choices.is_empty() {
        return Ok(default.to_string());
    }
    let picked = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(label)
        .items(choices)
        .default(choices.iter().position(|c| *c == default).unwrap_or(0))
        .interact()?;
    Ok(choices[picked].to_string())
}

/// Free-text answer with a default, asked only when not given on the
/// command line.
pub fn text(label: &str, explicit: Option<String>, default: &str) -> anyhow::Result<String> {
    if let Some(value) = explicit {
        return Ok(value);
    }
    if !interactive() {
        return Ok(default.to_string());
    }
    let value = Input::<String>::with_theme(&ColorfulTheme::default())
        .with_prompt(label)
        .default(default.to_string())
        .interact_text()?;
    Ok(value)
}

/// Gate a destructive step behind `--yes` or an explicit confirmation.
pub fn confirm(question: &str, yes: bool) -> anyhow::Result<()> {
    if yes {
        return Ok(());
    }
    if !interactive() {
        bail!("{question} refused: pass --yes to confirm in a non-interactive session");
    }
    let ok = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(question)
        .default(false)
        .interact()?;
    if !ok {
        bail!("aborted");
    }
    Ok(())
}

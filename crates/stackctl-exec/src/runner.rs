use std::sync::Arc;

use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use tokio::sync::Semaphore;

use crate::command::ExternalCommand;
use crate::process;
use crate::types::{BatchResult, CommandResult};
use crate::{ExecError, Result};

// ─── Public API ───────────────────────────────────────────────────────────

/// Execute a batch of external commands.
///
/// With `parallelism == 1` commands run strictly in submission order and
/// each one finishes before the next starts. With a larger value a command
/// starts as soon as its declared dependencies have finished, with at most
/// `parallelism` children alive at once.
///
/// A command whose dependency did not succeed is recorded as skipped.
/// Failures of independent commands never stop the rest of the batch; the
/// caller inspects [`BatchResult::all_succeeded`] afterwards.
///
/// Returns `Err` only for a malformed batch (zero parallelism or a
/// dependency that does not point at an earlier command).
pub async fn run(commands: Vec<ExternalCommand>, parallelism: usize) -> Result<BatchResult> {
    validate(&commands, parallelism)?;
    let results = if parallelism == 1 {
        run_serial(commands).await
    } else {
        run_bounded(commands, parallelism).await
    };
    Ok(BatchResult { results })
}

/// Run a single command with progress logging.
pub async fn run_one(cmd: &ExternalCommand) -> CommandResult {
    announce(cmd);
    let result = process::execute(cmd).await;
    report(&result);
    result
}

/// Run a single command and turn anything but success into an error.
pub async fn run_checked(cmd: &ExternalCommand) -> Result<CommandResult> {
    let result = run_one(cmd).await;
    result.check()?;
    Ok(result)
}

// ─── Internal ─────────────────────────────────────────────────────────────

fn validate(commands: &[ExternalCommand], parallelism: usize) -> Result<()> {
    if parallelism == 0 {
        return Err(ExecError::InvalidBatch(
            "parallelism must be at least 1".into(),
        ));
    }
    for (i, cmd) in commands.iter().enumerate() {
        if let Some(dep) = cmd.dependencies().iter().find(|&&d| d >= i) {
            return Err(ExecError::InvalidBatch(format!(
                "command {i} ('{cmd}') depends on command {dep}, which does not run before it"
            )));
        }
    }
    Ok(())
}

async fn run_serial(commands: Vec<ExternalCommand>) -> Vec<CommandResult> {
    let mut results: Vec<CommandResult> = Vec::with_capacity(commands.len());
    for cmd in &commands {
        let blocker = cmd
            .dependencies()
            .iter()
            .filter_map(|&d| results.get(d))
            .find(|r| !r.succeeded());
        let result = match blocker {
            Some(dep) => skip(cmd, dep),
            None => run_one(cmd).await,
        };
        results.push(result);
    }
    results
}

async fn run_bounded(commands: Vec<ExternalCommand>, parallelism: usize) -> Vec<CommandResult> {
    let semaphore = Arc::new(Semaphore::new(parallelism));
    let mut slots: Vec<Shared<BoxFuture<'static, CommandResult>>> =
        Vec::with_capacity(commands.len());

    for cmd in commands {
        let deps: Vec<_> = cmd
            .dependencies()
            .iter()
            .filter_map(|&d| slots.get(d).cloned())
            .collect();
        let sem = Arc::clone(&semaphore);
        let task = async move {
            let dep_results = join_all(deps).await;
            if let Some(dep) = dep_results.iter().find(|r| !r.succeeded()) {
                return skip(&cmd, dep);
            }
            let _permit = match sem.acquire_owned().await {
                Ok(p) => p,
                Err(_) => {
                    return CommandResult::skipped(
                        cmd.name(),
                        cmd.to_string(),
                        cmd.is_best_effort(),
                        "batch scheduler closed".into(),
                    )
                }
            };
            run_one(&cmd).await
        };
        slots.push(task.boxed().shared());
    }

    join_all(slots).await
}

fn skip(cmd: &ExternalCommand, dep: &CommandResult) -> CommandResult {
    let reason = format!("dependency '{}' did not succeed", dep.name);
    tracing::warn!("skipping: {cmd} ({reason})");
    CommandResult::skipped(cmd.name(), cmd.to_string(), cmd.is_best_effort(), reason)
}

fn announce(cmd: &ExternalCommand) {
    tracing::info!("running: {cmd}");
}

fn report(result: &CommandResult) {
    if result.succeeded() {
        tracing::info!("finished: {} ({} ms)", result.command, result.duration_ms);
    } else if result.best_effort {
        tracing::warn!(
            "failed (ignored): {} ({})",
            result.command,
            result.failure_reason()
        );
    } else {
        tracing::error!("failed: {} ({})", result.command, result.failure_reason());
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

use serde::Serialize;

use crate::ExecError;

// ─── CommandStatus ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Succeeded,
    Failed,
    /// Not started because a dependency did not succeed.
    Skipped,
}

// ─── CommandResult ────────────────────────────────────────────────────────

/// Outcome of one command in a batch.
///
/// `stdout`/`stderr` are only populated for `Tee` and `Capture` output
/// modes; `Inherit` leaves them empty.
#[derive(Debug, Clone, Serialize)]
pub struct CommandResult {
    pub name: String,
    /// Rendered command line with secret arguments redacted.
    pub command: String,
    pub exit_code: Option<i32>,
    pub status: CommandStatus,
    pub best_effort: bool,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    /// Spawn / wait error or skip reason, when there is no exit code to show.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResult {
    pub fn succeeded(&self) -> bool {
        self.status == CommandStatus::Succeeded
    }

    pub(crate) fn skipped(name: String, command: String, best_effort: bool, reason: String) -> Self {
        Self {
            name,
            command,
            exit_code: None,
            status: CommandStatus::Skipped,
            best_effort,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
            error: Some(reason),
        }
    }

    /// Convert a non-successful result into the matching error.
    pub fn check(&self) -> Result<(), ExecError> {
        match (self.status, self.exit_code) {
            (CommandStatus::Succeeded, _) => Ok(()),
            (CommandStatus::Skipped, _) => Err(ExecError::Skipped {
                command: self.command.clone(),
                reason: self.error.clone().unwrap_or_default(),
            }),
            (CommandStatus::Failed, Some(code)) => Err(ExecError::NonZeroExit {
                command: self.command.clone(),
                code,
            }),
            (CommandStatus::Failed, None) => match &self.error {
                Some(reason) => Err(ExecError::Failed {
                    command: self.command.clone(),
                    reason: reason.clone(),
                }),
                None => Err(ExecError::Signalled {
                    command: self.command.clone(),
                }),
            },
        }
    }

    /// One-line description of why the command did not succeed.
    pub fn failure_reason(&self) -> String {
        match (self.status, self.exit_code, &self.error) {
            (CommandStatus::Succeeded, _, _) => "succeeded".to_string(),
            (CommandStatus::Skipped, _, Some(reason)) => format!("skipped: {reason}"),
            (CommandStatus::Skipped, _, None) => "skipped".to_string(),
            (CommandStatus::Failed, Some(code), _) => format!("exited with code {code}"),
            (CommandStatus::Failed, None, Some(err)) => err.clone(),
            (CommandStatus::Failed, None, None) => "terminated by signal".to_string(),
        }
    }
}

// ─── BatchResult ──────────────────────────────────────────────────────────

/// Per-command results in submission order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    pub results: Vec<CommandResult>,
}

impl BatchResult {
    /// `true` when every command not marked best-effort succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.results
            .iter()
            .filter(|r| !r.best_effort)
            .all(CommandResult::succeeded)
    }

    /// Commands that failed or were skipped and count against the batch.
    pub fn failures(&self) -> impl Iterator<Item = &CommandResult> {
        self.results
            .iter()
            .filter(|r| !r.best_effort && !r.succeeded())
    }

    /// Best-effort commands that did not succeed.
    pub fn warnings(&self) -> impl Iterator<Item = &CommandResult> {
        self.results
            .iter()
            .filter(|r| r.best_effort && !r.succeeded())
    }

    pub fn get(&self, index: usize) -> Option<&CommandResult> {
        self.results.get(index)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

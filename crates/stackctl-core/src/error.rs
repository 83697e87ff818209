use thiserror::Error;

use crate::tfc::TfcError;

#[derive(Debug, Error)]
pub enum StackError {
    #[error("invalid configuration in {var}: {message}")]
    Config { var: String, message: String },

    #[error("usage: {0}")]
    Usage(String),

    #[error("invalid {field} '{value}': {reason}")]
    InvalidName {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("{0} is not set: export it or add it to the stackctl config file")]
    Unauthenticated(&'static str),

    #[error("no state stored under {0}: run 'stackctl setup' for this environment first")]
    StateUnavailable(String),

    #[error("invalid output '{key}': {message}")]
    Decode { key: String, message: String },

    /// `workspace_errors` carries `(workspace, error)` pairs from the
    /// workspace creation that preceded the batch, if any.
    #[error("{count} command(s) failed: {summary}")]
    BatchFailed {
        count: usize,
        summary: String,
        workspace_errors: Vec<(String, String)>,
    },

    #[error("secret {secret} has no key '{key}'")]
    SecretKeyNotFound { secret: String, key: String },

    #[error("home directory not found: set HOME or STACKCTL_HOME")]
    HomeNotFound,

    #[error(transparent)]
    Exec(#[from] stackctl_exec::ExecError),

    #[error(transparent)]
    Tfc(#[from] TfcError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("invalid base64 value: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl StackError {
    /// Summarize the failed entries of a batch into one error.
    pub fn from_batch(batch: &stackctl_exec::BatchResult) -> Self {
        let failures: Vec<String> = batch
            .failures()
            .map(|r| format!("{} ({})", r.name, r.failure_reason()))
            .collect();
        StackError::BatchFailed {
            count: failures.len(),
            summary: failures.join(", "),
            workspace_errors: Vec::new(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StackError>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("'{command}' exited with code {code}")]
    NonZeroExit { command: String, code: i32 },

    #[error("'{command}' terminated by signal")]
    Signalled { command: String },

    #[error("'{command}' was skipped: {reason}")]
    Skipped { command: String, reason: String },

    #[error("'{command}' failed: {reason}")]
    Failed { command: String, reason: String },

    #[error("invalid batch: {0}")]
    InvalidBatch(String),
}

//! `stackctl-exec`: bounded batch execution of external commands.
//!
//! Every provisioning step the CLI performs (`cdktf`, `doctl`, `kubectl`,
//! `istioctl`) goes through this crate so that sequencing, failure
//! handling, and output capture behave the same everywhere.
//!
//! # Architecture
//!
//! ```text
//! ExternalCommand   ← program + args + env + stdin + output mode + deps
//!     │
//!     ▼
//! runner::run       ← serial when parallelism == 1, semaphore-bounded
//!     │                otherwise; dependents of a failure are skipped
//!     ▼
//! process::execute  ← one tokio child; Inherit / Tee / Capture
//!     │
//!     ▼
//! BatchResult       ← per-command results in submission order
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use stackctl_exec::{chain, run, ExternalCommand};
//!
//! let steps = chain(vec![
//!     ExternalCommand::new("cdktf").args(["synth"]),
//!     ExternalCommand::new("cdktf").args(["deploy", "registry-cluster"]),
//! ]);
//! let batch = run(steps, 1).await?;
//! assert!(batch.all_succeeded());
//! ```

pub mod command;
pub mod error;
pub mod runner;
pub mod types;

pub(crate) mod process;


pub use command::{chain, ExternalCommand, OutputMode};
pub use error::ExecError;
pub use runner::{run, run_checked, run_one};
pub use types::{BatchResult, CommandResult, CommandStatus};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, ExecError>;

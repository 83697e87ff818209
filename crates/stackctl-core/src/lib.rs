//! Core of `stackctl`: turns environment configuration into an ordered set
//! of CDKTF stacks, drives `cdktf`/`doctl`/`kubectl`/`istioctl` through
//! [`stackctl_exec`], and keeps Terraform Cloud outputs synced into a
//! per-team store.

pub mod cluster;
pub mod config;
pub mod credentials;
pub mod error;
pub mod io;
pub mod istio;
pub mod orchestrator;
pub mod outputs;
pub mod paths;
pub mod plan;
pub mod resolver;
pub mod state;
pub mod store;
pub mod sync;
pub mod tfc;
pub mod types;
pub mod vault;

pub use error::{Result, StackError};

use crate::error::{Result, StackError};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Env
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Env {
    Dev,
    Stg,
    Prd,
}

impl Env {
    /// Creation order of the per-environment stacks.
    pub fn all() -> &'static [Env] {
        &[Env::Dev, Env::Stg, Env::Prd]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Env::Dev => "dev",
            Env::Stg => "stg",
            Env::Prd => "prd",
        }
    }
}

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Env {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "dev" => Ok(Env::Dev),
            "stg" => Ok(Env::Stg),
            "prd" => Ok(Env::Prd),
            other => Err(StackError::Usage(format!(
                "unknown environment '{other}': expected one of dev, stg, prd"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Which environments a command operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Env(Env),
    All,
}

impl Scope {
    pub fn choices() -> &'static [&'static str] {
        &["dev", "stg", "prd", "all"]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Env(env) => env.as_str(),
            Scope::All => "all",
        }
    }

    pub fn env(self) -> Option<Env> {
        match self {
            Scope::Env(env) => Some(env),
            Scope::All => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scope {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "all" => Ok(Scope::All),
            other => other.parse::<Env>().map(Scope::Env).map_err(|_| {
                StackError::Usage(format!(
                    "unknown scope '{other}': expected one of dev, stg, prd, all"
                ))
            }),
        }
    }
}

impl Serialize for Scope {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Variant
// ---------------------------------------------------------------------------

/// Family of stacks a single-environment scope selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Registry plus the environment's cluster stack.
    Cluster,
    /// The application service stack deployed onto an existing cluster.
    Service,
}

impl Variant {
    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Cluster => "cluster",
            Variant::Service => "service",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Variant {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "cluster" => Ok(Variant::Cluster),
            "service" => Ok(Variant::Service),
            other => Err(StackError::Usage(format!(
                "unknown operation '{other}': expected cluster or service"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// StackIdentity
// ---------------------------------------------------------------------------

/// The tuple every stack, workspace and resource name is derived from.
///
/// All components are validated on construction, so names built from an
/// identity never contain whitespace and `env` never contains the `-`
/// separator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackIdentity {
    org: String,
    env: Env,
    key: String,
    repo: String,
    tag: String,
    entropy: String,
}

impl StackIdentity {
    pub fn new(
        org: impl Into<String>,
        env: Env,
        key: impl Into<String>,
        repo: impl Into<String>,
        tag: impl Into<String>,
        entropy: impl Into<String>,
    ) -> Result<Self> {
        let identity = Self {
            org: org.into(),
            env,
            key: key.into(),
            repo: repo.into(),
            tag: tag.into(),
            entropy: entropy.into(),
        };
        paths::validate_slug("org", &identity.org)?;
        paths::validate_slug("stack type", &identity.key)?;
        paths::validate_slug("repo", &identity.repo)?;
        paths::validate_tag(&identity.tag)?;
        paths::validate_entropy(&identity.entropy)?;
        Ok(identity)
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn env(&self) -> Env {
        self.env
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn entropy(&self) -> &str {
        &self.entropy
    }

    /// Same identity targeting a different environment.
    pub fn with_env(&self, env: Env) -> Self {
        Self {
            env,
            ..self.clone()
        }
    }

    /// Cloud resource name: `{org}-{env}-{key}-{component}-{entropy}`.
    pub fn resource_name(&self, component: &str) -> String {
        format!(
            "{}-{}-{}-{}-{}",
            self.org, self.env, self.key, component, self.entropy
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

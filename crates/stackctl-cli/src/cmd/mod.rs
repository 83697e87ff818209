pub mod istio;
pub mod plan;
pub mod stack;
pub mod state;
pub mod vault;

use crate::prompt;
use anyhow::Context as _;
use stackctl_core::cluster::ClusterAccess;
use stackctl_core::config::{Settings, DEFAULT_REPO, DEFAULT_TAG};
use stackctl_core::orchestrator::resolve_identity;
use stackctl_core::resolver::EnvironmentConfig;
use stackctl_core::state::{derive_state_key, require_state};
use stackctl_core::store::FileStore;
use stackctl_core::types::{Env, Scope, StackIdentity};
use stackctl_core::StackError;

/// Global flags shared by every subcommand.
pub struct Flags {
    pub env: Option<String>,
    pub repo: Option<String>,
    pub tag: Option<String>,
    pub yes: bool,
    pub json: bool,
}

/// Everything a subcommand needs, resolved once.
pub struct Context {
    pub settings: Settings,
    pub store: FileStore,
    pub scope: Scope,
    pub identity: StackIdentity,
    pub yes: bool,
    pub json: bool,
}

impl Context {
    /// Resolve settings and the scope. Repository and tag are only asked
    /// for when `service` is set; the repository must then be one of the
    /// services configured for the scope. Otherwise configured values or
    /// defaults are used.
    pub fn load(flags: Flags, service: bool) -> anyhow::Result<Self> {
        let settings = Settings::from_env().context("failed to load settings")?;
        let scope = prompt::scope(flags.env.as_deref())?;
        let (repo, tag) = if service {
            let config = EnvironmentConfig::resolve(&settings, scope)?;
            let names = config.service_names();
            let fallback = settings
                .repo()
                .or_else(|| names.iter().copied().find(|n| *n == DEFAULT_REPO))
                .or_else(|| names.first().copied())
                .unwrap_or(DEFAULT_REPO);
            let repo = prompt::select("Repository", flags.repo, &names, fallback)?;
            config.require_service(scope, &repo)?;
            let tag = prompt::text("Tag", flags.tag, settings.tag().unwrap_or(DEFAULT_TAG))?;
            (Some(repo), Some(tag))
        } else {
            (flags.repo, flags.tag)
        };
        let identity = resolve_identity(&settings, scope, repo.as_deref(), tag.as_deref())?;
        let store = FileStore::from_settings(&settings)?;
        Ok(Self {
            settings,
            store,
            scope,
            identity,
            yes: flags.yes,
            json: flags.json,
        })
    }

    /// Single environment required; `all` is rejected.
    pub fn env(&self) -> anyhow::Result<Env> {
        self.scope.env().ok_or_else(|| {
            StackError::Usage(format!(
                "this command needs a single environment, not '{}'",
                self.scope
            ))
            .into()
        })
    }

    /// Connect to the environment's cluster using persisted state. Unlike
    /// deploy runs, missing state is fatal here.
    pub async fn connect(&self) -> anyhow::Result<ClusterAccess> {
        let env = self.env()?;
        let outputs = require_state(&self.settings, &self.store, env.as_str(), self.identity.key())?;
        let access = ClusterAccess::new(&self.settings)?;
        if !access.connect_from(&outputs).await? {
            return Err(StackError::StateUnavailable(format!(
                "{} has no cluster output",
                derive_state_key(env.as_str(), self.identity.key())
            ))
            .into());
        }
        Ok(access)
    }
}

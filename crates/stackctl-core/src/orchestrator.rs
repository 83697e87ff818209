//! One parameterized orchestrator for setup, deploy and destroy.
//!
//! Each run: validate configuration, make sure Terraform can authenticate,
//! connect to the existing cluster if there is one, create workspaces,
//! run `cdktf` per stack through the batch runner and, for cluster runs,
//! sync the resulting outputs into the team store.

use crate::cluster::ClusterAccess;
use crate::config::{Settings, DEFAULT_REPO, DEFAULT_TAG};
use crate::credentials::ensure_credentials;
use crate::error::{Result, StackError};
use crate::plan::{destroy_plan, plan, StackPlan};
use crate::resolver::EnvironmentConfig;
use crate::state::{derive_state_key, load_state};
use crate::store::TeamStore;
use crate::sync::{sync, SyncReport, SyncRequest};
use crate::tfc::{TfcClient, TfcError};
use crate::types::{Env, Scope, StackIdentity, Variant};
use futures::future::join_all;
use serde::Serialize;
use stackctl_exec::{BatchResult, ExternalCommand};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Options / reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Run `cdktf synth` before the first deploy.
    pub synth: bool,
    /// Upper bound on concurrently running `cdktf` processes.
    pub parallelism: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            synth: false,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkspaceReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
    /// `(workspace, error)` for every other failure.
    pub errors: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub plan: StackPlan,
    pub workspaces: WorkspaceReport,
    pub batch: BatchResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncReport>,
}

impl RunReport {
    /// Lines for the consolidated warning block.
    pub fn warnings(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .workspaces
            .errors
            .iter()
            .map(|(ws, e)| format!("workspace {ws}: {e}"))
            .collect();
        lines.extend(
            self.batch
                .warnings()
                .map(|r| format!("{}: {}", r.name, r.failure_reason())),
        );
        if let Some(sync) = &self.sync {
            lines.extend(sync.missing.iter().map(|s| format!("{s}: no outputs yet")));
        }
        lines
    }
}

/// Build the run identity from settings plus operator answers.
///
/// Scope `all` has no single environment; `dev` seeds the identity so
/// derived resource names stay well-formed.
pub fn resolve_identity(
    settings: &Settings,
    scope: Scope,
    repo: Option<&str>,
    tag: Option<&str>,
) -> Result<StackIdentity> {
    StackIdentity::new(
        settings.org()?,
        scope.env().unwrap_or(Env::Dev),
        settings.stack_type(),
        repo.or(settings.repo()).unwrap_or(DEFAULT_REPO),
        tag.or(settings.tag()).unwrap_or(DEFAULT_TAG),
        settings.entropy(),
    )
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator<'a> {
    settings: &'a Settings,
    store: &'a dyn TeamStore,
    identity: StackIdentity,
    scope: Scope,
    client: TfcClient,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        settings: &'a Settings,
        store: &'a dyn TeamStore,
        identity: StackIdentity,
        scope: Scope,
    ) -> Result<Self> {
        Ok(Self {
            settings,
            store,
            identity,
            scope,
            client: TfcClient::from_settings(settings)?,
        })
    }

    pub fn identity(&self) -> &StackIdentity {
        &self.identity
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn plan(&self, variant: Variant) -> Result<StackPlan> {
        plan(&self.identity, self.scope, variant)
    }

    pub fn destroy_plan(&self, variant: Variant) -> Result<StackPlan> {
        destroy_plan(&self.identity, self.scope, variant)
    }

    pub fn state_key(&self) -> String {
        derive_state_key(self.scope.as_str(), self.identity.key())
    }

    /// Variables the CDKTF program reads to parameterize its stacks.
    pub fn cdktf_env(&self) -> BTreeMap<String, String> {
        let id = &self.identity;
        [
            ("STACK_ENV", self.scope.as_str()),
            ("STACK_TYPE", id.key()),
            ("STACK_REPO", id.repo()),
            ("STACK_TAG", id.tag()),
            ("STACK_ORG", id.org()),
            ("STACK_ENTROPY", id.entropy()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn cdktf(&self, log_level: &str) -> ExternalCommand {
        ExternalCommand::new(self.settings.tools().cdktf)
            .envs(self.cdktf_env())
            .env("CDKTF_LOG_LEVEL", log_level)
    }

    /// Deploy commands in plan order.
    ///
    /// The registry gates everything after it. For scope `all` the
    /// environment stacks only depend on the registry and may run side by
    /// side; otherwise each stack depends on the previous one. A
    /// parallelism above one is also handed to `cdktf deploy`.
    pub fn deploy_commands(&self, plan: &StackPlan, opts: RunOptions) -> Vec<ExternalCommand> {
        let mut cmds = Vec::with_capacity(plan.len() + 1);
        let synth = opts.synth;
        if synth {
            cmds.push(self.cdktf("info").label("synth").arg("synth"));
        }
        let first = cmds.len();
        for (i, stack) in plan.stacks.iter().enumerate() {
            let mut cmd = self
                .cdktf("error")
                .label(stack)
                .args(["deploy", "--ignore-missing-stack-dependencies", "--auto-approve"]);
            if opts.parallelism > 1 {
                cmd = cmd.args(["--parallelism".to_string(), opts.parallelism.to_string()]);
            }
            cmd = cmd.arg(stack.as_str());
            if synth {
                cmd = cmd.after(0);
            }
            if i > 0 {
                cmd = match plan.scope {
                    Scope::All => cmd.after(first),
                    Scope::Env(_) => cmd.after(first + i - 1),
                };
            }
            cmds.push(cmd);
        }
        cmds
    }

    /// Destroy commands in reverse plan order. For a cluster teardown across
    /// `all` the registry goes last, after every environment stack; service
    /// stacks across `all` are independent.
    pub fn destroy_commands(&self, plan: &StackPlan) -> Vec<ExternalCommand> {
        let order = plan.destroy_order();
        let last = order.len().saturating_sub(1);
        order
            .iter()
            .enumerate()
            .map(|(i, stack)| {
                let cmd = self
                    .cdktf("fatal")
                    .label(stack)
                    .args(["destroy", stack.as_str(), "--auto-approve"]);
                match plan.scope {
                    Scope::All if i == last && plan.variant == Variant::Cluster => {
                        (0..last).fold(cmd, ExternalCommand::after)
                    }
                    Scope::All => cmd,
                    Scope::Env(_) if i > 0 => cmd.after(i - 1),
                    Scope::Env(_) => cmd,
                }
            })
            .collect()
    }

    /// Create a workspace per stack, concurrently.
    pub async fn create_workspaces(&self, stacks: &[String]) -> Result<WorkspaceReport> {
        let org = self.identity.org();
        let results = join_all(stacks.iter().map(|s| self.client.create_workspace(org, s))).await;
        let mut report = WorkspaceReport::default();
        for (stack, result) in stacks.iter().zip(results) {
            match result {
                Ok(_) => {
                    tracing::info!("created workspace {stack}");
                    report.created.push(stack.clone());
                }
                Err(TfcError::Conflict(_)) => {
                    tracing::info!("workspace {stack} already exists");
                    report.existing.push(stack.clone());
                }
                Err(TfcError::Unauthenticated) => return Err(TfcError::Unauthenticated.into()),
                Err(e) => {
                    tracing::warn!("workspace {stack}: {e}");
                    report.errors.push((stack.clone(), e.to_string()));
                }
            }
        }
        Ok(report)
    }

    fn ensure_terraform_credentials(&self) -> Result<()> {
        let token = self
            .settings
            .tfc_token()
            .ok_or(StackError::Unauthenticated("TFC_TOKEN"))?;
        let path = self.settings.tfrc_path();
        let update = ensure_credentials(&path, self.settings.tfc_host(), token)?;
        tracing::debug!("terraform credentials at {}: {update:?}", path.display());
        Ok(())
    }

    /// Connect to the scope's cluster using persisted state, if any.
    /// Never fails the run.
    async fn bootstrap(&self, access: &ClusterAccess) {
        let scope = self.scope.as_str();
        let outcome = match load_state(self.settings, self.store, scope, self.identity.key()) {
            Ok(Some(outputs)) => access.connect_from(&outputs).await,
            Ok(None) => Ok(false),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(true) => {}
            Ok(false) => tracing::warn!("no cluster state for {scope} yet; proceeding"),
            Err(e) => tracing::warn!("could not bootstrap {scope} cluster: {e}; proceeding"),
        }
    }

    /// Run `commands`. On failure the workspace errors gathered before the
    /// batch ride along in the error so they can still be reported.
    async fn run_batch(
        &self,
        commands: Vec<ExternalCommand>,
        opts: RunOptions,
        workspaces: &WorkspaceReport,
    ) -> Result<BatchResult> {
        let batch = stackctl_exec::run(commands, opts.parallelism).await?;
        if !batch.all_succeeded() {
            for r in batch.failures() {
                tracing::error!("{}: {}", r.name, r.failure_reason());
            }
            return Err(match StackError::from_batch(&batch) {
                StackError::BatchFailed { count, summary, .. } => StackError::BatchFailed {
                    count,
                    summary,
                    workspace_errors: workspaces.errors.clone(),
                },
                other => other,
            });
        }
        Ok(batch)
    }

    async fn sync_state(&self, plan: &StackPlan, access: Option<&ClusterAccess>) -> Result<SyncReport> {
        sync(
            &self.client,
            self.store,
            access,
            SyncRequest {
                org: self.identity.org(),
                scope: self.scope,
                stack_type: self.identity.key(),
                stacks: &plan.stacks,
            },
        )
        .await
    }

    /// Provision registry and cluster stacks, then persist their outputs.
    pub async fn setup(&self, opts: RunOptions) -> Result<RunReport> {
        EnvironmentConfig::resolve(self.settings, self.scope)?;
        let plan = self.plan(Variant::Cluster)?;
        let access = ClusterAccess::new(self.settings)?;
        self.ensure_terraform_credentials()?;
        self.bootstrap(&access).await;

        let workspaces = self.create_workspaces(&plan.stacks).await?;
        let batch = self
            .run_batch(self.deploy_commands(&plan, opts), opts, &workspaces)
            .await?;
        let sync = self.sync_state(&plan, Some(&access)).await?;
        Ok(RunReport {
            plan,
            workspaces,
            batch,
            sync: Some(sync),
        })
    }

    /// Deploy the application service stack onto an existing cluster.
    pub async fn deploy(&self, opts: RunOptions) -> Result<RunReport> {
        EnvironmentConfig::resolve(self.settings, self.scope)?
            .require_service(self.scope, self.identity.repo())?;
        let plan = self.plan(Variant::Service)?;
        let access = ClusterAccess::new(self.settings)?;
        self.ensure_terraform_credentials()?;
        self.bootstrap(&access).await;

        let workspaces = self.create_workspaces(&plan.stacks).await?;
        let batch = self
            .run_batch(self.deploy_commands(&plan, opts), opts, &workspaces)
            .await?;
        Ok(RunReport {
            plan,
            workspaces,
            batch,
            sync: None,
        })
    }

    /// Tear stacks down in reverse order. Cluster teardown rewrites the
    /// persisted state with whatever outputs remain.
    pub async fn destroy(&self, variant: Variant, opts: RunOptions) -> Result<RunReport> {
        let config = EnvironmentConfig::resolve(self.settings, self.scope)?;
        if variant == Variant::Service {
            config.require_service(self.scope, self.identity.repo())?;
        }
        let plan = self.destroy_plan(variant)?;
        let access = ClusterAccess::new(self.settings)?;
        self.ensure_terraform_credentials()?;
        self.bootstrap(&access).await;

        let workspaces = WorkspaceReport::default();
        let batch = self
            .run_batch(self.destroy_commands(&plan), opts, &workspaces)
            .await?;
        let sync = match variant {
            Variant::Cluster => Some(self.sync_state(&plan, None).await?),
            Variant::Service => None,
        };
        Ok(RunReport {
            plan,
            workspaces,
            batch,
            sync,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use stackctl_exec::CommandStatus;
    use tempfile::TempDir;

    fn settings(dir: &TempDir, extra: &[(&str, &str)]) -> Settings {
        let home = dir.path().to_string_lossy().into_owned();
        let mut vars = vec![
            ("HOME".to_string(), home.clone()),
            ("STACKCTL_HOME".to_string(), home),
            ("TFC_ORG".to_string(), "acme".to_string()),
        ];
        vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        Settings::from_vars(vars).unwrap()
    }

    const SAMPLE_APP_SERVICES: &str = r#"{"sample-app":{"replicas":1,"hc_port":3000}}"#;

    fn orchestrator<'a>(
        s: &'a Settings,
        store: &'a MemoryStore,
        scope: Scope,
    ) -> Orchestrator<'a> {
        let identity = resolve_identity(s, scope, Some("sample-app"), Some("v1")).unwrap();
        Orchestrator::new(s, store, identity, scope).unwrap()
    }

    #[test]
    fn cdktf_env_carries_identity() {
        let dir = TempDir::new().unwrap();
        let s = settings(&dir, &[("STACK_ENTROPY", "abc")]);
        let store = MemoryStore::new();
        let o = orchestrator(&s, &store, Scope::Env(Env::Stg));
        let env = o.cdktf_env();
        assert_eq!(env["STACK_ENV"], "stg");
        assert_eq!(env["STACK_TYPE"], "do-k8s-cdktf");
        assert_eq!(env["STACK_REPO"], "sample-app");
        assert_eq!(env["STACK_TAG"], "v1");
        assert_eq!(env["STACK_ORG"], "acme");
        assert_eq!(env["STACK_ENTROPY"], "abc");
    }

    #[test]
    fn single_env_deploy_is_a_chain() {
        let dir = TempDir::new().unwrap();
        let s = settings(&dir, &[]);
        let store = MemoryStore::new();
        let o = orchestrator(&s, &store, Scope::Env(Env::Dev));
        let plan = o.plan(Variant::Cluster).unwrap();
        let cmds = o.deploy_commands(
            &plan,
            RunOptions {
                synth: true,
                parallelism: 1,
            },
        );
        assert_eq!(cmds.len(), 3);
        assert_eq!(cmds[0].name(), "synth");
        assert_eq!(cmds[0].env_overrides()["CDKTF_LOG_LEVEL"], "info");
        assert_eq!(
            cmds[1].to_string(),
            "cdktf deploy --ignore-missing-stack-dependencies --auto-approve registry-do-k8s-cdktf"
        );
        assert_eq!(cmds[1].dependencies(), &[0]);
        assert_eq!(cmds[2].dependencies(), &[0, 1]);
        assert_eq!(cmds[2].env_overrides()["CDKTF_LOG_LEVEL"], "error");
    }

    #[test]
    fn all_scope_envs_depend_only_on_registry() {
        let dir = TempDir::new().unwrap();
        let s = settings(&dir, &[]);
        let store = MemoryStore::new();
        let o = orchestrator(&s, &store, Scope::All);
        let plan = o.plan(Variant::Cluster).unwrap();
        let cmds = o.deploy_commands(
            &plan,
            RunOptions {
                synth: false,
                parallelism: 3,
            },
        );
        assert!(cmds[0].dependencies().is_empty());
        for cmd in &cmds[1..] {
            assert_eq!(cmd.dependencies(), &[0]);
        }
        assert_eq!(
            cmds[3].to_string(),
            "cdktf deploy --ignore-missing-stack-dependencies --auto-approve --parallelism 3 prd-do-k8s-cdktf"
        );
    }

    #[test]
    fn all_scope_destroy_removes_registry_last() {
        let dir = TempDir::new().unwrap();
        let s = settings(&dir, &[]);
        let store = MemoryStore::new();
        let o = orchestrator(&s, &store, Scope::All);
        let plan = o.plan(Variant::Cluster).unwrap();
        let cmds = o.destroy_commands(&plan);
        let names: Vec<_> = cmds.iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            [
                "prd-do-k8s-cdktf",
                "stg-do-k8s-cdktf",
                "dev-do-k8s-cdktf",
                "registry-do-k8s-cdktf",
            ]
        );
        assert_eq!(cmds[3].dependencies(), &[0, 1, 2]);
        assert_eq!(cmds[0].env_overrides()["CDKTF_LOG_LEVEL"], "fatal");
    }

    #[test]
    fn all_scope_service_destroy_leaves_clusters_alone() {
        let dir = TempDir::new().unwrap();
        let s = settings(&dir, &[]);
        let store = MemoryStore::new();
        let o = orchestrator(&s, &store, Scope::All);
        let plan = o.destroy_plan(Variant::Service).unwrap();
        let cmds = o.destroy_commands(&plan);
        let names: Vec<_> = cmds.iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            [
                "prd-sample-app-do-k8s-cdktf",
                "stg-sample-app-do-k8s-cdktf",
                "dev-sample-app-do-k8s-cdktf",
            ]
        );
        assert!(cmds.iter().all(|c| c.dependencies().is_empty()));
    }

    #[test]
    fn identity_defaults_repo_and_tag() {
        let dir = TempDir::new().unwrap();
        let s = settings(&dir, &[]);
        let id = resolve_identity(&s, Scope::All, None, None).unwrap();
        assert_eq!(id.env(), Env::Dev);
        assert_eq!(id.repo(), DEFAULT_REPO);
        assert_eq!(id.tag(), DEFAULT_TAG);
    }

    #[tokio::test]
    async fn deploy_of_unconfigured_repo_is_a_usage_error() {
        let dir = TempDir::new().unwrap();
        let tfrc = dir.path().join("credentials.tfrc.json");
        let s = settings(
            &dir,
            &[
                ("DO_TOKEN", "dop"),
                ("TFC_TOKEN", "t"),
                ("STACKCTL_TFRC", tfrc.to_str().unwrap()),
            ],
        );
        let store = MemoryStore::new();
        let o = orchestrator(&s, &store, Scope::Env(Env::Dev));
        let err = o.deploy(RunOptions::default()).await.unwrap_err();
        assert!(matches!(err, StackError::Usage(ref msg) if msg.contains("sample-app")));
        assert!(!tfrc.exists());
    }

    #[tokio::test]
    async fn malformed_override_aborts_before_external_calls() {
        let dir = TempDir::new().unwrap();
        let tfrc = dir.path().join("credentials.tfrc.json");
        let s = settings(
            &dir,
            &[
                ("DO_DEV_SERVICES", "{oops"),
                ("DO_TOKEN", "dop"),
                ("TFC_TOKEN", "t"),
                ("STACKCTL_TFRC", tfrc.to_str().unwrap()),
            ],
        );
        let store = MemoryStore::new();
        let o = orchestrator(&s, &store, Scope::Env(Env::Dev));
        let err = o.setup(RunOptions::default()).await.unwrap_err();
        assert!(matches!(err, StackError::Config { .. }));
        assert!(!tfrc.exists());
    }

    #[cfg(unix)]
    mod end_to_end {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &TempDir, name: &str, body: &str) -> String {
            let path = dir.path().join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().into_owned()
        }

        async fn mock_tfc(server: &mut mockito::ServerGuard) {
            server
                .mock("POST", "/api/v2/organizations/acme/workspaces")
                .with_status(422)
                .with_body(r#"{"errors":[{"detail":"Name has already been taken"}]}"#)
                .create_async()
                .await;
            for (stack, id, body) in [
                (
                    "registry-do-k8s-cdktf",
                    "ws-1",
                    r#"{"data":[{"attributes":{"name":"registry","value":{"name":"acme"}}}]}"#,
                ),
                (
                    "dev-do-k8s-cdktf",
                    "ws-2",
                    r#"{"data":[{"attributes":{"name":"cluster","value":{"name":"acme-dev-k8s"}}}]}"#,
                ),
            ] {
                server
                    .mock(
                        "GET",
                        format!("/api/v2/organizations/acme/workspaces/{stack}").as_str(),
                    )
                    .with_status(200)
                    .with_body(format!(
                        r#"{{"data":{{"id":"{id}","attributes":{{"name":"{stack}"}}}}}}"#
                    ))
                    .create_async()
                    .await;
                server
                    .mock(
                        "GET",
                        format!("/api/v2/workspaces/{id}/current-state-version-outputs").as_str(),
                    )
                    .with_status(200)
                    .with_body(body)
                    .create_async()
                    .await;
            }
        }

        #[tokio::test]
        async fn dev_setup_deploys_in_order_then_persists_state() {
            let dir = TempDir::new().unwrap();
            let log = dir.path().join("cdktf.log");
            let cdktf = script(
                &dir,
                "cdktf",
                &format!("echo \"$STACK_ENV $*\" >> '{}'", log.display()),
            );
            let mut server = mockito::Server::new_async().await;
            mock_tfc(&mut server).await;
            let tfrc = dir.path().join("credentials.tfrc.json");
            let url = server.url();
            let s = settings(
                &dir,
                &[
                    ("DO_TOKEN", "dop"),
                    ("TFC_TOKEN", "t"),
                    ("TFC_ADDRESS", url.as_str()),
                    ("STACKCTL_TFRC", tfrc.to_str().unwrap()),
                    ("STACKCTL_CDKTF_BIN", cdktf.as_str()),
                    ("STACKCTL_DOCTL_BIN", "true"),
                    ("STACKCTL_KUBECTL_BIN", "true"),
                ],
            );
            let store = MemoryStore::new();
            let o = orchestrator(&s, &store, Scope::Env(Env::Dev));

            let report = o.setup(RunOptions::default()).await.unwrap();

            let calls = std::fs::read_to_string(&log).unwrap();
            let lines: Vec<_> = calls.lines().collect();
            assert_eq!(
                lines,
                [
                    "dev deploy --ignore-missing-stack-dependencies --auto-approve registry-do-k8s-cdktf",
                    "dev deploy --ignore-missing-stack-dependencies --auto-approve dev-do-k8s-cdktf",
                ]
            );
            assert_eq!(report.workspaces.existing.len(), 2);
            let state = store.get_config("DEV_DO_K8S_CDKTF_STATE").unwrap().unwrap();
            assert!(state.contains("acme-dev-k8s"));
            assert!(state.contains("\"registry\""));
            assert!(report.sync.unwrap().bootstrapped);
        }

        #[tokio::test]
        async fn failed_registry_skips_cluster_and_sync() {
            let dir = TempDir::new().unwrap();
            let cdktf = script(&dir, "cdktf", "case \"$*\" in *registry*) exit 1 ;; esac");
            let mut server = mockito::Server::new_async().await;
            mock_tfc(&mut server).await;
            let tfrc = dir.path().join("credentials.tfrc.json");
            let url = server.url();
            let s = settings(
                &dir,
                &[
                    ("DO_TOKEN", "dop"),
                    ("TFC_TOKEN", "t"),
                    ("TFC_ADDRESS", url.as_str()),
                    ("STACKCTL_TFRC", tfrc.to_str().unwrap()),
                    ("STACKCTL_CDKTF_BIN", cdktf.as_str()),
                    ("STACKCTL_DOCTL_BIN", "true"),
                    ("STACKCTL_KUBECTL_BIN", "true"),
                ],
            );
            let store = MemoryStore::new();
            let o = orchestrator(&s, &store, Scope::Env(Env::Dev));

            let err = o.setup(RunOptions::default()).await.unwrap_err();
            match err {
                StackError::BatchFailed {
                    count,
                    summary,
                    workspace_errors,
                } => {
                    assert_eq!(count, 2);
                    assert!(summary.contains("registry-do-k8s-cdktf"));
                    assert!(workspace_errors.is_empty());
                }
                other => panic!("expected BatchFailed, got {other:?}"),
            }
            assert!(store.get_config("DEV_DO_K8S_CDKTF_STATE").unwrap().is_none());
        }

        #[tokio::test]
        async fn failed_deploy_keeps_workspace_errors() {
            let dir = TempDir::new().unwrap();
            let cdktf = script(&dir, "cdktf", "exit 1");
            let mut server = mockito::Server::new_async().await;
            server
                .mock("POST", "/api/v2/organizations/acme/workspaces")
                .with_status(500)
                .with_body("boom")
                .create_async()
                .await;
            let tfrc = dir.path().join("credentials.tfrc.json");
            let url = server.url();
            let s = settings(
                &dir,
                &[
                    ("DO_TOKEN", "dop"),
                    ("TFC_TOKEN", "t"),
                    ("TFC_ADDRESS", url.as_str()),
                    ("STACKCTL_TFRC", tfrc.to_str().unwrap()),
                    ("STACKCTL_CDKTF_BIN", cdktf.as_str()),
                    ("STACKCTL_DOCTL_BIN", "true"),
                    ("STACKCTL_KUBECTL_BIN", "true"),
                    ("DO_DEV_SERVICES", SAMPLE_APP_SERVICES),
                ],
            );
            let store = MemoryStore::new();
            let o = orchestrator(&s, &store, Scope::Env(Env::Dev));

            match o.deploy(RunOptions::default()).await.unwrap_err() {
                StackError::BatchFailed {
                    count,
                    workspace_errors,
                    ..
                } => {
                    assert_eq!(count, 1);
                    assert_eq!(workspace_errors.len(), 1);
                    assert_eq!(workspace_errors[0].0, "dev-sample-app-do-k8s-cdktf");
                    assert!(workspace_errors[0].1.contains("500"));
                }
                other => panic!("expected BatchFailed, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn service_deploy_does_not_sync() {
            let dir = TempDir::new().unwrap();
            let cdktf = script(&dir, "cdktf", "exit 0");
            let mut server = mockito::Server::new_async().await;
            server
                .mock("POST", "/api/v2/organizations/acme/workspaces")
                .with_status(201)
                .with_body(r#"{"data":{"id":"ws-9","attributes":{"name":"dev-sample-app-do-k8s-cdktf"}}}"#)
                .create_async()
                .await;
            let tfrc = dir.path().join("credentials.tfrc.json");
            let url = server.url();
            let s = settings(
                &dir,
                &[
                    ("DO_TOKEN", "dop"),
                    ("TFC_TOKEN", "t"),
                    ("TFC_ADDRESS", url.as_str()),
                    ("STACKCTL_TFRC", tfrc.to_str().unwrap()),
                    ("STACKCTL_CDKTF_BIN", cdktf.as_str()),
                    ("STACKCTL_DOCTL_BIN", "true"),
                    ("STACKCTL_KUBECTL_BIN", "true"),
                    ("DO_DEV_SERVICES", SAMPLE_APP_SERVICES),
                ],
            );
            let store = MemoryStore::new();
            let o = orchestrator(&s, &store, Scope::Env(Env::Dev));

            let report = o.deploy(RunOptions::default()).await.unwrap();
            assert_eq!(report.plan.stacks, ["dev-sample-app-do-k8s-cdktf"]);
            assert_eq!(report.workspaces.created, ["dev-sample-app-do-k8s-cdktf"]);
            assert_eq!(report.batch.results[0].status, CommandStatus::Succeeded);
            assert!(report.sync.is_none());
            assert!(tfrc.exists());
        }
    }
}

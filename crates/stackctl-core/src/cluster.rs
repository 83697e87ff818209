//! Cluster access through `doctl` and `kubectl`.

use crate::config::{Settings, Tools};
use crate::error::{Result, StackError};
use crate::io;
use crate::outputs::WorkspaceOutputs;
use stackctl_exec::{chain, ExternalCommand, OutputMode};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ClusterAccess {
    tools: Tools,
    token: String,
    kubeconfig: PathBuf,
}

impl ClusterAccess {
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            tools: settings.tools(),
            token: settings.do_token()?.to_string(),
            kubeconfig: settings.kubeconfig_path(),
        })
    }

    pub fn kubeconfig_path(&self) -> &std::path::Path {
        &self.kubeconfig
    }

    /// A `kubectl` invocation bound to the saved kubeconfig.
    pub fn kubectl(&self) -> ExternalCommand {
        ExternalCommand::new(&self.tools.kubectl)
            .env("KUBECONFIG", self.kubeconfig.to_string_lossy())
    }

    fn doctl(&self) -> ExternalCommand {
        ExternalCommand::new(&self.tools.doctl)
            .env("KUBECONFIG", self.kubeconfig.to_string_lossy())
    }

    /// Auth, kubeconfig save and connectivity probe for `cluster`.
    ///
    /// Saving the kubeconfig depends on auth and is teed so its output is
    /// both shown and kept for error reporting; the probe is best effort.
    pub fn connect_commands(&self, cluster: &str) -> Vec<ExternalCommand> {
        let mut steps = chain(vec![
            self.doctl()
                .label("doctl auth")
                .args(["auth", "init", "-t"])
                .secret_arg(&self.token),
            self.doctl()
                .label("kubeconfig save")
                .args(["kubernetes", "cluster", "kubeconfig", "save", cluster, "-t"])
                .secret_arg(&self.token)
                .output(OutputMode::Tee),
        ]);
        steps.push(
            self.kubectl()
                .label("connectivity probe")
                .args(["get", "nodes"])
                .after(1)
                .best_effort(),
        );
        steps
    }

    pub async fn connect(&self, cluster: &str) -> Result<()> {
        tracing::info!("confirming connection to {cluster}");
        let batch = stackctl_exec::run(self.connect_commands(cluster), 1).await?;
        if !batch.all_succeeded() {
            let last_line = batch
                .results
                .get(1)
                .filter(|r| !r.succeeded())
                .and_then(|r| r.stderr.lines().rev().find(|l| !l.trim().is_empty()));
            if let Some(line) = last_line {
                tracing::error!("kubeconfig save for {cluster}: {line}");
            }
            return Err(StackError::from_batch(&batch));
        }
        Ok(())
    }

    /// Connect to the cluster named in `outputs`. Returns `false` when the
    /// outputs carry no cluster.
    pub async fn connect_from(&self, outputs: &WorkspaceOutputs) -> Result<bool> {
        match outputs.cluster() {
            Some(cluster) => {
                self.connect(&cluster.name).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Registry login and pull-secret manifest. Every step is best effort
    /// since the secret usually exists already.
    pub async fn registry_auth(&self) -> Result<()> {
        let login = self
            .doctl()
            .label("registry login")
            .args(["registry", "login", "-t"])
            .secret_arg(&self.token)
            .best_effort();
        stackctl_exec::run_one(&login).await;

        let manifest = self
            .doctl()
            .label("registry manifest")
            .args(["registry", "kubernetes-manifest", "-t"])
            .secret_arg(&self.token)
            .output(OutputMode::Capture)
            .best_effort();
        let manifest = stackctl_exec::run_one(&manifest).await;
        if !manifest.succeeded() {
            tracing::warn!("could not render registry pull secret; skipping apply");
            return Ok(());
        }

        let apply = self
            .kubectl()
            .label("registry pull secret")
            .args(["apply", "-f", "-"])
            .stdin(manifest.stdout)
            .best_effort();
        stackctl_exec::run_one(&apply).await;
        Ok(())
    }

    /// Current kubeconfig contents, if one has been saved.
    pub fn read_kubeconfig(&self) -> Result<Option<String>> {
        io::read_optional(&self.kubeconfig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn access(dir: &TempDir) -> ClusterAccess {
        let home = dir.path().to_string_lossy().into_owned();
        let settings = Settings::from_vars([
            ("HOME", home.as_str()),
            ("STACKCTL_HOME", home.as_str()),
            ("DO_TOKEN", "dop_v1_secret"),
            ("STACKCTL_DOCTL_BIN", "true"),
            ("STACKCTL_KUBECTL_BIN", "false"),
        ])
        .unwrap();
        ClusterAccess::new(&settings).unwrap()
    }

    #[test]
    fn connect_commands_redact_token_and_chain_auth() {
        let dir = TempDir::new().unwrap();
        let cmds = access(&dir).connect_commands("acme-dev-k8s");
        assert_eq!(cmds.len(), 3);
        assert_eq!(cmds[0].to_string(), "true auth init -t ***");
        assert_eq!(
            cmds[1].to_string(),
            "true kubernetes cluster kubeconfig save acme-dev-k8s -t ***"
        );
        assert_eq!(cmds[1].dependencies(), &[0]);
        assert_eq!(cmds[1].output_mode(), OutputMode::Tee);
        assert!(cmds[2].is_best_effort());
        assert!(!cmds.iter().any(|c| c.to_string().contains("dop_v1_secret")));
    }

    #[tokio::test]
    async fn failed_probe_does_not_fail_connect() {
        let dir = TempDir::new().unwrap();
        // doctl is `true`, kubectl is `false`.
        access(&dir).connect("acme-dev-k8s").await.unwrap();
    }

    #[tokio::test]
    async fn kubeconfig_save_output_is_kept() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().to_string_lossy().into_owned();
        let settings = Settings::from_vars([
            ("HOME", home.as_str()),
            ("STACKCTL_HOME", home.as_str()),
            ("DO_TOKEN", "dop"),
            ("STACKCTL_DOCTL_BIN", "echo"),
            ("STACKCTL_KUBECTL_BIN", "true"),
        ])
        .unwrap();
        let access = ClusterAccess::new(&settings).unwrap();
        let batch = stackctl_exec::run(access.connect_commands("acme-dev-k8s"), 1)
            .await
            .unwrap();
        assert!(batch.all_succeeded());
        assert_eq!(
            batch.results[1].stdout,
            "kubernetes cluster kubeconfig save acme-dev-k8s -t dop\n"
        );
    }

    #[test]
    fn missing_token_is_unauthenticated() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().to_string_lossy().into_owned();
        let settings = Settings::from_vars([("HOME", home.as_str()), ("STACKCTL_HOME", home.as_str())])
            .unwrap();
        assert!(matches!(
            ClusterAccess::new(&settings),
            Err(StackError::Unauthenticated("DO_TOKEN"))
        ));
    }
}

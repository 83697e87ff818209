//! Istio service mesh install and removal.

use crate::cluster::ClusterAccess;
use crate::config::Tools;
use crate::error::{Result, StackError};
use stackctl_exec::{BatchResult, ExternalCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IstioAction {
    Install,
    Uninstall,
}

impl std::str::FromStr for IstioAction {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "install" => Ok(IstioAction::Install),
            "uninstall" => Ok(IstioAction::Uninstall),
            other => Err(StackError::Usage(format!(
                "unknown istio action '{other}': expected install or uninstall"
            ))),
        }
    }
}

fn istioctl(tools: &Tools, access: &ClusterAccess) -> ExternalCommand {
    ExternalCommand::new(&tools.istioctl)
        .env("KUBECONFIG", access.kubeconfig_path().to_string_lossy())
}

/// Demo-profile install. The default gateways are removed since the
/// egress stack manages its own; the default namespace gets sidecar
/// injection.
pub fn install_commands(tools: &Tools, access: &ClusterAccess) -> Vec<ExternalCommand> {
    let kubectl = || access.kubectl();
    vec![
        istioctl(tools, access)
            .label("istio install")
            .args(["install", "--set", "profile=demo", "-y"]),
        kubectl()
            .args([
                "delete",
                "deployment",
                "istio-ingressgateway",
                "--namespace=istio-system",
            ])
            .after(0)
            .best_effort(),
        kubectl()
            .args([
                "delete",
                "deployment",
                "istio-egressgateway",
                "--namespace=istio-system",
            ])
            .after(0)
            .best_effort(),
        kubectl()
            .label("enable injection")
            .args([
                "label",
                "namespace",
                "default",
                "istio-injection=enabled",
                "--overwrite",
            ])
            .after(0),
        kubectl()
            .args([
                "delete",
                "service",
                "istio-ingressgateway",
                "--namespace=istio-system",
            ])
            .after(0)
            .best_effort(),
    ]
}

pub fn uninstall_commands(tools: &Tools, access: &ClusterAccess) -> Vec<ExternalCommand> {
    vec![
        istioctl(tools, access)
            .label("istio uninstall")
            .args(["x", "uninstall", "--purge", "-y"]),
        access
            .kubectl()
            .label("disable injection")
            .args([
                "label",
                "namespace",
                "default",
                "istio-injection-",
                "--overwrite",
            ])
            .after(0),
    ]
}

pub async fn run(action: IstioAction, tools: &Tools, access: &ClusterAccess) -> Result<BatchResult> {
    let commands = match action {
        IstioAction::Install => install_commands(tools, access),
        IstioAction::Uninstall => uninstall_commands(tools, access),
    };
    let batch = stackctl_exec::run(commands, 1).await?;
    if !batch.all_succeeded() {
        return Err(StackError::from_batch(&batch));
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use tempfile::TempDir;

    fn fixture(dir: &TempDir, kubectl: &str) -> (Tools, ClusterAccess) {
        let home = dir.path().to_string_lossy().into_owned();
        let settings = Settings::from_vars([
            ("HOME", home.as_str()),
            ("STACKCTL_HOME", home.as_str()),
            ("DO_TOKEN", "dop"),
            ("STACKCTL_ISTIOCTL_BIN", "true"),
            ("STACKCTL_KUBECTL_BIN", kubectl),
        ])
        .unwrap();
        (settings.tools(), ClusterAccess::new(&settings).unwrap())
    }

    #[test]
    fn install_plan_shape() {
        let dir = TempDir::new().unwrap();
        let (tools, access) = fixture(&dir, "kubectl");
        let cmds = install_commands(&tools, &access);
        assert_eq!(cmds[0].to_string(), "true install --set profile=demo -y");
        assert!(cmds[1..].iter().all(|c| c.dependencies() == [0]));
        let hard: Vec<_> = cmds.iter().filter(|c| !c.is_best_effort()).map(|c| c.name()).collect();
        assert_eq!(hard, ["istio install", "enable injection"]);
    }

    #[tokio::test]
    async fn failed_label_fails_install() {
        let dir = TempDir::new().unwrap();
        let (tools, access) = fixture(&dir, "false");
        let err = run(IstioAction::Install, &tools, &access).await.unwrap_err();
        assert!(matches!(err, StackError::BatchFailed { count: 1, .. }));
    }

    #[tokio::test]
    async fn uninstall_succeeds_with_working_tools() {
        let dir = TempDir::new().unwrap();
        let (tools, access) = fixture(&dir, "true");
        let batch = run(IstioAction::Uninstall, &tools, &access).await.unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn action_parsing() {
        assert_eq!("install".parse::<IstioAction>().unwrap(), IstioAction::Install);
        assert!("upgrade".parse::<IstioAction>().is_err());
    }
}

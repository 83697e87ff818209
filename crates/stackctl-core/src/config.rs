//! Process settings.
//!
//! Built once at startup from the environment variable map, optionally
//! layered over `$STACKCTL_HOME/config.yaml`, and passed by reference to
//! every component. Nothing else in the workspace reads `std::env`.

use crate::error::{Result, StackError};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_STACK_TYPE: &str = "do-k8s-cdktf";
pub const DEFAULT_REPO: &str = "sample-expressjs-do-k8s-cdktf";
pub const DEFAULT_TAG: &str = "main";
pub const DEFAULT_ENTROPY: &str = "0";
pub const DEFAULT_TEAM: &str = "default";
pub const DEFAULT_TFC_ADDRESS: &str = "https://app.terraform.io";

// ---------------------------------------------------------------------------
// FileSettings
// ---------------------------------------------------------------------------

/// Contents of `$STACKCTL_HOME/config.yaml`.
///
/// ```yaml
/// vars:
///   TFC_ORG: acme
///   STACK_TYPE: do-k8s-cdktf
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileSettings {
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
}

impl FileSettings {
    pub fn load(home: &Path) -> Result<Self> {
        let path = paths::config_path(home);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }
}

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

/// External binaries, overridable for testing or non-standard installs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tools {
    pub cdktf: String,
    pub doctl: String,
    pub kubectl: String,
    pub istioctl: String,
}

impl Tools {
    /// Binaries among `names` that cannot be found on `PATH`.
    pub fn missing<'a>(&'a self, names: &[&'a str]) -> Vec<&'a str> {
        names
            .iter()
            .copied()
            .filter(|name| which::which(self.binary(name)).is_err())
            .collect()
    }

    fn binary<'a>(&'a self, name: &'a str) -> &'a str {
        match name {
            "cdktf" => &self.cdktf,
            "doctl" => &self.doctl,
            "kubectl" => &self.kubectl,
            "istioctl" => &self.istioctl,
            other => other,
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Settings {
    vars: BTreeMap<String, String>,
    home: PathBuf,
    user_home: PathBuf,
}

impl Settings {
    /// Snapshot the real process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Build settings from an explicit variable map. Values from the file
    /// layer only fill in variables the map leaves unset.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut vars: BTreeMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let user_home = match vars.get("HOME").filter(|h| !h.is_empty()) {
            Some(h) => PathBuf::from(h),
            None => home::home_dir().ok_or(StackError::HomeNotFound)?,
        };
        let home = match vars.get("STACKCTL_HOME").filter(|h| !h.is_empty()) {
            Some(h) => PathBuf::from(h),
            None => user_home.join(paths::STACKCTL_DIR),
        };

        let file = FileSettings::load(&home)?;
        for (k, v) in file.vars {
            vars.entry(k).or_insert(v);
        }

        Ok(Self {
            vars,
            home,
            user_home,
        })
    }

    /// A non-empty variable value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// Root of the stackctl config and team store.
    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn org(&self) -> Result<&str> {
        self.get("TFC_ORG")
            .or_else(|| self.get("STACK_ORG"))
            .ok_or_else(|| StackError::Config {
                var: "TFC_ORG".into(),
                message: "not set (STACK_ORG is also accepted)".into(),
            })
    }

    pub fn stack_type(&self) -> &str {
        self.get("STACK_TYPE").unwrap_or(DEFAULT_STACK_TYPE)
    }

    pub fn repo(&self) -> Option<&str> {
        self.get("STACK_REPO")
    }

    pub fn tag(&self) -> Option<&str> {
        self.get("STACK_TAG")
    }

    pub fn entropy(&self) -> &str {
        self.get("STACK_ENTROPY").unwrap_or(DEFAULT_ENTROPY)
    }

    pub fn team(&self) -> &str {
        self.get("OPS_TEAM_NAME").unwrap_or(DEFAULT_TEAM)
    }

    pub fn do_token(&self) -> Result<&str> {
        self.get("DO_TOKEN")
            .ok_or(StackError::Unauthenticated("DO_TOKEN"))
    }

    pub fn tfc_token(&self) -> Option<&str> {
        self.get("TFC_TOKEN")
    }

    pub fn tfc_address(&self) -> &str {
        self.get("TFC_ADDRESS")
            .unwrap_or(DEFAULT_TFC_ADDRESS)
            .trim_end_matches('/')
    }

    /// Host part of the Terraform Cloud address, as used in the CLI
    /// credentials file.
    pub fn tfc_host(&self) -> &str {
        let address = self.tfc_address();
        let rest = address
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(address);
        rest.split('/').next().unwrap_or(rest)
    }

    pub fn parallelism(&self) -> Result<usize> {
        match self.get("STACKCTL_PARALLELISM") {
            None => Ok(1),
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n >= 1 => Ok(n),
                _ => Err(StackError::Config {
                    var: "STACKCTL_PARALLELISM".into(),
                    message: format!("expected a positive integer, got '{raw}'"),
                }),
            },
        }
    }

    pub fn tools(&self) -> Tools {
        Tools {
            cdktf: self.get("STACKCTL_CDKTF_BIN").unwrap_or("cdktf").to_string(),
            doctl: self.get("STACKCTL_DOCTL_BIN").unwrap_or("doctl").to_string(),
            kubectl: self
                .get("STACKCTL_KUBECTL_BIN")
                .unwrap_or("kubectl")
                .to_string(),
            istioctl: self
                .get("STACKCTL_ISTIOCTL_BIN")
                .unwrap_or("istioctl")
                .to_string(),
        }
    }

    /// Terraform CLI credentials file.
    pub fn tfrc_path(&self) -> PathBuf {
        self.get("STACKCTL_TFRC")
            .map(PathBuf::from)
            .unwrap_or_else(|| paths::default_tfrc_path(&self.user_home))
    }

    /// Kubeconfig written by `doctl kubernetes cluster kubeconfig save`.
    pub fn kubeconfig_path(&self) -> PathBuf {
        self.get("KUBECONFIG")
            .and_then(|v| v.split(':').next())
            .map(PathBuf::from)
            .unwrap_or_else(|| paths::default_kubeconfig_path(&self.user_home))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings(dir: &TempDir, extra: &[(&str, &str)]) -> Settings {
        let home = dir.path().to_string_lossy().into_owned();
        let mut vars = vec![
            ("HOME".to_string(), home.clone()),
            ("STACKCTL_HOME".to_string(), home),
        ];
        vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        Settings::from_vars(vars).unwrap()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let dir = TempDir::new().unwrap();
        let s = settings(&dir, &[]);
        assert_eq!(s.stack_type(), DEFAULT_STACK_TYPE);
        assert_eq!(s.team(), DEFAULT_TEAM);
        assert_eq!(s.tfc_address(), DEFAULT_TFC_ADDRESS);
        assert_eq!(s.tfc_host(), "app.terraform.io");
        assert_eq!(s.parallelism().unwrap(), 1);
        assert_eq!(s.tools().cdktf, "cdktf");
        assert!(s.org().is_err());
    }

    #[test]
    fn empty_values_count_as_unset() {
        let dir = TempDir::new().unwrap();
        let s = settings(&dir, &[("TFC_ORG", ""), ("STACK_ORG", "acme")]);
        assert_eq!(s.org().unwrap(), "acme");
    }

    #[test]
    fn file_layer_fills_gaps_only() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.yaml"),
            "vars:\n  TFC_ORG: from-file\n  STACK_TYPE: file-type\n",
        )
        .unwrap();
        let s = settings(&dir, &[("STACK_TYPE", "env-type")]);
        assert_eq!(s.org().unwrap(), "from-file");
        assert_eq!(s.stack_type(), "env-type");
    }

    #[test]
    fn bad_parallelism_is_config_error() {
        let dir = TempDir::new().unwrap();
        let s = settings(&dir, &[("STACKCTL_PARALLELISM", "0")]);
        assert!(matches!(
            s.parallelism(),
            Err(StackError::Config { ref var, .. }) if var == "STACKCTL_PARALLELISM"
        ));
    }

    #[test]
    fn missing_do_token_is_unauthenticated() {
        let dir = TempDir::new().unwrap();
        let s = settings(&dir, &[]);
        assert!(matches!(
            s.do_token(),
            Err(StackError::Unauthenticated("DO_TOKEN"))
        ));
    }

    #[test]
    fn tfrc_defaults_under_user_home() {
        let dir = TempDir::new().unwrap();
        let s = settings(&dir, &[("TFC_ADDRESS", "https://tfe.example.com/")]);
        assert_eq!(s.tfrc_path(), dir.path().join(".terraform.d/credentials.tfrc.json"));
        assert_eq!(s.tfc_host(), "tfe.example.com");
    }

    #[test]
    fn missing_tools_are_reported_by_name() {
        let dir = TempDir::new().unwrap();
        let s = settings(
            &dir,
            &[
                ("STACKCTL_CDKTF_BIN", "sh"),
                ("STACKCTL_ISTIOCTL_BIN", "/definitely/not/istioctl"),
            ],
        );
        assert_eq!(s.tools().missing(&["cdktf", "istioctl"]), ["istioctl"]);
    }
}

//! Per-environment configuration blobs.
//!
//! Each kind is read from `DO_{SCOPE}_{SUFFIX}` and falls back to a built-in
//! JSON literal. A value that is set but malformed aborts the run.

use crate::config::Settings;
use crate::error::{Result, StackError};
use crate::types::Scope;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Default literals
// ---------------------------------------------------------------------------

const DEFAULT_SERVICES: &str = r#"{
  "sample-expressjs-do-k8s-cdktf": {
    "replicas": 2,
    "ports": [ { "containerPort": 3000 } ],
    "lb_ports": [ { "protocol": "TCP", "port": 3000, "targetPort": 3000 } ],
    "hc_port": 3000
  }
}"#;

const DEFAULT_K8S: &str = r#"{
  "region": "nyc3",
  "version": "1.21.5-do.0",
  "node_size": "s-1vcpu-2gb",
  "node_count": 3,
  "auto_scale": false,
  "min_nodes": 3,
  "max_nodes": 3
}"#;

const DEFAULT_POSTGRES: &str = r#"{
  "engine": "pg",
  "version": "13",
  "size": "db-s-1vcpu-1gb",
  "region": "sfo3",
  "node_count": 1
}"#;

const DEFAULT_MYSQL: &str = r#"{
  "engine": "mysql",
  "version": "8",
  "size": "db-s-1vcpu-1gb",
  "region": "sfo3",
  "node_count": 1
}"#;

const DEFAULT_REDIS: &str = r#"{
  "engine": "redis",
  "version": "6",
  "size": "db-s-1vcpu-1gb",
  "region": "sfo3",
  "node_count": 1
}"#;

const DEFAULT_ISTIO: &str = r#"{
  "host": "ifconfig.co",
  "port": 443,
  "portName": "https",
  "protocol": "TCP"
}"#;

// ---------------------------------------------------------------------------
// ConfigKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKind {
    Services,
    K8sConfig,
    RedisConfig,
    MysqlConfig,
    PostgresConfig,
    Istio,
}

impl ConfigKind {
    pub fn all() -> &'static [ConfigKind] {
        &[
            ConfigKind::Services,
            ConfigKind::K8sConfig,
            ConfigKind::RedisConfig,
            ConfigKind::MysqlConfig,
            ConfigKind::PostgresConfig,
            ConfigKind::Istio,
        ]
    }

    pub fn suffix(self) -> &'static str {
        match self {
            ConfigKind::Services => "SERVICES",
            ConfigKind::K8sConfig => "K8S_CONFIG",
            ConfigKind::RedisConfig => "REDIS_CONFIG",
            ConfigKind::MysqlConfig => "MYSQL_CONFIG",
            ConfigKind::PostgresConfig => "POSTGRES_CONFIG",
            ConfigKind::Istio => "ISTIO",
        }
    }

    pub fn default_literal(self) -> &'static str {
        match self {
            ConfigKind::Services => DEFAULT_SERVICES,
            ConfigKind::K8sConfig => DEFAULT_K8S,
            ConfigKind::RedisConfig => DEFAULT_REDIS,
            ConfigKind::MysqlConfig => DEFAULT_MYSQL,
            ConfigKind::PostgresConfig => DEFAULT_POSTGRES,
            ConfigKind::Istio => DEFAULT_ISTIO,
        }
    }
}

/// `DO_{SCOPE}_{SUFFIX}`, e.g. `DO_STG_SERVICES`.
pub fn var_name(scope: Scope, kind: ConfigKind) -> String {
    format!("DO_{}_{}", scope.as_str().to_uppercase(), kind.suffix())
}

/// Resolve one configuration blob for `scope`.
pub fn resolve(settings: &Settings, scope: Scope, kind: ConfigKind) -> Result<Value> {
    let var = var_name(scope, kind);
    let (raw, origin) = match settings.get(&var) {
        Some(v) => (v, var.clone()),
        None => (kind.default_literal(), format!("{var} (built-in default)")),
    };
    serde_json::from_str(raw).map_err(|e| StackError::Config {
        var: origin,
        message: format!("not valid JSON: {e}"),
    })
}

fn resolve_typed<T: serde::de::DeserializeOwned>(
    settings: &Settings,
    scope: Scope,
    kind: ConfigKind,
) -> Result<T> {
    let value = resolve(settings, scope, kind)?;
    serde_json::from_value(value).map_err(|e| StackError::Config {
        var: var_name(scope, kind),
        message: format!("unexpected shape: {e}"),
    })
}

// ---------------------------------------------------------------------------
// Typed configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    pub container_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerPort {
    pub protocol: String,
    pub port: u16,
    pub target_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub replicas: u32,
    #[serde(default)]
    pub ports: Vec<ContainerPort>,
    #[serde(default)]
    pub lb_ports: Vec<LoadBalancerPort>,
    pub hc_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSizing {
    pub region: String,
    pub version: String,
    pub node_size: String,
    pub node_count: u32,
    #[serde(default)]
    pub auto_scale: bool,
    #[serde(default)]
    pub min_nodes: Option<u32>,
    #[serde(default)]
    pub max_nodes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSizing {
    pub engine: String,
    pub version: String,
    pub size: String,
    pub region: String,
    pub node_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IstioEgress {
    pub host: String,
    pub port: u16,
    pub port_name: String,
    pub protocol: String,
}

/// Every configuration blob for one scope, decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentConfig {
    pub services: BTreeMap<String, ServiceConfig>,
    pub k8s: ClusterSizing,
    pub postgres: DatabaseSizing,
    pub mysql: DatabaseSizing,
    pub redis: DatabaseSizing,
    pub istio: IstioEgress,
}

impl EnvironmentConfig {
    pub fn resolve(settings: &Settings, scope: Scope) -> Result<Self> {
        Ok(Self {
            services: resolve_typed(settings, scope, ConfigKind::Services)?,
            k8s: resolve_typed(settings, scope, ConfigKind::K8sConfig)?,
            postgres: resolve_typed(settings, scope, ConfigKind::PostgresConfig)?,
            mysql: resolve_typed(settings, scope, ConfigKind::MysqlConfig)?,
            redis: resolve_typed(settings, scope, ConfigKind::RedisConfig)?,
            istio: resolve_typed(settings, scope, ConfigKind::Istio)?,
        })
    }

    /// Service names in stable order, used as repo choices.
    pub fn service_names(&self) -> Vec<&str> {
        self.services.keys().map(String::as_str).collect()
    }

    /// Usage error unless `repo` is a service configured for `scope`.
    pub fn require_service(&self, scope: Scope, repo: &str) -> Result<()> {
        if self.services.contains_key(repo) {
            return Ok(());
        }
        let var = var_name(scope, ConfigKind::Services);
        Err(StackError::Usage(if self.services.is_empty() {
            format!("'{repo}' is not a configured service: {var} lists none")
        } else {
            format!(
                "'{repo}' is not a configured service; {var} has: {}",
                self.service_names().join(", ")
            )
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Env;
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
    fn var_names_follow_convention() {
        assert_eq!(
            var_name(Scope::Env(Env::Stg), ConfigKind::Services),
            "DO_STG_SERVICES"
        );
        assert_eq!(var_name(Scope::All, ConfigKind::K8sConfig), "DO_ALL_K8S_CONFIG");
    }

    #[test]
    fn unset_override_returns_default_verbatim() {
        let dir = TempDir::new().unwrap();
        let s = settings(&dir, &[]);
        for &kind in ConfigKind::all() {
            let value = resolve(&s, Scope::Env(Env::Dev), kind).unwrap();
            let expected: Value = serde_json::from_str(kind.default_literal()).unwrap();
            assert_eq!(value, expected);
            let reparsed: Value = serde_json::from_str(&value.to_string()).unwrap();
            assert_eq!(reparsed, value);
        }
    }

    #[test]
    fn override_is_returned_verbatim() {
        let dir = TempDir::new().unwrap();
        let blob = r#"{"api":{"replicas":5,"hc_port":8080,"extra":[1,2]}}"#;
        let s = settings(&dir, &[("DO_PRD_SERVICES", blob)]);
        let value = resolve(&s, Scope::Env(Env::Prd), ConfigKind::Services).unwrap();
        assert_eq!(value, serde_json::from_str::<Value>(blob).unwrap());
        // Other environments are unaffected.
        let dev = resolve(&s, Scope::Env(Env::Dev), ConfigKind::Services).unwrap();
        assert!(dev.get("sample-expressjs-do-k8s-cdktf").is_some());
    }

    #[test]
    fn malformed_override_names_the_variable() {
        let dir = TempDir::new().unwrap();
        let s = settings(&dir, &[("DO_DEV_K8S_CONFIG", "{not json")]);
        let err = resolve(&s, Scope::Env(Env::Dev), ConfigKind::K8sConfig).unwrap_err();
        match err {
            StackError::Config { var, .. } => assert_eq!(var, "DO_DEV_K8S_CONFIG"),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn defaults_decode_into_typed_config() {
        let dir = TempDir::new().unwrap();
        let s = settings(&dir, &[]);
        let cfg = EnvironmentConfig::resolve(&s, Scope::All).unwrap();
        let svc = &cfg.services["sample-expressjs-do-k8s-cdktf"];
        assert_eq!(svc.replicas, 2);
        assert_eq!(svc.ports[0].container_port, 3000);
        assert_eq!(svc.lb_ports[0].target_port, 3000);
        assert_eq!(cfg.k8s.region, "nyc3");
        assert_eq!(cfg.postgres.engine, "pg");
        assert_eq!(cfg.istio.port_name, "https");
        assert_eq!(cfg.service_names(), vec!["sample-expressjs-do-k8s-cdktf"]);
    }

    #[test]
    fn repo_must_be_a_configured_service() {
        let dir = TempDir::new().unwrap();
        let blob = r#"{"shop":{"replicas":1,"hc_port":80},"api":{"replicas":1,"hc_port":80}}"#;
        let s = settings(&dir, &[("DO_DEV_SERVICES", blob)]);
        let scope = Scope::Env(Env::Dev);
        let cfg = EnvironmentConfig::resolve(&s, scope).unwrap();
        assert_eq!(cfg.service_names(), vec!["api", "shop"]);
        cfg.require_service(scope, "shop").unwrap();
        match cfg.require_service(scope, "blog").unwrap_err() {
            StackError::Usage(msg) => {
                assert!(msg.contains("'blog'"));
                assert!(msg.contains("DO_DEV_SERVICES"));
                assert!(msg.contains("api, shop"));
            }
            other => panic!("expected Usage error, got {other:?}"),
        }
    }

    #[test]
    fn wrong_shape_is_config_error() {
        let dir = TempDir::new().unwrap();
        let s = settings(&dir, &[("DO_STG_ISTIO", r#"{"host": 1}"#)]);
        let err = EnvironmentConfig::resolve(&s, Scope::Env(Env::Stg)).unwrap_err();
        assert!(matches!(err, StackError::Config { ref var, .. } if var == "DO_STG_ISTIO"));
    }
}

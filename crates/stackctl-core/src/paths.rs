use crate::error::{Result, StackError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

/// Default stackctl home, relative to the user's home directory.
pub const STACKCTL_DIR: &str = ".stackctl";
pub const CONFIG_FILE: &str = "config.yaml";
pub const TEAMS_DIR: &str = "teams";
pub const TEAM_CONFIG_FILE: &str = "config.yaml";
pub const TEAM_SECRETS_FILE: &str = "secrets.yaml";

pub const TFRC_FILE: &str = ".terraform.d/credentials.tfrc.json";
pub const KUBECONFIG_FILE: &str = ".kube/config";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(home: &Path) -> PathBuf {
    home.join(CONFIG_FILE)
}

pub fn team_dir(home: &Path, team: &str) -> PathBuf {
    home.join(TEAMS_DIR).join(team)
}

pub fn team_config_path(home: &Path, team: &str) -> PathBuf {
    team_dir(home, team).join(TEAM_CONFIG_FILE)
}

pub fn team_secrets_path(home: &Path, team: &str) -> PathBuf {
    team_dir(home, team).join(TEAM_SECRETS_FILE)
}

pub fn default_tfrc_path(user_home: &Path) -> PathBuf {
    user_home.join(TFRC_FILE)
}

pub fn default_kubeconfig_path(user_home: &Path) -> PathBuf {
    user_home.join(KUBECONFIG_FILE)
}

// ---------------------------------------------------------------------------
// Name validation
// ---------------------------------------------------------------------------

static SLUG_RE: OnceLock<Regex> = OnceLock::new();
static ENTROPY_RE: OnceLock<Regex> = OnceLock::new();

fn slug_re() -> &'static Regex {
    SLUG_RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").expect("static regex")
    })
}

fn entropy_re() -> &'static Regex {
    ENTROPY_RE.get_or_init(|| Regex::new(r"^[a-z0-9]+$").expect("static regex"))
}

/// Org, key, repo and team: lowercase alphanumeric with interior hyphens.
pub fn validate_slug(field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() || value.len() > 64 || !slug_re().is_match(value) {
        return Err(StackError::InvalidName {
            field,
            value: value.to_string(),
            reason: "must be lowercase alphanumeric with interior hyphens",
        });
    }
    Ok(())
}

/// Entropy is the last segment of resource names and must not contain `-`.
pub fn validate_entropy(value: &str) -> Result<()> {
    if value.len() > 16 || !entropy_re().is_match(value) {
        return Err(StackError::InvalidName {
            field: "entropy",
            value: value.to_string(),
            reason: "must be 1-16 lowercase alphanumeric characters",
        });
    }
    Ok(())
}

pub fn validate_tag(value: &str) -> Result<()> {
    if value.is_empty() || value.chars().any(char::is_whitespace) {
        return Err(StackError::InvalidName {
            field: "tag",
            value: value.to_string(),
            reason: "must be non-empty and contain no whitespace",
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

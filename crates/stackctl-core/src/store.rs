//! Team config/secret store.
//!
//! Layout:
//!   $STACKCTL_HOME/teams/<team>/
//!     config.yaml   plain settings such as `DEV_DO_K8S_CDKTF_STATE`
//!     secrets.yaml  owner-only: kubeconfigs and other credentials

use crate::config::Settings;
use crate::error::Result;
use crate::io;
use crate::paths;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Opaque key/value persistence scoped to an operations team.
pub trait TeamStore: Send + Sync {
    fn get_secret(&self, key: &str) -> Result<Option<String>>;
    fn set_secret(&self, key: &str, value: &str) -> Result<()>;
    fn get_config(&self, key: &str) -> Result<Option<String>>;
    fn set_config(&self, key: &str, value: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreEntry {
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    entries: BTreeMap<String, StoreEntry>,
}

#[derive(Debug, Clone)]
pub struct FileStore {
    team: String,
    config_path: PathBuf,
    secrets_path: PathBuf,
}

impl FileStore {
    /// The team name becomes a path segment, so it must be a slug.
    pub fn open(home: &Path, team: &str) -> Result<Self> {
        paths::validate_slug("team", team)?;
        Ok(Self {
            team: team.to_string(),
            config_path: paths::team_config_path(home, team),
            secrets_path: paths::team_secrets_path(home, team),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::open(settings.home(), settings.team())
    }

    pub fn team(&self) -> &str {
        &self.team
    }

    /// Config entries with their last update time, sorted by key.
    pub fn config_entries(&self) -> Result<Vec<(String, StoreEntry)>> {
        Ok(load(&self.config_path)?.entries.into_iter().collect())
    }

    /// Secret key names only.
    pub fn secret_keys(&self) -> Result<Vec<String>> {
        Ok(load(&self.secrets_path)?.entries.into_keys().collect())
    }
}

fn load(path: &Path) -> Result<StoreFile> {
    match io::read_optional(path)? {
        Some(content) if !content.trim().is_empty() => Ok(serde_yaml::from_str(&content)?),
        _ => Ok(StoreFile::default()),
    }
}

fn upsert(path: &Path, key: &str, value: &str, private: bool) -> Result<()> {
    let mut file = load(path)?;
    file.entries.insert(
        key.to_string(),
        StoreEntry {
            value: value.to_string(),
            updated_at: Utc::now(),
        },
    );
    let content = serde_yaml::to_string(&file)?;
    if private {
        io::atomic_write_private(path, content.as_bytes())
    } else {
        io::atomic_write(path, content.as_bytes())
    }
}

impl TeamStore for FileStore {
    fn get_secret(&self, key: &str) -> Result<Option<String>> {
        Ok(load(&self.secrets_path)?.entries.remove(key).map(|e| e.value))
    }

    fn set_secret(&self, key: &str, value: &str) -> Result<()> {
        upsert(&self.secrets_path, key, value, true)
    }

    fn get_config(&self, key: &str) -> Result<Option<String>> {
        Ok(load(&self.config_path)?.entries.remove(key).map(|e| e.value))
    }

    fn set_config(&self, key: &str, value: &str) -> Result<()> {
        upsert(&self.config_path, key, value, false)
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Store kept entirely in memory, for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    config: Mutex<BTreeMap<String, String>>,
    secrets: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read(map: &Mutex<BTreeMap<String, String>>, key: &str) -> Option<String> {
    map.lock()
        .unwrap_or_else(|e| e.into_inner())
        .get(key)
        .cloned()
}

fn write(map: &Mutex<BTreeMap<String, String>>, key: &str, value: &str) {
    map.lock()
        .unwrap_or_else(|e| e.into_inner())
        .insert(key.to_string(), value.to_string());
}

impl TeamStore for MemoryStore {
    fn get_secret(&self, key: &str) -> Result<Option<String>> {
        Ok(read(&self.secrets, key))
    }

    fn set_secret(&self, key: &str, value: &str) -> Result<()> {
        write(&self.secrets, key, value);
        Ok(())
    }

    fn get_config(&self, key: &str) -> Result<Option<String>> {
        Ok(read(&self.config, key))
    }

    fn set_config(&self, key: &str, value: &str) -> Result<()> {
        write(&self.config, key, value);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

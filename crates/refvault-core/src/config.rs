//! Registry configuration management
//!
//! Configuration file: ~/.config/refvault/refvault.yaml
//! Every field is optional; a missing file yields the defaults.

use crate::paths::{sibling, Paths};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where the salt for passphrase key derivation comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaltMode {
    /// The built-in salt constant. Every existing store was written with it.
    #[default]
    Fixed,
    /// A random salt kept in `<store>.salt`. Not readable by fixed-salt stores.
    PerStore,
}

impl SaltMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaltMode::Fixed => "fixed",
            SaltMode::PerStore => "per_store",
        }
    }
}

/// What to do when the store on disk cannot be decrypted or parsed at open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPolicy {
    /// Warn and start from an empty registry
    #[default]
    Degrade,
    /// Refuse to open
    Strict,
}

impl LoadPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadPolicy::Degrade => "degrade",
            LoadPolicy::Strict => "strict",
        }
    }
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Encrypted store file
    #[serde(default = "default_storage")]
    pub storage: PathBuf,

    /// Generated key file (defaults to `<storage>.key`)
    #[serde(default)]
    pub key_file: Option<PathBuf>,

    /// Salt source for passphrase-derived keys
    #[serde(default)]
    pub salt_mode: SaltMode,

    /// Behaviour on an unreadable store at open
    #[serde(default)]
    pub load_policy: LoadPolicy,

    /// Audit settings
    #[serde(default)]
    pub audit: AuditConfig,
}

fn default_storage() -> PathBuf {
    Paths::new().store()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            storage: default_storage(),
            key_file: None,
            salt_mode: SaltMode::default(),
            load_policy: LoadPolicy::default(),
            audit: AuditConfig::default(),
        }
    }
}

impl RegistryConfig {
    /// Configuration for a store at `storage`, everything else default
    pub fn for_storage(storage: impl Into<PathBuf>) -> Self {
        Self {
            storage: storage.into(),
            ..Self::default()
        }
    }

    /// Load configuration from default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Paths::new().config_file())
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read refvault config from {:?}", path))?;
            let config: Self = serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse refvault config from {:?}", path))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Path of the generated key file
    pub fn key_path(&self) -> PathBuf {
        self.key_file
            .clone()
            .unwrap_or_else(|| sibling(&self.storage, ".key"))
    }

    /// Path of the per-store salt file
    pub fn salt_path(&self) -> PathBuf {
        sibling(&self.storage, ".salt")
    }
}

/// Audit log settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// JSON-lines file that receives a copy of every audit entry
    #[serde(default)]
    pub sink: Option<PathBuf>,

    /// Number of entries returned when no limit is given
    #[serde(default = "default_audit_limit")]
    pub default_limit: usize,
}

fn default_audit_limit() -> usize {
    100
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            sink: None,
            default_limit: default_audit_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.salt_mode, SaltMode::Fixed);
        assert_eq!(config.load_policy, LoadPolicy::Degrade);
        assert_eq!(config.audit.default_limit, 100);
        assert!(config.audit.sink.is_none());
        assert!(config.storage.ends_with("secrets.dat"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = RegistryConfig::load_from(&dir.path().join("nope.yaml")).unwrap();
        assert_eq!(config.load_policy, LoadPolicy::Degrade);
    }

    #[test]
    fn test_partial_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("refvault.yaml");
        std::fs::write(
            &path,
            "storage: /srv/registry/web.dat\nsalt_mode: per_store\nload_policy: strict\n",
        )
        .unwrap();

        let config = RegistryConfig::load_from(&path).unwrap();
        assert_eq!(config.storage, PathBuf::from("/srv/registry/web.dat"));
        assert_eq!(config.salt_mode, SaltMode::PerStore);
        assert_eq!(config.load_policy, LoadPolicy::Strict);
        assert_eq!(config.audit.default_limit, 100);
        assert_eq!(config.key_path(), PathBuf::from("/srv/registry/web.dat.key"));
        assert_eq!(config.salt_path(), PathBuf::from("/srv/registry/web.dat.salt"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("refvault.yaml");

        let mut config = RegistryConfig::for_storage(dir.path().join("secrets.dat"));
        config.key_file = Some(dir.path().join("keys").join("identity.key"));
        config.audit.sink = Some(dir.path().join("audit.log"));
        config.audit.default_limit = 20;
        config.save_to(&path).unwrap();

        let loaded = RegistryConfig::load_from(&path).unwrap();
        assert_eq!(loaded.storage, config.storage);
        assert_eq!(loaded.key_path(), dir.path().join("keys").join("identity.key"));
        assert_eq!(loaded.audit.sink, config.audit.sink);
        assert_eq!(loaded.audit.default_limit, 20);
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("refvault.yaml");
        std::fs::write(&path, "salt_mode: sometimes\n").unwrap();
        assert!(RegistryConfig::load_from(&path).is_err());
    }
}

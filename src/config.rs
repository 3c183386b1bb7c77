//! Application configuration
//!
//! Each setting resolves in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::catalog::FieldCatalog;
use crate::error::ConfigError;
use crate::reference::ReferenceData;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_CONFIG: &str = "LC_COMPLIANCE_CONFIG";
pub const ENV_DATABASE: &str = "LC_COMPLIANCE_DB";
pub const ENV_REFERENCE: &str = "LC_COMPLIANCE_REFERENCE";

const APP_DIR: &str = "lc-compliance";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,

    /// Reference data JSON; the built-in bundle when unset
    pub reference_path: Option<PathBuf>,

    /// Field format CSV replacing the built-in MT700 catalogue
    pub field_formats_path: Option<PathBuf>,

    pub bind_address: String,

    /// Recorded as the actor of runs and events
    pub actor: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_path: default_database_path(),
            reference_path: None,
            field_formats_path: None,
            bind_address: "127.0.0.1:3000".to_string(),
            actor: "lc-compliance".to_string(),
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub reference_path: Option<PathBuf>,
    pub actor: Option<String>,
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve against the process environment
    pub fn load(overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        Self::resolve(overrides, |name| std::env::var(name).ok())
    }

    /// Resolve with an explicit environment lookup
    pub fn resolve<F>(overrides: &ConfigOverrides, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // A config file named explicitly must exist; the per-user one is optional
        let explicit = overrides
            .config_path
            .clone()
            .or_else(|| env(ENV_CONFIG).map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => AppConfig::default(),
            },
        };

        if let Some(path) = overrides
            .database_path
            .clone()
            .or_else(|| env(ENV_DATABASE).map(PathBuf::from))
        {
            config.database_path = path;
        }

        if let Some(path) = overrides
            .reference_path
            .clone()
            .or_else(|| env(ENV_REFERENCE).map(PathBuf::from))
        {
            config.reference_path = Some(path);
        }

        if let Some(actor) = &overrides.actor {
            config.actor = actor.clone();
        }

        tracing::debug!(
            database = %config.database_path.display(),
            reference = ?config.reference_path,
            "configuration resolved"
        );
        Ok(config)
    }

    /// Reference bundle per configuration: file or built-in, with an optional
    /// catalogue override
    pub fn load_reference(&self) -> anyhow::Result<ReferenceData> {
        let mut reference = match &self.reference_path {
            Some(path) => ReferenceData::from_file(path)?,
            None => ReferenceData::standard(),
        };

        if let Some(path) = &self.field_formats_path {
            reference.field_formats = FieldCatalog::from_csv(path)
                .with_context(|| format!("Failed to load field formats from {:?}", path))?;
        }

        Ok(reference)
    }
}

/// `~/.config/lc-compliance/config.toml` (platform equivalent elsewhere)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

/// `~/.local/share/lc-compliance/lc_compliance.db` (platform equivalent elsewhere)
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("./lc_compliance_data"))
        .join("lc_compliance.db")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_file_values_fill_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "database_path = \"/tmp/lc/file.db\"\nactor = \"trade-ops\"\n");

        let overrides = ConfigOverrides {
            config_path: Some(path),
            ..Default::default()
        };
        let config = AppConfig::resolve(&overrides, env_of(&[])).unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/lc/file.db"));
        assert_eq!(config.actor, "trade-ops");
        assert_eq!(config.bind_address, "127.0.0.1:3000");
        assert!(config.reference_path.is_none());
    }

    #[test]
    fn test_priority_cli_then_env_then_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "database_path = \"/tmp/lc/file.db\"\nreference_path = \"/tmp/lc/file.json\"\n",
        );
        let env = env_of(&[
            (ENV_CONFIG, path.to_str().unwrap()),
            (ENV_DATABASE, "/tmp/lc/env.db"),
            (ENV_REFERENCE, "/tmp/lc/env.json"),
        ]);

        let overrides = ConfigOverrides {
            database_path: Some(PathBuf::from("/tmp/lc/cli.db")),
            ..Default::default()
        };
        let config = AppConfig::resolve(&overrides, env).unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/lc/cli.db"));
        assert_eq!(config.reference_path, Some(PathBuf::from("/tmp/lc/env.json")));
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let overrides = ConfigOverrides {
            config_path: Some(PathBuf::from("/definitely/not/here.toml")),
            ..Default::default()
        };

        let result = AppConfig::resolve(&overrides, env_of(&[]));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_invalid_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "database_path = [not toml");

        let result = AppConfig::from_file(&path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_load_reference_with_catalogue_override() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("formats.csv");
        std::fs::write(&csv_path, "message_type,tag,name,format,mandatory\nmt700,20,Credit Number,16x,true\n").unwrap();

        let config = AppConfig {
            field_formats_path: Some(csv_path),
            ..AppConfig::default()
        };
        let reference = config.load_reference().unwrap();

        assert_eq!(reference.field_formats.len(), 1);
        assert!(!reference.equivalence_groups.is_empty());
    }

    #[test]
    fn test_default_database_path_is_named() {
        assert!(default_database_path().ends_with("lc_compliance.db"));
    }
}

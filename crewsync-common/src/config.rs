//! Configuration loading and root folder resolution
//!
//! The root folder holds the crewsync database. It is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. `CREWSYNC_ROOT_FOLDER`, then `CREWSYNC_ROOT` environment variables
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or malformed config file never aborts startup; it is logged and the
//! next source in the priority order is used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Primary environment variable for the root folder
pub const ROOT_FOLDER_ENV: &str = "CREWSYNC_ROOT_FOLDER";

/// Alternative environment variable, consulted after [`ROOT_FOLDER_ENV`]
pub const ROOT_ENV_ALIAS: &str = "CREWSYNC_ROOT";

/// Database file name inside the root folder unless the config overrides it
pub const DEFAULT_DATABASE_FILE: &str = "crewsync.db";

/// `[logging]` section of the TOML config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Contents of `config.toml`
///
/// ```toml
/// root_folder = "/srv/crewsync"
/// database_file = "crewsync.db"
///
/// [logging]
/// level = "debug"
/// file = "/var/log/crewsync/crewsync.log"   # optional, in addition to stderr
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub root_folder: Option<PathBuf>,
    #[serde(default)]
    pub database_file: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Parse config from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))
    }

    /// Load config from an explicit file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }
}

/// Values compiled into the binary, used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub database_file: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            database_file: DEFAULT_DATABASE_FILE.to_string(),
        }
    }
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/crewsync (or /var/lib/crewsync for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("crewsync"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/crewsync"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("crewsync"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/crewsync"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("crewsync"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\crewsync"))
    } else {
        PathBuf::from("./crewsync_data")
    }
}

/// Locate the platform config file, if one exists
pub fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("crewsync").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/crewsync/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Resolves the root folder following the documented priority order
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    config_file: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            cli_arg: None,
            config_file: None,
        }
    }

    /// Root folder given on the command line
    pub fn with_cli_arg(mut self, path: Option<impl Into<PathBuf>>) -> Self {
        self.cli_arg = path.map(Into::into);
        self
    }

    /// Use an explicit config file instead of the platform location
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Load the TOML config, falling back to defaults on any problem
    pub fn config(&self) -> TomlConfig {
        let path = match self.config_file.clone().or_else(default_config_file) {
            Some(path) => path,
            None => return TomlConfig::default(),
        };

        match TomlConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "{}: ignoring config file {}: {}",
                    self.module_name,
                    path.display(),
                    e
                );
                TomlConfig::default()
            }
        }
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        for var in [ROOT_FOLDER_ENV, ROOT_ENV_ALIAS] {
            if let Ok(path) = std::env::var(var) {
                if !path.trim().is_empty() {
                    return PathBuf::from(path);
                }
            }
        }

        if let Some(root) = self.config().root_folder {
            return root;
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Prepares the resolved root folder for use
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
    database_file: String,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self {
            root_folder,
            database_file: DEFAULT_DATABASE_FILE.to_string(),
        }
    }

    /// Override the database file name (from `database_file` in the TOML config)
    pub fn with_database_file(mut self, database_file: Option<String>) -> Self {
        if let Some(name) = database_file.filter(|n| !n.trim().is_empty()) {
            self.database_file = name;
        }
        self
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Create the root folder if missing; safe to call repeatedly
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(&self.database_file)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = TomlConfig::parse(
            r#"
            root_folder = "/srv/crewsync"
            database_file = "storm.db"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.root_folder, Some(PathBuf::from("/srv/crewsync")));
        assert_eq!(config.database_file.as_deref(), Some("storm.db"));
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_parse_logging_file() {
        let config = TomlConfig::parse(
            r#"
            [logging]
            file = "/var/log/crewsync/crewsync.log"
            "#,
        )
        .unwrap();

        assert_eq!(config.logging.level, "info");
        assert_eq!(
            config.logging.file,
            Some(PathBuf::from("/var/log/crewsync/crewsync.log"))
        );
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = TomlConfig::parse("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_malformed_config_is_config_error() {
        let err = TomlConfig::parse("root_folder = [").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_blank_database_file_override_is_ignored() {
        let init = RootFolderInitializer::new(PathBuf::from("/tmp/x"))
            .with_database_file(Some("  ".to_string()));
        assert_eq!(init.database_path(), PathBuf::from("/tmp/x").join(DEFAULT_DATABASE_FILE));
    }
}

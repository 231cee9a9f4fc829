//! Configuration for Stockboard, read from `stockboard.toml`.
//!
//! Values are layered file → environment → CLI flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [store]
//! db_path = ".stockboard/board.db"
//! collection = "kanban"
//! document = "allItems"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 3150
//! dev_mode = false
//!
//! [board]
//! default_category = "Kitchen"
//! remote_updates = "replace"   # or "warn"
//! distance_offset = 50.0
//! row_height = 120.0
//!
//! [user]
//! uid = "u-123"
//! display_name = "Sam"
//! email = "sam@example.com"
//!
//! [logging]
//! level = "info"
//! json = false
//! dir = ".stockboard/logs"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::board::controller::{ControllerOptions, RemoteUpdatePolicy};
use crate::board::gesture::{DEFAULT_ROW_HEIGHT, DISTANCE_OFFSET};
use crate::board::models::{Category, UserStamp};
use crate::board::server::ServerConfig;
use crate::board::store::DocumentKey;

pub const CONFIG_FILE: &str = "stockboard.toml";

pub const ENV_DB_PATH: &str = "STOCKBOARD_DB_PATH";
pub const ENV_PORT: &str = "STOCKBOARD_PORT";
pub const ENV_USER_UID: &str = "STOCKBOARD_USER_UID";
pub const ENV_USER_NAME: &str = "STOCKBOARD_USER_NAME";
pub const ENV_USER_EMAIL: &str = "STOCKBOARD_USER_EMAIL";

/// Where the shared document lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_document")]
    pub document: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".stockboard/board.db")
}

fn default_collection() -> String {
    "kanban".to_string()
}

fn default_document() -> String {
    "allItems".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            collection: default_collection(),
            document: default_document(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Permissive CORS and bind on all interfaces
    #[serde(default)]
    pub dev_mode: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3150
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dev_mode: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardSection {
    #[serde(default)]
    pub default_category: Category,
    #[serde(default)]
    pub remote_updates: RemoteUpdatePolicy,
    #[serde(default = "default_distance_offset")]
    pub distance_offset: f64,
    #[serde(default = "default_row_height")]
    pub row_height: f64,
}

fn default_distance_offset() -> f64 {
    DISTANCE_OFFSET
}

fn default_row_height() -> f64 {
    DEFAULT_ROW_HEIGHT
}

impl Default for BoardSection {
    fn default() -> Self {
        Self {
            default_category: Category::default(),
            remote_updates: RemoteUpdatePolicy::default(),
            distance_offset: default_distance_offset(),
            row_height: default_row_height(),
        }
    }
}

/// Identity used to stamp edits. Without a uid the session is signed out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSection {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    /// Directory for daily rolling log files
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            dir: None,
        }
    }
}

/// Root of `stockboard.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockboardToml {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub board: BoardSection,
    #[serde(default)]
    pub user: UserSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Values given on the command line; each one wins over file and environment.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub db_path: Option<PathBuf>,
    pub port: Option<u16>,
    pub dev_mode: bool,
    pub user: Option<String>,
    pub log_level: Option<String>,
}

impl StockboardToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse stockboard.toml")
    }

    /// Load `stockboard.toml` from `dir`, or defaults if there is none.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize stockboard.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply `STOCKBOARD_*` variables from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply `STOCKBOARD_*` variables from `lookup`.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = lookup(ENV_DB_PATH) {
            self.store.db_path = PathBuf::from(path);
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid {} '{}'", ENV_PORT, port))?;
        }
        if let Some(uid) = lookup(ENV_USER_UID) {
            self.user.uid = Some(uid);
        }
        if let Some(name) = lookup(ENV_USER_NAME) {
            self.user.display_name = Some(name);
        }
        if let Some(email) = lookup(ENV_USER_EMAIL) {
            self.user.email = Some(email);
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(path) = &overrides.db_path {
            self.store.db_path = path.clone();
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if overrides.dev_mode {
            self.server.dev_mode = true;
        }
        if let Some(uid) = &overrides.user {
            self.user.uid = Some(uid.clone());
        }
        if let Some(level) = &overrides.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Resolve the effective configuration for a project directory.
    ///
    /// An explicit `config_path` must exist; otherwise `stockboard.toml` in
    /// `project_dir` is used when present.
    pub fn resolve(project_dir: &Path, config_path: Option<&Path>, overrides: &CliOverrides) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => Self::load(path)?,
            None => Self::load_or_default(project_dir)?,
        };
        config.apply_env()?;
        config.apply_overrides(overrides);
        Ok(config)
    }

    /// Defaults plus env and CLI overrides, ignoring any config file.
    pub fn resolve_defaults(overrides: &CliOverrides) -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        config.apply_overrides(overrides);
        Ok(config)
    }

    /// Database path, relative paths taken from `project_dir`.
    pub fn db_path(&self, project_dir: &Path) -> PathBuf {
        if self.store.db_path.is_absolute() {
            self.store.db_path.clone()
        } else {
            project_dir.join(&self.store.db_path)
        }
    }

    pub fn document_key(&self) -> DocumentKey {
        DocumentKey::new(&self.store.collection, &self.store.document)
    }

    /// The configured user, if a uid is set.
    pub fn user_stamp(&self) -> Option<UserStamp> {
        let uid = self.user.uid.as_deref().filter(|u| !u.trim().is_empty())?;
        Some(UserStamp::new(
            uid,
            self.user.display_name.clone().unwrap_or_default(),
            self.user.email.clone().unwrap_or_default(),
        ))
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            default_category: self.board.default_category,
            remote_updates: self.board.remote_updates,
            distance_offset: self.board.distance_offset,
            row_height: self.board.row_height,
        }
    }

    pub fn server_config(&self, project_dir: &Path) -> ServerConfig {
        ServerConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            db_path: self.db_path(project_dir),
            dev_mode: self.server.dev_mode,
            board_key: self.document_key(),
            default_category: self.board.default_category,
        }
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.store.collection.is_empty() || self.store.collection.contains('/') {
            warnings.push(format!(
                "Invalid store.collection '{}': must be non-empty and contain no '/'",
                self.store.collection
            ));
        }
        if self.store.document.is_empty() || self.store.document.contains('/') {
            warnings.push(format!(
                "Invalid store.document '{}': must be non-empty and contain no '/'",
                self.store.document
            ));
        }
        if self.server.port == 0 {
            warnings.push("server.port is 0; an ephemeral port will be chosen".to_string());
        }
        if !self.board.distance_offset.is_finite() || self.board.distance_offset < 0.0 {
            warnings.push(format!(
                "Invalid board.distance_offset {}: should be a non-negative number",
                self.board.distance_offset
            ));
        }
        if !self.board.row_height.is_finite() || self.board.row_height <= 0.0 {
            warnings.push(format!(
                "Invalid board.row_height {}: should be a positive number",
                self.board.row_height
            ));
        }
        if self.user_stamp().is_none() {
            warnings.push("No [user] uid configured; saves will be refused".to_string());
        }
        if !matches!(
            self.logging.level.to_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            warnings.push(format!(
                "Unknown logging.level '{}': expected trace, debug, info, warn or error",
                self.logging.level
            ));
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = StockboardToml::default();
        assert_eq!(config.store.db_path, PathBuf::from(".stockboard/board.db"));
        assert_eq!(config.document_key().to_string(), "kanban/allItems");
        assert_eq!(config.server.port, 3150);
        assert_eq!(config.board.default_category, Category::Kitchen);
        assert_eq!(config.board.remote_updates, RemoteUpdatePolicy::Replace);
        assert_eq!(config.board.distance_offset, 50.0);
        assert_eq!(config.board.row_height, 120.0);
        assert_eq!(config.logging.level, "info");
        assert!(config.user_stamp().is_none());
    }

    #[test]
    fn test_parse_partial_file() {
        let config = StockboardToml::parse(
            r#"
            [board]
            default_category = "DonutStation"
            remote_updates = "warn"

            [user]
            uid = "u-9"
            display_name = "Dee"
            "#,
        )
        .unwrap();
        assert_eq!(config.board.default_category, Category::DonutStation);
        assert_eq!(config.board.remote_updates, RemoteUpdatePolicy::Warn);
        assert_eq!(config.board.row_height, 120.0);
        assert_eq!(config.server.port, 3150);
        let user = config.user_stamp().unwrap();
        assert_eq!(user.uid, "u-9");
        assert_eq!(user.display_name, "Dee");
        assert_eq!(user.email, "");
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        assert!(StockboardToml::parse("[board]\nremote_updates = \"merge\"").is_err());
        assert!(StockboardToml::parse("[board]\ndefault_category = \"Garage\"").is_err());
        assert!(StockboardToml::parse("[server]\nport = \"abc\"").is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        let mut config = StockboardToml::default();
        config.server.port = 4000;
        config.user.uid = Some("u-1".into());
        config.save(&path)?;

        let loaded = StockboardToml::load_or_default(dir.path())?;
        assert_eq!(loaded.server.port, 4000);
        assert_eq!(loaded.user.uid.as_deref(), Some("u-1"));
        Ok(())
    }

    #[test]
    fn test_load_or_default_without_file() -> Result<()> {
        let dir = tempdir()?;
        let config = StockboardToml::load_or_default(dir.path())?;
        assert_eq!(config.server.port, 3150);
        Ok(())
    }

    #[test]
    fn test_env_then_cli_layering() -> Result<()> {
        let mut config = StockboardToml::parse("[server]\nport = 4000\n[user]\nuid = \"file\"")?;
        config.apply_env_from(env(&[
            (ENV_PORT, "5000"),
            (ENV_USER_UID, "env-user"),
            (ENV_USER_EMAIL, "env@example.com"),
            (ENV_DB_PATH, "/tmp/env.db"),
        ]))?;
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.user.uid.as_deref(), Some("env-user"));
        assert_eq!(config.store.db_path, PathBuf::from("/tmp/env.db"));

        config.apply_overrides(&CliOverrides {
            port: Some(6000),
            user: Some("cli-user".into()),
            ..Default::default()
        });
        assert_eq!(config.server.port, 6000);
        assert_eq!(config.user.uid.as_deref(), Some("cli-user"));
        assert_eq!(config.user.email.as_deref(), Some("env@example.com"));
        Ok(())
    }

    #[test]
    fn test_invalid_env_port_is_error() {
        let mut config = StockboardToml::default();
        let err = config.apply_env_from(env(&[(ENV_PORT, "lots")])).unwrap_err();
        assert!(err.to_string().contains(ENV_PORT));
    }

    #[test]
    fn test_db_path_relative_to_project() {
        let config = StockboardToml::default();
        assert_eq!(
            config.db_path(Path::new("/srv/cafe")),
            PathBuf::from("/srv/cafe/.stockboard/board.db")
        );
        let mut config = StockboardToml::default();
        config.store.db_path = PathBuf::from("/var/lib/board.db");
        assert_eq!(
            config.db_path(Path::new("/srv/cafe")),
            PathBuf::from("/var/lib/board.db")
        );
    }

    #[test]
    fn test_validate_reports_warnings() {
        let mut config = StockboardToml::default();
        config.user.uid = Some("u-1".into());
        assert!(config.validate().is_empty());

        config.store.document = "a/b".into();
        config.board.row_height = 0.0;
        config.logging.level = "loud".into();
        config.user.uid = None;
        let warnings = config.validate();
        assert_eq!(warnings.len(), 4);
        assert!(warnings.iter().any(|w| w.contains("store.document")));
        assert!(warnings.iter().any(|w| w.contains("row_height")));
        assert!(warnings.iter().any(|w| w.contains("saves will be refused")));
    }

    #[test]
    fn test_controller_options_follow_board_section() {
        let config = StockboardToml::parse("[board]\ndistance_offset = 30.0\nremote_updates = \"warn\"").unwrap();
        let options = config.controller_options();
        assert_eq!(options.distance_offset, 30.0);
        assert_eq!(options.remote_updates, RemoteUpdatePolicy::Warn);
    }
}

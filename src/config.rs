//! Configuration loading and management
//!
//! Handles parsing of the `.todo.toml` file stored at the root of a todo
//! tree, and resolution of that root itself.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Name of the configuration file inside the todo root.
pub const CONFIG_FILE: &str = ".todo.toml";

/// Environment variable naming the todo root.
pub const ROOT_ENV: &str = "TODO_ROOT";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// How many consecutive numeric IDs to try when auto-allocating
    #[serde(default = "default_create_attempts")]
    pub create_attempts: usize,

    /// Editor command; overrides `$VISUAL` and `$EDITOR`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor: Option<String>,

    /// Days a task is snoozed for when no count is given
    #[serde(default = "default_snooze_days")]
    pub snooze_days: u32,

    /// List used when `-d` is not given
    #[serde(default = "default_list")]
    pub default_list: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_attempts: default_create_attempts(),
            editor: None,
            snooze_days: default_snooze_days(),
            default_list: default_list(),
        }
    }
}

fn default_create_attempts() -> usize {
    crate::list::DEFAULT_CREATE_ATTEMPTS
}

fn default_snooze_days() -> u32 {
    1
}

fn default_list() -> String {
    ".".to_string()
}

impl Config {
    /// Load configuration from a `.todo.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|err| Error::InvalidConfig(format!("{}: {err}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the todo root, or return defaults
    pub fn load_from_root(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %config_path.display(), error = %err, "ignoring config");
                Self::default()
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.create_attempts) {
            return Err(Error::InvalidConfig(
                "create_attempts must be between 1 and 100".to_string(),
            ));
        }
        if self.editor.as_deref().is_some_and(|ed| ed.trim().is_empty()) {
            return Err(Error::InvalidConfig("editor cannot be empty".to_string()));
        }
        let list = self.default_list.trim();
        if list.is_empty() || list.starts_with('/') || list.split('/').any(|part| part == "..") {
            return Err(Error::InvalidConfig(format!(
                "default_list '{}' must be a relative list name",
                self.default_list
            )));
        }
        Ok(())
    }
}

/// Pick the todo root: an explicit path wins, then `$HOME/todo`.
pub fn resolve_root(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(root) = explicit {
        return Ok(root);
    }
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join("todo"))
        .ok_or_else(|| {
            Error::InvalidConfig(format!("cannot find home directory; set {ROOT_ENV}"))
        })
}

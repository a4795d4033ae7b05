//! Configuration for the indexing engine.
//!
//! Layered resolution: built-in defaults, then `.quarry/config.toml` found by
//! walking up from the working directory, then environment variables.
//!
//! # Environment Variables
//!
//! Variables are prefixed with `QUARRY_` and use double underscores to
//! separate nested levels:
//! - `QUARRY_INDEXING__PARALLEL_THREADS=8` sets `indexing.parallel_threads`
//! - `QUARRY_SEMANTIC__ENABLED=true` sets `semantic.enabled`
//! - `QUARRY_MULTI_REPO=false` sets `multi_repo`
//!
//! Unknown variables under the prefix are ignored.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Search across all registered repositories rather than only the
    /// current workspace.
    #[serde(default = "default_true")]
    pub multi_repo: bool,

    /// Indexing configuration.
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Search configuration.
    #[serde(default)]
    pub search: SearchConfig,

    /// Optional semantic search backend.
    #[serde(default)]
    pub semantic: SemanticConfig,

    /// Logging levels.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexingConfig {
    /// Number of parser worker threads.
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,

    /// Capacity of the walker -> parser queue. The walker blocks when the
    /// queue is full so memory stays bounded regardless of repository size.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Files larger than this many bytes are skipped.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Directory names excluded from directory walks.
    #[serde(default = "default_ignore_dirs")]
    pub ignore_dirs: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    /// Default result limit when the caller does not provide one.
    #[serde(default = "default_search_limit")]
    pub default_limit: usize,

    /// Context lines included on each side of a match snippet.
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,

    /// Hard per-repository budget for one query, in milliseconds. Applies
    /// regardless of the caller's deadline.
    #[serde(default = "default_repo_budget_ms")]
    pub per_repo_budget_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SemanticConfig {
    /// Whether semantic search is enabled at all.
    #[serde(default = "default_false")]
    pub enabled: bool,

    /// API key for the embedding backend.
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default log level.
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides.
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_parallel_threads() -> usize {
    num_cpus::get()
}
fn default_queue_capacity() -> usize {
    256
}
fn default_max_file_size() -> u64 {
    1024 * 1024
}
fn default_ignore_dirs() -> Vec<String> {
    [
        ".git",
        "node_modules",
        "vendor",
        "__pycache__",
        "target",
        "build",
        "dist",
        ".venv",
        ".idea",
        ".gradle",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_search_limit() -> usize {
    20
}
fn default_context_lines() -> usize {
    2
}
fn default_repo_budget_ms() -> u64 {
    300
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            multi_repo: true,
            indexing: IndexingConfig::default(),
            search: SearchConfig::default(),
            semantic: SemanticConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            parallel_threads: default_parallel_threads(),
            queue_capacity: default_queue_capacity(),
            max_file_size: default_max_file_size(),
            ignore_dirs: default_ignore_dirs(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_search_limit(),
            context_lines: default_context_lines(),
            per_repo_budget_ms: default_repo_budget_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, figment::Error> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(".quarry/config.toml"));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file plus defaults and environment.
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("QUARRY_").map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
            .extract()
    }

    /// Find the workspace config by looking for a `.quarry` directory from
    /// the current directory up to the root.
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(".quarry");
            if config_dir.is_dir() {
                return Some(config_dir.join("config.toml"));
            }
        }
        None
    }

    /// Save current configuration to file.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<(), crate::IndexError> {
        let path = path.as_ref();
        let parent = path.parent().ok_or_else(|| crate::IndexError::Config {
            reason: format!("config path '{}' has no parent directory", path.display()),
        })?;
        std::fs::create_dir_all(parent).map_err(|source| crate::IndexError::FileWrite {
            path: parent.to_path_buf(),
            source,
        })?;

        let rendered = toml::to_string_pretty(self).map_err(|e| crate::IndexError::Config {
            reason: format!("failed to render config: {e}"),
        })?;
        std::fs::write(path, rendered).map_err(|source| crate::IndexError::FileWrite {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Create a default config file under `.quarry/`.
    pub fn init_config_file(force: bool) -> Result<PathBuf, crate::IndexError> {
        let config_path = PathBuf::from(".quarry/config.toml");
        if !force && config_path.exists() {
            return Err(crate::IndexError::Config {
                reason: "configuration file already exists; use --force to overwrite".to_string(),
            });
        }
        Settings::default().save(&config_path)?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert!(settings.multi_repo);
        assert_eq!(settings.indexing.max_file_size, 1024 * 1024);
        assert!(settings.indexing.ignore_dirs.iter().any(|d| d == ".git"));
        assert!(!settings.semantic.enabled);
        assert_eq!(settings.search.context_lines, 2);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let toml_content = r#"
version = 2
multi_repo = false

[indexing]
parallel_threads = 4
max_file_size = 2048
ignore_dirs = ["out"]

[search]
default_limit = 5
per_repo_budget_ms = 150

[semantic]
enabled = true
"#;
        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.version, 2);
        assert!(!settings.multi_repo);
        assert_eq!(settings.indexing.parallel_threads, 4);
        assert_eq!(settings.indexing.max_file_size, 2048);
        assert_eq!(settings.indexing.ignore_dirs, vec!["out"]);
        assert_eq!(settings.search.default_limit, 5);
        assert_eq!(settings.search.per_repo_budget_ms, 150);
        assert!(settings.semantic.enabled);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        fs::write(&config_path, "[indexing]\nparallel_threads = 16\n").unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.indexing.parallel_threads, 16);
        assert_eq!(settings.version, 1);
        assert_eq!(settings.search.default_limit, 20);
    }

    #[test]
    fn test_save_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("sub").join("config.toml");

        let mut settings = Settings::default();
        settings.indexing.parallel_threads = 2;
        settings.search.default_limit = 7;
        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.indexing.parallel_threads, 2);
        assert_eq!(loaded.search.default_limit, 7);
    }
}

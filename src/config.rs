//! Configuration loading and management
//!
//! # Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Global config: ~/.config/tidewater/config.toml
//! 3. Project config: .tidewater/config.toml
//! 4. Explicit file given with `--config`
//! 5. Environment variables: TIDEWATER_*
//! 6. CLI flags (`--checkout`, `--cluster`)
//!
//! # Example Config
//!
//! ```toml
//! [checkout]
//! root = "../fleet-config"
//! paths = ["apps", "infra"]
//!
//! [cluster]
//! snapshot = "cluster.yaml"
//!
//! [log]
//! level = "debug"
//! ```

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tidewater_core::{Error, Result};

const DEFAULT_ROOT: &str = ".";
const DEFAULT_LOG_LEVEL: &str = "info";
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

// ═══════════════════════════════════════════════════════════════════════════
// CONFIGURATION STRUCTURES
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub checkout: CheckoutConfig,
    pub cluster: ClusterConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct CheckoutConfig {
    /// Working tree holding the manifests.
    pub root: PathBuf,
    /// Manifest directories relative to `root`; empty means the whole tree.
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterConfig {
    /// YAML snapshot of the running workloads.
    pub snapshot: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
}

// ═══════════════════════════════════════════════════════════════════════════
// DEFAULT IMPLEMENTATIONS
// ═══════════════════════════════════════════════════════════════════════════

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            paths: Vec::new(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PUBLIC API
// ═══════════════════════════════════════════════════════════════════════════

/// Where configuration comes from.
pub struct Sources<'a> {
    pub global: Option<PathBuf>,
    pub project: Option<PathBuf>,
    pub explicit: Option<&'a Path>,
    pub env: &'a dyn Fn(&str) -> Option<String>,
}

/// Load configuration from the standard locations and the process
/// environment.
///
/// # Errors
///
/// Returns error if:
/// - A config file is unreadable or malformed TOML
/// - An environment override is invalid
/// - The merged config fails validation
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let env = |key: &str| std::env::var(key).ok();
    load_config_from(&Sources {
        global: global_config_path(),
        project: project_config_path()?,
        explicit,
        env: &env,
    })
}

/// Load configuration from explicit sources.
///
/// Missing global and project files are skipped; a missing explicit file is
/// an error.
///
/// # Errors
///
/// Same as [`load_config`].
pub fn load_config_from(sources: &Sources<'_>) -> Result<Config> {
    // 1. Start with built-in defaults
    let mut config = Config::default();

    // 2-3. Global, then project
    for path in [&sources.global, &sources.project].into_iter().flatten() {
        if path.exists() {
            config.merge(load_toml_file(path)?);
        }
    }

    // 4. Explicit file must exist
    if let Some(path) = sources.explicit {
        config.merge(load_toml_file(path)?);
    }

    // 5. Environment variable overrides
    config.apply_env_vars(sources.env)?;

    config.validate()?;
    Ok(config)
}

// ═══════════════════════════════════════════════════════════════════════════
// HELPER FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════

/// Get path to global config file
fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "tidewater")
        .map(|proj_dirs| proj_dirs.config_dir().join("config.toml"))
}

/// Get path to project config file
///
/// # Errors
///
/// Returns error if current directory cannot be determined
fn project_config_path() -> Result<Option<PathBuf>> {
    std::env::current_dir()
        .map(|dir| Some(dir.join(".tidewater/config.toml")))
        .map_err(|e| Error::invalid_config(format!("failed to get current directory: {e}")))
}

/// Load a TOML file into a partial Config
///
/// # Errors
///
/// Returns error if:
/// - File cannot be read
/// - TOML is malformed
fn load_toml_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::file_read_failed(path, e.to_string()))?;

    toml::from_str(&content).map_err(|e| Error::config_parse_failed(path, e.to_string()))
}

fn parse_paths(value: &str) -> Vec<PathBuf> {
    value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════
// MERGE IMPLEMENTATIONS
// ═══════════════════════════════════════════════════════════════════════════

impl CheckoutConfig {
    fn merge(&mut self, other: Self) {
        if other.root != Path::new(DEFAULT_ROOT) {
            self.root = other.root;
        }
        // Replace, not append
        if !other.paths.is_empty() {
            self.paths = other.paths;
        }
    }
}

impl ClusterConfig {
    fn merge(&mut self, other: Self) {
        if other.snapshot.is_some() {
            self.snapshot = other.snapshot;
        }
    }
}

impl LogConfig {
    fn merge(&mut self, other: Self) {
        if other.level != DEFAULT_LOG_LEVEL {
            self.level = other.level;
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CONFIG METHODS
// ═══════════════════════════════════════════════════════════════════════════

impl Config {
    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: Self) {
        self.checkout.merge(other.checkout);
        self.cluster.merge(other.cluster);
        self.log.merge(other.log);
    }

    /// Apply command-line overrides, the last layer.
    #[must_use]
    pub fn with_overrides(mut self, checkout: Option<PathBuf>, snapshot: Option<PathBuf>) -> Self {
        if let Some(root) = checkout {
            self.checkout.root = root;
        }
        if let Some(snapshot) = snapshot {
            self.cluster.snapshot = Some(snapshot);
        }
        self
    }

    /// Apply command-line overrides and validate the final configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the overridden config fails validation
    pub fn apply_cli(self, checkout: Option<PathBuf>, snapshot: Option<PathBuf>) -> Result<Self> {
        let config = self.with_overrides(checkout, snapshot);
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// # Errors
    ///
    /// Returns error if environment variable values are invalid
    fn apply_env_vars(&mut self, env: &dyn Fn(&str) -> Option<String>) -> Result<()> {
        // TIDEWATER_CHECKOUT_ROOT
        if let Some(value) = env("TIDEWATER_CHECKOUT_ROOT") {
            if value.trim().is_empty() {
                return Err(Error::invalid_config("TIDEWATER_CHECKOUT_ROOT is empty"));
            }
            self.checkout.root = PathBuf::from(value);
        }

        // TIDEWATER_CHECKOUT_PATHS, comma separated
        if let Some(value) = env("TIDEWATER_CHECKOUT_PATHS") {
            self.checkout.paths = parse_paths(&value);
        }

        // TIDEWATER_CLUSTER_SNAPSHOT
        if let Some(value) = env("TIDEWATER_CLUSTER_SNAPSHOT") {
            self.cluster.snapshot = Some(PathBuf::from(value)).filter(|p| !p.as_os_str().is_empty());
        }

        // TIDEWATER_LOG_LEVEL
        if let Some(value) = env("TIDEWATER_LOG_LEVEL") {
            self.log.level = value.to_lowercase();
        }

        Ok(())
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any values are out of range or invalid
    pub fn validate(&self) -> Result<()> {
        if self.checkout.root.as_os_str().is_empty() {
            return Err(Error::invalid_config("checkout.root must not be empty"));
        }

        if self
            .cluster
            .snapshot
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            return Err(Error::invalid_config("cluster.snapshot must not be empty"));
        }

        for path in &self.checkout.paths {
            let escapes = path
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if escapes {
                return Err(Error::invalid_config(format!(
                    "checkout.paths entry '{}' must be relative to the checkout root",
                    path.display()
                )));
            }
        }

        if !LOG_LEVELS.contains(&self.log.level.as_str()) {
            return Err(Error::invalid_config(format!(
                "log.level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.log.level
            )));
        }

        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write(dir: &Path, name: &str, contents: &str) -> Result<PathBuf> {
        let path = dir.join(name);
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    #[test]
    fn test_no_config_files_returns_defaults() -> Result<()> {
        let config = load_config_from(&Sources {
            global: None,
            project: Some(PathBuf::from("/nonexistent/.tidewater/config.toml")),
            explicit: None,
            env: &no_env,
        })?;
        assert_eq!(config, Config::default());
        assert_eq!(config.checkout.root, PathBuf::from("."));
        assert_eq!(config.log.level, "info");
        Ok(())
    }

    #[test]
    fn test_project_overrides_global() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let global = write(
            dir.path(),
            "global.toml",
            "[checkout]\nroot = \"/global\"\npaths = [\"apps\"]\n[log]\nlevel = \"debug\"\n",
        )?;
        let project = write(dir.path(), "project.toml", "[checkout]\nroot = \"/project\"\n")?;

        let config = load_config_from(&Sources {
            global: Some(global),
            project: Some(project),
            explicit: None,
            env: &no_env,
        })?;

        assert_eq!(config.checkout.root, PathBuf::from("/project"));
        assert_eq!(config.checkout.paths, vec![PathBuf::from("apps")]);
        assert_eq!(config.log.level, "debug");
        Ok(())
    }

    #[test]
    fn test_explicit_file_overrides_project() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let project = write(dir.path(), "project.toml", "[cluster]\nsnapshot = \"a.yaml\"\n")?;
        let explicit = write(dir.path(), "explicit.toml", "[cluster]\nsnapshot = \"b.yaml\"\n")?;

        let config = load_config_from(&Sources {
            global: None,
            project: Some(project),
            explicit: Some(&explicit),
            env: &no_env,
        })?;

        assert_eq!(config.cluster.snapshot, Some(PathBuf::from("b.yaml")));
        Ok(())
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = load_config_from(&Sources {
            global: None,
            project: None,
            explicit: Some(Path::new("/nonexistent/tidewater.toml")),
            env: &no_env,
        });
        assert!(matches!(result, Err(Error::FileReadFailed { .. })));
    }

    #[test]
    fn test_env_var_overrides_config() -> Result<()> {
        let vars: HashMap<&str, &str> = [
            ("TIDEWATER_CHECKOUT_ROOT", "/env/repo"),
            ("TIDEWATER_CHECKOUT_PATHS", "apps, infra ,"),
            ("TIDEWATER_CLUSTER_SNAPSHOT", "/env/cluster.yaml"),
            ("TIDEWATER_LOG_LEVEL", "WARN"),
        ]
        .into_iter()
        .collect();
        let env = |key: &str| vars.get(key).map(ToString::to_string);

        let config = load_config_from(&Sources {
            global: None,
            project: None,
            explicit: None,
            env: &env,
        })?;

        assert_eq!(config.checkout.root, PathBuf::from("/env/repo"));
        assert_eq!(
            config.checkout.paths,
            vec![PathBuf::from("apps"), PathBuf::from("infra")]
        );
        assert_eq!(config.cluster.snapshot, Some(PathBuf::from("/env/cluster.yaml")));
        assert_eq!(config.log.level, "warn");
        Ok(())
    }

    #[test]
    fn test_cli_overrides_are_last() {
        let config = Config::default().with_overrides(
            Some(PathBuf::from("/cli/repo")),
            Some(PathBuf::from("/cli/cluster.yaml")),
        );
        assert_eq!(config.checkout.root, PathBuf::from("/cli/repo"));
        assert_eq!(config.cluster.snapshot, Some(PathBuf::from("/cli/cluster.yaml")));
    }

    #[test]
    fn test_malformed_toml_returns_parse_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write(dir.path(), "bad.toml", "[checkout\nroot = ")?;

        let result = load_toml_file(&path);
        assert!(matches!(result, Err(Error::ConfigParseFailed { .. })));
        Ok(())
    }

    #[test]
    fn test_unknown_key_is_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write(dir.path(), "typo.toml", "[checkout]\nrooot = \"/x\"\n")?;

        assert!(load_toml_file(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_deep_merge_replaces_not_appends() {
        let mut base = Config::default();
        base.checkout.paths = vec![PathBuf::from("a"), PathBuf::from("b")];

        let mut other = Config::default();
        other.checkout.paths = vec![PathBuf::from("c")];
        base.merge(other);

        assert_eq!(base.checkout.paths, vec![PathBuf::from("c")]);
    }

    #[test]
    fn test_partial_config_keeps_earlier_values() {
        let mut base = Config::default();
        base.cluster.snapshot = Some(PathBuf::from("cluster.yaml"));
        base.log.level = "debug".to_string();

        base.merge(Config::default());

        assert_eq!(base.cluster.snapshot, Some(PathBuf::from("cluster.yaml")));
        assert_eq!(base.log.level, "debug");
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.log.level = "loud".to_string();

        let result = config.validate();
        assert!(result.is_err_and(|e| e.to_string().contains("log.level")));
    }

    #[test]
    fn test_paths_must_stay_inside_checkout() {
        for bad in ["/etc", "../sibling", "apps/../../x"] {
            let mut config = Config::default();
            config.checkout.paths = vec![PathBuf::from(bad)];
            assert!(config.validate().is_err(), "{bad} should be rejected");
        }

        let mut config = Config::default();
        config.checkout.paths = vec![PathBuf::from("./apps"), PathBuf::from("infra/base")];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_command_line_overrides_are_validated() {
        let result = Config::default().apply_cli(Some(PathBuf::new()), None);
        assert!(result.is_err_and(|e| e.to_string().contains("checkout.root")));

        let result = Config::default().apply_cli(None, Some(PathBuf::new()));
        assert!(result.is_err_and(|e| e.to_string().contains("cluster.snapshot")));

        let mut config = Config::default();
        config.log.level = "loud".to_string();
        assert!(config.apply_cli(Some(PathBuf::from("/repo")), None).is_err());
    }

    #[test]
    fn test_command_line_overrides_win() -> Result<()> {
        let config = Config::default()
            .apply_cli(Some(PathBuf::from("/repo")), Some(PathBuf::from("cluster.yaml")))?;
        assert_eq!(config.checkout.root, PathBuf::from("/repo"));
        assert_eq!(config.cluster.snapshot, Some(PathBuf::from("cluster.yaml")));
        Ok(())
    }

    #[test]
    fn test_global_config_path() {
        if let Some(path) = global_config_path() {
            assert!(path.ends_with("config.toml"));
        }
    }
}

//! Tool configuration
//!
//! Layered as built-in defaults, then `.hmr.toml` (or `--config`), then
//! command-line flags. The result is validated once and turned into the
//! engine's [`EngineConfig`].

use hmr_core::EngineConfig;
use hmr_watcher::IgnoreConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config file looked up in the watch root when `--config` is not given
pub const CONFIG_FILE_NAME: &str = ".hmr.toml";

/// Endpoint used when neither the command line nor the file names one
pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:9222";

const QUIET_WINDOW_RANGE: (u64, u64) = (1, 60_000);
const UPDATE_TIMEOUT_RANGE: (u64, u64) = (1, 600_000);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Contents of `.hmr.toml`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Debug endpoint: `host[:port]`, a bare port or a `ws://` url
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Directory to watch (default: current directory)
    #[serde(default)]
    pub watch: Option<PathBuf>,

    /// Quiet interval that closes a batch (default: 1000)
    #[serde(default = "default_quiet_window_ms")]
    pub quiet_window_ms: u64,

    /// Longest a non-empty batch may stay open (default: unbounded)
    #[serde(default)]
    pub max_wait_ms: Option<u64>,

    /// Bound on each remote update call (default: 5000)
    #[serde(default = "default_update_timeout_ms")]
    pub update_timeout_ms: u64,

    /// Push only the last change per file within a batch (default: true)
    #[serde(default = "default_true")]
    pub dedupe_changes: bool,

    /// Directory the remote process loads sources from, e.g. `/app`
    #[serde(default)]
    pub remote_root: Option<String>,

    #[serde(default)]
    pub ignore: IgnoreConfig,
}

fn default_quiet_window_ms() -> u64 {
    1000
}

fn default_update_timeout_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: None,
            watch: None,
            quiet_window_ms: default_quiet_window_ms(),
            max_wait_ms: None,
            update_timeout_ms: default_update_timeout_ms(),
            dedupe_changes: true,
            remote_root: None,
            ignore: IgnoreConfig::default(),
        }
    }
}

/// Values given on the command line; `None` leaves the lower layer alone
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub endpoint: Option<String>,
    pub watch: Option<PathBuf>,
    pub quiet_window_ms: Option<u64>,
    pub max_wait_ms: Option<u64>,
    pub update_timeout_ms: Option<u64>,
    pub no_dedupe: bool,
    pub remote_root: Option<String>,
}

impl Config {
    /// Parse a config file
    ///
    /// A relative `watch` is taken relative to the file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if let (Some(watch), Some(dir)) = (&config.watch, path.parent()) {
            if watch.is_relative() {
                config.watch = Some(dir.join(watch));
            }
        }

        Ok(config)
    }

    /// Find and load the config file for a run
    ///
    /// An explicit path must exist. Otherwise `.hmr.toml` in `watch_dir` is
    /// used when present, and defaults when not. Returns the file used.
    pub fn discover(
        explicit: Option<&Path>,
        watch_dir: &Path,
    ) -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Self::from_file(path)?, Some(path.to_path_buf())));
        }

        let candidate = watch_dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Ok((Self::from_file(&candidate)?, Some(candidate)));
        }

        Ok((Self::default(), None))
    }

    /// Apply command-line values on top
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(endpoint) = overrides.endpoint {
            self.endpoint = Some(endpoint);
        }
        if let Some(watch) = overrides.watch {
            self.watch = Some(watch);
        }
        if let Some(ms) = overrides.quiet_window_ms {
            self.quiet_window_ms = ms;
        }
        if let Some(ms) = overrides.max_wait_ms {
            self.max_wait_ms = Some(ms);
        }
        if let Some(ms) = overrides.update_timeout_ms {
            self.update_timeout_ms = ms;
        }
        if overrides.no_dedupe {
            self.dedupe_changes = false;
        }
        if let Some(root) = overrides.remote_root {
            self.remote_root = Some(root);
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = QUIET_WINDOW_RANGE;
        if !(min..=max).contains(&self.quiet_window_ms) {
            return Err(ConfigError::Invalid(format!(
                "quiet_window_ms must be between {} and {} (got {})",
                min, max, self.quiet_window_ms
            )));
        }

        let (min, max) = UPDATE_TIMEOUT_RANGE;
        if !(min..=max).contains(&self.update_timeout_ms) {
            return Err(ConfigError::Invalid(format!(
                "update_timeout_ms must be between {} and {} (got {})",
                min, max, self.update_timeout_ms
            )));
        }

        if let Some(max_wait) = self.max_wait_ms {
            if max_wait < self.quiet_window_ms {
                return Err(ConfigError::Invalid(format!(
                    "max_wait_ms ({}) must not be shorter than quiet_window_ms ({})",
                    max_wait, self.quiet_window_ms
                )));
            }
        }

        if matches!(self.endpoint.as_deref(), Some(e) if e.trim().is_empty()) {
            return Err(ConfigError::Invalid("endpoint must not be empty".to_string()));
        }

        Ok(())
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    pub fn watch_root(&self) -> PathBuf {
        self.watch.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            quiet_window: Duration::from_millis(self.quiet_window_ms),
            max_wait: self.max_wait_ms.map(Duration::from_millis),
            update_timeout: Duration::from_millis(self.update_timeout_ms),
            dedupe_changes: self.dedupe_changes,
            remote_root: self.remote_root.clone(),
        }
    }
}

/// Annotated example `.hmr.toml`
pub fn example_config() -> &'static str {
    r#"# hmr configuration
# Place as .hmr.toml in the watched directory, or pass --config PATH.
# Command-line flags take precedence over values in this file.

# Debug endpoint: host[:port], a bare port, or a ws:// debugger url
endpoint = "127.0.0.1:9222"

# Directory to watch, relative to this file
watch = "."

# Quiet interval that closes a batch, in milliseconds (1-60000)
quiet_window_ms = 1000

# Push a batch at the latest this long after its first event, even while
# edits keep coming (optional, at least quiet_window_ms)
# max_wait_ms = 10000

# Timeout for each remote update, in milliseconds (1-600000)
update_timeout_ms = 5000

# Push only the last change per file within a batch
dedupe_changes = true

# Directory the remote process loads its sources from
# remote_root = "/app"

[ignore]
# Skip files matched by the root .gitignore
use_gitignore = true

# Skip files matched by .hmrignore
use_hmrignore = true

# Extra gitignore-style patterns
additional_patterns = ["*.log", "coverage/"]
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        config.validate().unwrap();

        assert_eq!(config.endpoint(), DEFAULT_ENDPOINT);
        assert_eq!(config.watch_root(), PathBuf::from("."));
        assert_eq!(config.engine_config(), EngineConfig::default());
    }

    #[test]
    fn test_example_config_parses_and_validates() {
        let config: Config = toml::from_str(example_config()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.endpoint(), "127.0.0.1:9222");
        assert_eq!(config.quiet_window_ms, 1000);
        assert_eq!(config.ignore.additional_patterns, vec!["*.log", "coverage/"]);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str("quiet_window_ms = 250\n").unwrap();

        assert_eq!(config.quiet_window_ms, 250);
        assert_eq!(config.update_timeout_ms, 5000);
        assert!(config.dedupe_changes);
        assert!(config.ignore.use_gitignore);
        assert_eq!(config.max_wait_ms, None);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(toml::from_str::<Config>("quiet_window = 250\n").is_err());
    }

    #[test]
    fn test_validate_ranges() {
        let mut config = Config::default();

        config.quiet_window_ms = 0;
        assert!(config.validate().is_err());
        config.quiet_window_ms = 60_001;
        assert!(config.validate().is_err());
        config.quiet_window_ms = 500;
        config.validate().unwrap();

        config.update_timeout_ms = 0;
        assert!(config.validate().is_err());
        config.update_timeout_ms = 5000;

        config.max_wait_ms = Some(400);
        assert!(config.validate().is_err());
        config.max_wait_ms = Some(500);
        config.validate().unwrap();

        config.endpoint = Some("  ".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let mut config: Config = toml::from_str(
            r#"
            endpoint = "10.0.0.5:9229"
            quiet_window_ms = 200
            remote_root = "/srv"
            "#,
        )
        .unwrap();

        config.apply(Overrides {
            endpoint: Some("9230".to_string()),
            max_wait_ms: Some(3000),
            no_dedupe: true,
            ..Default::default()
        });

        assert_eq!(config.endpoint(), "9230");
        assert_eq!(config.quiet_window_ms, 200);
        assert_eq!(config.remote_root.as_deref(), Some("/srv"));

        let engine = config.engine_config();
        assert_eq!(engine.quiet_window, Duration::from_millis(200));
        assert_eq!(engine.max_wait, Some(Duration::from_millis(3000)));
        assert!(!engine.dedupe_changes);
    }

    #[test]
    fn test_discover_in_watch_dir() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        let (config, source) = Config::discover(None, root).unwrap();
        assert_eq!(config, Config::default());
        assert!(source.is_none());

        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(
            root.join(CONFIG_FILE_NAME),
            "watch = \"src\"\nupdate_timeout_ms = 750\n",
        )
        .unwrap();

        let (config, source) = Config::discover(None, root).unwrap();
        assert_eq!(source, Some(root.join(CONFIG_FILE_NAME)));
        assert_eq!(config.update_timeout_ms, 750);
        assert_eq!(config.watch_root(), root.join("src"));
    }

    #[test]
    fn test_discover_explicit_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.toml");

        match Config::discover(Some(&missing), temp_dir.path()) {
            Err(ConfigError::Read { path, .. }) => assert_eq!(path, missing),
            other => panic!("unexpected: {:?}", other),
        }
    }
}

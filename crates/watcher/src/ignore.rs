//! Ignore rules for the watch root
//!
//! Sources, highest priority first:
//! 1. Built-in patterns (`.git/`, `.hmr/`, `node_modules/`, editor temp files)
//! 2. `.hmrignore` at the watch root (optional, overrides `.gitignore`)
//! 3. `.gitignore` at the watch root (optional)
//! 4. Extra patterns from configuration (gitignore syntax)

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Directory names that are never watched
const BUILTIN_DIRS: &[&str] = &[".git", ".hmr", "node_modules"];

/// Combined ignore rules for one watch root
pub struct IgnoreRules {
    root: PathBuf,
    gitignore: Option<Gitignore>,
    hmrignore: Option<Gitignore>,
    additional: Option<Gitignore>,
    config: IgnoreConfig,
}

impl IgnoreRules {
    /// Load ignore rules for a watch root
    pub fn load(root: &Path, config: IgnoreConfig) -> Result<Self, ignore::Error> {
        let mut rules = Self {
            root: root.to_path_buf(),
            gitignore: None,
            hmrignore: None,
            additional: None,
            config,
        };

        rules.reload()?;
        Ok(rules)
    }

    /// Rebuild all pattern sets from disk and configuration
    pub fn reload(&mut self) -> Result<(), ignore::Error> {
        self.gitignore = if self.config.use_gitignore {
            self.load_file(".gitignore")?
        } else {
            None
        };

        self.hmrignore = if self.config.use_hmrignore {
            self.load_file(".hmrignore")?
        } else {
            None
        };

        self.additional = if self.config.additional_patterns.is_empty() {
            None
        } else {
            let mut builder = GitignoreBuilder::new(&self.root);
            for pattern in &self.config.additional_patterns {
                builder.add_line(None, pattern)?;
            }
            Some(builder.build()?)
        };

        Ok(())
    }

    fn load_file(&self, name: &str) -> Result<Option<Gitignore>, ignore::Error> {
        let path = self.root.join(name);
        if !path.exists() {
            return Ok(None);
        }

        let mut builder = GitignoreBuilder::new(&self.root);
        if let Some(err) = builder.add(&path) {
            return Err(err);
        }
        Ok(Some(builder.build()?))
    }

    /// Check if a root-relative path should be ignored
    pub fn should_ignore(&self, path: &Path, is_dir: bool) -> bool {
        if is_builtin_ignored(path) {
            return true;
        }

        // .hmrignore decides first, including whitelisting with `!pattern`
        if let Some(ref hmrignore) = self.hmrignore {
            let matched = hmrignore.matched_path_or_any_parents(path, is_dir);
            if matched.is_ignore() {
                return true;
            }
            if matched.is_whitelist() {
                return false;
            }
        }

        if let Some(ref gitignore) = self.gitignore {
            if gitignore.matched_path_or_any_parents(path, is_dir).is_ignore() {
                return true;
            }
        }

        if let Some(ref additional) = self.additional {
            if additional.matched_path_or_any_parents(path, is_dir).is_ignore() {
                return true;
            }
        }

        false
    }

    /// Number of active ignore sources (built-ins always count)
    pub fn active_sources(&self) -> usize {
        1 + [
            self.gitignore.is_some(),
            self.hmrignore.is_some(),
            self.additional.is_some(),
        ]
        .iter()
        .filter(|active| **active)
        .count()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Built-in directories and editor scratch files
fn is_builtin_ignored(path: &Path) -> bool {
    let in_builtin_dir = path.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .map(|name| BUILTIN_DIRS.contains(&name))
            .unwrap_or(false)
    });
    if in_builtin_dir {
        return true;
    }

    let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");

    // Vim swap files
    if filename.ends_with(".swp") || filename.ends_with(".swo") || filename.ends_with(".swx") {
        return true;
    }

    // Backup files (~), Emacs auto-save (#*#) and lock files (.#*)
    if filename.ends_with('~')
        || (filename.len() > 1 && filename.starts_with('#') && filename.ends_with('#'))
        || filename.starts_with(".#")
    {
        return true;
    }

    // Vim's 4913 write-test file and macOS metadata
    filename == "4913" || filename == ".DS_Store" || filename.starts_with("._")
}

/// Ignore configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IgnoreConfig {
    /// Use .gitignore patterns (default: true)
    #[serde(default = "default_true")]
    pub use_gitignore: bool,

    /// Use .hmrignore patterns (default: true)
    #[serde(default = "default_true")]
    pub use_hmrignore: bool,

    /// Additional patterns from config
    #[serde(default)]
    pub additional_patterns: Vec<String>,
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            use_gitignore: true,
            use_hmrignore: true,
            additional_patterns: vec![],
        }
    }
}

fn default_true() -> bool {
    true
}

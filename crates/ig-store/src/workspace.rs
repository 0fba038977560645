use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::config::Config;
use crate::error::Result;
use crate::store::SqliteStore;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "IG_DATA_DIR";
pub const DB_FILE: &str = "ideas.db";
pub const CONFIG_FILE: &str = "config.toml";

/// Default data directory: `~/.idea-graph`.
pub fn default_base_dir() -> PathBuf {
    dirs_home().join(".idea-graph")
}

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Make a name safe to use as an owner scope.
pub fn sanitize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Owner scope for this session.
///
/// Priority chain:
/// 1. Explicit `--owner`
/// 2. `owner` in `config.toml`
/// 3. CWD basename
fn resolve_owner(explicit: Option<&str>, config: &Config) -> String {
    for candidate in [explicit, config.owner.as_deref()].into_iter().flatten() {
        let sanitized = sanitize_name(candidate);
        if !sanitized.is_empty() {
            return sanitized;
        }
    }

    env::current_dir()
        .ok()
        .and_then(|cwd| cwd.file_name().map(|n| sanitize_name(&n.to_string_lossy())))
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "default".to_string())
}

/// An opened data directory: the database, its config and the active owner.
///
/// Layout:
/// ```text
/// ~/.idea-graph/
/// ├── config.toml   (optional)
/// └── ideas.db
/// ```
pub struct Workspace {
    base_dir: PathBuf,
    store: SqliteStore,
    config: Config,
    owner: String,
}

impl Workspace {
    /// Open the workspace, creating the directory as needed.
    /// `base_dir`: overrides the default location.
    /// `owner`: explicit owner scope (overrides config and auto-detection).
    pub fn open(base_dir: Option<&Path>, owner: Option<&str>) -> Result<Self> {
        let base_dir = base_dir.map(PathBuf::from).unwrap_or_else(default_base_dir);
        fs::create_dir_all(&base_dir)?;

        let config = Config::load(&base_dir.join(CONFIG_FILE))?;
        let owner = resolve_owner(owner, &config);
        let store = SqliteStore::open(&base_dir.join(DB_FILE))?;

        tracing::info!(dir = %base_dir.display(), owner = %owner, "workspace opened");
        Ok(Self {
            base_dir,
            store,
            config,
            owner,
        })
    }

    /// In-memory store with default config (for testing).
    pub fn open_in_memory(owner: &str) -> Result<Self> {
        Ok(Self {
            base_dir: PathBuf::new(),
            store: SqliteStore::open_in_memory()?,
            config: Config::default(),
            owner: owner.to_string(),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }
}

//! YAML configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.hubmirror/
//!   config.yaml     (mode 0600)
//!   runs/
//!     last-run.json
//! ```
//!
//! # API pattern
//!
//! Every filesystem function has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Credentials are never stored in the file; see [`Credentials`].

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{DatabaseId, IdentityStrategy, ItemKind, RepoRef};

pub const DEFAULT_BATCH_SIZE: usize = 50;
/// Upper bound on concurrent writes per batch.
pub const MAX_BATCH_SIZE: usize = 100;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const ENV_ISSUES_DATABASE: &str = "NOTION_DATABASE_ID_ISSUES";
pub const ENV_PRS_DATABASE: &str = "NOTION_DATABASE_ID_PR";
pub const ENV_BATCH_SIZE: &str = "HUBMIRROR_BATCH_SIZE";
pub const ENV_GITHUB_KEY: &str = "GITHUB_KEY";
pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const ENV_NOTION_KEY: &str = "NOTION_KEY";

// ---------------------------------------------------------------------------
// 1. Config types
// ---------------------------------------------------------------------------

/// Root of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub collections: Collections,
    #[serde(default)]
    pub properties: PropertyNames,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            collections: Collections::default(),
            properties: PropertyNames::default(),
        }
    }
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

/// The two mirrored collections. Either may be left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Collections {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issues: Option<CollectionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_requests: Option<CollectionConfig>,
}

/// One source stream paired with one sink database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub database_id: DatabaseId,
    #[serde(default)]
    pub source: SourceMode,
    #[serde(default)]
    pub identity: IdentityStrategy,
}

impl CollectionConfig {
    pub fn new(database_id: impl Into<DatabaseId>, source: SourceMode) -> Self {
        Self {
            database_id: database_id.into(),
            source,
            identity: IdentityStrategy::default(),
        }
    }
}

/// Which part of the source a collection mirrors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SourceMode {
    /// Items assigned to the authenticated user, across all repositories.
    #[default]
    Assigned,
    /// Every repository the user owns or collaborates on.
    Owned,
    /// A single fixed repository.
    Repository { owner: String, name: String },
}

impl SourceMode {
    pub fn repository(repo: &RepoRef) -> Self {
        SourceMode::Repository {
            owner: repo.owner.clone(),
            name: repo.name.clone(),
        }
    }

    /// `true` when items may come from more than one repository.
    pub fn spans_repositories(&self) -> bool {
        !matches!(self, SourceMode::Repository { .. })
    }
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceMode::Assigned => write!(f, "assigned"),
            SourceMode::Owned => write!(f, "owned"),
            SourceMode::Repository { owner, name } => write!(f, "repository {owner}/{name}"),
        }
    }
}

/// Names of the sink database properties the mirror writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyNames {
    pub title: String,
    pub number: String,
    pub repository: String,
    pub author: String,
    pub state: String,
    pub url: String,
    pub date: String,
}

impl Default for PropertyNames {
    fn default() -> Self {
        Self {
            title: "Name".to_string(),
            number: "ID".to_string(),
            repository: "Repository".to_string(),
            author: "Author".to_string(),
            state: "State".to_string(),
            url: "URL".to_string(),
            date: "Date".to_string(),
        }
    }
}

impl Config {
    /// Configured collections in a fixed order (issues first).
    pub fn collections(&self) -> Vec<(ItemKind, &CollectionConfig)> {
        let mut out = Vec::new();
        if let Some(c) = self.collections.issues.as_ref() {
            out.push((ItemKind::Issue, c));
        }
        if let Some(c) = self.collections.pull_requests.as_ref() {
            out.push((ItemKind::PullRequest, c));
        }
        out
    }

    /// Apply environment overrides through `lookup` (normally `std::env::var`).
    ///
    /// A database override for a collection missing from the file adds that
    /// collection with default source and identity settings.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(id) = non_empty(ENV_ISSUES_DATABASE) {
            override_database(&mut self.collections.issues, id, SourceMode::Assigned);
        }
        if let Some(id) = non_empty(ENV_PRS_DATABASE) {
            override_database(&mut self.collections.pull_requests, id, SourceMode::Owned);
        }
        if let Some(raw) = non_empty(ENV_BATCH_SIZE) {
            self.batch_size = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidOverride {
                    var: ENV_BATCH_SIZE,
                    value: raw.clone(),
                })?;
        }
        Ok(())
    }

    /// Check constraints. Returns non-fatal warnings on success.
    pub fn validate(&self) -> Result<Vec<String>, ConfigError> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::Invalid(format!(
                "batch_size must be between 1 and {MAX_BATCH_SIZE}, got {}",
                self.batch_size
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be positive".to_string(),
            ));
        }

        let collections = self.collections();
        if collections.is_empty() {
            return Err(ConfigError::Invalid(
                "no collections configured; set collections.issues or collections.pull_requests"
                    .to_string(),
            ));
        }

        let mut warnings = Vec::new();
        for (kind, collection) in collections {
            if collection.database_id.0.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "collections.{}.database_id is empty",
                    kind.collection()
                )));
            }
            if let SourceMode::Repository { owner, name } = &collection.source {
                if owner.is_empty() || name.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "collections.{}.source needs both owner and name",
                        kind.collection()
                    )));
                }
            }
            if collection.identity == IdentityStrategy::Number
                && collection.source.spans_repositories()
            {
                warnings.push(format!(
                    "collections.{}: number identity with {} source; numbers repeat across repositories",
                    kind.collection(),
                    collection.source
                ));
            }
        }
        Ok(warnings)
    }
}

fn override_database(slot: &mut Option<CollectionConfig>, id: String, source: SourceMode) {
    match slot {
        Some(existing) => existing.database_id = DatabaseId(id),
        None => *slot = Some(CollectionConfig::new(id, source)),
    }
}

// ---------------------------------------------------------------------------
// 2. Credentials
// ---------------------------------------------------------------------------

/// API tokens, read from the environment only.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub github_token: String,
    pub notion_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("github_token", &"<redacted>")
            .field("notion_token", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read tokens through `lookup`. `GITHUB_KEY` wins over `GITHUB_TOKEN`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let github_token = non_empty(ENV_GITHUB_KEY)
            .or_else(|| non_empty(ENV_GITHUB_TOKEN))
            .ok_or(ConfigError::MissingCredential {
                var: ENV_GITHUB_KEY,
            })?;
        let notion_token = non_empty(ENV_NOTION_KEY).ok_or(ConfigError::MissingCredential {
            var: ENV_NOTION_KEY,
        })?;
        Ok(Self {
            github_token,
            notion_token,
        })
    }

    /// `from_lookup` over the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }
}

// ---------------------------------------------------------------------------
// 3. Paths
// ---------------------------------------------------------------------------

/// `<home>/.hubmirror/`
pub fn root_dir_at(home: &Path) -> PathBuf {
    home.join(".hubmirror")
}

/// `<home>/.hubmirror/config.yaml`, pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    root_dir_at(home).join("config.yaml")
}

// ---------------------------------------------------------------------------
// 4. Load / save
// ---------------------------------------------------------------------------

/// Load `config.yaml` under `home`.
///
/// Returns `ConfigError::ConfigNotFound` if absent, `ConfigError::Parse`
/// (with path) if malformed.
pub fn load_at(home: &Path) -> Result<Config, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound { path });
    }
    let contents = std::fs::read_to_string(&path)?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Config, ConfigError> {
    load_at(&home()?)
}

/// Load, apply process-environment overrides and validate.
///
/// Returns the effective config and any validation warnings.
pub fn load_effective_at(home: &Path) -> Result<(Config, Vec<String>), ConfigError> {
    let mut config = match load_at(home) {
        Ok(config) => config,
        // Env-only setups are allowed: overrides may supply every collection.
        Err(ConfigError::ConfigNotFound { .. }) if has_env_collections() => Config::default(),
        Err(err) => return Err(err),
    };
    config.apply_env(|var| std::env::var(var).ok())?;
    let warnings = config.validate()?;
    Ok((config, warnings))
}

fn has_env_collections() -> bool {
    [ENV_ISSUES_DATABASE, ENV_PRS_DATABASE]
        .iter()
        .any(|var| std::env::var(var).map(|v| !v.trim().is_empty()).unwrap_or(false))
}

/// Atomically save `config` to `<home>/.hubmirror/config.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, config: &Config) -> Result<PathBuf, ConfigError> {
    let dir = root_dir_at(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    let path = config_path_at(home);
    let tmp_path = path.with_file_name("config.yaml.tmp");

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    if let Err(e) = std::fs::rename(&tmp_path, &path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(path)
}

/// `save_at` convenience wrapper.
pub fn save(config: &Config) -> Result<PathBuf, ConfigError> {
    save_at(&home()?, config)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Resolve the user's home directory.
pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

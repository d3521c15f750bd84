//! Configuration for depot.
//!
//! Built once at startup and passed by reference to whatever needs it.
//! Sources, lowest to highest precedence:
//!
//! 1. built-in defaults ([`Config::default`]),
//! 2. a configuration file (TOML, YAML or JSON, picked by extension),
//! 3. `DEPOT_`-prefixed environment variables, with `__` separating nested
//!    keys (`DEPOT_JANITOR__DESIRED_PERCENT_FREE=15`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "DEPOT_";
const DEFAULT_FILE_NAME: &str = "config.toml";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "depot")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the bundle directory (`uploads/` and `dbs/` live underneath).
    pub bundle_dir: PathBuf,
    pub cache: CacheConfig,
    pub janitor: JanitorConfig,
}

impl Default for Config {
    fn default() -> Self {
        let bundle_dir = project_dirs()
            .map(|dirs| dirs.data_dir().join("bundles"))
            .unwrap_or_else(|| PathBuf::from("bundles"));
        Self { bundle_dir, cache: CacheConfig::default(), janitor: JanitorConfig::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of open bundle databases.
    pub database_capacity: u64,
    /// Total cost of cached decoded documents.
    pub document_capacity: u64,
    /// Total cost of cached decoded result chunks.
    pub result_chunk_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { database_capacity: 100, document_capacity: 100_000, result_chunk_capacity: 100_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JanitorConfig {
    pub interval_secs: u64,
    /// Uploads that haven't been converted within this long are abandoned.
    pub max_unconverted_upload_age_secs: u64,
    /// Percentage of the filesystem to keep free by evicting bundles.
    pub desired_percent_free: u8,
    /// Number of bundle ids per state lookup.
    pub dead_dump_batch_size: usize,
}

impl JanitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn max_unconverted_upload_age(&self) -> Duration {
        Duration::from_secs(self.max_unconverted_upload_age_secs)
    }
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            max_unconverted_upload_age_secs: 24 * 60 * 60,
            desired_percent_free: 10,
            dead_dump_batch_size: 100,
        }
    }
}

impl Config {
    /// Load configuration from defaults, `path` (or the default file, if it
    /// exists) and the environment, then validate it.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: Self = Self::figment(path)?.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        tracing::debug!(bundle_dir = %config.bundle_dir.display(), "Loaded configuration");
        Ok(config)
    }

    /// The layered sources without extracting them.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        match path {
            Some(path) if !path.exists() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => figment = Self::merge_file(figment, path)?,
            None => {
                if let Some(path) = Self::default_path().filter(|p| p.exists()) {
                    tracing::debug!(path = %path.display(), "Using default configuration file");
                    figment = Self::merge_file(figment, &path)?;
                }
            },
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// `config.toml` in the platform configuration directory.
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(DEFAULT_FILE_NAME))
    }

    fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
        let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
        Ok(match extension.as_deref() {
            Some("toml") => figment.merge(Toml::file_exact(path)),
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
            Some("json") => figment.merge(Json::file_exact(path)),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
        })
    }

    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("cache.database_capacity", self.cache.database_capacity > 0),
            ("cache.document_capacity", self.cache.document_capacity > 0),
            ("cache.result_chunk_capacity", self.cache.result_chunk_capacity > 0),
            ("janitor.interval_secs", self.janitor.interval_secs > 0),
            ("janitor.desired_percent_free", self.janitor.desired_percent_free <= 100),
            ("janitor.dead_dump_batch_size", self.janitor.dead_dump_batch_size > 0),
        ];
        if let Some((field, _)) = checks.into_iter().find(|(_, ok)| !ok) {
            exn::bail!(ErrorKind::Invalid(field));
        }
        Ok(())
    }
}

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::NucError;

pub const DEFAULT_EFETCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";
pub const DEFAULT_DATABASE: &str = "nucleotide";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_BIND: &str = "127.0.0.1:8000";
pub const DEFAULT_RECORD_ID: &str = "30271926";
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Environment variable naming a config file when `--config` is absent.
pub const CONFIG_ENV: &str = "NUCSEARCH_CONFIG";

/// Top-level configuration. Every field has a default, so an empty file
/// (or no file at all) is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub eutils: EutilsConfig,
    pub cache: CacheConfig,
    pub service: ServiceConfig,
}

/// Where and how records are requested.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EutilsConfig {
    pub base_url: String,
    pub database: String,
    /// Transport timeout for a single request. 0 disables it.
    pub timeout_secs: u64,
}

impl Default for EutilsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_EFETCH_URL.into(),
            database: DEFAULT_DATABASE.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub bind: String,
    /// Record searched when a request does not name one.
    pub record_id: String,
    pub page_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.into(),
            record_id: DEFAULT_RECORD_ID.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Config {
    /// Load from `path`, falling back to `$NUCSEARCH_CONFIG`, then to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, NucError> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        match path.map(Path::to_path_buf).or(from_env) {
            Some(p) => Self::from_file(&p),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, NucError> {
        let text = fs::read_to_string(path).map_err(|e| NucError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&text, path)
    }

    /// Parse TOML text. `origin` is only used in error messages.
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self, NucError> {
        let config: Self = toml::from_str(text).map_err(|e| NucError::Config {
            path: origin.to_path_buf(),
            reason: e.message().to_string(),
        })?;
        config.validate(origin)?;
        Ok(config)
    }

    fn validate(&self, origin: &Path) -> Result<(), NucError> {
        let invalid = |reason: &str| NucError::Config {
            path: origin.to_path_buf(),
            reason: reason.to_string(),
        };
        if self.eutils.database.trim().is_empty() {
            return Err(invalid("eutils.database must not be empty"));
        }
        if self.eutils.base_url.trim().is_empty() {
            return Err(invalid("eutils.base_url must not be empty"));
        }
        if self.service.page_size == 0 {
            return Err(invalid("service.page_size must be at least 1"));
        }
        Ok(())
    }
}

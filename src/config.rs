//! Settings loading with env-var overrides.
//!
//! Reads a TOML file (`forgechain.toml` in the working directory unless
//! `FORGECHAIN_CONFIG` names another), then applies `FORGECHAIN_*` overrides.
//! Every key is optional:
//!
//! ```toml
//! [llm]
//! verbose = true
//! cache = true            # omit to cache whenever a backend is configured
//!
//! [cache]
//! backend = "file"        # "none" | "memory" | "file"
//! path = ".forgechain/cache.json"
//!
//! [retry]
//! max_attempts = 6
//! min_delay = "500ms"
//! max_delay = "10s"
//! strategy = "exponential_backoff_with_jitter"
//! only_retry_rate_limits = false
//! ```

use crate::cache::{Cache, CacheError, FileCache, InMemoryCache};
use crate::llm::{BaseLLM, LLM, LLMFactory, RetryConfig, RetryStrategy};
use serde::{Deserialize, Deserializer};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_CONFIG_PATH: &str = "forgechain.toml";
const DEFAULT_CACHE_PATH: &str = ".forgechain/cache.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
    #[error("cannot open cache: {0}")]
    Cache(#[from] CacheError),
}

/// Which cache backend to build at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    None,
    Memory,
    File,
}

impl std::str::FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(CacheBackend::None),
            "memory" => Ok(CacheBackend::Memory),
            "file" => Ok(CacheBackend::File),
            other => Err(format!("unknown cache backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Passed to callbacks as the verbosity flag.
    pub verbose: bool,
    /// Forces caching on or off; unset means "cache when a backend exists".
    pub cache: Option<bool>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            verbose: true,
            cache: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub backend: CacheBackend,
    /// Location of the file backend; `.forgechain/cache.json` when unset.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: usize,
    #[serde(deserialize_with = "humantime_duration")]
    pub min_delay: Duration,
    #[serde(deserialize_with = "humantime_duration")]
    pub max_delay: Duration,
    pub strategy: RetryStrategy,
    pub only_retry_rate_limits: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            min_delay: defaults.min_delay,
            max_delay: defaults.max_delay,
            strategy: defaults.strategy,
            only_retry_rate_limits: defaults.only_retry_rate_limits,
        }
    }
}

/// Fully-resolved settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub llm: LlmSettings,
    pub cache: CacheSettings,
    pub retry: RetrySettings,
}

fn humantime_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}

impl Settings {
    /// Loads `.env`, reads the settings file and applies env-var overrides.
    ///
    /// A missing settings file is not an error; defaults are used instead.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let path = env::var("FORGECHAIN_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let path = Path::new(&path);
        let mut settings = if path.exists() {
            Self::load(path)?
        } else {
            debug!(path = %path.display(), "No settings file, using defaults");
            Self::default()
        };
        settings.apply_overrides(|key| env::var(key).ok())?;
        Ok(settings)
    }

    /// Reads settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml_str(&raw)?;
        info!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Applies `FORGECHAIN_*` overrides read through `lookup`.
    ///
    /// Tests pass a closure over a map instead of mutating the process
    /// environment.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("FORGECHAIN_VERBOSE") {
            self.llm.verbose = parse_override("FORGECHAIN_VERBOSE", &value)?;
        }
        if let Some(value) = lookup("FORGECHAIN_USE_CACHE") {
            self.llm.cache = Some(parse_override("FORGECHAIN_USE_CACHE", &value)?);
        }
        if let Some(value) = lookup("FORGECHAIN_CACHE_BACKEND") {
            self.cache.backend = parse_override("FORGECHAIN_CACHE_BACKEND", &value)?;
        }
        if let Some(value) = lookup("FORGECHAIN_CACHE_PATH") {
            self.cache.path = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup("FORGECHAIN_MAX_ATTEMPTS") {
            self.retry.max_attempts = parse_override("FORGECHAIN_MAX_ATTEMPTS", &value)?;
        }
        Ok(())
    }

    pub fn retry_config(&self) -> RetryConfig {
        let mut config = RetryConfig::new(
            self.retry.max_attempts,
            self.retry.min_delay,
            self.retry.max_delay,
            self.retry.strategy,
        );
        config.only_retry_rate_limits = self.retry.only_retry_rate_limits;
        config
    }

    /// Builds the configured cache backend. Call once and share the result.
    pub async fn build_cache(&self) -> Result<Option<Arc<dyn Cache>>, ConfigError> {
        let cache: Option<Arc<dyn Cache>> = match self.cache.backend {
            CacheBackend::None => None,
            CacheBackend::Memory => Some(Arc::new(InMemoryCache::new())),
            CacheBackend::File => {
                let path = self
                    .cache
                    .path
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_PATH));
                Some(Arc::new(FileCache::open(path).await?))
            }
        };
        debug!(backend = ?self.cache.backend, "Built cache backend");
        Ok(cache)
    }

    /// Wraps `provider` in the configured retry decorator and an orchestrator
    /// using the configured cache and verbosity.
    pub async fn build_llm(&self, provider: Arc<dyn LLM>) -> Result<BaseLLM, ConfigError> {
        let provider = LLMFactory::create(provider, Some(self.retry_config()));
        let mut llm = BaseLLM::new(provider).with_verbose(self.llm.verbose);
        if let Some(cache) = self.build_cache().await? {
            llm = llm.with_cache(cache);
        }
        if let Some(use_cache) = self.llm.cache {
            llm = llm.with_use_cache(use_cache);
        }
        Ok(llm)
    }
}

fn parse_override<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

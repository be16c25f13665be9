//! Configuration loading for the affiliate console.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `AFFILIATE_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const ENV_PREFIX: &str = "AFFILIATE_";

/// Application configuration derived from `AFFILIATE_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Per-page query cache parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct CacheConfig {
    /// How long a successful list result is served without refetching (default: 30)
    ///
    /// Environment variable: `AFFILIATE_CACHE_TTL_SECONDS`
    #[serde(default = "default_cache_ttl_seconds")]
    pub ttl_seconds: u64,

    /// Maximum number of distinct query keys kept per page (default: 64)
    ///
    /// Environment variable: `AFFILIATE_CACHE_CAPACITY`
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_cache_ttl_seconds(),
            capacity: default_cache_capacity(),
        }
    }
}

impl CacheConfig {
    /// Validate cache bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl_seconds == 0 || self.ttl_seconds > 3600 {
            return Err(ConfigError::InvalidCacheTtl {
                value: self.ttl_seconds,
            });
        }

        if self.capacity == 0 || self.capacity > 10_000 {
            return Err(ConfigError::InvalidCacheCapacity {
                value: self.capacity,
            });
        }

        Ok(())
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_base_url: default_api_base_url(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            request_timeout_ms: default_request_timeout_ms(),
            page_size: default_page_size(),
            cache: CacheConfig::default(),
            access_token: None,
            refresh_token: None,
        }
    }
}

impl AppConfig {
    /// Returns the API root as a parsed URL.
    pub fn api_base(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.api_base_url).map_err(|source| ConfigError::InvalidApiBaseUrl {
            value: self.api_base_url.clone(),
            reason: source.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(ConfigError::InvalidApiBaseUrl {
                value: self.api_base_url.clone(),
                reason: "expected an absolute http(s) URL".to_string(),
            });
        }

        Ok(url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Returns a redacted JSON representation (tokens are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.access_token.is_some() {
            config.access_token = Some("[REDACTED]".to_string());
        }
        if config.refresh_token.is_some() {
            config.refresh_token = Some("[REDACTED]".to_string());
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api_base()?;

        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }

        if self.request_timeout_ms < 100 || self.request_timeout_ms > 120_000 {
            return Err(ConfigError::InvalidRequestTimeout {
                value: self.request_timeout_ms,
            });
        }

        if self.page_size == 0 || self.page_size > 100 {
            return Err(ConfigError::InvalidPageSize {
                value: self.page_size,
            });
        }

        self.cache.validate()?;

        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_base_url() -> String {
    "http://localhost:4000/api/v1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_page_size() -> u32 {
    10
}

fn default_cache_ttl_seconds() -> u64 {
    30
}

fn default_cache_capacity() -> usize {
    64
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
    #[error("invalid API base URL '{value}': {reason}")]
    InvalidApiBaseUrl { value: String, reason: String },
    #[error("log format must be 'json' or 'pretty', got '{value}'")]
    InvalidLogFormat { value: String },
    #[error("request timeout must be between 100 and 120000 ms, got {value}")]
    InvalidRequestTimeout { value: u64 },
    #[error("page size must be between 1 and 100, got {value}")]
    InvalidPageSize { value: u32 },
    #[error("cache TTL must be between 1 and 3600 seconds, got {value}")]
    InvalidCacheTtl { value: u64 },
    #[error("cache capacity must be between 1 and 10000 entries, got {value}")]
    InvalidCacheCapacity { value: usize },
    #[error("invalid numeric value '{value}' for {key}")]
    InvalidNumber { key: &'static str, value: String },
}

/// Loads configuration from layered env files and the process environment.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads `.env` layers, overlays the process environment and validates the result.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = take_string(&mut layered, "PROFILE").unwrap_or(profile_hint);
        let api_base_url =
            take_string(&mut layered, "API_BASE_URL").unwrap_or_else(default_api_base_url);
        let log_level = take_string(&mut layered, "LOG_LEVEL").unwrap_or_else(default_log_level);
        let log_format =
            take_string(&mut layered, "LOG_FORMAT").unwrap_or_else(default_log_format);
        let request_timeout_ms = take_number(&mut layered, "REQUEST_TIMEOUT_MS")?
            .unwrap_or_else(default_request_timeout_ms);
        let page_size = take_number(&mut layered, "PAGE_SIZE")?.unwrap_or_else(default_page_size);
        let cache = CacheConfig {
            ttl_seconds: take_number(&mut layered, "CACHE_TTL_SECONDS")?
                .unwrap_or_else(default_cache_ttl_seconds),
            capacity: take_number(&mut layered, "CACHE_CAPACITY")?
                .unwrap_or_else(default_cache_capacity),
        };
        let access_token = take_string(&mut layered, "ACCESS_TOKEN");
        let refresh_token = take_string(&mut layered, "REFRESH_TOKEN");

        let config = AppConfig {
            profile,
            api_base_url,
            log_level,
            log_format,
            request_timeout_ms,
            page_size,
            cache,
            access_token,
            refresh_token,
        };

        config.validate()?;
        Ok(config)
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{ENV_PREFIX}PROFILE"))
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn take_string(layered: &mut BTreeMap<String, String>, key: &str) -> Option<String> {
    layered
        .remove(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn take_number<N: std::str::FromStr>(
    layered: &mut BTreeMap<String, String>,
    key: &'static str,
) -> Result<Option<N>, ConfigError> {
    match take_string(layered, key) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
        None => Ok(None),
    }
}

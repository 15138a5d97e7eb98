//! Rate engine configuration.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::Duration;
use fxquery_common::{constants, Currency};

use crate::error::{FxError, FxResult};

/// Upstream provider configuration.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of the Open Exchange Rates compatible API.
    pub base_url: String,
    /// Application id sent as `app_id`.
    pub app_id: String,
    /// Request timeout.
    pub request_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openexchangerates.org/api".to_string(),
            app_id: String::new(),
            request_timeout: constants::default_request_timeout(),
        }
    }
}

/// Where snapshots are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    /// One JSON file per key under a directory.
    File(PathBuf),
    /// Process-local map; lost on exit.
    Memory,
    /// Shared key-value cache at the given Redis URL.
    Redis(String),
}

/// Redis URL used when `CACHE_BACKEND=redis` and `REDIS_URL` is unset.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Backing store.
    pub backend: CacheBackend,
    /// Age after which the latest snapshot is stale.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::File(PathBuf::from("./.fxquery-cache")),
            ttl: constants::default_cache_ttl(),
        }
    }
}

/// Main engine configuration.
#[derive(Debug, Clone)]
pub struct FxConfig {
    /// Currency all rates are quoted against.
    pub base_currency: Currency,
    /// Decimal places of conversion results.
    pub precision: u32,
    /// Provider configuration.
    pub provider: ProviderConfig,
    /// Cache configuration.
    pub cache: CacheConfig,
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            base_currency: Currency::usd(),
            precision: 2,
            provider: ProviderConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl FxConfig {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is read first when present; variables
    /// already set in the environment take precedence.
    pub fn from_env() -> FxResult<Self> {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();

        if let Ok(app_id) = std::env::var("APP_ID") {
            config.provider.app_id = app_id;
        }

        if let Ok(url) = std::env::var("PROVIDER_URL") {
            config.provider.base_url = url;
        }

        if let Some(timeout) = seconds_var("REQUEST_TIMEOUT_SECONDS")? {
            config.provider.request_timeout = timeout;
        }

        if let Ok(base) = std::env::var("BASE_CURRENCY") {
            config.base_currency = Currency::new(base);
        }

        if let Some(precision) = parse_var::<u32>("PRECISION")? {
            config.precision = precision;
        }

        if let Some(ttl) = seconds_var("CACHE_EXPIRY_IN_SECONDS")? {
            config.cache.ttl = ttl;
        }

        let dir = std::env::var("CACHE_DIR").ok();
        match std::env::var("CACHE_BACKEND").as_deref() {
            Ok("memory") => config.cache.backend = CacheBackend::Memory,
            Ok("redis") => {
                let url =
                    std::env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string());
                config.cache.backend = CacheBackend::Redis(url);
            }
            Ok("file") | Err(_) => {
                if let Some(dir) = dir {
                    config.cache.backend = CacheBackend::File(PathBuf::from(dir));
                }
            }
            Ok(other) => {
                return Err(FxError::Configuration(format!(
                    "CACHE_BACKEND must be 'file', 'memory' or 'redis', got '{}'",
                    other
                )))
            }
        }

        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_currency.is_empty() {
            return Err("Base currency cannot be empty".to_string());
        }

        // rust_decimal carries at most 28 fractional digits
        if self.precision > 28 {
            return Err("Precision cannot exceed 28 decimal places".to_string());
        }

        if !(self.provider.base_url.starts_with("http://")
            || self.provider.base_url.starts_with("https://"))
        {
            return Err(format!(
                "Provider URL must be http(s), got '{}'",
                self.provider.base_url
            ));
        }

        if self.provider.request_timeout <= Duration::zero() {
            return Err("Request timeout must be positive".to_string());
        }

        if self.cache.ttl < Duration::zero() {
            return Err("Cache expiry cannot be negative".to_string());
        }

        match &self.cache.backend {
            CacheBackend::File(dir) if dir.as_os_str().is_empty() => {
                return Err("Cache directory cannot be empty".to_string());
            }
            CacheBackend::Redis(url) if url.trim().is_empty() => {
                return Err("Redis URL cannot be empty".to_string());
            }
            _ => {}
        }

        Ok(())
    }
}

fn seconds_var(name: &str) -> FxResult<Option<Duration>> {
    parse_var::<i64>(name)?
        .map(|seconds| seconds_to_duration(name, seconds))
        .transpose()
}

fn seconds_to_duration(name: &str, seconds: i64) -> FxResult<Duration> {
    Duration::try_seconds(seconds).ok_or_else(|| {
        FxError::Configuration(format!("{} is out of range: {}", name, seconds))
    })
}

fn parse_var<T: FromStr>(name: &str) -> FxResult<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| FxError::Configuration(format!("{} is not valid: {}", name, e))),
        Err(_) => Ok(None),
    }
}

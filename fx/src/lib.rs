//! fxquery rate engine
//!
//! Resolves exchange rate tables and converts amounts between currencies.
//!
//! # Features
//!
//! - Open Exchange Rates compatible HTTP provider
//! - File, Redis or in-memory snapshot cache with a configurable TTL
//! - Stale-cache fallback when the provider is unreachable
//! - Historical rates by date
//! - Free-text query parsing ("100 JPY to USD on 2022-01-01")
//!
//! # Example
//!
//! ```rust,ignore
//! use fxquery_fx::{build_resolver, ConversionEngine, FxConfig};
//! use fxquery_common::{now, Currency};
//!
//! let config = FxConfig::from_env()?;
//! let resolver = build_resolver(&config)?;
//! let engine = ConversionEngine::new(config.base_currency.clone(), config.precision);
//!
//! let rates = resolver.resolve(now(), false).await?;
//! let eur = engine.convert(dec!(100), &Currency::usd(), &Currency::eur(), &rates)?;
//! ```

pub mod config;
pub mod conversion;
pub mod error;
pub mod provider;
pub mod query;
pub mod redis_store;
pub mod resolver;
pub mod store;

use std::sync::Arc;

pub use config::{CacheBackend, CacheConfig, FxConfig, ProviderConfig};
pub use conversion::{Conversion, ConversionEngine, ConversionRequest};
pub use error::{FxError, FxResult};
pub use provider::{FetchThroughCache, HttpRateProvider, RateProvider, SharedRateProvider};
pub use query::{ParsedQuery, QueryParser, QueryReader};
pub use redis_store::{KeyValueClient, RedisClient, RedisRateStore};
pub use resolver::{RateResolver, ResolverConfig};
pub use store::{open_store, FileRateStore, MemoryRateStore, RateStore, SharedRateStore};

#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockRateProvider;

/// Wire the configured store and HTTP provider into a resolver.
pub fn build_resolver(config: &FxConfig) -> FxResult<RateResolver> {
    config.validate().map_err(FxError::Configuration)?;

    let store = open_store(&config.cache.backend)?;
    let provider: SharedRateProvider = Arc::new(HttpRateProvider::new(&config.provider)?);

    Ok(RateResolver::new(
        store,
        provider,
        ResolverConfig {
            ttl: config.cache.ttl,
        },
    ))
}

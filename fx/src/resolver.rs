//! Rate resolution: cache, then live fetch, then stale cache.

use chrono::Duration;
use fxquery_common::{RateDate, RateKey, RateSnapshot, Timestamp};
use tracing::{debug, info, instrument, warn};

use crate::error::{FxError, FxResult};
use crate::provider::{FetchThroughCache, SharedRateProvider};
use crate::store::SharedRateStore;

/// Configuration for the resolver.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Maximum age of the latest snapshot served without a refresh.
    pub ttl: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            ttl: fxquery_common::constants::default_cache_ttl(),
        }
    }
}

/// Decides where a rate table comes from.
///
/// Resolution order for a key:
///
/// 1. the cached snapshot, if fresh (or if `force` is set, or the key is historical);
/// 2. a live fetch, which also writes the result to the store;
/// 3. the cached snapshot regardless of age;
/// 4. otherwise [`FxError::Unavailable`].
///
/// Recoverable failures along the way (see [`FxError::is_recoverable`]) are logged
/// and absorbed; anything else is returned immediately.
pub struct RateResolver {
    store: SharedRateStore,
    provider: SharedRateProvider,
    config: ResolverConfig,
}

impl RateResolver {
    /// Create a resolver. Successful fetches from `provider` are persisted to `store`.
    pub fn new(store: SharedRateStore, provider: SharedRateProvider, config: ResolverConfig) -> Self {
        let provider: SharedRateProvider =
            std::sync::Arc::new(FetchThroughCache::new(provider, store.clone()));
        Self {
            store,
            provider,
            config,
        }
    }

    /// Resolve the latest rates.
    #[instrument(skip(self))]
    pub async fn resolve(&self, now: Timestamp, force: bool) -> FxResult<RateSnapshot> {
        self.resolve_key(&RateKey::Latest, now, force).await
    }

    /// Resolve the rates of a past day given as `YYYY-MM-DD`.
    ///
    /// A malformed date fails with [`FxError::InvalidDate`] before any I/O.
    #[instrument(skip(self))]
    pub async fn resolve_on(&self, date: &str, now: Timestamp) -> FxResult<RateSnapshot> {
        let date = RateDate::parse(date)?;
        self.resolve_key(&RateKey::Historical(date), now, false).await
    }

    /// Resolve latest rates, or historical ones when a date is given.
    pub async fn resolve_for(
        &self,
        date: Option<&str>,
        now: Timestamp,
        force: bool,
    ) -> FxResult<RateSnapshot> {
        match date {
            Some(date) => self.resolve_on(date, now).await,
            None => self.resolve(now, force).await,
        }
    }

    /// Walk the fallback chain for a key.
    pub async fn resolve_key(
        &self,
        key: &RateKey,
        now: Timestamp,
        force: bool,
    ) -> FxResult<RateSnapshot> {
        // Historical tables never change, so their age is irrelevant.
        let ignore_age = force || key.is_historical();

        match self.cached(key, now, ignore_age).await {
            Ok(snapshot) => {
                debug!(key = %key, "Using cached rates");
                return Ok(snapshot);
            }
            Err(e) if !e.is_recoverable() => return Err(e),
            Err(e) => debug!(key = %key, reason = %e, "Cache not usable"),
        }

        match self.provider.fetch(key).await {
            Ok(snapshot) => return Ok(snapshot),
            Err(e) if !e.is_recoverable() => return Err(e),
            Err(e) => warn!(
                key = %key,
                provider = self.provider.name(),
                error = %e,
                "Live fetch failed, falling back to stale cache"
            ),
        }

        match self.cached(key, now, true).await {
            Ok(snapshot) => {
                info!(
                    key = %key,
                    age_seconds = snapshot.age(now).num_seconds(),
                    "Serving stale rates"
                );
                Ok(snapshot)
            }
            Err(e) => {
                warn!(key = %key, reason = %e, "No rates available");
                Err(FxError::Unavailable(*key))
            }
        }
    }

    /// Load the cached snapshot for a key, enforcing the TTL unless `ignore_age`.
    pub async fn cached(
        &self,
        key: &RateKey,
        now: Timestamp,
        ignore_age: bool,
    ) -> FxResult<RateSnapshot> {
        let snapshot = self.store.load(key).await?;
        let age = snapshot.age(now);

        if ignore_age || age <= self.config.ttl {
            Ok(snapshot)
        } else {
            Err(FxError::CacheExpired {
                key: *key,
                age_seconds: age.num_seconds(),
            })
        }
    }
}

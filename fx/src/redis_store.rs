//! Redis-backed snapshot storage.
//!
//! Snapshots are stored as JSON strings under `exchange_rates:` (latest) and
//! `exchange_rates:YYYY-MM-DD` (historical). A single `SET` replaces a value
//! atomically, so readers never observe a partial write.

use std::sync::Arc;

use async_trait::async_trait;
use fxquery_common::{RateKey, RateSnapshot};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{FxError, FxResult};
use crate::store::RateStore;

/// Prefix of every cache key.
pub const KEY_PREFIX: &str = "exchange_rates:";

/// Minimal string get/set interface of a key-value cache.
#[async_trait]
pub trait KeyValueClient: Send + Sync {
    async fn get(&self, key: &str) -> FxResult<Option<String>>;

    async fn set(&self, key: &str, value: String) -> FxResult<()>;
}

/// Redis client shared by all store operations.
///
/// The connection is established on first use and then reused; the manager
/// reconnects on its own after a dropped connection.
pub struct RedisClient {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
}

impl RedisClient {
    /// Create a client for `url`. Accepts `host:port` as shorthand for `redis://host:port`.
    pub fn open(url: &str) -> FxResult<Self> {
        let client = redis::Client::open(normalize_url(url))?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
        })
    }

    async fn connection(&self) -> FxResult<ConnectionManager> {
        let connection = self
            .connection
            .get_or_try_init(|| async {
                let manager = ConnectionManager::new(self.client.clone()).await?;
                info!("Connected to Redis");
                Ok::<_, FxError>(manager)
            })
            .await?;
        Ok(connection.clone())
    }
}

fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.contains("://") {
        url.to_string()
    } else {
        format!("redis://{}", url)
    }
}

#[async_trait]
impl KeyValueClient for RedisClient {
    async fn get(&self, key: &str) -> FxResult<Option<String>> {
        let mut connection = self.connection().await?;
        let value: Option<String> = connection.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> FxResult<()> {
        let mut connection = self.connection().await?;
        connection.set::<_, _, ()>(key, value).await?;
        Ok(())
    }
}

/// Stores snapshots in a key-value cache, Redis by default.
pub struct RedisRateStore<C = RedisClient> {
    client: Arc<C>,
}

impl<C: KeyValueClient> RedisRateStore<C> {
    /// Create a store over an existing client.
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    /// Cache key for a rate key.
    pub fn key_for(key: &RateKey) -> String {
        format!("{}{}", KEY_PREFIX, key.cache_key())
    }
}

#[async_trait]
impl<C: KeyValueClient> RateStore for RedisRateStore<C> {
    async fn save(&self, key: &RateKey, snapshot: &RateSnapshot) -> FxResult<()> {
        let body = serde_json::to_string(snapshot)
            .map_err(|e| FxError::MalformedSnapshot(e.to_string()))?;
        let cache_key = Self::key_for(key);

        self.client.set(&cache_key, body).await?;

        debug!(key = %key, cache_key = %cache_key, rates = snapshot.len(), "Snapshot saved");
        Ok(())
    }

    async fn load(&self, key: &RateKey) -> FxResult<RateSnapshot> {
        let cache_key = Self::key_for(key);
        let body = self
            .client
            .get(&cache_key)
            .await?
            .ok_or(FxError::CacheNotFound(*key))?;

        serde_json::from_str(&body)
            .map_err(|e| FxError::MalformedSnapshot(format!("{}: {}", cache_key, e)))
    }

    async fn exists(&self, key: &RateKey) -> bool {
        matches!(self.client.get(&Self::key_for(key)).await, Ok(Some(_)))
    }
}

//! Rate provider traits and implementations.

use std::sync::Arc;

use async_trait::async_trait;
use fxquery_common::{RateDate, RateKey, RateSnapshot};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::ProviderConfig;
use crate::error::{FxError, FxResult};
use crate::store::SharedRateStore;

/// Trait for exchange rate providers.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Fetch the most recent rates.
    async fn fetch_latest(&self) -> FxResult<RateSnapshot>;

    /// Fetch the rates of a past day.
    async fn fetch_historical(&self, date: &RateDate) -> FxResult<RateSnapshot>;

    /// Fetch the rates named by a key.
    async fn fetch(&self, key: &RateKey) -> FxResult<RateSnapshot> {
        match key {
            RateKey::Latest => self.fetch_latest().await,
            RateKey::Historical(date) => self.fetch_historical(date).await,
        }
    }
}

/// Shared rate provider handle.
pub type SharedRateProvider = Arc<dyn RateProvider>;

/// Open Exchange Rates compatible HTTP provider.
///
/// Requests `{base_url}/latest.json` and `{base_url}/historical/{date}.json`
/// with the `app_id` query parameter.
pub struct HttpRateProvider {
    client: Client,
    base_url: String,
    app_id: String,
}

impl HttpRateProvider {
    /// Create a provider with its own HTTP client.
    pub fn new(config: &ProviderConfig) -> FxResult<Self> {
        let timeout = config
            .request_timeout
            .to_std()
            .map_err(|e| FxError::Configuration(format!("request timeout: {}", e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FxError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self::with_client(client, config))
    }

    /// Create a provider around an existing client.
    pub fn with_client(client: Client, config: &ProviderConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            app_id: config.app_id.clone(),
        }
    }

    fn endpoint(&self, key: &RateKey) -> String {
        match key {
            RateKey::Latest => format!("{}/latest.json", self.base_url),
            RateKey::Historical(date) => format!("{}/historical/{}.json", self.base_url, date),
        }
    }

    async fn get(&self, key: &RateKey) -> FxResult<RateSnapshot> {
        let url = self.endpoint(key);
        debug!(url = %url, "Requesting rates");

        let response = self
            .client
            .get(&url)
            .query(&[("app_id", self.app_id.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(key = %key, status = status.as_u16(), "Rate provider rejected request");
            return Err(FxError::UpstreamStatus {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let snapshot: RateSnapshot = serde_json::from_slice(&body)
            .map_err(|e| FxError::MalformedSnapshot(e.to_string()))?;

        info!(key = %key, rates = snapshot.len(), "Fetched exchange rates");
        Ok(snapshot)
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    fn name(&self) -> &str {
        "openexchangerates"
    }

    async fn fetch_latest(&self) -> FxResult<RateSnapshot> {
        self.get(&RateKey::Latest).await
    }

    async fn fetch_historical(&self, date: &RateDate) -> FxResult<RateSnapshot> {
        self.get(&RateKey::Historical(*date)).await
    }
}

/// Persists every successful fetch of the inner provider into a store.
///
/// A failed fetch leaves the store untouched. A failed write is logged and the
/// fetched snapshot is still returned.
pub struct FetchThroughCache {
    inner: SharedRateProvider,
    store: SharedRateStore,
}

impl FetchThroughCache {
    /// Wrap a provider.
    pub fn new(inner: SharedRateProvider, store: SharedRateStore) -> Self {
        Self { inner, store }
    }

    async fn persist(&self, key: &RateKey, snapshot: &RateSnapshot) {
        match self.store.save(key, snapshot).await {
            Ok(()) => debug!(key = %key, "Cached fetched rates"),
            Err(e) => warn!(key = %key, error = %e, "Failed to cache fetched rates"),
        }
    }
}

#[async_trait]
impl RateProvider for FetchThroughCache {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn fetch_latest(&self) -> FxResult<RateSnapshot> {
        let snapshot = self.inner.fetch_latest().await?;
        self.persist(&RateKey::Latest, &snapshot).await;
        Ok(snapshot)
    }

    async fn fetch_historical(&self, date: &RateDate) -> FxResult<RateSnapshot> {
        let snapshot = self.inner.fetch_historical(date).await?;
        self.persist(&RateKey::Historical(*date), &snapshot).await;
        Ok(snapshot)
    }
}

/// Mock rate provider for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateProvider {
    name: String,
    snapshots: dashmap::DashMap<RateKey, RateSnapshot>,
    failing: std::sync::atomic::AtomicBool,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateProvider {
    /// Create a new mock provider with no rates.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            snapshots: dashmap::DashMap::new(),
            failing: std::sync::atomic::AtomicBool::new(false),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Set the snapshot returned for a key.
    pub fn set_snapshot(&self, key: RateKey, snapshot: RateSnapshot) {
        self.snapshots.insert(key, snapshot);
    }

    /// Make every fetch fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    /// Number of fetches attempted so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn answer(&self, key: &RateKey) -> FxResult<RateSnapshot> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(FxError::FetchFailed("mock provider offline".to_string()));
        }
        self.snapshots
            .get(key)
            .map(|s| s.clone())
            .ok_or(FxError::UpstreamStatus { status: 404 })
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateProvider for MockRateProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_latest(&self) -> FxResult<RateSnapshot> {
        self.answer(&RateKey::Latest)
    }

    async fn fetch_historical(&self, date: &RateDate) -> FxResult<RateSnapshot> {
        self.answer(&RateKey::Historical(*date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryRateStore, RateStore};
    use fxquery_common::Currency;
    use httpmock::prelude::*;
    use rust_decimal_macros::dec;

    fn provider_for(server: &MockServer) -> HttpRateProvider {
        let config = ProviderConfig {
            base_url: server.url("/api"),
            app_id: "test-app".to_string(),
            ..Default::default()
        };
        HttpRateProvider::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_latest() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/latest.json")
                .query_param("app_id", "test-app");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({
                    "timestamp": 1_640_995_200,
                    "base": "USD",
                    "rates": { "USD": 1, "EUR": 0.879, "JPY": 115.08 }
                }));
        });

        let snapshot = provider_for(&server).fetch_latest().await.unwrap();

        mock.assert();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.rate(&Currency::eur()), Some(dec!(0.879)));
    }

    #[tokio::test]
    async fn test_fetch_historical_uses_date_path() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/historical/2022-01-01.json");
            then.status(200).json_body(serde_json::json!({
                "timestamp": 1_641_081_599,
                "rates": { "EUR": 0.8792 }
            }));
        });

        let date = RateDate::parse("2022-01-01").unwrap();
        let snapshot = provider_for(&server).fetch_historical(&date).await.unwrap();

        mock.assert();
        assert_eq!(snapshot.rate(&Currency::eur()), Some(dec!(0.8792)));
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/latest.json");
            then.status(401).json_body(serde_json::json!({ "error": true }));
        });

        let result = provider_for(&server).fetch_latest().await;

        assert!(matches!(result, Err(FxError::UpstreamStatus { status: 401 })));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/latest.json");
            then.status(200).body("<html>maintenance</html>");
        });

        let result = provider_for(&server).fetch_latest().await;

        assert!(matches!(result, Err(FxError::MalformedSnapshot(_))));
    }

    #[tokio::test]
    async fn test_unreachable_upstream() {
        let config = ProviderConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            ..Default::default()
        };
        let provider = HttpRateProvider::new(&config).unwrap();

        let result = provider.fetch_latest().await;

        assert!(matches!(result, Err(FxError::FetchFailed(_))));
    }

    #[tokio::test]
    async fn test_fetch_through_cache_persists_success() {
        let mock = Arc::new(MockRateProvider::new("mock"));
        let snapshot = RateSnapshot::new(
            fxquery_common::now(),
            [(Currency::eur(), dec!(0.9))],
        )
        .unwrap();
        mock.set_snapshot(RateKey::Latest, snapshot.clone());

        let store = Arc::new(MemoryRateStore::new());
        let provider = FetchThroughCache::new(mock, store.clone());

        let fetched = provider.fetch_latest().await.unwrap();

        assert_eq!(fetched, snapshot);
        assert_eq!(store.load(&RateKey::Latest).await.unwrap(), snapshot);
    }

    #[tokio::test]
    async fn test_fetch_through_cache_keeps_cache_on_failure() {
        let mock = Arc::new(MockRateProvider::new("mock"));
        mock.set_failing(true);

        let store = Arc::new(MemoryRateStore::new());
        let cached = RateSnapshot::new(
            fxquery_common::now(),
            [(Currency::eur(), dec!(0.8))],
        )
        .unwrap();
        store.save(&RateKey::Latest, &cached).await.unwrap();

        let provider = FetchThroughCache::new(mock, store.clone());

        assert!(provider.fetch_latest().await.is_err());
        assert_eq!(store.load(&RateKey::Latest).await.unwrap(), cached);
    }
}

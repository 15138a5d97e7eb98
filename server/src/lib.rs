//! fxquery HTTP server
//!
//! Exposes rate lookups and conversions over a small JSON API:
//!
//! - `GET /` service information
//! - `GET /convert?from=USD&to=EUR&amount=100&date=2023-06-30`
//! - `GET /rates?date=2023-06-30`

pub mod api;
pub mod config;
pub mod error;

use std::sync::Arc;

use fxquery_common::Currency;
use fxquery_fx::{build_resolver, ConversionEngine, FxConfig, FxResult, RateResolver};

pub use api::app_router;
pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};

/// State shared by all request handlers.
pub struct AppState {
    pub resolver: RateResolver,
    pub engine: ConversionEngine,
    pub base: Currency,
}

impl AppState {
    pub fn new(resolver: RateResolver, engine: ConversionEngine) -> Self {
        let base = engine.base().clone();
        Self {
            resolver,
            engine,
            base,
        }
    }
}

/// Construct the shared state from configuration.
pub fn build_state(config: &FxConfig) -> FxResult<Arc<AppState>> {
    let resolver = build_resolver(config)?;
    let engine = ConversionEngine::new(config.base_currency.clone(), config.precision);
    Ok(Arc::new(AppState::new(resolver, engine)))
}

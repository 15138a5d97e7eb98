//! HTTP routes.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use fxquery_common::{now, Currency, RateDate, RateKey};
use fxquery_fx::{Conversion, ConversionRequest, FxError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Query string of `GET /convert`.
#[derive(Debug, Default, Deserialize)]
pub struct ConvertParams {
    pub from: Option<String>,
    pub to: Option<String>,
    pub amount: Option<String>,
    pub date: Option<String>,
}

/// Query string of `GET /rates`.
#[derive(Debug, Default, Deserialize)]
pub struct RatesParams {
    pub date: Option<String>,
}

/// Body of `GET /rates`.
#[derive(Debug, Serialize)]
pub struct RatesResponse {
    pub base: Currency,
    pub timestamp: i64,
    pub date: Option<RateDate>,
    pub rates: BTreeMap<Currency, Decimal>,
}

/// Build the application router.
pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/convert", get(convert))
        .route("/rates", get(rates))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "name": "fxquery",
        "version": env!("CARGO_PKG_VERSION"),
        "message": "Welcome to the fxquery currency conversion API",
        "endpoints": [
            "GET /convert?from=USD&to=EUR&amount=100&date=2023-06-30",
            "GET /rates?date=2023-06-30",
        ],
    }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn convert(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConvertParams>,
) -> ApiResult<Json<Conversion>> {
    let from = required(params.from, "from")?;
    let to = required(params.to, "to")?;
    let amount = match present(params.amount) {
        Some(raw) => Decimal::from_str(raw.trim())
            .map_err(|_| ApiError::BadRequest(format!("amount '{}' is not a number", raw)))?,
        None => Decimal::ONE,
    };
    let date = parse_date(params.date)?;

    let rates = state
        .resolver
        .resolve_key(&RateKey::from(date), now(), false)
        .await?;

    let request = ConversionRequest::new(amount, Currency::new(from), Currency::new(to));
    let conversion = state.engine.execute(request, &rates, date)?;

    info!(
        from = %conversion.request.from,
        to = %conversion.request.to,
        amount = %conversion.request.value,
        result = %conversion.result,
        "Conversion served"
    );
    Ok(Json(conversion))
}

async fn rates(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RatesParams>,
) -> ApiResult<Json<RatesResponse>> {
    let date = parse_date(params.date)?;

    let snapshot = state
        .resolver
        .resolve_key(&RateKey::from(date), now(), false)
        .await?;

    Ok(Json(RatesResponse {
        base: state.base.clone(),
        timestamp: snapshot.fetched_at().timestamp(),
        date,
        rates: snapshot.rates().clone(),
    }))
}

/// Empty query values count as absent.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn required(value: Option<String>, name: &str) -> ApiResult<String> {
    present(value).ok_or_else(|| ApiError::BadRequest(format!("'{}' is required", name)))
}

fn parse_date(value: Option<String>) -> ApiResult<Option<RateDate>> {
    present(value)
        .map(|raw| RateDate::parse(raw.trim()))
        .transpose()
        .map_err(|e| ApiError::Fx(FxError::from(e)))
}

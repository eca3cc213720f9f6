use super::ApiError;
use crate::analytics::{self, OptionPredictionResponse, QuoteRequest, QuoteResponse};
use crate::config::parse_ticker_list;
use crate::errors::EngineResult;
use crate::feeds::treasury::{RateQuote, RateSource};
use crate::market::{LookbackPeriod, PriceSeries};
use crate::models::black_scholes::years_until;
use crate::models::pipeline::PredictionResult;
use crate::models::volatility::annualized_volatility;
use crate::state::{AppState, Counters, TickerList};
use axum::extract::{Query, State};
use axum::response::Json;
use chrono::NaiveDate;
use std::sync::Arc;

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(serde::Deserialize)]
pub struct SeriesQuery {
    pub ticker: String,
    pub period: Option<LookbackPeriod>,
}

/// Prediction endpoints default to the full table (training rows included,
/// so fit looks optimistic there); `test_only=true` returns held-out rows only.
#[derive(serde::Deserialize)]
pub struct PredictQuery {
    pub ticker: String,
    pub period: Option<LookbackPeriod>,
    #[serde(default)]
    pub test_only: bool,
}

fn select_view(result: PredictionResult, test_only: bool) -> PredictionResult {
    if test_only {
        result.restricted_to_test()
    } else {
        result
    }
}

#[derive(serde::Deserialize)]
pub struct OptionPredictQuery {
    pub ticker: String,
    pub period: Option<LookbackPeriod>,
    pub strike: Option<f64>,
    pub expiry: NaiveDate,
    #[serde(default)]
    pub test_only: bool,
}

#[derive(serde::Deserialize)]
pub struct AddTickersBody {
    /// Comma-separated symbols, e.g. "AAPL, NVDA, AMZN".
    pub tickers: String,
}

async fn fetch_history(
    state: &AppState,
    ticker: &str,
    period: LookbackPeriod,
) -> EngineResult<PriceSeries> {
    let result = state.history.fetch_history(ticker, period).await;
    match &result {
        Ok(_) => Counters::bump(&state.counters.histories_fetched),
        Err(e) => {
            Counters::bump(&state.counters.data_source_errors);
            tracing::warn!(ticker = %ticker, period = %period, error = %e, "history fetch failed");
        }
    }
    result
}

async fn resolve_rate(state: &AppState) -> RateQuote {
    let rate = state
        .treasury
        .resolve_rate(state.config.default_risk_free_rate)
        .await;
    if rate.source == RateSource::Default {
        Counters::bump(&state.counters.rate_fallbacks);
    }
    rate
}

/// GET /api/quote -- Black-Scholes quote for a ticker
pub async fn get_quote(
    State(state): State<Arc<AppState>>,
    Query(request): Query<QuoteRequest>,
) -> ApiResult<QuoteResponse> {
    let spot = state.history.fetch_spot(&request.ticker).await.inspect_err(|_| {
        Counters::bump(&state.counters.data_source_errors);
    })?;
    let history = match request.volatility {
        Some(_) => None,
        None => Some(fetch_history(&state, &request.ticker, LookbackPeriod::OneYear).await?),
    };
    let rate = resolve_rate(&state).await;
    let today = chrono::Utc::now().date_naive();

    let response =
        analytics::quote_option(&state.pricer, &request, spot, history.as_ref(), rate, today)?;
    Counters::bump(&state.counters.quotes_priced);
    tracing::info!(
        ticker = %response.ticker,
        spot = response.spot,
        strike = response.strike,
        call = response.call,
        put = response.put,
        rate_source = ?response.rate_source,
        "option quoted"
    );
    Ok(Json(response))
}

/// GET /api/history -- daily bars for charting
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SeriesQuery>,
) -> ApiResult<serde_json::Value> {
    let period = q.period.unwrap_or_default();
    let series = fetch_history(&state, &q.ticker, period).await?;
    Ok(Json(serde_json::json!({
        "ticker": q.ticker.trim().to_uppercase(),
        "period": period,
        "bars": series.bars(),
    })))
}

/// GET /api/volatility -- annualized historical volatility
pub async fn get_volatility(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SeriesQuery>,
) -> ApiResult<serde_json::Value> {
    let period = q.period.unwrap_or(LookbackPeriod::OneYear);
    let series = fetch_history(&state, &q.ticker, period).await?;
    let sigma = annualized_volatility(&series)?;
    Ok(Json(serde_json::json!({
        "ticker": q.ticker.trim().to_uppercase(),
        "period": period,
        "points": series.len(),
        "sigma": sigma,
    })))
}

/// GET /api/predict/stock -- Lag1/Lag2 linear return prediction
pub async fn predict_stock(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PredictQuery>,
) -> ApiResult<PredictionResult> {
    let series = fetch_history(&state, &q.ticker, q.period.unwrap_or(LookbackPeriod::FiveYears)).await?;
    let result = analytics::predict_stock_returns(&series, &state.split())?;
    Counters::bump(&state.counters.predictions_run);
    tracing::info!(
        ticker = %q.ticker,
        rows = result.full().len(),
        mse = result.metrics().mse,
        r2 = ?result.metrics().r2,
        "stock prediction"
    );
    Ok(Json(select_view(result, q.test_only)))
}

/// GET /api/predict/option -- Lag1/Lag2 linear option price prediction
pub async fn predict_option(
    State(state): State<Arc<AppState>>,
    Query(q): Query<OptionPredictQuery>,
) -> ApiResult<OptionPredictionResponse> {
    let series = fetch_history(&state, &q.ticker, q.period.unwrap_or(LookbackPeriod::FiveYears)).await?;
    let rate = resolve_rate(&state).await;
    let strike = match q.strike {
        Some(k) => k,
        None => series.last_close().unwrap_or_default() * analytics::DEFAULT_STRIKE_MULTIPLIER,
    };
    let ttl_years = years_until(q.expiry, chrono::Utc::now().date_naive());

    let mut result =
        analytics::predict_option_prices(&series, strike, ttl_years, rate.rate, &state.split())?;
    Counters::bump(&state.counters.predictions_run);
    tracing::info!(ticker = %q.ticker, strike, ttl_years, sigma = result.sigma, "option prediction");
    if q.test_only {
        result.call = result.call.restricted_to_test();
        result.put = result.put.restricted_to_test();
    }
    Ok(Json(result))
}

/// GET /api/predict/signal -- random-forest trading signal
pub async fn predict_signal(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PredictQuery>,
) -> ApiResult<PredictionResult> {
    let series = fetch_history(&state, &q.ticker, q.period.unwrap_or(LookbackPeriod::FiveYears)).await?;
    let result =
        analytics::generate_trading_signals(&series, &state.split(), state.config.forest_trees)?;
    Counters::bump(&state.counters.predictions_run);
    tracing::info!(
        ticker = %q.ticker,
        rows = result.full().len(),
        accuracy = result.metrics().accuracy,
        "signal generation"
    );
    Ok(Json(select_view(result, q.test_only)))
}

/// GET /api/tickers -- tracked tickers in insertion order
pub async fn get_tickers(State(state): State<Arc<AppState>>) -> Json<TickerList> {
    let tickers = state.tickers.read().unwrap_or_else(|e| e.into_inner());
    Json(tickers.clone())
}

/// POST /api/tickers -- track more tickers (comma-separated, deduplicated)
pub async fn add_tickers(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AddTickersBody>,
) -> Json<serde_json::Value> {
    let mut tickers = state.tickers.write().unwrap_or_else(|e| e.into_inner());
    let added: Vec<String> = parse_ticker_list(&body.tickers)
        .into_iter()
        .filter(|t| tickers.add(t))
        .collect();
    if !added.is_empty() {
        tracing::info!(added = ?added, total = tickers.len(), "tracking tickers");
    }
    Json(serde_json::json!({
        "added": added,
        "tickers": tickers.as_slice(),
    }))
}

/// GET /api/counters -- request counters (lock-free reads)
pub async fn get_counters(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    use portable_atomic::Ordering::Relaxed;
    Json(serde_json::json!({
        "quotes_priced": state.counters.quotes_priced.load(Relaxed),
        "predictions_run": state.counters.predictions_run.load(Relaxed),
        "histories_fetched": state.counters.histories_fetched.load(Relaxed),
        "data_source_errors": state.counters.data_source_errors.load(Relaxed),
        "rate_fallbacks": state.counters.rate_fallbacks.load(Relaxed),
    }))
}

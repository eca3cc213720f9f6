use crate::errors::{EngineError, EngineResult};
use crate::feeds::treasury::{RateQuote, RateSource};
use crate::market::PriceSeries;
use crate::models::black_scholes::{
    intrinsic_value, years_until, BlackScholes, OptionContract, Recommendation,
};
use crate::models::features::{
    build_lag_features, build_signal_features, FeatureColumn, FeatureRow, LagFeatureRow,
};
use crate::models::learners::{ForestClassifier, LinearModel};
use crate::models::pipeline::{fit_and_predict, PredictionResult, SplitConfig};
use crate::models::volatility::annualized_volatility;
use chrono::{DateTime, NaiveDate, Utc};

/// Default strike when none is given: 5% above spot.
pub const DEFAULT_STRIKE_MULTIPLIER: f64 = 1.05;

const LAG_FEATURES: [FeatureColumn; 2] = [FeatureColumn::Lag1, FeatureColumn::Lag2];
const SIGNAL_FEATURES: [FeatureColumn; 4] = [
    FeatureColumn::Return,
    FeatureColumn::Ma10,
    FeatureColumn::Ma50,
    FeatureColumn::Rsi,
];

// ── Option quote ──

#[derive(Debug, Clone, serde::Deserialize)]
pub struct QuoteRequest {
    pub ticker: String,
    pub strike: Option<f64>,
    pub expiry: NaiveDate,
    /// Annualized volatility as a decimal; estimated from history when absent.
    pub volatility: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilitySource {
    Historical,
    Override,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct QuoteResponse {
    pub ticker: String,
    pub spot: f64,
    pub strike: f64,
    pub days_to_expiry: i64,
    pub ttl_years: f64,
    pub rate: f64,
    pub rate_source: RateSource,
    pub sigma: f64,
    pub sigma_source: VolatilitySource,
    pub call: f64,
    pub put: f64,
    pub d1: f64,
    pub d2: f64,
    /// Payoff if exercised now: max(S-K, 0) and max(K-S, 0).
    pub intrinsic_call: f64,
    pub intrinsic_put: f64,
    pub recommendation: Recommendation,
}

/// Price a European option on `request.ticker`.
///
/// `history` feeds the volatility estimate and is only required when the
/// request does not override it.
pub fn quote_option(
    pricer: &BlackScholes,
    request: &QuoteRequest,
    spot: f64,
    history: Option<&PriceSeries>,
    rate: RateQuote,
    today: NaiveDate,
) -> EngineResult<QuoteResponse> {
    let (sigma, sigma_source) = match (request.volatility, history) {
        (Some(v), _) => (v, VolatilitySource::Override),
        (None, Some(series)) => (annualized_volatility(series)?, VolatilitySource::Historical),
        (None, None) => {
            return Err(EngineError::InvalidInput(
                "price history is required when no volatility is given".into(),
            ))
        }
    };
    let strike = request.strike.unwrap_or(spot * DEFAULT_STRIKE_MULTIPLIER);
    let ttl_years = years_until(request.expiry, today);

    let contract = OptionContract {
        spot,
        strike,
        ttl_years,
        rate: rate.rate,
        sigma,
    };
    let quote = pricer.price(&contract)?;
    let (intrinsic_call, intrinsic_put) = intrinsic_value(spot, strike);

    Ok(QuoteResponse {
        ticker: request.ticker.trim().to_uppercase(),
        spot,
        strike,
        days_to_expiry: (request.expiry - today).num_days(),
        ttl_years,
        rate: rate.rate,
        rate_source: rate.source,
        sigma,
        sigma_source,
        call: quote.call,
        put: quote.put,
        d1: quote.d1,
        d2: quote.d2,
        intrinsic_call,
        intrinsic_put,
        recommendation: quote.recommendation(),
    })
}

// ── Stock return prediction ──

/// Lag1/Lag2 -> Return with a linear model.
pub fn predict_stock_returns(
    series: &PriceSeries,
    split: &SplitConfig,
) -> EngineResult<PredictionResult> {
    let rows = build_lag_features(series);
    fit_and_predict(
        &rows,
        &LAG_FEATURES,
        FeatureColumn::Return,
        split,
        &mut LinearModel::new(),
    )
}

// ── Option price prediction ──

/// Lag features paired with the theoretical option prices of the same bar.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct OptionFeatureRow {
    pub timestamp: DateTime<Utc>,
    pub lag: LagFeatureRow,
    pub call: f64,
    pub put: f64,
}

impl FeatureRow for OptionFeatureRow {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn value(&self, column: FeatureColumn) -> Option<f64> {
        match column {
            FeatureColumn::CallPrice => Some(self.call),
            FeatureColumn::PutPrice => Some(self.put),
            other => self.lag.value(other),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct OptionPredictionResponse {
    pub strike: f64,
    pub ttl_years: f64,
    pub rate: f64,
    pub sigma: f64,
    pub call: PredictionResult,
    pub put: PredictionResult,
}

/// Lag1/Lag2 -> Black-Scholes call and put prices, one linear model per side.
///
/// Each row's targets price a contract with spot = that bar's close and the
/// given strike, expiry and rate; sigma is estimated over the whole series.
pub fn predict_option_prices(
    series: &PriceSeries,
    strike: f64,
    ttl_years: f64,
    rate: f64,
    split: &SplitConfig,
) -> EngineResult<OptionPredictionResponse> {
    let sigma = annualized_volatility(series)?;
    let pricer = BlackScholes::new();

    let rows = build_lag_features(series)
        .into_iter()
        .map(|lag| {
            let quote = pricer.price(&OptionContract {
                spot: lag.close,
                strike,
                ttl_years,
                rate,
                sigma,
            })?;
            Ok(OptionFeatureRow {
                timestamp: lag.timestamp,
                lag,
                call: quote.call,
                put: quote.put,
            })
        })
        .collect::<EngineResult<Vec<_>>>()?;

    let call = fit_and_predict(
        &rows,
        &LAG_FEATURES,
        FeatureColumn::CallPrice,
        split,
        &mut LinearModel::new(),
    )?;
    let put = fit_and_predict(
        &rows,
        &LAG_FEATURES,
        FeatureColumn::PutPrice,
        split,
        &mut LinearModel::new(),
    )?;

    Ok(OptionPredictionResponse {
        strike,
        ttl_years,
        rate,
        sigma,
        call,
        put,
    })
}

// ── Trading signal generation ──

/// Return/MA10/MA50/RSI -> Signal with a seeded random forest.
pub fn generate_trading_signals(
    series: &PriceSeries,
    split: &SplitConfig,
    n_trees: u16,
) -> EngineResult<PredictionResult> {
    if n_trees == 0 {
        return Err(EngineError::InvalidInput("forest needs at least one tree".into()));
    }
    let rows = build_signal_features(series)?;
    fit_and_predict(
        &rows,
        &SIGNAL_FEATURES,
        FeatureColumn::Signal,
        split,
        &mut ForestClassifier::new(n_trees, split.seed),
    )
}

use crate::errors::{EngineError, EngineResult};
use crate::market::PriceSeries;

/// Trading days per year used to annualize daily volatility.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Daily simple returns r_t = (close_t - close_{t-1}) / close_{t-1} for t >= 1.
///
/// Output has `len - 1` entries (empty for fewer than 2 bars). Closes are
/// guaranteed positive by `PriceSeries`, so every entry is finite.
pub fn daily_returns(series: &PriceSeries) -> Vec<f64> {
    series
        .bars()
        .windows(2)
        .map(|w| (w[1].close - w[0].close) / w[0].close)
        .collect()
}

/// Annualized historical volatility: sample std-dev of daily returns * sqrt(252).
///
/// Needs at least two returns for the Bessel-corrected deviation; a constant
/// series yields exactly 0.0.
pub fn annualized_volatility(series: &PriceSeries) -> EngineResult<f64> {
    if series.len() < 2 {
        return Err(EngineError::InsufficientData(format!(
            "volatility needs at least 2 prices, got {}",
            series.len()
        )));
    }

    let returns = daily_returns(series);
    if returns.len() < 2 {
        return Err(EngineError::InsufficientData(
            "sample deviation of a single return is undefined".into(),
        ));
    }

    let sigma = sample_std_dev(&returns) * TRADING_DAYS_PER_YEAR.sqrt();
    tracing::debug!(points = series.len(), sigma, "estimated annualized volatility");
    Ok(sigma)
}

/// Bessel-corrected standard deviation. Caller guarantees `data.len() >= 2`.
#[inline]
fn sample_std_dev(data: &[f64]) -> f64 {
    let nf = data.len() as f64;
    let mean = data.iter().sum::<f64>() / nf;

    let mut var_sum: f64 = 0.0;
    for &x in data {
        let d = x - mean;
        var_sum += d * d;
    }

    (var_sum / (nf - 1.0)).sqrt()
}

use crate::errors::{EngineError, EngineResult};
use crate::market::PriceSeries;
use crate::models::volatility::daily_returns;
use chrono::{DateTime, Utc};

/// Short moving-average window (observations, including t).
pub const SHORT_MA_WINDOW: usize = 10;
/// Long moving-average window.
pub const LONG_MA_WINDOW: usize = 50;
/// Up-day counting window for the momentum indicator.
pub const MOMENTUM_WINDOW: usize = 14;
/// Leading rows dropped by the signal variant: max(50, 14) + 1.
pub const SIGNAL_WARMUP: usize = 51;
/// Leading rows dropped by the lag variant (return, Lag1, Lag2 all defined).
pub const LAG_WARMUP: usize = 3;

/// Named columns a feature table can be queried by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureColumn {
    Close,
    Return,
    Lag1,
    Lag2,
    Ma10,
    Ma50,
    /// Up-day share over 14 returns, scaled to 0-100. Not Wilder's RSI.
    Rsi,
    Signal,
    CallPrice,
    PutPrice,
}

impl std::fmt::Display for FeatureColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Close => "Close",
            Self::Return => "Return",
            Self::Lag1 => "Lag1",
            Self::Lag2 => "Lag2",
            Self::Ma10 => "MA10",
            Self::Ma50 => "MA50",
            Self::Rsi => "RSI",
            Self::Signal => "Signal",
            Self::CallPrice => "Call",
            Self::PutPrice => "Put",
        };
        f.write_str(name)
    }
}

/// A fully-defined engineered row keyed by its source bar's timestamp.
pub trait FeatureRow {
    fn timestamp(&self) -> DateTime<Utc>;

    /// Value of `column`, or `None` when this row type does not carry it.
    fn value(&self, column: FeatureColumn) -> Option<f64>;
}

/// Row of the lag variant (price/return prediction).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct LagFeatureRow {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    #[serde(rename = "return")]
    pub ret: f64,
    pub lag1: f64,
    pub lag2: f64,
}

impl FeatureRow for LagFeatureRow {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn value(&self, column: FeatureColumn) -> Option<f64> {
        match column {
            FeatureColumn::Close => Some(self.close),
            FeatureColumn::Return => Some(self.ret),
            FeatureColumn::Lag1 => Some(self.lag1),
            FeatureColumn::Lag2 => Some(self.lag2),
            _ => None,
        }
    }
}

/// Row of the signal variant (trading-signal generation).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct SignalFeatureRow {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    #[serde(rename = "return")]
    pub ret: f64,
    pub ma10: f64,
    pub ma50: f64,
    /// Percentage (0-100) of up-days in the trailing 14 observations.
    /// A simplified proxy, not Wilder's RSI.
    pub rsi: f64,
    /// 1 iff MA10 > MA50.
    pub signal: u8,
}

impl FeatureRow for SignalFeatureRow {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn value(&self, column: FeatureColumn) -> Option<f64> {
        match column {
            FeatureColumn::Close => Some(self.close),
            FeatureColumn::Return => Some(self.ret),
            FeatureColumn::Ma10 => Some(self.ma10),
            FeatureColumn::Ma50 => Some(self.ma50),
            FeatureColumn::Rsi => Some(self.rsi),
            FeatureColumn::Signal => Some(f64::from(self.signal)),
            _ => None,
        }
    }
}

/// Lag variant: return_t, Lag1_t = return_{t-1}, Lag2_t = return_{t-2}.
///
/// The first three bars never have all three defined, so a series of length
/// n yields exactly max(n - 3, 0) rows.
pub fn build_lag_features(series: &PriceSeries) -> Vec<LagFeatureRow> {
    let bars = series.bars();
    // returns[i] is the return of bar i + 1
    let returns = daily_returns(series);

    let rows: Vec<LagFeatureRow> = (LAG_WARMUP..bars.len())
        .map(|t| LagFeatureRow {
            timestamp: bars[t].timestamp,
            close: bars[t].close,
            ret: returns[t - 1],
            lag1: returns[t - 2],
            lag2: returns[t - 3],
        })
        .collect();

    tracing::debug!(input = bars.len(), rows = rows.len(), "built lag features");
    rows
}

/// Signal variant: return, MA10, MA50, up-day momentum and crossover signal.
///
/// The first `SIGNAL_WARMUP` bars are dropped, so at least 52 bars are needed
/// for a non-empty table; shorter input is `InsufficientData`.
pub fn build_signal_features(series: &PriceSeries) -> EngineResult<Vec<SignalFeatureRow>> {
    let bars = series.bars();
    if bars.len() <= SIGNAL_WARMUP {
        return Err(EngineError::InsufficientData(format!(
            "signal features need at least {} prices, got {}",
            SIGNAL_WARMUP + 1,
            bars.len()
        )));
    }

    let closes = series.closes();
    let returns = daily_returns(series);

    // Prefix sums keep the moving averages O(1) per row.
    let mut close_prefix = Vec::with_capacity(closes.len() + 1);
    close_prefix.push(0.0);
    for &c in &closes {
        let last = close_prefix[close_prefix.len() - 1];
        close_prefix.push(last + c);
    }
    let mean_ending_at = |t: usize, window: usize| -> f64 {
        (close_prefix[t + 1] - close_prefix[t + 1 - window]) / window as f64
    };

    // up_prefix[i] = number of up-days among bars 1..i (bar 0 has no predecessor)
    let mut up_prefix = vec![0usize; closes.len() + 1];
    for i in 1..closes.len() {
        up_prefix[i + 1] = up_prefix[i] + usize::from(closes[i] > closes[i - 1]);
    }

    let rows: Vec<SignalFeatureRow> = (SIGNAL_WARMUP..bars.len())
        .map(|t| {
            let ma10 = mean_ending_at(t, SHORT_MA_WINDOW);
            let ma50 = mean_ending_at(t, LONG_MA_WINDOW);
            let up_days = up_prefix[t + 1] - up_prefix[t + 1 - MOMENTUM_WINDOW];
            SignalFeatureRow {
                timestamp: bars[t].timestamp,
                close: closes[t],
                ret: returns[t - 1],
                ma10,
                ma50,
                rsi: up_days as f64 / MOMENTUM_WINDOW as f64 * 100.0,
                signal: u8::from(ma10 > ma50),
            }
        })
        .collect();

    tracing::debug!(input = bars.len(), rows = rows.len(), "built signal features");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::series_from_closes;

    fn wave(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + 10.0 * (i as f64 / 9.0).sin()).collect()
    }

    #[test]
    fn test_lag_row_count() {
        for n in [0, 1, 2, 3, 4, 10, 250] {
            let series = series_from_closes(&wave(n));
            let rows = build_lag_features(&series);
            assert_eq!(rows.len(), n.saturating_sub(3), "n={n}");
        }
    }

    #[test]
    fn test_lag_values_shifted() {
        let closes = [100.0, 110.0, 99.0, 99.0, 118.8];
        let series = series_from_closes(&closes);
        let rows = build_lag_features(&series);
        assert_eq!(rows.len(), 2);

        let r = daily_returns(&series);
        assert_eq!(rows[0].timestamp, series.bars()[3].timestamp);
        assert_eq!(rows[0].ret, r[2]);
        assert_eq!(rows[0].lag1, r[1]);
        assert_eq!(rows[0].lag2, r[0]);
        assert_eq!(rows[1].lag1, rows[0].ret);
        assert_eq!(rows[1].lag2, rows[0].lag1);
        assert!(rows.iter().all(|row| row.lag1.is_finite() && row.lag2.is_finite()));
    }

    #[test]
    fn test_signal_rising_series_all_ones() {
        let closes: Vec<f64> = (0..120).map(|i| 50.0 + i as f64).collect();
        let rows = build_signal_features(&series_from_closes(&closes)).unwrap();
        assert_eq!(rows.len(), 120 - SIGNAL_WARMUP);
        for row in &rows {
            assert!(row.ma10 > row.ma50);
            assert_eq!(row.signal, 1, "rising series must signal at {}", row.timestamp);
            assert_eq!(row.rsi, 100.0);
        }
    }

    #[test]
    fn test_signal_falling_series_all_zero() {
        let closes: Vec<f64> = (0..80).map(|i| 500.0 - i as f64).collect();
        let rows = build_signal_features(&series_from_closes(&closes)).unwrap();
        assert!(rows.iter().all(|r| r.signal == 0 && r.rsi == 0.0));
    }

    #[test]
    fn test_signal_matches_crossover_definition() {
        let series = series_from_closes(&wave(200));
        let closes = series.closes();
        let rows = build_signal_features(&series).unwrap();
        for (offset, row) in rows.iter().enumerate() {
            let t = SIGNAL_WARMUP + offset;
            let ma10 = closes[t - 9..=t].iter().sum::<f64>() / 10.0;
            let ma50 = closes[t - 49..=t].iter().sum::<f64>() / 50.0;
            let ups = (t - 13..=t).filter(|&i| closes[i] > closes[i - 1]).count();
            assert!((row.ma10 - ma10).abs() < 1e-9);
            assert!((row.ma50 - ma50).abs() < 1e-9);
            assert!((row.rsi - ups as f64 / 14.0 * 100.0).abs() < 1e-9);
            assert_eq!(row.signal == 1, row.ma10 > row.ma50);
        }
        assert!(rows.iter().any(|r| r.signal == 0) && rows.iter().any(|r| r.signal == 1));
    }

    #[test]
    fn test_signal_minimum_length() {
        let err = build_signal_features(&series_from_closes(&wave(51))).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData(_)), "got {err:?}");

        let rows = build_signal_features(&series_from_closes(&wave(52))).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_rows_ascending_and_contiguous() {
        let series = series_from_closes(&wave(90));
        let rows = build_signal_features(&series).unwrap();
        let tail = &series.bars()[SIGNAL_WARMUP..];
        assert_eq!(rows.len(), tail.len());
        for (row, bar) in rows.iter().zip(tail) {
            assert_eq!(row.timestamp, bar.timestamp);
        }
    }

    #[test]
    fn test_missing_column_is_none() {
        let series = series_from_closes(&wave(10));
        let row = build_lag_features(&series)[0];
        assert!(row.value(FeatureColumn::Rsi).is_none());
        assert_eq!(row.value(FeatureColumn::Lag1), Some(row.lag1));
    }
}

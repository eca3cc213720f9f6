use crate::errors::{EngineError, EngineResult};
use chrono::{DateTime, Utc};

/// One daily OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// Bar with only a close known (open/high/low mirror it, zero volume).
    #[cfg(test)]
    pub fn from_close(timestamp: DateTime<Utc>, close: f64) -> Self {
        Self {
            timestamp,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
        }
    }
}

/// Price history ordered by timestamp, strictly ascending.
///
/// Every close is finite and positive, so return ratios never divide by zero.
/// Read-only once built.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(bars: Vec<PriceBar>) -> EngineResult<Self> {
        for (i, bar) in bars.iter().enumerate() {
            if !bar.close.is_finite() || bar.close <= 0.0 {
                return Err(EngineError::InvalidInput(format!(
                    "close at {} must be finite and positive, got {}",
                    bar.timestamp, bar.close
                )));
            }
            if i > 0 && bars[i - 1].timestamp >= bar.timestamp {
                return Err(EngineError::InvalidInput(format!(
                    "timestamps must be strictly ascending: {} then {}",
                    bars[i - 1].timestamp, bar.timestamp
                )));
            }
        }
        Ok(Self { bars })
    }

    /// Daily series from closes, one calendar day apart starting at `start`.
    #[cfg(test)]
    pub fn from_closes(start: DateTime<Utc>, closes: &[f64]) -> EngineResult<Self> {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar::from_close(start + chrono::Duration::days(i as i64), c))
            .collect();
        Self::new(bars)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    #[inline]
    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }
}

/// Lookback windows accepted by the price-history provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum LookbackPeriod {
    #[default]
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "5y")]
    FiveYears,
    #[serde(rename = "max")]
    Max,
}

impl LookbackPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMonth => "1mo",
            Self::ThreeMonths => "3mo",
            Self::SixMonths => "6mo",
            Self::OneYear => "1y",
            Self::FiveYears => "5y",
            Self::Max => "max",
        }
    }
}

impl std::fmt::Display for LookbackPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
pub(crate) fn series_from_closes(closes: &[f64]) -> PriceSeries {
    let start = DateTime::from_timestamp(1_704_067_200, 0).unwrap_or_default();
    PriceSeries::from_closes(start, closes).expect("valid test series")
}

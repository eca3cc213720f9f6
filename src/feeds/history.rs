use crate::errors::{EngineError, EngineResult};
use crate::market::{LookbackPeriod, PriceBar, PriceSeries};
use reqwest::Client;

/// Daily price-history client for a Yahoo-Finance-style chart endpoint.
/// Every failure (transport, status, payload, validation) is a `DataSource` error.
#[derive(Clone)]
pub struct HistoryClient {
    client: Client,
    base_url: String,
}

impl HistoryClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(timeout_secs))
                .user_agent("Mozilla/5.0 (pretty_quant)")
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn fetch_history(
        &self,
        ticker: &str,
        period: LookbackPeriod,
    ) -> EngineResult<PriceSeries> {
        self.fetch_range(ticker, period.as_str()).await
    }

    /// Latest close, used as the spot price.
    pub async fn fetch_spot(&self, ticker: &str) -> EngineResult<f64> {
        // 5 days so weekends and holidays still return a bar
        let series = self.fetch_range(ticker, "5d").await?;
        series
            .last_close()
            .ok_or_else(|| EngineError::DataSource(format!("no recent price for {ticker}")))
    }

    async fn fetch_range(&self, ticker: &str, range: &str) -> EngineResult<PriceSeries> {
        let ticker = ticker.trim().to_uppercase();
        if ticker.is_empty() {
            return Err(EngineError::InvalidInput("ticker must not be empty".into()));
        }
        let url = format!("{}/{}?range={}&interval=1d", self.base_url, ticker, range);

        let resp = self.client.get(&url).send().await.inspect_err(|e| {
            tracing::debug!(ticker = %ticker, error = %e, "history request failed");
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::DataSource(format!(
                "{ticker} history HTTP {status}: {body}"
            )));
        }

        let body = resp.text().await?;

        let series = parse_chart(&body)?;
        tracing::info!(ticker = %ticker, range = range, bars = series.len(), "fetched price history");
        Ok(series)
    }
}

// Chart response format (abridged):
// {
//   "chart": {
//     "result": [{
//       "timestamp": [1717075800, 1717162200],
//       "indicators": { "quote": [{
//         "open": [190.7, 191.4], "high": [...], "low": [...],
//         "close": [191.3, null], "volume": [49947900, 75158300]
//       }]}
//     }],
//     "error": null
//   }
// }

#[derive(serde::Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(serde::Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(serde::Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(serde::Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(serde::Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteColumns>,
}

#[derive(serde::Deserialize, Default)]
struct QuoteColumns {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Parse a chart payload into a validated series.
///
/// Bars with a missing or non-positive close are skipped, as are repeated
/// timestamps (the provider sometimes re-sends the live bar).
fn parse_chart(body: &str) -> EngineResult<PriceSeries> {
    let resp: ChartResponse = serde_json::from_str(body)?;

    if let Some(err) = resp.chart.error {
        return Err(EngineError::DataSource(format!(
            "provider error {}: {}",
            err.code.unwrap_or_default(),
            err.description.unwrap_or_default()
        )));
    }

    let result = resp
        .chart
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.swap_remove(0)) })
        .ok_or_else(|| EngineError::DataSource("chart response has no result".into()))?;

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let at = |col: &[Option<f64>], i: usize| col.get(i).copied().flatten();

    let mut bars: Vec<PriceBar> = Vec::with_capacity(result.timestamp.len());
    for (i, &ts) in result.timestamp.iter().enumerate() {
        let Some(close) = at(&quote.close, i).filter(|c| c.is_finite() && *c > 0.0) else {
            continue;
        };
        let Some(timestamp) = chrono::DateTime::from_timestamp(ts, 0) else {
            continue;
        };
        if bars.last().is_some_and(|prev| prev.timestamp >= timestamp) {
            continue;
        }
        bars.push(PriceBar {
            timestamp,
            open: at(&quote.open, i).unwrap_or(close),
            high: at(&quote.high, i).unwrap_or(close),
            low: at(&quote.low, i).unwrap_or(close),
            close,
            volume: at(&quote.volume, i).unwrap_or(0.0),
        });
    }

    let series =
        PriceSeries::new(bars).map_err(|e| EngineError::DataSource(format!("chart data: {e}")))?;
    if series.is_empty() {
        return Err(EngineError::DataSource("chart response has no priced bars".into()));
    }
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"symbol": "AAPL"},
                "timestamp": [1717075800, 1717162200, 1717162200, 1717421400, 1717507800],
                "indicators": {"quote": [{
                    "open":   [190.7, 191.4, 191.4, null, 194.6],
                    "high":   [192.1, 192.5, 192.5, 194.9, 195.3],
                    "low":    [189.9, 190.2, 190.2, 192.2, 193.0],
                    "close":  [191.3, 192.2, 192.3, null, 194.3],
                    "volume": [49947900, 75158300, 75158300, 50080500, null]
                }]}
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_parse_chart_skips_gaps_and_repeats() {
        let series = parse_chart(SAMPLE).unwrap();
        assert_eq!(series.closes(), vec![191.3, 192.2, 194.3]);
        let last = series.bars()[2];
        assert_eq!(last.open, 194.6);
        assert_eq!(last.volume, 0.0);
    }

    #[test]
    fn test_parse_chart_provider_error() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = parse_chart(body).unwrap_err();
        assert!(matches!(err, EngineError::DataSource(ref m) if m.contains("delisted")), "got {err:?}");
    }

    #[test]
    fn test_parse_chart_garbage() {
        assert!(matches!(parse_chart("<html>"), Err(EngineError::DataSource(_))));
    }
}

use crate::errors::{EngineError, EngineResult};
use reqwest::Client;
use smallvec::SmallVec;

/// Where the risk-free rate in a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RateSource {
    Live,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct RateQuote {
    pub rate: f64,
    pub source: RateSource,
}

/// 1-year treasury yield client (Alpha-Vantage-style `TREASURY_YIELD`).
#[derive(Clone)]
pub struct TreasuryClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl TreasuryClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Most recent yield as a decimal (5.18% -> 0.0518).
    pub async fn fetch_risk_free_rate(&self) -> EngineResult<f64> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| EngineError::DataSource("no rate API key configured".into()))?;

        let mut parts: SmallVec<[String; 4]> = SmallVec::new();
        parts.push("function=TREASURY_YIELD".into());
        parts.push("interval=monthly".into());
        parts.push("maturity=1year".into());
        parts.push(format!("apikey={api_key}"));
        let url = format!("{}?{}", self.base_url, parts.join("&"));

        let resp = self.client.get(&url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::DataSource(format!("rate HTTP {status}: {body}")));
        }

        let body = resp.text().await?;
        parse_treasury(&body)
    }

    /// Live rate, or `default` when the lookup fails. The fallback is logged
    /// and reported through `RateSource::Default`.
    pub async fn resolve_rate(&self, default: f64) -> RateQuote {
        resolve_rate(self.fetch_risk_free_rate().await, default)
    }
}

pub fn resolve_rate(fetched: EngineResult<f64>, default: f64) -> RateQuote {
    match fetched {
        Ok(rate) => RateQuote {
            rate,
            source: RateSource::Live,
        },
        Err(e) => {
            tracing::warn!(error = %e, default, "risk-free rate unavailable, using default");
            RateQuote {
                rate: default,
                source: RateSource::Default,
            }
        }
    }
}

// Response format:
// {
//   "name": "1-Year Treasury Constant Maturity Rate",
//   "interval": "monthly",
//   "unit": "percent",
//   "data": [
//     { "date": "2024-05-01", "value": "5.18" },
//     { "date": "2024-04-01", "value": "5.16" }
//   ]
// }
// Missing observations are reported as ".".

#[derive(serde::Deserialize)]
struct TreasuryResponse {
    data: Option<Vec<TreasuryPoint>>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(serde::Deserialize)]
struct TreasuryPoint {
    date: String,
    value: String,
}

fn parse_treasury(body: &str) -> EngineResult<f64> {
    let resp: TreasuryResponse = serde_json::from_str(body)?;

    let points = match resp.data {
        Some(points) => points,
        None => {
            let reason = resp.note.or(resp.information).unwrap_or_else(|| "no data".into());
            return Err(EngineError::DataSource(format!("rate provider: {reason}")));
        }
    };

    // ISO dates compare correctly as strings
    let latest = points
        .iter()
        .filter_map(|p| p.value.trim().parse::<f64>().ok().map(|v| (p.date.as_str(), v)))
        .filter(|(_, v)| v.is_finite())
        .max_by(|a, b| a.0.cmp(b.0))
        .ok_or_else(|| EngineError::DataSource("rate response has no numeric values".into()))?;

    Ok(latest.1 / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_latest_point() {
        let body = r#"{"name":"1-Year","unit":"percent","data":[
            {"date":"2024-05-01","value":"."},
            {"date":"2024-04-01","value":"5.16"},
            {"date":"2024-03-01","value":"5.03"}
        ]}"#;
        let rate = parse_treasury(body).unwrap();
        assert!((rate - 0.0516).abs() < 1e-12, "rate={rate}");
    }

    #[test]
    fn test_parse_rate_limited() {
        let body = r#"{"Note":"Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."}"#;
        let err = parse_treasury(body).unwrap_err();
        assert!(matches!(err, EngineError::DataSource(ref m) if m.contains("frequency")), "got {err:?}");
    }

    #[test]
    fn test_parse_malformed_body() {
        let err = parse_treasury("<html>rate limited</html>").unwrap_err();
        assert!(matches!(err, EngineError::DataSource(_)), "got {err:?}");
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let quote = resolve_rate(Err(EngineError::DataSource("timeout".into())), 0.05);
        assert_eq!(quote, RateQuote { rate: 0.05, source: RateSource::Default });

        let quote = resolve_rate(Ok(0.043), 0.05);
        assert_eq!(quote.source, RateSource::Live);
        assert_eq!(quote.rate, 0.043);
    }
}

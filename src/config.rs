use crate::errors::{EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub history_base_url: String,
    pub rate_base_url: String,
    /// Rate lookups are skipped (and the default used) when no key is set.
    pub rate_api_key: Option<String>,
    pub default_risk_free_rate: f64,
    pub request_timeout_secs: u64,
    pub test_fraction: f64,
    pub split_seed: u64,
    pub forest_trees: u16,
    pub default_tickers: Vec<String>,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> EngineResult<Self> {
        dotenvy::dotenv().ok();

        let default_risk_free_rate = env_var_or("DEFAULT_RISK_FREE_RATE", "0.05")
            .parse::<f64>()
            .map_err(|e| EngineError::Config(format!("DEFAULT_RISK_FREE_RATE: {e}")))?;

        let request_timeout_secs = env_var_or("REQUEST_TIMEOUT_SECS", "10")
            .parse::<u64>()
            .map_err(|e| EngineError::Config(format!("REQUEST_TIMEOUT_SECS: {e}")))?;

        let test_fraction = env_var_or("TEST_FRACTION", "0.2")
            .parse::<f64>()
            .map_err(|e| EngineError::Config(format!("TEST_FRACTION: {e}")))?;

        let split_seed = env_var_or("SPLIT_SEED", "42")
            .parse::<u64>()
            .map_err(|e| EngineError::Config(format!("SPLIT_SEED: {e}")))?;

        let forest_trees = env_var_or("FOREST_TREES", "100")
            .parse::<u16>()
            .map_err(|e| EngineError::Config(format!("FOREST_TREES: {e}")))?;

        let server_port = env_var_or("SERVER_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| EngineError::Config(format!("SERVER_PORT: {e}")))?;

        let cfg = Self {
            history_base_url: env_var_or(
                "HISTORY_BASE_URL",
                "https://query1.finance.yahoo.com/v8/finance/chart",
            ),
            rate_base_url: env_var_or("RATE_BASE_URL", "https://www.alphavantage.co/query"),
            rate_api_key: std::env::var("RATE_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            default_risk_free_rate,
            request_timeout_secs,
            test_fraction,
            split_seed,
            forest_trees,
            default_tickers: parse_ticker_list(&env_var_or("DEFAULT_TICKERS", "AAPL")),
            server_port,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> EngineResult<()> {
        if !self.default_risk_free_rate.is_finite() {
            return Err(EngineError::Config(
                "DEFAULT_RISK_FREE_RATE must be finite".into(),
            ));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(EngineError::Config(format!(
                "TEST_FRACTION must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.forest_trees == 0 {
            return Err(EngineError::Config("FOREST_TREES must be > 0".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(EngineError::Config("REQUEST_TIMEOUT_SECS must be > 0".into()));
        }
        Ok(())
    }
}

/// Split a comma-separated ticker list: trimmed, upper-cased, empties dropped.
pub fn parse_ticker_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

use crate::config::AppConfig;
use crate::feeds::history::HistoryClient;
use crate::feeds::treasury::TreasuryClient;
use crate::models::black_scholes::BlackScholes;
use crate::models::pipeline::SplitConfig;
use portable_atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

// ── Tracked tickers ──

/// Ordered, deduplicated, append-only set of ticker symbols.
/// Owned by the caller; the pricing core never touches it.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct TickerList {
    tickers: Vec<String>,
}

impl TickerList {
    pub fn new<I, S>(initial: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::default();
        for t in initial {
            list.add(t.as_ref());
        }
        list
    }

    /// Add a symbol (normalized to trimmed upper case).
    /// Returns false when it was empty or already tracked.
    pub fn add(&mut self, ticker: &str) -> bool {
        let normalized = ticker.trim().to_uppercase();
        if normalized.is_empty() || self.contains(&normalized) {
            return false;
        }
        self.tickers.push(normalized);
        true
    }

    pub fn contains(&self, ticker: &str) -> bool {
        let needle = ticker.trim();
        self.tickers.iter().any(|t| t.eq_ignore_ascii_case(needle))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.tickers
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }
}

// ── Request counters (lock-free) ──

#[derive(Debug, Default)]
pub struct Counters {
    pub quotes_priced: AtomicU64,
    pub predictions_run: AtomicU64,
    pub histories_fetched: AtomicU64,
    pub data_source_errors: AtomicU64,
    pub rate_fallbacks: AtomicU64,
}

impl Counters {
    #[inline]
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

// ── Shared application state ──

/// Everything request handlers share. Only the ticker list is mutable.
pub struct AppState {
    pub config: AppConfig,
    pub history: HistoryClient,
    pub treasury: TreasuryClient,
    pub pricer: BlackScholes,
    pub tickers: RwLock<TickerList>,
    pub counters: Counters,
}

impl AppState {
    pub fn new(config: AppConfig) -> Arc<Self> {
        let history = HistoryClient::new(&config.history_base_url, config.request_timeout_secs);
        let treasury = TreasuryClient::new(
            &config.rate_base_url,
            config.rate_api_key.clone(),
            config.request_timeout_secs,
        );
        let tickers = RwLock::new(TickerList::new(&config.default_tickers));

        Arc::new(Self {
            config,
            history,
            treasury,
            pricer: BlackScholes::new(),
            tickers,
            counters: Counters::default(),
        })
    }

    pub fn split(&self) -> SplitConfig {
        SplitConfig {
            test_fraction: self.config.test_fraction,
            seed: self.config.split_seed,
        }
    }
}

use crate::errors::{EngineError, EngineResult};
use statrs::distribution::{ContinuousCDF, Normal};

/// Inputs of a European option pricing call. Built fresh per request.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OptionContract {
    pub spot: f64,
    pub strike: f64,
    /// Years to expiry. Zero or negative for expired contracts.
    pub ttl_years: f64,
    pub rate: f64,
    pub sigma: f64,
}

/// Black-Scholes prices plus the intermediate terms.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct OptionQuote {
    pub call: f64,
    pub put: f64,
    pub d1: f64,
    pub d2: f64,
}

/// Educational decision support: which side looks cheaper to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    FavorCall,
    FavorPut,
}

impl OptionQuote {
    pub fn recommendation(&self) -> Recommendation {
        if self.call > self.put {
            Recommendation::FavorCall
        } else {
            Recommendation::FavorPut
        }
    }
}

/// European Black-Scholes pricer.
///
/// call = S*Phi(d1) - K*e^(-rT)*Phi(d2)
/// put  = K*e^(-rT)*Phi(-d2) - S*Phi(-d1)
///
/// where d1 = (ln(S/K) + (r + sigma^2/2)*T) / (sigma*sqrt(T)), d2 = d1 - sigma*sqrt(T).
///
/// Inputs that would divide by zero (T <= 0, sigma <= 0) are rejected with
/// `InvalidInput`; a quote is never NaN or infinite.
pub struct BlackScholes {
    /// Standard normal distribution (created once, reused)
    normal: Normal,
}

impl BlackScholes {
    pub fn new() -> Self {
        Self {
            normal: Normal::standard(),
        }
    }

    pub fn price(&self, contract: &OptionContract) -> EngineResult<OptionQuote> {
        validate(contract)?;
        let OptionContract {
            spot: s,
            strike: k,
            ttl_years: t,
            rate: r,
            sigma,
        } = *contract;

        let sigma_sqrt_t = sigma * t.sqrt();
        let d1 = ((s / k).ln() + (r + 0.5 * sigma * sigma) * t) / sigma_sqrt_t;
        let d2 = d1 - sigma_sqrt_t;
        let discounted_strike = k * (-r * t).exp();

        let call = s * self.normal.cdf(d1) - discounted_strike * self.normal.cdf(d2);
        let put = discounted_strike * self.normal.cdf(-d2) - s * self.normal.cdf(-d1);

        if !(call.is_finite() && put.is_finite() && d1.is_finite() && d2.is_finite()) {
            return Err(EngineError::InvalidInput(format!(
                "inputs produce a non-finite price: {contract:?}"
            )));
        }

        tracing::debug!(spot = s, strike = k, ttl_years = t, call, put, "priced option");
        Ok(OptionQuote { call, put, d1, d2 })
    }
}

impl Default for BlackScholes {
    fn default() -> Self {
        Self::new()
    }
}

fn validate(c: &OptionContract) -> EngineResult<()> {
    let fields = [
        ("spot", c.spot),
        ("strike", c.strike),
        ("ttl_years", c.ttl_years),
        ("rate", c.rate),
        ("sigma", c.sigma),
    ];
    if let Some((name, v)) = fields.iter().find(|(_, v)| !v.is_finite()) {
        return Err(EngineError::InvalidInput(format!("{name} must be finite, got {v}")));
    }
    if c.spot <= 0.0 {
        return Err(EngineError::InvalidInput(format!("spot must be > 0, got {}", c.spot)));
    }
    if c.strike <= 0.0 {
        return Err(EngineError::InvalidInput(format!("strike must be > 0, got {}", c.strike)));
    }
    if c.sigma <= 0.0 {
        return Err(EngineError::InvalidInput(format!("sigma must be > 0, got {}", c.sigma)));
    }
    if c.ttl_years <= 0.0 {
        return Err(EngineError::InvalidInput(format!(
            "time to expiry must be > 0, got {} (contract expired)",
            c.ttl_years
        )));
    }
    Ok(())
}

/// Payoff at expiry: (call, put) = (max(S-K, 0), max(K-S, 0)).
#[inline]
pub fn intrinsic_value(spot: f64, strike: f64) -> (f64, f64) {
    ((spot - strike).max(0.0), (strike - spot).max(0.0))
}

/// Year fraction between two dates, calendar days / 365.
#[inline]
pub fn years_until(expiry: chrono::NaiveDate, today: chrono::NaiveDate) -> f64 {
    (expiry - today).num_days() as f64 / 365.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(spot: f64, strike: f64, ttl_years: f64, rate: f64, sigma: f64) -> OptionContract {
        OptionContract { spot, strike, ttl_years, rate, sigma }
    }

    #[test]
    fn test_reference_values() {
        // S=100, K=105, T=0.5, r=3%, sigma=20%
        let q = BlackScholes::new().price(&contract(100.0, 105.0, 0.5, 0.03, 0.2)).unwrap();
        assert!((q.call - 4.1783).abs() < 1e-3, "call={} should be ~4.1783", q.call);
        assert!((q.put - 7.6151).abs() < 1e-3, "put={} should be ~7.6151", q.put);
        assert!((q.d1 + 0.16822).abs() < 1e-4, "d1={}", q.d1);
    }

    #[test]
    fn test_atm_zero_rate_symmetry() {
        let bs = BlackScholes::new();
        for &(s, t, sigma) in &[(100.0, 0.5, 0.2), (42.0, 2.0, 0.6), (3500.0, 0.01, 0.05)] {
            let q = bs.price(&contract(s, s, t, 0.0, sigma)).unwrap();
            assert!((q.call - q.put).abs() < 1e-9 * s, "S=K, r=0: call={} put={}", q.call, q.put);
        }
    }

    #[test]
    fn test_put_call_parity() {
        let bs = BlackScholes::new();
        let cases = [
            (100.0, 105.0, 0.5, 0.03, 0.2),
            (50.0, 30.0, 1.5, 0.07, 0.45),
            (10.0, 25.0, 0.1, -0.01, 0.9),
            (2500.0, 2400.0, 3.0, 0.05, 0.15),
        ];
        for &(s, k, t, r, sigma) in &cases {
            let q = bs.price(&contract(s, k, t, r, sigma)).unwrap();
            let lhs = q.call - q.put;
            let rhs = s - k * (-r * t).exp();
            let scale = s.max(k);
            assert!(
                (lhs - rhs).abs() <= 1e-6 * scale,
                "parity violated for {:?}: {lhs} vs {rhs}",
                (s, k, t, r, sigma)
            );
        }
    }

    #[test]
    fn test_short_expiry_tends_to_intrinsic() {
        let bs = BlackScholes::new();
        for &(s, k) in &[(110.0, 100.0), (90.0, 100.0)] {
            let q = bs.price(&contract(s, k, 1e-8, 0.05, 0.3)).unwrap();
            let (call_iv, put_iv) = intrinsic_value(s, k);
            assert!((q.call - call_iv).abs() < 1e-4, "call={} intrinsic={call_iv}", q.call);
            assert!((q.put - put_iv).abs() < 1e-4, "put={} intrinsic={put_iv}", q.put);
        }
    }

    #[test]
    fn test_monotonic_in_sigma() {
        let bs = BlackScholes::new();
        let mut prev = bs.price(&contract(100.0, 110.0, 0.75, 0.02, 0.01)).unwrap();
        for i in 2..=100 {
            let sigma = i as f64 * 0.01;
            let q = bs.price(&contract(100.0, 110.0, 0.75, 0.02, sigma)).unwrap();
            assert!(q.call >= prev.call - 1e-12, "call fell at sigma={sigma}");
            assert!(q.put >= prev.put - 1e-12, "put fell at sigma={sigma}");
            prev = q;
        }
    }

    #[test]
    fn test_degenerate_inputs_rejected() {
        let bs = BlackScholes::new();
        let bad = [
            contract(100.0, 100.0, 0.0, 0.05, 0.2),
            contract(100.0, 100.0, -0.1, 0.05, 0.2),
            contract(100.0, 100.0, 0.5, 0.05, 0.0),
            contract(0.0, 100.0, 0.5, 0.05, 0.2),
            contract(100.0, -5.0, 0.5, 0.05, 0.2),
            contract(f64::NAN, 100.0, 0.5, 0.05, 0.2),
            contract(100.0, 100.0, 0.5, f64::INFINITY, 0.2),
        ];
        for c in &bad {
            match bs.price(c) {
                Err(EngineError::InvalidInput(_)) => {}
                other => panic!("expected InvalidInput for {c:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_recommendation() {
        let q = BlackScholes::new().price(&contract(120.0, 100.0, 0.5, 0.03, 0.2)).unwrap();
        assert_eq!(q.recommendation(), Recommendation::FavorCall);
        let q = BlackScholes::new().price(&contract(100.0, 105.0, 0.5, 0.03, 0.2)).unwrap();
        assert_eq!(q.recommendation(), Recommendation::FavorPut);
    }

    #[test]
    fn test_years_until() {
        let today = chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let expiry = chrono::NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        assert!((years_until(expiry, today) - 14.0 / 365.0).abs() < 1e-12);
        assert!(years_until(today, expiry) < 0.0);
    }
}

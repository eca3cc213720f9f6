pub mod black_scholes;
pub mod features;
pub mod learners;
pub mod pipeline;
pub mod volatility;

use crate::errors::EngineResult;

/// Fitting capability used by the prediction pipeline.
/// Implementations retrain from scratch on every `fit`; nothing is persisted.
/// `predict` must be deterministic for a fitted model.
pub trait Model {
    fn name(&self) -> &'static str;

    /// Fit on row-major features `x` (one inner Vec per row) and targets `y`.
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> EngineResult<()>;

    /// One prediction per row of `x`. Fails if called before `fit`.
    fn predict(&self, x: &[Vec<f64>]) -> EngineResult<Vec<f64>>;
}

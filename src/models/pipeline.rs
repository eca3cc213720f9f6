//! Train/test split, fit, and full-table prediction.
//!
//! Known limitation: predictions cover the *entire* feature table, including
//! the rows the model was trained on. The full view therefore shows optimistic,
//! in-sample fit quality on training rows. Use [`PredictionResult::test_only`]
//! and [`PredictionResult::metrics`] for an honest out-of-sample read.

use crate::errors::{EngineError, EngineResult};
use crate::models::features::{FeatureColumn, FeatureRow};
use crate::models::Model;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Deterministic split settings: same seed and row count give the same split.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SplitConfig {
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Train,
    Test,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PredictionPoint {
    pub timestamp: DateTime<Utc>,
    pub actual: f64,
    pub predicted: f64,
    pub partition: Partition,
}

/// Out-of-sample quality on the test partition.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct EvaluationMetrics {
    pub test_rows: usize,
    pub mse: f64,
    /// Coefficient of determination; `None` when the test targets are constant.
    pub r2: Option<f64>,
    /// Fraction of exact matches, meaningful for the binary target.
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PredictionResult {
    pub model: &'static str,
    pub target: FeatureColumn,
    /// One point per input row, same order as the feature table.
    pub points: Vec<PredictionPoint>,
    pub metrics: EvaluationMetrics,
}

impl PredictionResult {
    /// Every row, training rows included (in-sample, optimistic).
    pub fn full(&self) -> &[PredictionPoint] {
        &self.points
    }

    /// Only the held-out rows, in table order.
    pub fn test_only(&self) -> Vec<&PredictionPoint> {
        self.points
            .iter()
            .filter(|p| p.partition == Partition::Test)
            .collect()
    }

    pub fn metrics(&self) -> &EvaluationMetrics {
        &self.metrics
    }

    /// Copy holding only the held-out points; metrics are unchanged.
    pub fn restricted_to_test(&self) -> PredictionResult {
        PredictionResult {
            model: self.model,
            target: self.target,
            points: self.test_only().into_iter().cloned().collect(),
            metrics: self.metrics,
        }
    }
}

/// Row indices of (train, test), each sorted ascending.
///
/// Indices are shuffled with a `StdRng` seeded from `split.seed`; the first
/// ceil(test_fraction * n) shuffled indices form the test partition.
pub fn train_test_split(n: usize, split: &SplitConfig) -> EngineResult<(Vec<usize>, Vec<usize>)> {
    if !(split.test_fraction > 0.0 && split.test_fraction < 1.0) {
        return Err(EngineError::InvalidInput(format!(
            "test fraction must be in (0, 1), got {}",
            split.test_fraction
        )));
    }
    if n < 2 {
        return Err(EngineError::InsufficientData(format!(
            "train/test split needs at least 2 rows, got {n}"
        )));
    }

    let n_test = (split.test_fraction * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(EngineError::InsufficientData(format!(
            "{n} rows cannot be split with test fraction {}",
            split.test_fraction
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(split.seed);
    indices.shuffle(&mut rng);

    let mut test = indices[..n_test].to_vec();
    let mut train = indices[n_test..].to_vec();
    test.sort_unstable();
    train.sort_unstable();
    Ok((train, test))
}

/// Fit `model` on the training partition and predict every row of `rows`.
pub fn fit_and_predict<R: FeatureRow, M: Model + ?Sized>(
    rows: &[R],
    features: &[FeatureColumn],
    target: FeatureColumn,
    split: &SplitConfig,
    model: &mut M,
) -> EngineResult<PredictionResult> {
    if features.is_empty() {
        return Err(EngineError::InvalidInput("no feature columns given".into()));
    }
    if features.contains(&target) {
        return Err(EngineError::InvalidInput(format!(
            "target column {target} is also a feature"
        )));
    }

    let (train_idx, test_idx) = train_test_split(rows.len(), split)?;

    let x = rows
        .iter()
        .map(|row| {
            features
                .iter()
                .map(|&col| column_value(row, col))
                .collect::<EngineResult<Vec<f64>>>()
        })
        .collect::<EngineResult<Vec<Vec<f64>>>>()?;
    let y = rows
        .iter()
        .map(|row| column_value(row, target))
        .collect::<EngineResult<Vec<f64>>>()?;

    let x_train: Vec<Vec<f64>> = train_idx.iter().map(|&i| x[i].clone()).collect();
    let y_train: Vec<f64> = train_idx.iter().map(|&i| y[i]).collect();

    model.fit(&x_train, &y_train)?;
    let predicted = model.predict(&x)?;

    if predicted.len() != rows.len() {
        return Err(EngineError::Model(format!(
            "{} returned {} predictions for {} rows",
            model.name(),
            predicted.len(),
            rows.len()
        )));
    }
    if let Some(bad) = predicted.iter().find(|p| !p.is_finite()) {
        return Err(EngineError::Model(format!(
            "{} produced a non-finite prediction: {bad}",
            model.name()
        )));
    }

    let mut is_test = vec![false; rows.len()];
    for &i in &test_idx {
        is_test[i] = true;
    }

    let points: Vec<PredictionPoint> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| PredictionPoint {
            timestamp: row.timestamp(),
            actual: y[i],
            predicted: predicted[i],
            partition: if is_test[i] { Partition::Test } else { Partition::Train },
        })
        .collect();

    let metrics = evaluate(
        &test_idx.iter().map(|&i| y[i]).collect::<Vec<_>>(),
        &test_idx.iter().map(|&i| predicted[i]).collect::<Vec<_>>(),
    );

    tracing::debug!(
        model = model.name(),
        target = %target,
        rows = rows.len(),
        train = train_idx.len(),
        test = test_idx.len(),
        mse = metrics.mse,
        "fit and predicted"
    );

    Ok(PredictionResult {
        model: model.name(),
        target,
        points,
        metrics,
    })
}

fn column_value<R: FeatureRow>(row: &R, column: FeatureColumn) -> EngineResult<f64> {
    row.value(column).ok_or_else(|| {
        EngineError::InvalidInput(format!("feature table has no {column} column"))
    })
}

/// Metrics over paired actual/predicted values. Caller guarantees non-empty input.
fn evaluate(actual: &[f64], predicted: &[f64]) -> EvaluationMetrics {
    let n = actual.len() as f64;
    let mse = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p) * (a - p))
        .sum::<f64>()
        / n;

    let mean = actual.iter().sum::<f64>() / n;
    let total: f64 = actual.iter().map(|a| (a - mean) * (a - mean)).sum();
    let r2 = if total > 1e-300 {
        Some(1.0 - mse * n / total)
    } else {
        None
    };

    let hits = actual.iter().zip(predicted).filter(|(a, p)| a == p).count();

    EvaluationMetrics {
        test_rows: actual.len(),
        mse,
        r2,
        accuracy: hits as f64 / n,
    }
}

use crate::errors::{EngineError, EngineResult};
use crate::models::Model;
use smartcore::ensemble::random_forest_classifier::{
    RandomForestClassifier, RandomForestClassifierParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::linear_regression::{
    LinearRegression, LinearRegressionParameters, LinearRegressionSolverName,
};

type Regressor = LinearRegression<f64, f64, DenseMatrix<f64>, Vec<f64>>;
type Forest = RandomForestClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>;

/// Ordinary least squares (smartcore, SVD solver) for continuous targets.
pub struct LinearModel {
    model: Option<Regressor>,
}

impl LinearModel {
    pub fn new() -> Self {
        Self { model: None }
    }
}

impl Default for LinearModel {
    fn default() -> Self {
        Self::new()
    }
}

impl Model for LinearModel {
    fn name(&self) -> &'static str {
        "Linear Regression"
    }

    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> EngineResult<()> {
        let matrix = to_matrix(x, y.len())?;
        // one coefficient per feature plus the intercept
        let n_features = x[0].len();
        if x.len() <= n_features {
            return Err(EngineError::InsufficientData(format!(
                "linear fit needs more than {n_features} training rows, got {}",
                x.len()
            )));
        }
        let params =
            LinearRegressionParameters::default().with_solver(LinearRegressionSolverName::SVD);
        self.model = Some(LinearRegression::fit(&matrix, &y.to_vec(), params)?);
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> EngineResult<Vec<f64>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| EngineError::Model("linear model used before fit".into()))?;
        let matrix = to_matrix(x, x.len())?;
        Ok(model.predict(&matrix)?)
    }
}

/// Fitted state of [`ForestClassifier`].
enum ForestFit {
    Trees(Forest),
    /// Training labels were all one class; that class is predicted everywhere.
    Constant(i32),
}

/// Random-forest classifier (smartcore) for the binary signal target.
/// Targets must be 0.0 or 1.0; predictions are returned as 0.0 / 1.0.
pub struct ForestClassifier {
    n_trees: u16,
    seed: u64,
    model: Option<ForestFit>,
}

impl ForestClassifier {
    pub fn new(n_trees: u16, seed: u64) -> Self {
        Self {
            n_trees: n_trees.max(1),
            seed,
            model: None,
        }
    }
}

impl Model for ForestClassifier {
    fn name(&self) -> &'static str {
        "Random Forest"
    }

    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> EngineResult<()> {
        let labels = y
            .iter()
            .map(|&v| match v {
                v if v == 0.0 => Ok(0),
                v if v == 1.0 => Ok(1),
                other => Err(EngineError::InvalidInput(format!(
                    "classifier target must be 0 or 1, got {other}"
                ))),
            })
            .collect::<EngineResult<Vec<i32>>>()?;

        let matrix = to_matrix(x, labels.len())?;
        if let Some(&first) = labels.first().filter(|&&l| labels.iter().all(|&o| o == l)) {
            tracing::debug!(label = first, rows = labels.len(), "single-class training set");
            self.model = Some(ForestFit::Constant(first));
            return Ok(());
        }
        let params = RandomForestClassifierParameters::default()
            .with_n_trees(self.n_trees)
            .with_seed(self.seed);
        self.model = Some(ForestFit::Trees(RandomForestClassifier::fit(
            &matrix, &labels, params,
        )?));
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> EngineResult<Vec<f64>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| EngineError::Model("forest used before fit".into()))?;
        let matrix = to_matrix(x, x.len())?;
        let labels: Vec<i32> = match model {
            ForestFit::Trees(forest) => forest.predict(&matrix)?,
            ForestFit::Constant(label) => vec![*label; x.len()],
        };
        Ok(labels.into_iter().map(f64::from).collect())
    }
}

fn to_matrix(x: &[Vec<f64>], expected_rows: usize) -> EngineResult<DenseMatrix<f64>> {
    if x.is_empty() {
        return Err(EngineError::InsufficientData("no rows to fit or predict".into()));
    }
    if x.len() != expected_rows {
        return Err(EngineError::InvalidInput(format!(
            "feature rows ({}) and targets ({expected_rows}) differ",
            x.len()
        )));
    }
    Ok(DenseMatrix::from_2d_vec(&x.to_vec())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_recovers_plane() {
        // y = 1 + 2a - 3b
        let x: Vec<Vec<f64>> = (0..30)
            .map(|i| vec![i as f64 * 0.1, ((i * 7) % 11) as f64 * 0.2])
            .collect();
        let y: Vec<f64> = x.iter().map(|r| 1.0 + 2.0 * r[0] - 3.0 * r[1]).collect();

        let mut model = LinearModel::new();
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        for (p, t) in pred.iter().zip(&y) {
            assert!((p - t).abs() < 1e-6, "pred={p} target={t}");
        }
    }

    #[test]
    fn test_predict_before_fit_errors() {
        let model = LinearModel::new();
        assert!(matches!(model.predict(&[vec![1.0]]), Err(EngineError::Model(_))));
        let forest = ForestClassifier::new(10, 7);
        assert!(matches!(forest.predict(&[vec![1.0]]), Err(EngineError::Model(_))));
    }

    #[test]
    fn test_forest_separable_classes() {
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let y: Vec<f64> = (0..40).map(|i| if i < 20 { 0.0 } else { 1.0 }).collect();

        let mut forest = ForestClassifier::new(20, 42);
        forest.fit(&x, &y).unwrap();
        let pred = forest.predict(&[vec![2.0, 2.0], vec![37.0, 1.0]]).unwrap();
        assert_eq!(pred, vec![0.0, 1.0]);
    }

    #[test]
    fn test_forest_rejects_non_binary_target() {
        let mut forest = ForestClassifier::new(5, 1);
        let err = forest.fit(&[vec![1.0], vec![2.0]], &[0.0, 2.0]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)), "got {err:?}");
    }

    #[test]
    fn test_linear_needs_more_rows_than_features() {
        let x = vec![vec![0.1, 0.4], vec![0.3, 0.2]];
        let mut model = LinearModel::new();
        let err = model.fit(&x, &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData(_)), "got {err:?}");

        // three rows for two features plus intercept is enough
        let x = vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]];
        let y = [1.0, 3.0, -2.0];
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        for (p, t) in pred.iter().zip(&y) {
            assert!((p - t).abs() < 1e-6, "pred={p} target={t}");
        }
    }

    #[test]
    fn test_forest_single_class_predicts_that_class() {
        let x: Vec<Vec<f64>> = (0..12).map(|i| vec![i as f64, 1.0]).collect();
        for label in [0.0, 1.0] {
            let mut forest = ForestClassifier::new(8, 3);
            forest.fit(&x, &vec![label; x.len()]).unwrap();
            let pred = forest.predict(&[vec![-5.0, 0.0], vec![100.0, 2.0]]).unwrap();
            assert_eq!(pred, vec![label, label]);
        }
    }

    #[test]
    fn test_row_count_mismatch() {
        let mut model = LinearModel::new();
        let err = model.fit(&[vec![1.0], vec![2.0]], &[1.0]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)), "got {err:?}");
    }
}

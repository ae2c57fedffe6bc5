//! Linear models
//!
//! Ridge-regularized linear regression solved by normal equations (Cholesky),
//! and multinomial logistic regression fitted by gradient descent. These are
//! the non-network model family; weight-based and gradient-path sensitivity
//! methods reject them by precondition.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{MlSenseError, Result};
use crate::model::{Model, ModelKind, TaskType};

/// Linear model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearConfig {
    /// Ridge penalty (regression) / L2 penalty (logistic)
    pub l2: f64,
    /// Gradient descent epochs (logistic only)
    pub max_epochs: usize,
    /// Gradient descent learning rate (logistic only)
    pub learning_rate: f64,
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self {
            l2: 1e-6,
            max_epochs: 500,
            learning_rate: 0.1,
        }
    }
}

/// Linear / logistic regression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    config: LinearConfig,
    task: TaskType,
    /// (n_features x n_outputs); n_outputs = 1 for regression
    coefficients: Array2<f64>,
    intercept: Array1<f64>,
    classes: Vec<f64>,
    is_fitted: bool,
}

impl LinearModel {
    pub fn new(config: LinearConfig, task: TaskType) -> Self {
        Self {
            config,
            task,
            coefficients: Array2::zeros((0, 0)),
            intercept: Array1::zeros(0),
            classes: Vec::new(),
            is_fitted: false,
        }
    }

    /// Fitted coefficients, one column per output
    pub fn coefficients(&self) -> &Array2<f64> {
        &self.coefficients
    }

    fn fit_regression(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let d = x.ncols();

        // Normal equations on centered data: (X'X + l2 I) beta = X'y
        let x_mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(d));
        let y_mean = y.mean().unwrap_or(0.0);
        let xc = x - &x_mean;
        let yc = y.mapv(|v| v - y_mean);

        let mut xtx = xc.t().dot(&xc);
        for i in 0..d {
            xtx[[i, i]] += self.config.l2.max(1e-12);
        }
        let xty = xc.t().dot(&yc);

        let beta = cholesky_solve(&xtx, &xty).ok_or_else(|| {
            MlSenseError::TrainingError("singular design matrix in linear fit".to_string())
        })?;

        let intercept = y_mean - beta.dot(&x_mean);
        self.coefficients = beta.insert_axis(Axis(1));
        self.intercept = Array1::from_vec(vec![intercept]);
        Ok(())
    }

    fn fit_classification(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let mut classes: Vec<f64> = y.to_vec();
        classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        classes.dedup_by(|a, b| (*a - *b).abs() < 1e-12);
        if classes.len() < 2 {
            return Err(MlSenseError::TrainingError(
                "classification requires at least 2 distinct labels".to_string(),
            ));
        }
        self.classes = classes;

        let (n, d) = x.dim();
        let k = self.classes.len();
        let mut onehot = Array2::zeros((n, k));
        for (i, &label) in y.iter().enumerate() {
            let idx = self
                .classes
                .iter()
                .position(|&c| (c - label).abs() < 1e-12)
                .unwrap_or(0);
            onehot[[i, idx]] = 1.0;
        }

        let mut w: Array2<f64> = Array2::zeros((d, k));
        let mut b: Array1<f64> = Array1::zeros(k);

        for _epoch in 0..self.config.max_epochs {
            let proba = softmax_rows(&(x.dot(&w) + &b));
            let delta = (&proba - &onehot) / n as f64;
            let grad_w = x.t().dot(&delta) + &w * self.config.l2;
            let grad_b = delta.sum_axis(Axis(0));
            w = w - grad_w * self.config.learning_rate;
            b = b - grad_b * self.config.learning_rate;
        }

        self.coefficients = w;
        self.intercept = b;
        Ok(())
    }

    fn decision(&self, x: &Array2<f64>) -> Array2<f64> {
        x.dot(&self.coefficients) + &self.intercept
    }
}

fn softmax_rows(z: &Array2<f64>) -> Array2<f64> {
    let mut result = z.clone();
    for mut row in result.rows_mut() {
        let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exp_sum: f64 = row.iter().map(|&v| (v - max).exp()).sum();
        for v in row.iter_mut() {
            *v = (*v - max).exp() / exp_sum;
        }
    }
    result
}

/// Solve the symmetric positive-definite system Ax = b via Cholesky
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    let mut l = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // Forward substitution: L y = b
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L' x = y
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

impl Model for LinearModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Linear
    }

    fn task(&self) -> TaskType {
        self.task
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(MlSenseError::ShapeError {
                expected: format!("{} outcome values", x.nrows()),
                actual: format!("{}", y.len()),
            });
        }
        if x.nrows() == 0 {
            return Err(MlSenseError::TrainingError(
                "cannot fit on an empty table".to_string(),
            ));
        }
        match self.task {
            TaskType::Regression => self.fit_regression(x, y)?,
            TaskType::Classification => self.fit_classification(x, y)?,
        }
        self.is_fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(MlSenseError::ModelNotFitted);
        }
        match self.task {
            TaskType::Regression => Ok(self.decision(x).column(0).to_owned()),
            TaskType::Classification => {
                let proba = self.predict_proba(x)?;
                Ok(proba
                    .rows()
                    .into_iter()
                    .map(|row| {
                        let max_idx = row
                            .iter()
                            .enumerate()
                            .max_by(|(_, a), (_, b)| {
                                a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
                            })
                            .map(|(i, _)| i)
                            .unwrap_or(0);
                        self.classes[max_idx]
                    })
                    .collect())
            }
        }
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(MlSenseError::ModelNotFitted);
        }
        if self.task != TaskType::Classification {
            return Err(MlSenseError::ValidationError(
                "predict_proba requires a classification model".to_string(),
            ));
        }
        Ok(softmax_rows(&self.decision(x)))
    }

    fn classes(&self) -> Option<&[f64]> {
        if self.task == TaskType::Classification {
            Some(&self.classes)
        } else {
            None
        }
    }
}

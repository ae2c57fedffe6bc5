//! Performance metrics
//!
//! A closed set of scoring functions keyed by [`Metric`], each tagged with a
//! [`Polarity`] so callers can orient score differences consistently
//! (permutation importance relies on this to make "positive = worse model"
//! hold for both loss-type and score-type metrics).

use crate::error::{MlSenseError, Result};
use crate::model::TaskType;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Whether a larger metric value means a better or a worse model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarity {
    LowerIsBetter,
    HigherIsBetter,
}

/// Supported metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    /// Root mean squared error (regression)
    Rmse,
    /// Mean absolute error (regression)
    Mae,
    /// Coefficient of determination (regression)
    RSquared,
    /// Fraction of correctly predicted labels (classification)
    Accuracy,
    /// Area under the ROC curve (classification; expects scores for the
    /// positive class and 0/1 truth)
    RocAuc,
    /// Negative log likelihood (classification; expects positive-class
    /// probabilities and 0/1 truth)
    LogLoss,
}

impl Metric {
    /// Parse a metric from its conventional name
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "rmse" => Ok(Metric::Rmse),
            "mae" => Ok(Metric::Mae),
            "r2" | "rsq" | "r_squared" => Ok(Metric::RSquared),
            "accuracy" => Ok(Metric::Accuracy),
            "roc_auc" | "auc" => Ok(Metric::RocAuc),
            "log_loss" | "logloss" => Ok(Metric::LogLoss),
            other => Err(MlSenseError::ValidationError(format!(
                "unknown metric: {}",
                other
            ))),
        }
    }

    /// Conventional name
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Rmse => "rmse",
            Metric::Mae => "mae",
            Metric::RSquared => "r_squared",
            Metric::Accuracy => "accuracy",
            Metric::RocAuc => "roc_auc",
            Metric::LogLoss => "log_loss",
        }
    }

    /// Metric direction
    pub fn polarity(&self) -> Polarity {
        match self {
            Metric::Rmse | Metric::Mae | Metric::LogLoss => Polarity::LowerIsBetter,
            Metric::RSquared | Metric::Accuracy | Metric::RocAuc => Polarity::HigherIsBetter,
        }
    }

    /// Whether the metric applies to classification tasks
    pub fn for_classification(&self) -> bool {
        matches!(self, Metric::Accuracy | Metric::RocAuc | Metric::LogLoss)
    }

    /// The default metric for a task
    pub fn default_for(task: TaskType) -> Self {
        match task {
            TaskType::Regression => Metric::Rmse,
            TaskType::Classification => Metric::RocAuc,
        }
    }

    /// Reject metric/task mismatches before any computation
    pub fn validate_for(&self, task: TaskType) -> Result<()> {
        let ok = match task {
            TaskType::Regression => !self.for_classification(),
            TaskType::Classification => self.for_classification(),
        };
        if ok {
            Ok(())
        } else {
            Err(MlSenseError::ValidationError(format!(
                "metric {} is not valid for {:?} tasks",
                self.name(),
                task
            )))
        }
    }

    /// Score predictions against the truth.
    ///
    /// The interpretation of `y_pred` depends on the metric: predicted values
    /// for regression metrics, predicted labels for accuracy, and
    /// positive-class scores/probabilities (with 0/1 truth) for roc_auc and
    /// log_loss.
    pub fn score(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
        if y_true.len() != y_pred.len() {
            return Err(MlSenseError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{}", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(MlSenseError::ComputationError(
                "cannot score an empty prediction vector".to_string(),
            ));
        }
        match self {
            Metric::Rmse => Ok(rmse(y_true, y_pred)),
            Metric::Mae => Ok(mae(y_true, y_pred)),
            Metric::RSquared => Ok(r_squared(y_true, y_pred)),
            Metric::Accuracy => Ok(accuracy(y_true, y_pred)),
            Metric::RocAuc => roc_auc(y_true, y_pred),
            Metric::LogLoss => Ok(log_loss(y_true, y_pred)),
        }
    }
}

/// Root mean squared error
pub fn rmse(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let mse = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64;
    mse.sqrt()
}

/// Mean absolute error
pub fn mae(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / y_true.len() as f64
}

/// Coefficient of determination
pub fn r_squared(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let n = y_true.len() as f64;
    let mean = y_true.sum() / n;
    let ss_tot: f64 = y_true.iter().map(|y| (y - mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else {
        0.0
    }
}

/// Label accuracy
pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (**t - **p).abs() < 0.5)
        .count();
    correct as f64 / y_true.len() as f64
}

/// Area under the ROC curve via the rank statistic (ties get average rank).
///
/// `y_true` must be 0/1 indicators; `scores` are positive-class scores.
pub fn roc_auc(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<f64> {
    let n = y_true.len();
    let n_pos = y_true.iter().filter(|v| **v > 0.5).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(MlSenseError::ComputationError(
            "roc_auc requires both classes present in the truth".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        scores[a]
            .partial_cmp(&scores[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Average ranks over tied score groups
    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && (scores[order[j + 1]] - scores[order[i]]).abs() < 1e-12 {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            ranks[order[k]] = avg_rank;
        }
        i = j + 1;
    }

    let rank_sum_pos: f64 = y_true
        .iter()
        .zip(ranks.iter())
        .filter(|(t, _)| **t > 0.5)
        .map(|(_, r)| *r)
        .sum();

    let u = rank_sum_pos - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Ok(u / (n_pos * n_neg) as f64)
}

/// Binary cross-entropy with probability clamping
pub fn log_loss(y_true: &Array1<f64>, proba: &Array1<f64>) -> f64 {
    let eps = 1e-12;
    let total: f64 = y_true
        .iter()
        .zip(proba.iter())
        .map(|(t, p)| {
            let p = p.clamp(eps, 1.0 - eps);
            if *t > 0.5 {
                -p.ln()
            } else {
                -(1.0 - p).ln()
            }
        })
        .sum();
    total / y_true.len() as f64
}

//! Hyperparameter tuning
//!
//! A small exhaustive grid search: every candidate specification is fitted on
//! the baked training table and scored on the baked validation table, and the
//! best trial by the tuning metric wins. Trials are recorded so the report
//! can be inspected after the fact.

use crate::data::Dataset;
use crate::error::{MlSenseError, Result};
use crate::metrics::{Metric, Polarity};
use crate::model::{LinearConfig, Model, ModelSpec, TaskType};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Candidate values for the neural-network grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningGrid {
    /// Hidden layer layouts to try
    pub hidden_layers: Vec<Vec<usize>>,
    /// Learning rates to try
    pub learning_rates: Vec<f64>,
    /// L2 penalties to try
    pub alphas: Vec<f64>,
}

impl Default for TuningGrid {
    fn default() -> Self {
        Self {
            hidden_layers: vec![vec![16], vec![32], vec![32, 16]],
            learning_rates: vec![0.01, 0.003],
            alphas: vec![1e-4, 1e-3],
        }
    }
}

/// One scored grid point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialResult {
    pub spec: ModelSpec,
    pub score: f64,
}

/// Outcome of a tuning run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningReport {
    /// Metric the trials were scored with
    pub metric: Metric,
    /// Every trial in evaluation order
    pub trials: Vec<TrialResult>,
    /// Index of the winning trial
    pub best_index: usize,
}

impl TuningReport {
    pub fn best(&self) -> &TrialResult {
        &self.trials[self.best_index]
    }
}

/// Enumerate candidate specifications around a base specification
fn candidates(base: &ModelSpec, grid: &TuningGrid) -> Vec<ModelSpec> {
    match base {
        ModelSpec::NeuralNetwork(config) => {
            let mut specs = Vec::new();
            for layers in &grid.hidden_layers {
                for &lr in &grid.learning_rates {
                    for &alpha in &grid.alphas {
                        let mut candidate = config.clone();
                        candidate.hidden_layers = layers.clone();
                        candidate.learning_rate = lr;
                        candidate.alpha = alpha;
                        specs.push(ModelSpec::NeuralNetwork(candidate));
                    }
                }
            }
            specs
        }
        ModelSpec::Linear(config) => [1e-6, 1e-4, 1e-2]
            .iter()
            .map(|&l2| {
                ModelSpec::Linear(LinearConfig {
                    l2,
                    ..config.clone()
                })
            })
            .collect(),
    }
}

/// Grid-search the specification; returns the refitted best model and the
/// trial report. `train` and `validation` must already be baked.
pub fn tune(
    base: &ModelSpec,
    grid: &TuningGrid,
    metric: Metric,
    task: TaskType,
    train: &Dataset,
    validation: &Dataset,
) -> Result<(Box<dyn Model>, TuningReport)> {
    if validation.n_samples() == 0 {
        return Err(MlSenseError::ValidationError(
            "tuning requires a non-empty validation split".to_string(),
        ));
    }
    metric.validate_for(task)?;

    let specs = candidates(base, grid);
    let mut trials: Vec<TrialResult> = Vec::with_capacity(specs.len());
    let mut best_index = 0;
    let mut best_model: Option<Box<dyn Model>> = None;

    for (i, spec) in specs.into_iter().enumerate() {
        let mut model = spec.build(task);
        model.fit(&train.features, &train.outcome)?;
        let score = evaluate(model.as_ref(), metric, validation)?;
        debug!(trial = i, score, metric = metric.name(), "tuning trial");

        let better = match best_model {
            None => true,
            Some(_) => match metric.polarity() {
                Polarity::LowerIsBetter => score < trials[best_index].score,
                Polarity::HigherIsBetter => score > trials[best_index].score,
            },
        };
        if better {
            best_index = i;
            best_model = Some(model);
        }
        trials.push(TrialResult { spec, score });
    }

    let model = best_model.ok_or_else(|| {
        MlSenseError::ValidationError("tuning grid produced no candidates".to_string())
    })?;

    Ok((
        model,
        TuningReport {
            metric,
            trials,
            best_index,
        },
    ))
}

/// Score a fitted model on a baked table with the given metric.
///
/// Classification probability metrics use the positive-class column for
/// binary outcomes and a one-vs-rest macro average otherwise.
pub fn evaluate(model: &dyn Model, metric: Metric, data: &Dataset) -> Result<f64> {
    match model.task() {
        TaskType::Regression => {
            let pred = model.predict(&data.features)?;
            metric.score(&data.outcome, &pred)
        }
        TaskType::Classification => match metric {
            Metric::Accuracy => {
                let pred = model.predict(&data.features)?;
                metric.score(&data.outcome, &pred)
            }
            Metric::RocAuc | Metric::LogLoss => {
                let classes = model.classes().ok_or(MlSenseError::ModelNotFitted)?;
                let proba = model.predict_proba(&data.features)?;
                if classes.len() == 2 {
                    let indicator = data
                        .outcome
                        .mapv(|v| if (v - classes[1]).abs() < 1e-12 { 1.0 } else { 0.0 });
                    metric.score(&indicator, &proba.column(1).to_owned())
                } else {
                    let mut total = 0.0;
                    for (k, &class) in classes.iter().enumerate() {
                        let indicator = data
                            .outcome
                            .mapv(|v| if (v - class).abs() < 1e-12 { 1.0 } else { 0.0 });
                        total += metric.score(&indicator, &proba.column(k).to_owned())?;
                    }
                    Ok(total / classes.len() as f64)
                }
            }
            _ => Err(MlSenseError::ValidationError(format!(
                "metric {} is not valid for classification",
                metric.name()
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MlpConfig;
    use ndarray::{Array1, Array2};

    fn regression_tables() -> (Dataset, Dataset) {
        let x = Array2::from_shape_fn((120, 2), |(i, j)| ((i * (j + 2) * 11) % 53) as f64 / 53.0);
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|row| 3.0 * row[0] - row[1])
            .collect();
        let train = Dataset::from_numeric(
            x.slice(ndarray::s![..90, ..]).to_owned(),
            &["a", "b"],
            y.slice(ndarray::s![..90]).to_owned(),
            "y",
        )
        .unwrap();
        let validation = Dataset::from_numeric(
            x.slice(ndarray::s![90.., ..]).to_owned(),
            &["a", "b"],
            y.slice(ndarray::s![90..]).to_owned(),
            "y",
        )
        .unwrap();
        (train, validation)
    }

    #[test]
    fn test_grid_size_matches_cartesian_product() {
        let grid = TuningGrid::default();
        let specs = candidates(&ModelSpec::NeuralNetwork(MlpConfig::default()), &grid);
        assert_eq!(specs.len(), 3 * 2 * 2);
    }

    #[test]
    fn test_best_trial_has_extreme_score() {
        let (train, validation) = regression_tables();
        let grid = TuningGrid {
            hidden_layers: vec![vec![4], vec![8]],
            learning_rates: vec![0.01],
            alphas: vec![1e-4],
        };
        let (_, report) = tune(
            &ModelSpec::NeuralNetwork(MlpConfig {
                max_epochs: 60,
                ..Default::default()
            }),
            &grid,
            Metric::Rmse,
            TaskType::Regression,
            &train,
            &validation,
        )
        .unwrap();

        assert_eq!(report.trials.len(), 2);
        let best = report.best().score;
        for trial in &report.trials {
            assert!(best <= trial.score + 1e-12);
        }
    }

    #[test]
    fn test_linear_grid_tunes_penalty() {
        let (train, validation) = regression_tables();
        let (model, report) = tune(
            &ModelSpec::Linear(LinearConfig::default()),
            &TuningGrid::default(),
            Metric::Rmse,
            TaskType::Regression,
            &train,
            &validation,
        )
        .unwrap();
        assert_eq!(report.trials.len(), 3);
        assert!(evaluate(model.as_ref(), Metric::Rmse, &validation).unwrap() < 0.1);
    }

    #[test]
    fn test_rejects_empty_validation_split() {
        let (train, _) = regression_tables();
        let empty = Dataset::from_numeric(
            Array2::zeros((0, 2)),
            &["a", "b"],
            Array1::zeros(0),
            "y",
        )
        .unwrap();
        let err = tune(
            &ModelSpec::Linear(LinearConfig::default()),
            &TuningGrid::default(),
            Metric::Rmse,
            TaskType::Regression,
            &train,
            &empty,
        )
        .unwrap_err();
        assert!(matches!(err, MlSenseError::ValidationError(_)));
    }
}

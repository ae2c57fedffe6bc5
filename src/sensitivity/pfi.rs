//! Permutation feature importance
//!
//! Shuffles one feature column at a time on the held-out table, re-scores the
//! model, and records the oriented degradation relative to the unpermuted
//! baseline. Each repetition contributes one row, so the returned table is
//! (n_repeats x n_features) and its column spread yields error bars.
//!
//! Sign convention: importance is `permuted - baseline` for lower-is-better
//! metrics and `baseline - permuted` for higher-is-better metrics, so a
//! positive value always means the model got worse, whatever the metric.

use crate::data::Dataset;
use crate::error::{MlSenseError, Result};
use crate::metrics::{accuracy, Metric, Polarity};
use crate::model::{Model, TaskType};
use crate::sensitivity::summary::{ImportanceResult, ImportanceTable};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Permutation importance computer
pub struct PermutationImportance {
    metric: Metric,
    n_repeats: usize,
    seed: Option<u64>,
}

impl PermutationImportance {
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            n_repeats: 10,
            seed: None,
        }
    }

    /// Set the number of permutation repetitions
    pub fn with_n_repeats(mut self, n_repeats: usize) -> Self {
        self.n_repeats = n_repeats.max(1);
        self
    }

    /// Set the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Compute importance on the baked test table.
    ///
    /// `outcome_levels` > 2 switches to one-vs-rest per-class scoring.
    pub fn compute(
        &self,
        model: &dyn Model,
        test: &Dataset,
        outcome_levels: usize,
    ) -> Result<ImportanceResult> {
        if test.n_samples() < 2 {
            return Err(MlSenseError::ComputationError(
                "permutation importance requires at least 2 test observations".to_string(),
            ));
        }

        match model.task() {
            TaskType::Regression => {
                let y = test.outcome.clone();
                let metric = self.metric;
                let table = self.permute_and_score(test, &|x| {
                    let pred = model.predict(x)?;
                    metric.score(&y, &pred)
                })?;
                Ok(ImportanceResult::PerObservation(table))
            }
            TaskType::Classification if outcome_levels <= 2 => {
                let classes = model.classes().ok_or(MlSenseError::ModelNotFitted)?;
                let positive_index = classes.len() - 1;
                let positive = classes[positive_index];
                let y = test.outcome.clone();
                let metric = self.metric;
                let table = self.permute_and_score(test, &|x| {
                    class_score(metric, model, x, &y, positive, positive_index)
                })?;
                Ok(ImportanceResult::PerObservation(table))
            }
            TaskType::Classification => {
                let classes: Vec<f64> = model
                    .classes()
                    .ok_or(MlSenseError::ModelNotFitted)?
                    .to_vec();
                let y = test.outcome.clone();
                let metric = self.metric;

                let mut per_class = BTreeMap::new();
                for (class_index, &class_value) in classes.iter().enumerate() {
                    let table = self.permute_and_score(test, &|x| {
                        class_score(metric, model, x, &y, class_value, class_index)
                    })?;
                    per_class.insert(crate::sensitivity::format_class_label(class_value), table);
                }
                Ok(ImportanceResult::PerClass(per_class))
            }
        }
    }

    /// Shared permutation loop: baseline score, then oriented degradation per
    /// repetition per feature. The scorer sees the (possibly permuted)
    /// feature matrix only.
    fn permute_and_score(
        &self,
        test: &Dataset,
        score: &(dyn Fn(&Array2<f64>) -> Result<f64> + Sync),
    ) -> Result<ImportanceTable> {
        let x = &test.features;
        let n_features = x.ncols();
        let base_seed = self.seed.unwrap_or_else(rand::random);

        let baseline = score(x)?;
        let polarity = self.metric.polarity();

        let mut values = Array2::zeros((self.n_repeats, n_features));
        for rep in 0..self.n_repeats {
            let row: Vec<f64> = (0..n_features)
                .into_par_iter()
                .map(|j| -> Result<f64> {
                    // Deterministic per-(repetition, feature) stream keeps
                    // the computation reproducible under rayon scheduling.
                    let mut rng = StdRng::seed_from_u64(
                        base_seed ^ ((rep as u64) << 32) ^ (j as u64).wrapping_mul(0x9e3779b9),
                    );
                    let mut col: Vec<f64> = x.column(j).to_vec();
                    col.shuffle(&mut rng);

                    let mut x_permuted = x.clone();
                    for (i, v) in col.into_iter().enumerate() {
                        x_permuted[[i, j]] = v;
                    }

                    let permuted = score(&x_permuted)?;
                    Ok(match polarity {
                        Polarity::LowerIsBetter => permuted - baseline,
                        Polarity::HigherIsBetter => baseline - permuted,
                    })
                })
                .collect::<Result<Vec<f64>>>()?;

            for (j, v) in row.into_iter().enumerate() {
                values[[rep, j]] = v;
            }
        }

        ImportanceTable::new(test.feature_names(), values)
    }
}

/// One-vs-rest score for a single class
fn class_score(
    metric: Metric,
    model: &dyn Model,
    x: &Array2<f64>,
    y: &Array1<f64>,
    class_value: f64,
    class_index: usize,
) -> Result<f64> {
    let indicator = y.mapv(|v| if (v - class_value).abs() < 1e-12 { 1.0 } else { 0.0 });
    match metric {
        Metric::Accuracy => {
            let pred = model.predict(x)?;
            let pred_indicator =
                pred.mapv(|v| if (v - class_value).abs() < 1e-12 { 1.0 } else { 0.0 });
            Ok(accuracy(&indicator, &pred_indicator))
        }
        Metric::RocAuc | Metric::LogLoss => {
            let proba = model.predict_proba(x)?;
            if class_index >= proba.ncols() {
                return Err(MlSenseError::ShapeError {
                    expected: format!("probability column {}", class_index),
                    actual: format!("{} columns", proba.ncols()),
                });
            }
            let scores = proba.column(class_index).to_owned();
            metric.score(&indicator, &scores)
        }
        _ => Err(MlSenseError::ValidationError(format!(
            "metric {} is not valid for classification scoring",
            metric.name()
        ))),
    }
}

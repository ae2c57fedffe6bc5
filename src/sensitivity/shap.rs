//! Sampling Shapley-value attribution
//!
//! A Monte-Carlo permutation estimator: for each test observation, features
//! enter a coalition in random order starting from a random background row,
//! and each feature is credited with its marginal prediction change, averaged
//! over many sampled permutations. The background set is the training table,
//! so attributions are relative to the expected training prediction.

use crate::data::Dataset;
use crate::error::{MlSenseError, Result};
use crate::model::{Model, TaskType};
use crate::sensitivity::summary::{ImportanceResult, ImportanceTable};
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Sampling Shapley explainer
pub struct ShapExplainer {
    n_samples: usize,
    seed: Option<u64>,
}

impl ShapExplainer {
    pub fn new() -> Self {
        Self {
            n_samples: 64,
            seed: None,
        }
    }

    /// Set the number of sampled permutations per observation
    pub fn with_n_samples(mut self, n: usize) -> Self {
        self.n_samples = n.max(10);
        self
    }

    /// Set the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Compute per-observation attributions on the baked test table, with
    /// the baked train table as background.
    pub fn compute(
        &self,
        model: &dyn Model,
        train: &Dataset,
        test: &Dataset,
        outcome_levels: usize,
    ) -> Result<ImportanceResult> {
        if train.n_samples() == 0 {
            return Err(MlSenseError::ComputationError(
                "Shapley estimation requires a non-empty background table".to_string(),
            ));
        }

        let background = &train.features;
        let x = &test.features;
        let names = test.feature_names();

        match model.task() {
            TaskType::Regression => {
                let values = self.explain_table(background, x, &|x| model.predict(x))?;
                Ok(ImportanceResult::PerObservation(ImportanceTable::new(
                    names, values,
                )?))
            }
            TaskType::Classification if outcome_levels <= 2 => {
                let classes = model.classes().ok_or(MlSenseError::ModelNotFitted)?;
                let positive_index = classes.len() - 1;
                let values = self.explain_table(background, x, &|x| {
                    Ok(model.predict_proba(x)?.column(positive_index).to_owned())
                })?;
                Ok(ImportanceResult::PerObservation(ImportanceTable::new(
                    names, values,
                )?))
            }
            TaskType::Classification => {
                let classes: Vec<f64> = model
                    .classes()
                    .ok_or(MlSenseError::ModelNotFitted)?
                    .to_vec();
                let mut per_class = BTreeMap::new();
                for (class_index, &class_value) in classes.iter().enumerate() {
                    let values = self.explain_table(background, x, &|x| {
                        Ok(model.predict_proba(x)?.column(class_index).to_owned())
                    })?;
                    per_class.insert(
                        crate::sensitivity::format_class_label(class_value),
                        ImportanceTable::new(names.clone(), values)?,
                    );
                }
                Ok(ImportanceResult::PerClass(per_class))
            }
        }
    }

    /// One attribution row per observation in `x`
    fn explain_table(
        &self,
        background: &Array2<f64>,
        x: &Array2<f64>,
        predict: &(dyn Fn(&Array2<f64>) -> Result<Array1<f64>> + Sync),
    ) -> Result<Array2<f64>> {
        let n_features = x.ncols();
        let base_seed = self.seed.unwrap_or_else(rand::random);

        let rows: Vec<Vec<f64>> = (0..x.nrows())
            .into_par_iter()
            .map(|idx| {
                self.explain_instance(
                    background,
                    &x.row(idx).to_owned(),
                    predict,
                    base_seed.wrapping_add(idx as u64),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let mut values = Array2::zeros((x.nrows(), n_features));
        for (i, row) in rows.into_iter().enumerate() {
            for (j, v) in row.into_iter().enumerate() {
                values[[i, j]] = v;
            }
        }
        Ok(values)
    }

    fn explain_instance(
        &self,
        background: &Array2<f64>,
        instance: &Array1<f64>,
        predict: &(dyn Fn(&Array2<f64>) -> Result<Array1<f64>> + Sync),
        seed: u64,
    ) -> Result<Vec<f64>> {
        let n_features = instance.len();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut contributions = vec![0.0; n_features];

        for _ in 0..self.n_samples {
            let mut perm: Vec<usize> = (0..n_features).collect();
            perm.shuffle(&mut rng);

            let bg_idx = rng.gen_range(0..background.nrows());
            let mut coalition = background.row(bg_idx).to_owned();

            let mut pred_before =
                predict(&coalition.clone().insert_axis(Axis(0)))?[0];

            for &feature_idx in &perm {
                coalition[feature_idx] = instance[feature_idx];
                let pred_after =
                    predict(&coalition.clone().insert_axis(Axis(0)))?[0];
                contributions[feature_idx] += pred_after - pred_before;
                pred_before = pred_after;
            }
        }

        for c in &mut contributions {
            *c /= self.n_samples as f64;
        }
        Ok(contributions)
    }
}

impl Default for ShapExplainer {
    fn default() -> Self {
        Self::new()
    }
}

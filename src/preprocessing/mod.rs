//! Preprocessing recipe
//!
//! A two-phase transform in the fit/apply style:
//! - [`Recipe::prep`] learns column statistics from the training split
//! - [`FittedRecipe::bake`] applies them to any table
//!
//! Numeric columns are standardized (zero mean, unit variance); categorical
//! columns are one-hot expanded using the levels recorded in the metadata.
//! Baking is deterministic given the same training table.

use crate::data::{ColumnType, Dataset, FeatureMeta};
use crate::error::{MlSenseError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Recipe specification (unfitted)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    /// Standardize numeric columns
    pub standardize: bool,
    /// One-hot expand categorical columns
    pub one_hot: bool,
}

impl Default for Recipe {
    fn default() -> Self {
        Self {
            standardize: true,
            one_hot: true,
        }
    }
}

/// Per-column learned transform
#[derive(Debug, Clone, Serialize, Deserialize)]
enum ColumnStep {
    /// (mean, std) learned on train; std floored away from zero
    Standardize { mean: f64, std: f64 },
    /// Pass the column through unchanged
    Identity,
    /// Expand into one indicator column per level
    OneHot { levels: Vec<String> },
}

/// A recipe with statistics learned from a training table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedRecipe {
    steps: Vec<(FeatureMeta, ColumnStep)>,
    output_meta: Vec<FeatureMeta>,
}

impl Recipe {
    /// Learn column statistics from the training split
    pub fn prep(&self, train: &Dataset) -> Result<FittedRecipe> {
        if train.n_samples() == 0 {
            return Err(MlSenseError::PreprocessingError(
                "cannot prep a recipe on an empty training table".to_string(),
            ));
        }

        let mut steps = Vec::with_capacity(train.n_features());
        let mut output_meta = Vec::new();

        for (j, meta) in train.meta.iter().enumerate() {
            match meta.dtype {
                ColumnType::Numeric => {
                    let step = if self.standardize {
                        let col = train.features.column(j);
                        let mean = col.mean().unwrap_or(0.0);
                        let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
                            / col.len() as f64;
                        ColumnStep::Standardize {
                            mean,
                            std: var.sqrt().max(1e-12),
                        }
                    } else {
                        ColumnStep::Identity
                    };
                    steps.push((meta.clone(), step));
                    output_meta.push(FeatureMeta::numeric(&meta.name));
                }
                ColumnType::Categorical => {
                    let levels = meta.levels.clone().ok_or_else(|| {
                        MlSenseError::PreprocessingError(format!(
                            "categorical column {} has no recorded levels",
                            meta.name
                        ))
                    })?;
                    if self.one_hot {
                        for level in &levels {
                            output_meta
                                .push(FeatureMeta::numeric(format!("{}_{}", meta.name, level)));
                        }
                        steps.push((meta.clone(), ColumnStep::OneHot { levels }));
                    } else {
                        steps.push((meta.clone(), ColumnStep::Identity));
                        output_meta.push(FeatureMeta::numeric(&meta.name));
                    }
                }
            }
        }

        Ok(FittedRecipe { steps, output_meta })
    }
}

impl FittedRecipe {
    /// Names of the columns produced by [`bake`](Self::bake)
    pub fn output_names(&self) -> Vec<String> {
        self.output_meta.iter().map(|m| m.name.clone()).collect()
    }

    /// Apply the learned transforms to a table
    pub fn bake(&self, dataset: &Dataset) -> Result<Dataset> {
        if dataset.n_features() != self.steps.len() {
            return Err(MlSenseError::ShapeError {
                expected: format!("{} feature columns", self.steps.len()),
                actual: format!("{}", dataset.n_features()),
            });
        }

        let n = dataset.n_samples();
        let mut columns: Vec<Vec<f64>> = Vec::with_capacity(self.output_meta.len());

        for (j, (meta, step)) in self.steps.iter().enumerate() {
            if dataset.meta[j].name != meta.name {
                return Err(MlSenseError::PreprocessingError(format!(
                    "column {} expected at position {}, found {}",
                    meta.name, j, dataset.meta[j].name
                )));
            }
            let col = dataset.features.column(j);
            match step {
                ColumnStep::Standardize { mean, std } => {
                    columns.push(col.iter().map(|v| (v - mean) / std).collect());
                }
                ColumnStep::Identity => {
                    columns.push(col.to_vec());
                }
                ColumnStep::OneHot { levels } => {
                    for (code, _) in levels.iter().enumerate() {
                        columns.push(
                            col.iter()
                                .map(|v| if (*v - code as f64).abs() < 0.5 { 1.0 } else { 0.0 })
                                .collect(),
                        );
                    }
                }
            }
        }

        let mut features = Array2::zeros((n, columns.len()));
        for (c, values) in columns.iter().enumerate() {
            for (r, v) in values.iter().enumerate() {
                features[[r, c]] = *v;
            }
        }

        Dataset::new(
            features,
            self.output_meta.clone(),
            dataset.outcome.clone(),
            dataset.outcome_name.clone(),
        )
    }
}

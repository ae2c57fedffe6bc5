//! Tabular data model
//!
//! Provides the in-memory table used across the pipeline:
//! - [`Dataset`]: feature matrix + per-column metadata + outcome column
//! - [`ColumnType`] / [`FeatureMeta`]: numeric vs. categorical column info
//! - [`DataSplit`] / [`split_dataset`]: seeded train/validation/test split
//!
//! Categorical features are stored integer-coded in the feature matrix and
//! expanded by the preprocessing recipe; the raw metadata keeps their levels.

use crate::error::{MlSenseError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// Column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Numeric,
    Categorical,
}

/// Per-column metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMeta {
    /// Column name
    pub name: String,
    /// Column type
    pub dtype: ColumnType,
    /// Category levels (categorical columns only); index = integer code
    pub levels: Option<Vec<String>>,
}

impl FeatureMeta {
    /// Numeric column metadata
    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dtype: ColumnType::Numeric,
            levels: None,
        }
    }

    /// Categorical column metadata with its levels
    pub fn categorical(name: impl Into<String>, levels: Vec<String>) -> Self {
        Self {
            name: name.into(),
            dtype: ColumnType::Categorical,
            levels: Some(levels),
        }
    }
}

/// A feature table with an outcome column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    /// Feature matrix, one row per observation
    pub features: Array2<f64>,
    /// Per-column metadata, one entry per feature column
    pub meta: Vec<FeatureMeta>,
    /// Outcome column
    pub outcome: Array1<f64>,
    /// Outcome column name
    pub outcome_name: String,
}

impl Dataset {
    /// Create a dataset, validating shape agreement
    pub fn new(
        features: Array2<f64>,
        meta: Vec<FeatureMeta>,
        outcome: Array1<f64>,
        outcome_name: impl Into<String>,
    ) -> Result<Self> {
        if features.ncols() != meta.len() {
            return Err(MlSenseError::ShapeError {
                expected: format!("{} metadata entries", features.ncols()),
                actual: format!("{}", meta.len()),
            });
        }
        if features.nrows() != outcome.len() {
            return Err(MlSenseError::ShapeError {
                expected: format!("{} outcome values", features.nrows()),
                actual: format!("{}", outcome.len()),
            });
        }
        Ok(Self {
            features,
            meta,
            outcome,
            outcome_name: outcome_name.into(),
        })
    }

    /// Convenience constructor for all-numeric feature matrices
    pub fn from_numeric(
        features: Array2<f64>,
        feature_names: &[&str],
        outcome: Array1<f64>,
        outcome_name: &str,
    ) -> Result<Self> {
        let meta = feature_names
            .iter()
            .map(|n| FeatureMeta::numeric(*n))
            .collect();
        Self::new(features, meta, outcome, outcome_name)
    }

    /// Number of observations
    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    /// Number of feature columns
    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Feature column names in order
    pub fn feature_names(&self) -> Vec<String> {
        self.meta.iter().map(|m| m.name.clone()).collect()
    }

    /// Whether every feature column is numeric
    pub fn all_numeric(&self) -> bool {
        self.meta.iter().all(|m| m.dtype == ColumnType::Numeric)
    }

    /// Distinct outcome values, sorted ascending
    pub fn outcome_values(&self) -> Vec<f64> {
        let mut values: Vec<f64> = self.outcome.to_vec();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        values.dedup_by(|a, b| (*a - *b).abs() < 1e-12);
        values
    }

    /// Select a subset of rows by index
    pub fn select_rows(&self, indices: &[usize]) -> Result<Self> {
        let n_cols = self.n_features();
        let mut rows = Vec::with_capacity(indices.len() * n_cols);
        let mut outcome = Vec::with_capacity(indices.len());
        for &i in indices {
            if i >= self.n_samples() {
                return Err(MlSenseError::DataError(format!(
                    "row index {} out of bounds for {} rows",
                    i,
                    self.n_samples()
                )));
            }
            rows.extend(self.features.row(i).iter().copied());
            outcome.push(self.outcome[i]);
        }
        Ok(Self {
            features: Array2::from_shape_vec((indices.len(), n_cols), rows)?,
            meta: self.meta.clone(),
            outcome: Array1::from_vec(outcome),
            outcome_name: self.outcome_name.clone(),
        })
    }

    /// Column means of the feature matrix
    pub fn feature_means(&self) -> Array1<f64> {
        self.features
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(self.n_features()))
    }
}

/// Train/validation/test partition of a dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSplit {
    pub train: Dataset,
    pub validation: Dataset,
    pub test: Dataset,
}

/// Split configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of rows assigned to the training split
    pub train_fraction: f64,
    /// Fraction of rows assigned to the validation split
    pub validation_fraction: f64,
    /// Random seed for the shuffle
    pub seed: Option<u64>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_fraction: 0.6,
            validation_fraction: 0.2,
            seed: Some(42),
        }
    }
}

/// Shuffle row indices with a seeded RNG and cut into three contiguous blocks
pub fn split_dataset(dataset: &Dataset, config: &SplitConfig) -> Result<DataSplit> {
    if config.train_fraction <= 0.0
        || config.validation_fraction < 0.0
        || config.train_fraction + config.validation_fraction >= 1.0
    {
        return Err(MlSenseError::InvalidParameter {
            name: "split fractions".to_string(),
            value: format!(
                "train={}, validation={}",
                config.train_fraction, config.validation_fraction
            ),
            reason: "train > 0, validation >= 0, train + validation < 1 required".to_string(),
        });
    }

    let n = dataset.n_samples();
    if n < 3 {
        return Err(MlSenseError::DataError(
            "splitting requires at least 3 observations".to_string(),
        ));
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng);

    let n_train = ((n as f64) * config.train_fraction).round().max(1.0) as usize;
    let n_val = ((n as f64) * config.validation_fraction).round() as usize;
    let n_train = n_train.min(n - 2);
    let n_val = n_val.min(n - n_train - 1);

    let train_idx = &indices[..n_train];
    let val_idx = &indices[n_train..n_train + n_val];
    let test_idx = &indices[n_train + n_val..];

    Ok(DataSplit {
        train: dataset.select_rows(train_idx)?,
        validation: dataset.select_rows(val_idx)?,
        test: dataset.select_rows(test_idx)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn toy_dataset(n: usize) -> Dataset {
        let features =
            Array2::from_shape_fn((n, 2), |(i, j)| i as f64 + 0.1 * j as f64);
        let outcome = Array1::from_shape_fn(n, |i| i as f64);
        Dataset::from_numeric(features, &["a", "b"], outcome, "y").unwrap()
    }

    #[test]
    fn test_dataset_shape_validation() {
        let features = array![[1.0, 2.0], [3.0, 4.0]];
        let bad_meta = vec![FeatureMeta::numeric("a")];
        let outcome = array![0.0, 1.0];
        assert!(Dataset::new(features, bad_meta, outcome, "y").is_err());
    }

    #[test]
    fn test_outcome_values_dedup() {
        let features = array![[1.0], [2.0], [3.0], [4.0]];
        let outcome = array![1.0, 0.0, 1.0, 2.0];
        let ds = Dataset::from_numeric(features, &["a"], outcome, "y").unwrap();
        assert_eq!(ds.outcome_values(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_split_sizes_and_disjointness() {
        let ds = toy_dataset(100);
        let split = split_dataset(&ds, &SplitConfig::default()).unwrap();
        assert_eq!(split.train.n_samples(), 60);
        assert_eq!(split.validation.n_samples(), 20);
        assert_eq!(split.test.n_samples(), 20);
        assert_eq!(
            split.train.n_samples() + split.validation.n_samples() + split.test.n_samples(),
            100
        );
    }

    #[test]
    fn test_split_deterministic_with_seed() {
        let ds = toy_dataset(50);
        let cfg = SplitConfig::default();
        let a = split_dataset(&ds, &cfg).unwrap();
        let b = split_dataset(&ds, &cfg).unwrap();
        assert_eq!(a.train.outcome, b.train.outcome);
        assert_eq!(a.test.outcome, b.test.outcome);
    }

    #[test]
    fn test_split_rejects_bad_fractions() {
        let ds = toy_dataset(10);
        let cfg = SplitConfig {
            train_fraction: 0.9,
            validation_fraction: 0.2,
            seed: Some(1),
        };
        assert!(split_dataset(&ds, &cfg).is_err());
    }

    #[test]
    fn test_select_rows_out_of_bounds() {
        let ds = toy_dataset(5);
        assert!(ds.select_rows(&[0, 7]).is_err());
    }
}

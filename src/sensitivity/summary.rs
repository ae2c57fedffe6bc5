//! Importance result shapes and the result normalizer
//!
//! The five computers return heterogeneous shapes; [`ImportanceResult`] is
//! the single sum type that reconciles them, and [`summarize`] collapses a
//! per-row importance table into the ranked (feature, mean |importance|,
//! standard error) form every bar plot consumes.

use crate::error::{MlSenseError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A (rows x features) importance table.
///
/// Rows are test observations (SHAP, Integrated Gradients) or permutation
/// repetitions (PFI).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportanceTable {
    pub feature_names: Vec<String>,
    pub values: Array2<f64>,
}

impl ImportanceTable {
    pub fn new(feature_names: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if feature_names.len() != values.ncols() {
            return Err(MlSenseError::ShapeError {
                expected: format!("{} feature columns", feature_names.len()),
                actual: format!("{}", values.ncols()),
            });
        }
        Ok(Self {
            feature_names,
            values,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.values.ncols()
    }
}

/// One signed importance value per feature (no per-observation dimension)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportanceVector {
    pub feature_names: Vec<String>,
    pub values: Array1<f64>,
}

impl fmt::Display for ImportanceVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<24} {:>14}", "feature", "importance")?;
        let mut order: Vec<usize> = (0..self.values.len()).collect();
        order.sort_by(|&a, &b| {
            self.values[b]
                .abs()
                .partial_cmp(&self.values[a].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for i in order {
            writeln!(f, "{:<24} {:>14.6}", self.feature_names[i], self.values[i])?;
        }
        Ok(())
    }
}

/// First-order and total-order variance-decomposition indices per feature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SobolIndices {
    pub feature_names: Vec<String>,
    pub first_order: Array1<f64>,
    pub total_order: Array1<f64>,
}

impl fmt::Display for SobolIndices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<24} {:>12} {:>12}",
            "feature", "first_order", "total_order"
        )?;
        let mut order: Vec<usize> = (0..self.feature_names.len()).collect();
        order.sort_by(|&a, &b| {
            self.total_order[b]
                .partial_cmp(&self.total_order[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for i in order {
            writeln!(
                f,
                "{:<24} {:>12.6} {:>12.6}",
                self.feature_names[i], self.first_order[i], self.total_order[i]
            )?;
        }
        Ok(())
    }
}

/// Result payload of one sensitivity method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ImportanceResult {
    /// Binary/continuous outcome: one table
    PerObservation(ImportanceTable),
    /// Multi-class outcome: one table per class label
    PerClass(BTreeMap<String, ImportanceTable>),
    /// Weight-derived importance: one signed vector per class label
    ClassWeights(BTreeMap<String, ImportanceVector>),
    /// Variance-decomposition indices (Sobol-Jansen)
    VarianceIndices(SobolIndices),
}

/// One row of a normalized summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSummary {
    pub feature: String,
    pub mean_importance: f64,
    pub std_error: f64,
}

/// The canonical ranked-summary shape consumed by bar plots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedSummary {
    pub entries: Vec<FeatureSummary>,
}

impl fmt::Display for NormalizedSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<24} {:>14} {:>12}",
            "feature", "mean_importance", "std_error"
        )?;
        for entry in &self.entries {
            writeln!(
                f,
                "{:<24} {:>14.6} {:>12.6}",
                entry.feature, entry.mean_importance, entry.std_error
            )?;
        }
        Ok(())
    }
}

/// Collapse a per-row importance table into a ranked summary: per feature the
/// mean of absolute values and the standard error of the mean (sd / sqrt(n)),
/// sorted descending by mean.
pub fn summarize(table: &ImportanceTable) -> NormalizedSummary {
    let n = table.n_rows().max(1) as f64;

    let mut entries: Vec<FeatureSummary> = table
        .feature_names
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let col = table.values.column(j);
            let mean_abs = col.iter().map(|v| v.abs()).sum::<f64>() / n;
            let variance =
                col.iter().map(|v| (v.abs() - mean_abs).powi(2)).sum::<f64>() / n;
            FeatureSummary {
                feature: name.clone(),
                mean_importance: mean_abs,
                std_error: variance.sqrt() / n.sqrt(),
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        b.mean_importance
            .partial_cmp(&a.mean_importance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    NormalizedSummary { entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_table_shape_validation() {
        let values = array![[1.0, 2.0], [3.0, 4.0]];
        assert!(ImportanceTable::new(vec!["a".into()], values).is_err());
    }

    #[test]
    fn test_summarize_sorted_descending() {
        let table = ImportanceTable::new(
            vec!["a".into(), "b".into(), "c".into()],
            array![[0.1, -0.9, 0.4], [0.2, 0.8, -0.5]],
        )
        .unwrap();

        let summary = summarize(&table);
        assert_eq!(summary.entries[0].feature, "b");
        assert_eq!(summary.entries[1].feature, "c");
        assert_eq!(summary.entries[2].feature, "a");
        for pair in summary.entries.windows(2) {
            assert!(pair[0].mean_importance >= pair[1].mean_importance);
        }
    }

    #[test]
    fn test_summarize_all_zero_input() {
        let table = ImportanceTable::new(
            vec!["a".into(), "b".into()],
            Array2::zeros((5, 2)),
        )
        .unwrap();

        let summary = summarize(&table);
        for entry in &summary.entries {
            assert_eq!(entry.mean_importance, 0.0);
            assert_eq!(entry.std_error, 0.0);
        }
    }

    #[test]
    fn test_summarize_uses_absolute_values() {
        let table = ImportanceTable::new(
            vec!["a".into()],
            array![[-2.0], [2.0], [-2.0], [2.0]],
        )
        .unwrap();
        let summary = summarize(&table);
        assert_eq!(summary.entries[0].mean_importance, 2.0);
        assert_eq!(summary.entries[0].std_error, 0.0);
    }

    #[test]
    fn test_std_error_known_value() {
        // column values 1, 3 -> mean abs 2, population sd 1, se 1/sqrt(2)
        let table =
            ImportanceTable::new(vec!["a".into()], array![[1.0], [3.0]]).unwrap();
        let summary = summarize(&table);
        assert!((summary.entries[0].mean_importance - 2.0).abs() < 1e-12);
        assert!((summary.entries[0].std_error - 1.0 / 2.0f64.sqrt()).abs() < 1e-12);
    }
}

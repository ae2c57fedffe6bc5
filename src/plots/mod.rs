//! Plot construction
//!
//! Plots are pure values: a builder maps an importance table or summary to a
//! serializable [`Plot`] (kind + title + data payload) without touching its
//! inputs. Rendering is the caller's choice — `Display` gives a compact text
//! view and [`Plot::to_json`] the machine-readable form.

use crate::error::{MlSenseError, Result};
use crate::sensitivity::{ImportanceTable, NormalizedSummary, SobolIndices};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Renderer family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlotKind {
    RankedBar,
    DirectionalBar,
    Box,
    Swarm,
}

/// Five-number summary for one box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxStats {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// One point of a swarm plot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmPoint {
    /// Index into the plot's feature list (the y position)
    pub feature_index: usize,
    /// Importance value (the x position)
    pub importance: f64,
    /// Feature value of the originating observation (the color)
    pub feature_value: f64,
}

/// Kind-specific plot payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PlotData {
    /// Horizontal bars ordered by descending importance, with std-error
    /// whiskers
    RankedBar {
        features: Vec<String>,
        means: Vec<f64>,
        std_errors: Vec<f64>,
    },
    /// Signed per-feature sensitivity coefficients
    DirectionalBar {
        features: Vec<String>,
        coefficients: Vec<f64>,
    },
    /// Per-feature importance distribution, ordered by mean |importance|
    Box {
        features: Vec<String>,
        stats: Vec<BoxStats>,
    },
    /// Per-observation importance scatter, colored by feature value
    Swarm {
        features: Vec<String>,
        points: Vec<SwarmPoint>,
    },
}

/// A constructed, displayable plot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plot {
    pub title: String,
    pub data: PlotData,
}

impl Plot {
    pub fn kind(&self) -> PlotKind {
        match &self.data {
            PlotData::RankedBar { .. } => PlotKind::RankedBar,
            PlotData::DirectionalBar { .. } => PlotKind::DirectionalBar,
            PlotData::Box { .. } => PlotKind::Box,
            PlotData::Swarm { .. } => PlotKind::Swarm,
        }
    }

    /// Machine-readable form for external charting frontends
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl fmt::Display for Plot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{:?}] {}", self.kind(), self.title)?;
        match &self.data {
            PlotData::RankedBar {
                features,
                means,
                std_errors,
            } => {
                let max = means.iter().cloned().fold(f64::MIN_POSITIVE, f64::max);
                for ((name, mean), se) in features.iter().zip(means).zip(std_errors) {
                    let width = ((mean / max) * 40.0).round().max(0.0) as usize;
                    writeln!(
                        f,
                        "{:<24} {} {:.4} (±{:.4})",
                        name,
                        "#".repeat(width),
                        mean,
                        se
                    )?;
                }
            }
            PlotData::DirectionalBar {
                features,
                coefficients,
            } => {
                for (name, coef) in features.iter().zip(coefficients) {
                    let sign = if *coef >= 0.0 { "+" } else { "-" };
                    writeln!(f, "{:<24} {} {:.4}", name, sign, coef)?;
                }
            }
            PlotData::Box { features, stats } => {
                for (name, s) in features.iter().zip(stats) {
                    writeln!(
                        f,
                        "{:<24} |{:.3} [{:.3} {:.3} {:.3}] {:.3}|",
                        name, s.min, s.q1, s.median, s.q3, s.max
                    )?;
                }
            }
            PlotData::Swarm { features, points } => {
                writeln!(f, "{} features, {} points", features.len(), points.len())?;
            }
        }
        Ok(())
    }
}

/// Ranked bar plot from a normalized summary
pub fn ranked_bar(summary: &NormalizedSummary, title: impl Into<String>) -> Plot {
    Plot {
        title: title.into(),
        data: PlotData::RankedBar {
            features: summary.entries.iter().map(|e| e.feature.clone()).collect(),
            means: summary.entries.iter().map(|e| e.mean_importance).collect(),
            std_errors: summary.entries.iter().map(|e| e.std_error).collect(),
        },
    }
}

/// Directional bar from signed per-feature values (Olden weights)
pub fn signed_bar(
    features: Vec<String>,
    values: Vec<f64>,
    title: impl Into<String>,
) -> Plot {
    Plot {
        title: title.into(),
        data: PlotData::DirectionalBar {
            features,
            coefficients: values,
        },
    }
}

/// Directional bar from a per-observation importance table.
///
/// The coefficient for feature j is `cov(importance_j, x_j) / var(x_j)` over
/// the test observations: positive when high feature values push the
/// prediction up. `feature_values` must be the baked test feature matrix,
/// row-aligned with the table.
pub fn directional_bar(
    table: &ImportanceTable,
    feature_values: &Array2<f64>,
    title: impl Into<String>,
) -> Result<Plot> {
    if feature_values.nrows() != table.n_rows() || feature_values.ncols() != table.n_features() {
        return Err(MlSenseError::ShapeError {
            expected: format!("{} x {} feature values", table.n_rows(), table.n_features()),
            actual: format!("{} x {}", feature_values.nrows(), feature_values.ncols()),
        });
    }

    let n = table.n_rows() as f64;
    let mut coefficients = Vec::with_capacity(table.n_features());

    for j in 0..table.n_features() {
        let imp = table.values.column(j);
        let x = feature_values.column(j);

        let imp_mean = imp.sum() / n;
        let x_mean = x.sum() / n;
        let cov = imp
            .iter()
            .zip(x.iter())
            .map(|(i, v)| (i - imp_mean) * (v - x_mean))
            .sum::<f64>()
            / n;
        let var = x.iter().map(|v| (v - x_mean).powi(2)).sum::<f64>() / n;

        if var < 1e-12 {
            return Err(MlSenseError::ComputationError(format!(
                "degenerate variance for feature {} in directional sensitivity",
                table.feature_names[j]
            )));
        }
        coefficients.push(cov / var);
    }

    Ok(Plot {
        title: title.into(),
        data: PlotData::DirectionalBar {
            features: table.feature_names.clone(),
            coefficients,
        },
    })
}

/// Box plot of the per-row importance distributions, ordered by mean
/// |importance| descending
pub fn box_plot(table: &ImportanceTable, title: impl Into<String>) -> Plot {
    let n = table.n_rows().max(1) as f64;

    let mut order: Vec<usize> = (0..table.n_features()).collect();
    let mean_abs: Vec<f64> = (0..table.n_features())
        .map(|j| table.values.column(j).iter().map(|v| v.abs()).sum::<f64>() / n)
        .collect();
    order.sort_by(|&a, &b| {
        mean_abs[b]
            .partial_cmp(&mean_abs[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut features = Vec::with_capacity(order.len());
    let mut stats = Vec::with_capacity(order.len());
    for &j in &order {
        let mut col: Vec<f64> = table.values.column(j).to_vec();
        col.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        features.push(table.feature_names[j].clone());
        stats.push(BoxStats {
            min: col[0],
            q1: quantile(&col, 0.25),
            median: quantile(&col, 0.5),
            q3: quantile(&col, 0.75),
            max: col[col.len() - 1],
        });
    }

    Plot {
        title: title.into(),
        data: PlotData::Box { features, stats },
    }
}

/// Swarm plot: one point per observation per feature, colored by the
/// observation's feature value. Features are ranked by mean |importance| so
/// `feature_index` doubles as the rank.
pub fn swarm(
    table: &ImportanceTable,
    feature_values: &Array2<f64>,
    title: impl Into<String>,
) -> Result<Plot> {
    if feature_values.nrows() != table.n_rows() || feature_values.ncols() != table.n_features() {
        return Err(MlSenseError::ShapeError {
            expected: format!("{} x {} feature values", table.n_rows(), table.n_features()),
            actual: format!("{} x {}", feature_values.nrows(), feature_values.ncols()),
        });
    }

    let n = table.n_rows().max(1) as f64;
    let mut order: Vec<usize> = (0..table.n_features()).collect();
    let mean_abs: Vec<f64> = (0..table.n_features())
        .map(|j| table.values.column(j).iter().map(|v| v.abs()).sum::<f64>() / n)
        .collect();
    order.sort_by(|&a, &b| {
        mean_abs[b]
            .partial_cmp(&mean_abs[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let features: Vec<String> = order
        .iter()
        .map(|&j| table.feature_names[j].clone())
        .collect();
    let mut points = Vec::with_capacity(table.n_rows() * table.n_features());
    for (rank, &j) in order.iter().enumerate() {
        for i in 0..table.n_rows() {
            points.push(SwarmPoint {
                feature_index: rank,
                importance: table.values[[i, j]],
                feature_value: feature_values[[i, j]],
            });
        }
    }

    Ok(Plot {
        title: title.into(),
        data: PlotData::Swarm { features, points },
    })
}

/// Bar plot of Sobol indices (first- or total-order)
pub fn sobol_bar(indices: &SobolIndices, total: bool, title: impl Into<String>) -> Plot {
    let values = if total {
        &indices.total_order
    } else {
        &indices.first_order
    };

    let mut order: Vec<usize> = (0..indices.feature_names.len()).collect();
    order.sort_by(|&a, &b| {
        values[b]
            .partial_cmp(&values[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Plot {
        title: title.into(),
        data: PlotData::RankedBar {
            features: order
                .iter()
                .map(|&j| indices.feature_names[j].clone())
                .collect(),
            means: order.iter().map(|&j| values[j]).collect(),
            std_errors: vec![0.0; order.len()],
        },
    }
}

/// Linear-interpolated quantile of pre-sorted values
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensitivity::summarize;
    use ndarray::array;

    fn table() -> ImportanceTable {
        ImportanceTable::new(
            vec!["a".into(), "b".into()],
            array![[0.5, -0.1], [1.5, 0.1], [1.0, -0.2], [2.0, 0.2]],
        )
        .unwrap()
    }

    #[test]
    fn test_ranked_bar_preserves_summary_order() {
        let summary = summarize(&table());
        let plot = ranked_bar(&summary, "importance");
        match &plot.data {
            PlotData::RankedBar { features, means, .. } => {
                assert_eq!(features[0], "a");
                assert!(means[0] >= means[1]);
            }
            _ => panic!("expected a ranked bar"),
        }
        assert_eq!(plot.kind(), PlotKind::RankedBar);
    }

    #[test]
    fn test_directional_bar_sign_tracks_relationship() {
        let t = table();
        // Importance of column a rises with x_a, importance of column b
        // falls with x_b.
        let x = array![
            [1.0, 4.0],
            [3.0, 3.0],
            [2.0, 2.0],
            [4.0, 1.0]
        ];
        let plot = directional_bar(&t, &x, "direction").unwrap();
        match &plot.data {
            PlotData::DirectionalBar { coefficients, .. } => {
                assert!(coefficients[0] > 0.0);
                assert!(coefficients[1] < 0.0);
            }
            _ => panic!("expected a directional bar"),
        }
    }

    #[test]
    fn test_directional_bar_rejects_constant_feature() {
        let t = table();
        let x = array![[1.0, 2.0], [1.0, 3.0], [1.0, 4.0], [1.0, 5.0]];
        let err = directional_bar(&t, &x, "direction").unwrap_err();
        assert!(matches!(err, MlSenseError::ComputationError(_)));
        assert!(err.to_string().contains("a"));
    }

    #[test]
    fn test_box_plot_ordering_and_quartiles() {
        let plot = box_plot(&table(), "spread");
        match &plot.data {
            PlotData::Box { features, stats } => {
                assert_eq!(features[0], "a");
                let s = &stats[0];
                assert_eq!(s.min, 0.5);
                assert_eq!(s.max, 2.0);
                assert!((s.median - 1.25).abs() < 1e-12);
            }
            _ => panic!("expected a box plot"),
        }
    }

    #[test]
    fn test_swarm_point_count_and_alignment() {
        let t = table();
        let x = array![[1.0, 5.0], [2.0, 6.0], [3.0, 7.0], [4.0, 8.0]];
        let plot = swarm(&t, &x, "swarm").unwrap();
        match &plot.data {
            PlotData::Swarm { features, points } => {
                assert_eq!(points.len(), 8);
                assert_eq!(features.len(), 2);
                // Rank 0 is feature a (larger mean |importance|)
                assert_eq!(features[0], "a");
            }
            _ => panic!("expected a swarm plot"),
        }
    }

    #[test]
    fn test_plot_round_trips_through_json() {
        let summary = summarize(&table());
        let plot = ranked_bar(&summary, "importance");
        let json = plot.to_json().unwrap();
        let back: Plot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind(), PlotKind::RankedBar);
        assert_eq!(back.title, "importance");
    }

    #[test]
    fn test_builders_do_not_mutate_inputs() {
        let t = table();
        let before = t.values.clone();
        let _ = box_plot(&t, "spread");
        let summary = summarize(&t);
        let _ = ranked_bar(&summary, "bar");
        assert_eq!(t.values, before);
    }
}

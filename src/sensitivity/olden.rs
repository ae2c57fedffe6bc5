//! Connection-weight importance (Olden)
//!
//! Sums, for each input feature, the signed product of connection weights
//! along every path from that input to each output unit. For a layered
//! network this is exactly the product of the layer weight matrices, giving
//! an (n_features x n_outputs) matrix with no per-observation dimension.

use crate::error::{MlSenseError, Result};
use crate::model::{Model, TaskType};
use crate::sensitivity::summary::{ImportanceResult, ImportanceVector};
use ndarray::Array2;
use std::collections::BTreeMap;

/// Connection-weight importance computer
pub struct OldenImportance;

impl OldenImportance {
    /// Compute per-class weight importance from the fitted network.
    ///
    /// Regression yields a single vector keyed by the outcome name; binary
    /// classification reports the positive-class column (the other column is
    /// its mirror image under softmax); multi-class yields one vector per
    /// class.
    pub fn compute(
        model: &dyn Model,
        feature_names: &[String],
        outcome_name: &str,
        outcome_levels: usize,
    ) -> Result<ImportanceResult> {
        let net = model
            .as_neural()
            .ok_or_else(|| MlSenseError::UnsupportedMethod {
                method: "Olden".to_string(),
                requirement: "a fitted neural network model".to_string(),
            })?;

        let weights = net.layer_weights();
        if weights.is_empty() {
            return Err(MlSenseError::ModelNotFitted);
        }
        if weights[0].nrows() != feature_names.len() {
            return Err(MlSenseError::ShapeError {
                expected: format!("{} input features", weights[0].nrows()),
                actual: format!("{}", feature_names.len()),
            });
        }

        // Path-product over all layers: (n_features x n_outputs)
        let product: Array2<f64> = weights[1..]
            .iter()
            .fold(weights[0].clone(), |acc, w| acc.dot(w));

        let mut per_class = BTreeMap::new();
        match model.task() {
            TaskType::Regression => {
                per_class.insert(
                    outcome_name.to_string(),
                    ImportanceVector {
                        feature_names: feature_names.to_vec(),
                        values: product.column(0).to_owned(),
                    },
                );
            }
            TaskType::Classification => {
                let classes: Vec<f64> = model
                    .classes()
                    .ok_or(MlSenseError::ModelNotFitted)?
                    .to_vec();
                if outcome_levels <= 2 {
                    let positive_index = classes.len() - 1;
                    per_class.insert(
                        crate::sensitivity::format_class_label(classes[positive_index]),
                        ImportanceVector {
                            feature_names: feature_names.to_vec(),
                            values: product.column(positive_index).to_owned(),
                        },
                    );
                } else {
                    for (class_index, &class_value) in classes.iter().enumerate() {
                        per_class.insert(
                            crate::sensitivity::format_class_label(class_value),
                            ImportanceVector {
                                feature_names: feature_names.to_vec(),
                                values: product.column(class_index).to_owned(),
                            },
                        );
                    }
                }
            }
        }

        Ok(ImportanceResult::ClassWeights(per_class))
    }
}

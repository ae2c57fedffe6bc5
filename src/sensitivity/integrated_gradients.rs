//! Integrated-gradients attribution
//!
//! Integrates the network's input gradient along the straight-line path from
//! a baseline input (the training feature means) to each test observation,
//! using a midpoint Riemann sum. Attribution per feature is
//! `(x - baseline) * mean_gradient`, one row per observation. Only defined
//! for differentiable (neural network) models.

use crate::data::Dataset;
use crate::error::{MlSenseError, Result};
use crate::model::{Model, TaskType};
use crate::sensitivity::summary::{ImportanceResult, ImportanceTable};
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;

/// Integrated-gradients computer
pub struct IntegratedGradients {
    n_steps: usize,
}

impl IntegratedGradients {
    pub fn new() -> Self {
        Self { n_steps: 32 }
    }

    /// Set the number of path integration steps
    pub fn with_n_steps(mut self, n_steps: usize) -> Self {
        self.n_steps = n_steps.max(4);
        self
    }

    /// Compute attributions on the baked test table; the baseline is the
    /// baked train table's column means.
    pub fn compute(
        &self,
        model: &dyn Model,
        train: &Dataset,
        test: &Dataset,
        outcome_levels: usize,
    ) -> Result<ImportanceResult> {
        let net = model
            .as_neural()
            .ok_or_else(|| MlSenseError::UnsupportedMethod {
                method: "Integrated Gradients".to_string(),
                requirement: "a fitted neural network model".to_string(),
            })?;

        let baseline = train.feature_means();
        let names = test.feature_names();

        match model.task() {
            TaskType::Regression => {
                let values = self.integrate(net, &baseline, &test.features, 0)?;
                Ok(ImportanceResult::PerObservation(ImportanceTable::new(
                    names, values,
                )?))
            }
            TaskType::Classification if outcome_levels <= 2 => {
                let positive_index = net.n_outputs() - 1;
                let values = self.integrate(net, &baseline, &test.features, positive_index)?;
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
                    let values = self.integrate(net, &baseline, &test.features, class_index)?;
                    per_class.insert(
                        crate::sensitivity::format_class_label(class_value),
                        ImportanceTable::new(names.clone(), values)?,
                    );
                }
                Ok(ImportanceResult::PerClass(per_class))
            }
        }
    }

    /// Midpoint Riemann sum of the input gradient along the path, for one
    /// output unit, over every row of `x` at once.
    fn integrate(
        &self,
        net: &crate::model::NeuralNetwork,
        baseline: &Array1<f64>,
        x: &Array2<f64>,
        output: usize,
    ) -> Result<Array2<f64>> {
        let (n, d) = x.dim();
        if baseline.len() != d {
            return Err(MlSenseError::ShapeError {
                expected: format!("baseline of length {}", d),
                actual: format!("{}", baseline.len()),
            });
        }

        let baseline_rows = Array2::from_shape_fn((n, d), |(_, j)| baseline[j]);
        let diff = x - &baseline_rows;

        let mut grad_sum: Array2<f64> = Array2::zeros((n, d));
        for k in 0..self.n_steps {
            let alpha = (k as f64 + 0.5) / self.n_steps as f64;
            let point = &baseline_rows + &(&diff * alpha);
            grad_sum = grad_sum + net.input_gradients(&point, output)?;
        }

        let mean_grad = grad_sum / self.n_steps as f64;
        Ok(diff * mean_grad)
    }
}

impl Default for IntegratedGradients {
    fn default() -> Self {
        Self::new()
    }
}

//! Model construction
//!
//! Defines the narrow [`Model`] interface the sensitivity layer consumes
//! (predict, class probabilities, and — for neural networks — raw weights and
//! a differentiable forward pass), plus the in-crate implementations:
//! - [`NeuralNetwork`]: feedforward MLP for regression and classification
//! - [`LinearModel`]: linear / logistic regression

pub mod linear;
pub mod neural_network;

pub use linear::{LinearConfig, LinearModel};
pub use neural_network::{Activation, MlpConfig, NeuralNetwork};

use crate::error::{MlSenseError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Prediction task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskType {
    Regression,
    Classification,
}

/// Model family, used by method preconditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelKind {
    NeuralNetwork,
    Linear,
}

/// Trait for fitted models consumed by the pipeline
pub trait Model: std::fmt::Debug + Send + Sync {
    /// Model family
    fn kind(&self) -> ModelKind;

    /// Task the model was configured for
    fn task(&self) -> TaskType;

    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict values (regression) or class labels (classification)
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Per-class probabilities, one column per class (classification only)
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let _ = x;
        Err(MlSenseError::ValidationError(
            "model does not produce class probabilities".to_string(),
        ))
    }

    /// Sorted distinct class labels seen during fit (classification only)
    fn classes(&self) -> Option<&[f64]> {
        None
    }

    /// Downcast hook for methods that need network internals
    fn as_neural(&self) -> Option<&NeuralNetwork> {
        None
    }
}

/// Shared fitted-model handle; cheap to clone with the analysis object
pub type ModelHandle = Arc<dyn Model>;

/// Model specification for the build stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModelSpec {
    NeuralNetwork(MlpConfig),
    Linear(LinearConfig),
}

impl ModelSpec {
    /// Instantiate an unfitted model for the given task
    pub fn build(&self, task: TaskType) -> Box<dyn Model> {
        match self {
            ModelSpec::NeuralNetwork(config) => {
                Box::new(NeuralNetwork::new(config.clone(), task))
            }
            ModelSpec::Linear(config) => Box::new(LinearModel::new(config.clone(), task)),
        }
    }
}

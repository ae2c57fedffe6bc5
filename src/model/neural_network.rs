//! Feedforward neural network (multi-layer perceptron)
//!
//! One network covers both tasks: a linear output head for regression and a
//! softmax head for classification. Beyond fit/predict it exposes the two
//! accessors the sensitivity layer needs:
//! - [`NeuralNetwork::layer_weights`]: the raw connection weights
//! - [`NeuralNetwork::input_gradients`]: analytic gradient of one output unit
//!   with respect to the inputs

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::error::{MlSenseError, Result};
use crate::model::{Model, ModelKind, TaskType};

/// Activation function for hidden layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    ReLU,
    Sigmoid,
    Tanh,
}

impl Default for Activation {
    fn default() -> Self {
        Self::Tanh
    }
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpConfig {
    /// Hidden layer sizes
    pub hidden_layers: Vec<usize>,
    /// Hidden layer activation
    pub activation: Activation,
    /// Learning rate
    pub learning_rate: f64,
    /// Number of epochs
    pub max_epochs: usize,
    /// Mini-batch size
    pub batch_size: usize,
    /// L2 regularization strength
    pub alpha: f64,
    /// Momentum coefficient
    pub momentum: f64,
    /// Random seed for weight init and batch shuffling
    pub random_state: Option<u64>,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![32],
            activation: Activation::Tanh,
            learning_rate: 0.01,
            max_epochs: 200,
            batch_size: 32,
            alpha: 0.0001,
            momentum: 0.9,
            random_state: Some(42),
        }
    }
}

/// Multi-layer perceptron for regression or classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeuralNetwork {
    config: MlpConfig,
    task: TaskType,
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    n_features: usize,
    n_outputs: usize,
    classes: Vec<f64>,
    is_fitted: bool,
}

impl NeuralNetwork {
    pub fn new(config: MlpConfig, task: TaskType) -> Self {
        Self {
            config,
            task,
            weights: Vec::new(),
            biases: Vec::new(),
            n_features: 0,
            n_outputs: 0,
            classes: Vec::new(),
            is_fitted: false,
        }
    }

    /// Raw connection weights, input layer first
    pub fn layer_weights(&self) -> &[Array2<f64>] {
        &self.weights
    }

    /// Number of output units (1 for regression, n_classes otherwise)
    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    /// Gradient of one output unit with respect to every input, per row of `x`.
    ///
    /// The gradient is taken at the pre-softmax logit for classification and
    /// at the linear output for regression, so it stays informative where
    /// softmax saturates.
    pub fn input_gradients(&self, x: &Array2<f64>, output: usize) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(MlSenseError::ModelNotFitted);
        }
        if output >= self.n_outputs {
            return Err(MlSenseError::InvalidParameter {
                name: "output".to_string(),
                value: format!("{}", output),
                reason: format!("network has {} output units", self.n_outputs),
            });
        }
        if x.ncols() != self.n_features {
            return Err(MlSenseError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{}", x.ncols()),
            });
        }

        let (_, z_values) = self.forward(x);
        let n = x.nrows();
        let last = self.weights.len() - 1;

        // d z_last[:, output] / d a_last_input is the selected weight column,
        // identical for every row.
        let w_out = self.weights[last].column(output).to_owned();
        let mut grad = Array2::from_shape_fn((n, w_out.len()), |(_, j)| w_out[j]);

        // Chain back through the hidden layers.
        for i in (0..last).rev() {
            let dz = self.activation_derivative(&z_values[i]);
            grad = (&grad * &dz).dot(&self.weights[i].t());
        }

        Ok(grad)
    }

    fn initialize_weights(&mut self) {
        self.weights.clear();
        self.biases.clear();

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let mut layer_sizes = vec![self.n_features];
        layer_sizes.extend(&self.config.hidden_layers);
        layer_sizes.push(self.n_outputs);

        for i in 0..layer_sizes.len() - 1 {
            let n_in = layer_sizes[i];
            let n_out = layer_sizes[i + 1];

            // Xavier/Glorot initialization
            let scale = (2.0 / (n_in + n_out) as f64).sqrt();
            let weights: Vec<f64> = (0..n_in * n_out)
                .map(|_| rng.gen::<f64>() * 2.0 * scale - scale)
                .collect();

            self.weights
                .push(Array2::from_shape_vec((n_in, n_out), weights).expect("init shape"));
            self.biases.push(Array1::zeros(n_out));
        }
    }

    fn forward(&self, x: &Array2<f64>) -> (Vec<Array2<f64>>, Vec<Array2<f64>>) {
        let mut activations = vec![x.clone()];
        let mut z_values = Vec::new();

        for (i, (w, b)) in self.weights.iter().zip(self.biases.iter()).enumerate() {
            let z = activations.last().expect("non-empty activations").dot(w) + b;
            z_values.push(z.clone());

            let a = if i < self.weights.len() - 1 {
                self.activate(&z)
            } else {
                match self.task {
                    TaskType::Regression => z,
                    TaskType::Classification => softmax(&z),
                }
            };
            activations.push(a);
        }

        (activations, z_values)
    }

    fn activate(&self, z: &Array2<f64>) -> Array2<f64> {
        match self.config.activation {
            Activation::ReLU => z.mapv(|v| v.max(0.0)),
            Activation::Sigmoid => z.mapv(|v| 1.0 / (1.0 + (-v).exp())),
            Activation::Tanh => z.mapv(|v| v.tanh()),
        }
    }

    fn activation_derivative(&self, z: &Array2<f64>) -> Array2<f64> {
        match self.config.activation {
            Activation::ReLU => z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Sigmoid => {
                let sig = self.activate(z);
                &sig * &(1.0 - &sig)
            }
            Activation::Tanh => {
                let t = z.mapv(|v| v.tanh());
                1.0 - &t * &t
            }
        }
    }

    fn gather_rows(x: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
        let n_cols = x.ncols();
        let mut rows = Vec::with_capacity(indices.len() * n_cols);
        for &i in indices {
            rows.extend(x.row(i).iter().copied());
        }
        Array2::from_shape_vec((indices.len(), n_cols), rows).expect("gather shape")
    }

    fn to_onehot(&self, y: &Array1<f64>) -> Array2<f64> {
        let n = y.len();
        let mut onehot = Array2::zeros((n, self.n_outputs));
        for (i, &label) in y.iter().enumerate() {
            let class_idx = self
                .classes
                .iter()
                .position(|&c| (c - label).abs() < 1e-12)
                .unwrap_or(0);
            onehot[[i, class_idx]] = 1.0;
        }
        onehot
    }

    /// Mini-batch momentum SGD against MSE (regression) or softmax
    /// cross-entropy (classification); both reduce to the same output delta.
    fn train(&mut self, x: &Array2<f64>, targets: &Array2<f64>) {
        let n_samples = x.nrows();

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed.wrapping_add(1)),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let mut velocities_w: Vec<Array2<f64>> = self
            .weights
            .iter()
            .map(|w| Array2::zeros(w.raw_dim()))
            .collect();
        let mut velocities_b: Vec<Array1<f64>> = self
            .biases
            .iter()
            .map(|b| Array1::zeros(b.len()))
            .collect();

        for _epoch in 0..self.config.max_epochs {
            let mut indices: Vec<usize> = (0..n_samples).collect();
            indices.shuffle(&mut rng);

            for batch_start in (0..n_samples).step_by(self.config.batch_size.max(1)) {
                let batch_end = (batch_start + self.config.batch_size.max(1)).min(n_samples);
                let batch_indices = &indices[batch_start..batch_end];

                let x_batch = Self::gather_rows(x, batch_indices);
                let t_batch = Self::gather_rows(targets, batch_indices);

                let (activations, z_values) = self.forward(&x_batch);
                let gradients = self.backward(&t_batch, &activations, &z_values);

                for (i, (grad_w, grad_b)) in gradients.into_iter().enumerate() {
                    velocities_w[i] = &velocities_w[i] * self.config.momentum
                        - &grad_w * self.config.learning_rate;
                    velocities_b[i] = &velocities_b[i] * self.config.momentum
                        - &grad_b * self.config.learning_rate;

                    self.weights[i] = &self.weights[i] + &velocities_w[i];
                    self.biases[i] = &self.biases[i] + &velocities_b[i];

                    // L2 weight decay
                    self.weights[i] = &self.weights[i]
                        * (1.0 - self.config.alpha * self.config.learning_rate);
                }
            }
        }
    }

    fn backward(
        &self,
        targets: &Array2<f64>,
        activations: &[Array2<f64>],
        z_values: &[Array2<f64>],
    ) -> Vec<(Array2<f64>, Array1<f64>)> {
        let n = targets.nrows() as f64;
        let mut gradients = Vec::new();

        // MSE-with-linear-head and cross-entropy-with-softmax-head share this
        // output delta.
        let mut delta = (activations.last().expect("output activation") - targets) / n;

        for i in (0..self.weights.len()).rev() {
            let a_prev = &activations[i];
            let grad_w = a_prev.t().dot(&delta);
            let grad_b = delta.sum_axis(Axis(0));
            gradients.push((grad_w, grad_b));

            if i > 0 {
                let z = &z_values[i - 1];
                delta = delta.dot(&self.weights[i].t()) * self.activation_derivative(z);
            }
        }

        gradients.reverse();
        gradients
    }
}

fn softmax(z: &Array2<f64>) -> Array2<f64> {
    let mut result = z.clone();
    for mut row in result.rows_mut() {
        let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exp_sum: f64 = row.iter().map(|&v| (v - max).exp()).sum();
        for v in row.iter_mut() {
            *v = (*v - max).exp() / exp_sum;
        }
    }
    result
}

impl Model for NeuralNetwork {
    fn kind(&self) -> ModelKind {
        ModelKind::NeuralNetwork
    }

    fn task(&self) -> TaskType {
        self.task
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(MlSenseError::ShapeError {
                expected: format!("{} outcome values", x.nrows()),
                actual: format!("{}", y.len()),
            });
        }
        if x.nrows() == 0 {
            return Err(MlSenseError::TrainingError(
                "cannot fit on an empty table".to_string(),
            ));
        }

        self.n_features = x.ncols();

        let targets = match self.task {
            TaskType::Regression => {
                self.n_outputs = 1;
                self.initialize_weights();
                y.clone().insert_axis(Axis(1))
            }
            TaskType::Classification => {
                let mut classes: Vec<f64> = y.to_vec();
                classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                classes.dedup_by(|a, b| (*a - *b).abs() < 1e-12);
                if classes.len() < 2 {
                    return Err(MlSenseError::TrainingError(
                        "classification requires at least 2 distinct labels".to_string(),
                    ));
                }
                self.classes = classes;
                self.n_outputs = self.classes.len();
                self.initialize_weights();
                self.to_onehot(y)
            }
        };

        self.train(x, &targets);
        self.is_fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(MlSenseError::ModelNotFitted);
        }
        let (activations, _) = self.forward(x);
        let output = activations.last().expect("output activation");

        match self.task {
            TaskType::Regression => Ok(output.column(0).to_owned()),
            TaskType::Classification => Ok(output
                .rows()
                .into_iter()
                .map(|row| {
                    let max_idx = row
                        .iter()
                        .enumerate()
                        .max_by(|(_, a), (_, b)| {
                            a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
                        })
                        .map(|(i, _)| i)
                        .unwrap_or(0);
                    self.classes[max_idx]
                })
                .collect()),
        }
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(MlSenseError::ModelNotFitted);
        }
        if self.task != TaskType::Classification {
            return Err(MlSenseError::ValidationError(
                "predict_proba requires a classification model".to_string(),
            ));
        }
        let (activations, _) = self.forward(x);
        Ok(activations.last().expect("output activation").clone())
    }

    fn classes(&self) -> Option<&[f64]> {
        if self.task == TaskType::Classification {
            Some(&self.classes)
        } else {
            None
        }
    }

    fn as_neural(&self) -> Option<&NeuralNetwork> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((120, 2), |(i, j)| {
            ((i * 7 + j * 13) % 23) as f64 / 23.0 - 0.5
        });
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|row| 2.0 * row[0] - row[1] + 0.3)
            .collect();
        (x, y)
    }

    fn classification_data(n_classes: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((150, 2), |(i, j)| {
            ((i * 11 + j * 5) % 29) as f64 / 29.0 - 0.5
        });
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|row| {
                let s = (row[0] + row[1] + 1.0) / 2.0;
                ((s * n_classes as f64).floor() as usize).min(n_classes - 1) as f64
            })
            .collect();
        (x, y)
    }

    #[test]
    fn test_regression_fit_reduces_error() {
        let (x, y) = regression_data();
        let mut net = NeuralNetwork::new(
            MlpConfig {
                hidden_layers: vec![16],
                max_epochs: 300,
                ..Default::default()
            },
            TaskType::Regression,
        );
        net.fit(&x, &y).unwrap();
        let pred = net.predict(&x).unwrap();

        let mse: f64 = y
            .iter()
            .zip(pred.iter())
            .map(|(t, p)| (t - p).powi(2))
            .sum::<f64>()
            / y.len() as f64;
        let y_mean = y.mean().unwrap();
        let var: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum::<f64>() / y.len() as f64;
        assert!(mse < var, "mse {} should beat variance {}", mse, var);
    }

    #[test]
    fn test_classification_proba_shape_and_rows_sum() {
        let (x, y) = classification_data(3);
        let mut net = NeuralNetwork::new(
            MlpConfig {
                hidden_layers: vec![16],
                max_epochs: 150,
                ..Default::default()
            },
            TaskType::Classification,
        );
        net.fit(&x, &y).unwrap();

        let proba = net.predict_proba(&x).unwrap();
        assert_eq!(proba.ncols(), 3);
        assert_eq!(proba.nrows(), x.nrows());
        for row in proba.rows() {
            let s: f64 = row.sum();
            assert!((s - 1.0).abs() < 1e-9);
        }
        assert_eq!(net.classes().unwrap(), &[0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_input_gradients_match_finite_differences() {
        let (x, y) = regression_data();
        let mut net = NeuralNetwork::new(
            MlpConfig {
                hidden_layers: vec![8],
                max_epochs: 50,
                ..Default::default()
            },
            TaskType::Regression,
        );
        net.fit(&x, &y).unwrap();

        let probe = x.slice(ndarray::s![..3, ..]).to_owned();
        let grad = net.input_gradients(&probe, 0).unwrap();
        assert_eq!(grad.dim(), (3, 2));

        let eps = 1e-6;
        for r in 0..3 {
            for c in 0..2 {
                let mut plus = probe.clone();
                let mut minus = probe.clone();
                plus[[r, c]] += eps;
                minus[[r, c]] -= eps;
                let fd = (net.predict(&plus).unwrap()[r] - net.predict(&minus).unwrap()[r])
                    / (2.0 * eps);
                assert!(
                    (grad[[r, c]] - fd).abs() < 1e-4,
                    "analytic {} vs finite difference {}",
                    grad[[r, c]],
                    fd
                );
            }
        }
    }

    #[test]
    fn test_input_gradients_rejects_bad_output_index() {
        let (x, y) = regression_data();
        let mut net = NeuralNetwork::new(MlpConfig::default(), TaskType::Regression);
        net.fit(&x, &y).unwrap();
        assert!(net.input_gradients(&x, 5).is_err());
    }

    #[test]
    fn test_unfitted_predict_rejected() {
        let net = NeuralNetwork::new(MlpConfig::default(), TaskType::Regression);
        let x = Array2::zeros((2, 2));
        assert!(matches!(
            net.predict(&x),
            Err(MlSenseError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_layer_weights_shapes() {
        let (x, y) = classification_data(4);
        let mut net = NeuralNetwork::new(
            MlpConfig {
                hidden_layers: vec![6],
                max_epochs: 20,
                ..Default::default()
            },
            TaskType::Classification,
        );
        net.fit(&x, &y).unwrap();
        let w = net.layer_weights();
        assert_eq!(w.len(), 2);
        assert_eq!(w[0].dim(), (2, 6));
        assert_eq!(w[1].dim(), (6, 4));
        assert_eq!(net.n_outputs(), 4);
    }
}

//! Sensitivity method enumeration and preconditions
//!
//! A closed enum instead of string-keyed dispatch: each variant knows its own
//! applicability predicate, and validation is an exhaustive match that runs
//! before any computation.

use crate::error::{MlSenseError, Result};
use crate::model::{ModelKind, TaskType};
use serde::{Deserialize, Serialize};

/// The five supported sensitivity methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SensitivityMethod {
    /// Permutation feature importance
    Pfi,
    /// Sampling Shapley-value attribution
    Shap,
    /// Gradient path-integral attribution (neural networks only)
    IntegratedGradients,
    /// Connection-weight importance (neural networks only)
    Olden,
    /// Variance-decomposition indices (continuous features, regression only)
    SobolJansen,
}

impl SensitivityMethod {
    /// All methods in dispatch order (the order results are computed and
    /// displayed in, regardless of request order)
    pub const ALL: [SensitivityMethod; 5] = [
        SensitivityMethod::Pfi,
        SensitivityMethod::Shap,
        SensitivityMethod::IntegratedGradients,
        SensitivityMethod::Olden,
        SensitivityMethod::SobolJansen,
    ];

    /// Key used in the result and plot maps
    pub fn key(&self) -> &'static str {
        match self {
            SensitivityMethod::Pfi => "pfi",
            SensitivityMethod::Shap => "shap",
            SensitivityMethod::IntegratedGradients => "integrated_gradients",
            SensitivityMethod::Olden => "olden",
            SensitivityMethod::SobolJansen => "sobol_jansen",
        }
    }

    /// Human-readable label for banners and logs
    pub fn label(&self) -> &'static str {
        match self {
            SensitivityMethod::Pfi => "Permutation Feature Importance",
            SensitivityMethod::Shap => "SHAP",
            SensitivityMethod::IntegratedGradients => "Integrated Gradients",
            SensitivityMethod::Olden => "Olden",
            SensitivityMethod::SobolJansen => "Sobol-Jansen",
        }
    }

    /// Parse a method from its map key or label
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "pfi" | "permutation" => Ok(SensitivityMethod::Pfi),
            "shap" => Ok(SensitivityMethod::Shap),
            "integrated_gradients" | "ig" => Ok(SensitivityMethod::IntegratedGradients),
            "olden" => Ok(SensitivityMethod::Olden),
            "sobol_jansen" | "sobol" => Ok(SensitivityMethod::SobolJansen),
            other => Err(MlSenseError::ValidationError(format!(
                "unknown sensitivity method: {}",
                other
            ))),
        }
    }

    /// Check the method's preconditions against the fitted model and data.
    ///
    /// `all_numeric_features` refers to the raw (pre-recipe) feature columns.
    pub fn validate(
        &self,
        model_kind: ModelKind,
        task: TaskType,
        all_numeric_features: bool,
    ) -> Result<()> {
        match self {
            SensitivityMethod::Pfi | SensitivityMethod::Shap => Ok(()),
            SensitivityMethod::IntegratedGradients | SensitivityMethod::Olden => {
                if model_kind == ModelKind::NeuralNetwork {
                    Ok(())
                } else {
                    Err(MlSenseError::UnsupportedMethod {
                        method: self.label().to_string(),
                        requirement: "a fitted neural network model".to_string(),
                    })
                }
            }
            SensitivityMethod::SobolJansen => {
                if !all_numeric_features {
                    return Err(MlSenseError::UnsupportedMethod {
                        method: self.label().to_string(),
                        requirement: "all input features to be continuous".to_string(),
                    });
                }
                if task != TaskType::Regression {
                    return Err(MlSenseError::UnsupportedMethod {
                        method: self.label().to_string(),
                        requirement: "a continuous (regression) outcome".to_string(),
                    });
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for method in SensitivityMethod::ALL {
            assert_eq!(SensitivityMethod::parse(method.key()).unwrap(), method);
        }
        assert!(SensitivityMethod::parse("lime").is_err());
    }

    #[test]
    fn test_nn_only_methods_reject_linear_models() {
        for method in [
            SensitivityMethod::Olden,
            SensitivityMethod::IntegratedGradients,
        ] {
            let err = method
                .validate(ModelKind::Linear, TaskType::Regression, true)
                .unwrap_err();
            let msg = err.to_string();
            assert!(msg.contains(method.label()));
            assert!(msg.contains("neural network"));
        }
    }

    #[test]
    fn test_sobol_rejects_categorical_features() {
        let err = SensitivityMethod::SobolJansen
            .validate(ModelKind::NeuralNetwork, TaskType::Regression, false)
            .unwrap_err();
        assert!(err.to_string().contains("continuous"));
    }

    #[test]
    fn test_sobol_rejects_classification() {
        let err = SensitivityMethod::SobolJansen
            .validate(ModelKind::NeuralNetwork, TaskType::Classification, true)
            .unwrap_err();
        assert!(err.to_string().contains("regression"));
    }

    #[test]
    fn test_pfi_and_shap_apply_everywhere() {
        for kind in [ModelKind::Linear, ModelKind::NeuralNetwork] {
            for task in [TaskType::Regression, TaskType::Classification] {
                assert!(SensitivityMethod::Pfi.validate(kind, task, false).is_ok());
                assert!(SensitivityMethod::Shap.validate(kind, task, false).is_ok());
            }
        }
    }

    #[test]
    fn test_dispatch_order_is_fixed() {
        let keys: Vec<&str> = SensitivityMethod::ALL.iter().map(|m| m.key()).collect();
        assert_eq!(
            keys,
            vec!["pfi", "shap", "integrated_gradients", "olden", "sobol_jansen"]
        );
    }
}

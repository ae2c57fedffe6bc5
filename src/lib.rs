//! # mlsense
//!
//! A declarative modeling pipeline with model-agnostic sensitivity analysis.
//!
//! The pipeline moves a tabular [`data::Dataset`] through four stages, each a
//! pure function over an [`analysis::Analysis`] value:
//!
//! 1. **Preprocessing** — seeded train/validation/test split and a fit/apply
//!    recipe (standardization, one-hot expansion)
//! 2. **Model construction** — feedforward network or linear model, fitted on
//!    the baked training split
//! 3. **Fine tuning** — grid search scored on the validation split
//! 4. **Sensitivity analysis** — permutation importance, sampling Shapley,
//!    integrated gradients, connection weights (Olden), and Sobol-Jansen
//!    variance indices, each with its ready-to-render plot set
//!
//! ```no_run
//! use mlsense::prelude::*;
//! use ndarray::{Array1, Array2};
//!
//! # fn main() -> mlsense::Result<()> {
//! let x = Array2::from_elem((100, 2), 0.5);
//! let y = Array1::from_elem(100, 1.0);
//! let data = Dataset::from_numeric(x, &["a", "b"], y, "y")?;
//!
//! let analysis = Analysis::new(
//!     data,
//!     TaskType::Regression,
//!     ModelSpec::NeuralNetwork(MlpConfig::default()),
//! )
//! .with_sensitivity_config(
//!     SensitivityConfig::default()
//!         .with_methods([SensitivityMethod::Pfi, SensitivityMethod::Shap]),
//! );
//!
//! let result = pipeline::run_pipeline(&analysis)?;
//! for (key, plot) in &result.plots {
//!     println!("{}:\n{}", key, plot);
//! }
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod data;
pub mod error;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod plots;
pub mod preprocessing;
pub mod sensitivity;
pub mod tuning;

pub use error::{MlSenseError, Result};

/// Common imports for pipeline users
pub mod prelude {
    pub use crate::analysis::Analysis;
    pub use crate::data::{split_dataset, ColumnType, Dataset, FeatureMeta, SplitConfig};
    pub use crate::error::{MlSenseError, Result};
    pub use crate::metrics::Metric;
    pub use crate::model::{
        Activation, LinearConfig, MlpConfig, Model, ModelKind, ModelSpec, TaskType,
    };
    pub use crate::pipeline;
    pub use crate::plots::{Plot, PlotKind};
    pub use crate::preprocessing::Recipe;
    pub use crate::sensitivity::{
        summarize, ImportanceResult, SensitivityConfig, SensitivityMethod,
    };
    pub use crate::tuning::{TuningGrid, TuningReport};
}

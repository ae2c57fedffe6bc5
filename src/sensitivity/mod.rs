//! Sensitivity analysis
//!
//! The dispatch and aggregation layer over the five importance computers:
//! - [`pfi`]: permutation feature importance
//! - [`shap`]: sampling Shapley attribution
//! - [`integrated_gradients`]: gradient path integrals (networks only)
//! - [`olden`]: connection-weight importance (networks only)
//! - [`sobol`]: variance-decomposition indices (continuous regression only)
//!
//! [`run`] validates every requested method against the fitted model and the
//! data BEFORE computing anything, so a request either runs to completion or
//! fails without partial results. Methods always execute in the fixed order
//! of [`SensitivityMethod::ALL`], each persisting its result and its plots
//! under its own keys. Plots are constructed, never rendered; display is the
//! caller's decision.

pub mod integrated_gradients;
pub mod method;
pub mod olden;
pub mod pfi;
pub mod shap;
pub mod sobol;
pub mod summary;

pub use integrated_gradients::IntegratedGradients;
pub use method::SensitivityMethod;
pub use olden::OldenImportance;
pub use pfi::PermutationImportance;
pub use shap::ShapExplainer;
pub use sobol::SobolJansen;
pub use summary::{
    summarize, FeatureSummary, ImportanceResult, ImportanceTable, ImportanceVector,
    NormalizedSummary, SobolIndices,
};

use crate::analysis::Analysis;
use crate::data::Dataset;
use crate::error::{MlSenseError, Result};
use crate::metrics::Metric;
use crate::plots::{self, Plot};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Configuration for the sensitivity stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityConfig {
    /// Requested methods; execution order is fixed regardless of insertion
    /// order
    pub methods: BTreeSet<SensitivityMethod>,
    /// Scoring metric for permutation importance; the analysis default when
    /// unset
    pub metric: Option<Metric>,
    /// Print per-method result banners to stdout
    pub verbose: bool,
    /// Random seed shared by the stochastic methods
    pub seed: Option<u64>,
    /// Permutation repetitions
    pub pfi_repeats: usize,
    /// Sampled permutations per observation (Shapley)
    pub shap_samples: usize,
    /// Path integration steps (integrated gradients)
    pub ig_steps: usize,
    /// Monte-Carlo design size (Sobol)
    pub sobol_samples: usize,
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            methods: [SensitivityMethod::Pfi, SensitivityMethod::Shap]
                .into_iter()
                .collect(),
            metric: None,
            verbose: false,
            seed: Some(42),
            pfi_repeats: 10,
            shap_samples: 64,
            ig_steps: 32,
            sobol_samples: 512,
        }
    }
}

impl SensitivityConfig {
    /// Request an exact method set
    pub fn with_methods(mut self, methods: impl IntoIterator<Item = SensitivityMethod>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    /// Request methods by name (e.g. from a config file): "pfi", "shap",
    /// "integrated_gradients", "olden", "sobol_jansen"
    pub fn with_method_names<I, S>(mut self, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.methods = names
            .into_iter()
            .map(|name| SensitivityMethod::parse(name.as_ref()))
            .collect::<Result<BTreeSet<_>>>()?;
        Ok(self)
    }

    /// Set the permutation scoring metric
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = Some(metric);
        self
    }

    /// Set the permutation scoring metric by name, e.g. "rmse" or "roc_auc"
    pub fn with_metric_name(mut self, name: &str) -> Result<Self> {
        self.metric = Some(Metric::parse(name)?);
        Ok(self)
    }

    /// Enable or disable stdout banners
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set the shared random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Map key of a class label. Integer-valued labels print without the
/// fractional part, so class 2.0 keys as "2".
pub fn format_class_label(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Run the requested sensitivity methods against a fitted analysis.
///
/// Returns a new analysis whose `sensitivity` and `plots` maps carry one set
/// of entries per method. An empty request or any failed precondition is an
/// error before any computation starts.
pub fn run(analysis: &Analysis, config: &SensitivityConfig) -> Result<Analysis> {
    if config.methods.is_empty() {
        return Err(MlSenseError::ValidationError(
            "no sensitivity methods requested".to_string(),
        ));
    }

    let model = analysis.model()?.clone();
    let metric = config.metric.unwrap_or_else(|| analysis.effective_metric());
    metric.validate_for(analysis.task)?;

    // Applicability refers to the raw (pre-recipe) feature columns.
    let all_numeric = analysis.data.all_numeric();
    let requested: Vec<SensitivityMethod> = SensitivityMethod::ALL
        .iter()
        .copied()
        .filter(|m| config.methods.contains(m))
        .collect();
    for method in &requested {
        method.validate(model.kind(), analysis.task, all_numeric)?;
    }

    let baked = analysis.baked_split()?;
    let outcome_levels = analysis.outcome_levels();
    let mut out = analysis.clone();

    for method in requested {
        info!(method = method.key(), "running sensitivity method");

        let result = match method {
            SensitivityMethod::Pfi => {
                let mut computer =
                    PermutationImportance::new(metric).with_n_repeats(config.pfi_repeats);
                if let Some(seed) = config.seed {
                    computer = computer.with_seed(seed);
                }
                computer.compute(model.as_ref(), &baked.test, outcome_levels)?
            }
            SensitivityMethod::Shap => {
                let mut computer = ShapExplainer::new().with_n_samples(config.shap_samples);
                if let Some(seed) = config.seed {
                    computer = computer.with_seed(seed);
                }
                computer.compute(model.as_ref(), &baked.train, &baked.test, outcome_levels)?
            }
            SensitivityMethod::IntegratedGradients => IntegratedGradients::new()
                .with_n_steps(config.ig_steps)
                .compute(model.as_ref(), &baked.train, &baked.test, outcome_levels)?,
            SensitivityMethod::Olden => OldenImportance::compute(
                model.as_ref(),
                &analysis.fitted_recipe()?.output_names(),
                &analysis.data.outcome_name,
                outcome_levels,
            )?,
            SensitivityMethod::SobolJansen => {
                let mut computer = SobolJansen::new().with_n_samples(config.sobol_samples);
                if let Some(seed) = config.seed {
                    computer = computer.with_seed(seed);
                }
                computer.compute(model.as_ref(), &baked.train)?
            }
        };

        if config.verbose {
            print_result(method, &result);
        }

        build_plots(&mut out.plots, method, &result, &baked.test)?;
        out.sensitivity.insert(method.key().to_string(), result);
    }

    Ok(out)
}

/// Print the per-method banner and a text rendering of the result
fn print_result(method: SensitivityMethod, result: &ImportanceResult) {
    println!("######### {} Results #########", method.label());
    match result {
        ImportanceResult::PerObservation(table) => {
            println!("{}", summarize(table));
        }
        ImportanceResult::PerClass(map) => {
            for (class, table) in map {
                println!("class {}:", class);
                println!("{}", summarize(table));
            }
        }
        ImportanceResult::ClassWeights(map) => {
            for (class, vector) in map {
                println!("class {}:", class);
                println!("{}", vector);
            }
        }
        ImportanceResult::VarianceIndices(indices) => {
            println!("{}", indices);
        }
    }
}

/// Construct and store the method's plot set.
///
/// Keys are `{method}_{plot}`, with the class label spliced in for per-class
/// results. Swarm and directional-bar plots need row alignment with the test
/// observations, so permutation importance (rows are repetitions) gets only
/// the bar and box forms.
fn build_plots(
    plots: &mut BTreeMap<String, Plot>,
    method: SensitivityMethod,
    result: &ImportanceResult,
    baked_test: &Dataset,
) -> Result<()> {
    let key = |class: Option<&str>, plot: &str| match class {
        Some(class) => format!("{}_{}_{}", method.key(), class, plot),
        None => format!("{}_{}", method.key(), plot),
    };
    let title = |class: Option<&str>, what: &str| match class {
        Some(class) => format!("{} {} (class {})", method.label(), what, class),
        None => format!("{} {}", method.label(), what),
    };
    let row_aligned = matches!(
        method,
        SensitivityMethod::Shap | SensitivityMethod::IntegratedGradients
    );

    let table_plots = |plots: &mut BTreeMap<String, Plot>,
                       class: Option<&str>,
                       table: &ImportanceTable|
     -> Result<()> {
        let ranked = summarize(table);
        plots.insert(
            key(class, "bar"),
            plots::ranked_bar(&ranked, title(class, "importance")),
        );
        plots.insert(key(class, "box"), plots::box_plot(table, title(class, "spread")));
        if row_aligned {
            plots.insert(
                key(class, "swarm"),
                plots::swarm(table, &baked_test.features, title(class, "per-observation"))?,
            );
            if method == SensitivityMethod::Shap {
                plots.insert(
                    key(class, "directional_bar"),
                    plots::directional_bar(
                        table,
                        &baked_test.features,
                        title(class, "direction"),
                    )?,
                );
            }
        }
        Ok(())
    };

    match result {
        ImportanceResult::PerObservation(table) => table_plots(plots, None, table)?,
        ImportanceResult::PerClass(map) => {
            for (class, table) in map {
                table_plots(plots, Some(class), table)?;
            }
        }
        ImportanceResult::ClassWeights(map) => {
            let single = map.len() == 1;
            for (class, vector) in map {
                let class_key = if single { None } else { Some(class.as_str()) };
                plots.insert(
                    key(class_key, "directional_bar"),
                    plots::signed_bar(
                        vector.feature_names.clone(),
                        vector.values.to_vec(),
                        title(class_key, "connection weights"),
                    ),
                );
            }
        }
        ImportanceResult::VarianceIndices(indices) => {
            plots.insert(
                key(None, "first_order_bar"),
                plots::sobol_bar(indices, false, title(None, "first-order indices")),
            );
            plots.insert(
                key(None, "total_order_bar"),
                plots::sobol_bar(indices, true, title(None, "total-order indices")),
            );
        }
    }

    Ok(())
}

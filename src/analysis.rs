//! The analysis object threaded through the pipeline
//!
//! [`Analysis`] is a value: every pipeline stage takes it by reference and
//! returns a new one with its own fields filled in, leaving the input
//! untouched. The result and plot maps are append-only — a stage adds entries
//! under its own keys and never rewrites another stage's.

use crate::data::{DataSplit, Dataset, SplitConfig};
use crate::error::{MlSenseError, Result};
use crate::metrics::Metric;
use crate::model::{ModelHandle, ModelSpec, TaskType};
use crate::plots::Plot;
use crate::preprocessing::{FittedRecipe, Recipe};
use crate::sensitivity::{ImportanceResult, SensitivityConfig};
use crate::tuning::{TuningGrid, TuningReport};
use std::collections::BTreeMap;

/// The accumulating state of one pipeline run
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Prediction task
    pub task: TaskType,
    /// Raw input table (pre-split, pre-recipe)
    pub data: Dataset,
    /// Train/validation/test split parameters
    pub split_config: SplitConfig,
    /// Preprocessing recipe specification
    pub recipe: Recipe,
    /// Model family and hyperparameters
    pub model_spec: ModelSpec,
    /// Performance metric; defaults per task when unset
    pub metric: Option<Metric>,
    /// Tuning grid for the fine-tuning stage
    pub tuning_grid: TuningGrid,
    /// Sensitivity stage configuration
    pub sensitivity_config: SensitivityConfig,

    /// Raw splits, set by the preprocessing stage
    pub split: Option<DataSplit>,
    /// Recipe with learned statistics, set by the preprocessing stage
    pub fitted_recipe: Option<FittedRecipe>,
    /// Fitted model handle, set by the build stage (replaced by tuning)
    pub model: Option<ModelHandle>,
    /// Named performance scores, e.g. "validation_rmse"
    pub performance: BTreeMap<String, f64>,
    /// Tuning trials, set by the fine-tuning stage
    pub tuning: Option<TuningReport>,
    /// Sensitivity results keyed by method
    pub sensitivity: BTreeMap<String, ImportanceResult>,
    /// Constructed plots keyed by "{method}_{plot}" or
    /// "{method}_{class}_{plot}"
    pub plots: BTreeMap<String, Plot>,
}

impl Analysis {
    /// Start an analysis from a raw table with default stage configuration
    pub fn new(data: Dataset, task: TaskType, model_spec: ModelSpec) -> Self {
        Self {
            task,
            data,
            split_config: SplitConfig::default(),
            recipe: Recipe::default(),
            model_spec,
            metric: None,
            tuning_grid: TuningGrid::default(),
            sensitivity_config: SensitivityConfig::default(),
            split: None,
            fitted_recipe: None,
            model: None,
            performance: BTreeMap::new(),
            tuning: None,
            sensitivity: BTreeMap::new(),
            plots: BTreeMap::new(),
        }
    }

    /// Override the split parameters
    pub fn with_split_config(mut self, config: SplitConfig) -> Self {
        self.split_config = config;
        self
    }

    /// Override the preprocessing recipe
    pub fn with_recipe(mut self, recipe: Recipe) -> Self {
        self.recipe = recipe;
        self
    }

    /// Set the performance metric
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = Some(metric);
        self
    }

    /// Override the tuning grid
    pub fn with_tuning_grid(mut self, grid: TuningGrid) -> Self {
        self.tuning_grid = grid;
        self
    }

    /// Override the sensitivity configuration
    pub fn with_sensitivity_config(mut self, config: SensitivityConfig) -> Self {
        self.sensitivity_config = config;
        self
    }

    /// The effective metric (explicit or per-task default)
    pub fn effective_metric(&self) -> Metric {
        self.metric.unwrap_or_else(|| Metric::default_for(self.task))
    }

    /// Number of distinct outcome levels (1 for regression)
    pub fn outcome_levels(&self) -> usize {
        match self.task {
            TaskType::Regression => 1,
            TaskType::Classification => self.data.outcome_values().len(),
        }
    }

    /// The fitted model, or an error if no build stage has run
    pub fn model(&self) -> Result<&ModelHandle> {
        self.model.as_ref().ok_or(MlSenseError::ModelNotFitted)
    }

    /// The raw splits, or an error if preprocessing has not run
    pub fn split(&self) -> Result<&DataSplit> {
        self.split.as_ref().ok_or_else(|| {
            MlSenseError::ValidationError(
                "preprocessing stage has not run: no data splits available".to_string(),
            )
        })
    }

    /// The fitted recipe, or an error if preprocessing has not run
    pub fn fitted_recipe(&self) -> Result<&FittedRecipe> {
        self.fitted_recipe.as_ref().ok_or_else(|| {
            MlSenseError::ValidationError(
                "preprocessing stage has not run: no fitted recipe available".to_string(),
            )
        })
    }

    /// Bake all three splits with the fitted recipe
    pub fn baked_split(&self) -> Result<DataSplit> {
        let split = self.split()?;
        let recipe = self.fitted_recipe()?;
        Ok(DataSplit {
            train: recipe.bake(&split.train)?,
            validation: recipe.bake(&split.validation)?,
            test: recipe.bake(&split.test)?,
        })
    }
}

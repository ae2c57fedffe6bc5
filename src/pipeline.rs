//! Pipeline stages
//!
//! Four stage functions, each `&Analysis -> Result<Analysis>`:
//! 1. [`preprocessing`]: split the raw table and learn the recipe
//! 2. [`build_model`]: fit the specified model on the baked training split
//! 3. [`fine_tuning`]: grid-search hyperparameters on the validation split
//! 4. [`sensitivity_analysis`]: run the configured sensitivity methods
//!
//! Stages never mutate their input; [`run_pipeline`] chains all four.

use crate::analysis::Analysis;
use crate::data::split_dataset;
use crate::error::Result;
use crate::model::ModelHandle;
use crate::sensitivity;
use crate::tuning;
use std::sync::Arc;
use tracing::info;

/// Split the raw table into train/validation/test and learn the recipe
/// statistics on the training split.
pub fn preprocessing(analysis: &Analysis) -> Result<Analysis> {
    let split = split_dataset(&analysis.data, &analysis.split_config)?;
    info!(
        train = split.train.n_samples(),
        validation = split.validation.n_samples(),
        test = split.test.n_samples(),
        "split dataset"
    );
    let fitted = analysis.recipe.prep(&split.train)?;

    let mut out = analysis.clone();
    out.split = Some(split);
    out.fitted_recipe = Some(fitted);
    Ok(out)
}

/// Fit the specified model on the baked training split and record its
/// validation and test scores under the effective metric.
pub fn build_model(analysis: &Analysis) -> Result<Analysis> {
    let metric = analysis.effective_metric();
    metric.validate_for(analysis.task)?;

    let baked = analysis.baked_split()?;
    let mut model = analysis.model_spec.build(analysis.task);
    model.fit(&baked.train.features, &baked.train.outcome)?;
    info!(task = ?analysis.task, "fitted model");

    let mut out = analysis.clone();
    for (name, table) in [("validation", &baked.validation), ("test", &baked.test)] {
        if table.n_samples() > 0 {
            let score = tuning::evaluate(model.as_ref(), metric, table)?;
            out.performance
                .insert(format!("{}_{}", name, metric.name()), score);
        }
    }
    out.model = Some(ModelHandle::from(model));
    Ok(out)
}

/// Grid-search the model specification on the validation split, refit the
/// winner, and refresh the recorded scores.
pub fn fine_tuning(analysis: &Analysis) -> Result<Analysis> {
    let metric = analysis.effective_metric();
    let baked = analysis.baked_split()?;

    let (model, report) = tuning::tune(
        &analysis.model_spec,
        &analysis.tuning_grid,
        metric,
        analysis.task,
        &baked.train,
        &baked.validation,
    )?;
    info!(
        trials = report.trials.len(),
        best = report.best_index,
        score = report.best().score,
        "tuning complete"
    );

    let mut out = analysis.clone();
    out.model_spec = report.best().spec.clone();
    for (name, table) in [("validation", &baked.validation), ("test", &baked.test)] {
        if table.n_samples() > 0 {
            let score = tuning::evaluate(model.as_ref(), metric, table)?;
            out.performance
                .insert(format!("{}_{}", name, metric.name()), score);
        }
    }
    out.model = Some(Arc::from(model));
    out.tuning = Some(report);
    Ok(out)
}

/// Run the configured sensitivity methods against the fitted model
pub fn sensitivity_analysis(analysis: &Analysis) -> Result<Analysis> {
    sensitivity::run(analysis, &analysis.sensitivity_config)
}

/// All four stages in order
pub fn run_pipeline(analysis: &Analysis) -> Result<Analysis> {
    let analysis = preprocessing(analysis)?;
    let analysis = build_model(&analysis)?;
    let analysis = fine_tuning(&analysis)?;
    sensitivity_analysis(&analysis)
}

//! End-to-end pipeline tests: preprocessing through sensitivity analysis on
//! small synthetic tables.

use mlsense::prelude::*;
use ndarray::{Array1, Array2};

/// 4 continuous features; y depends on them with sharply different strengths
fn regression_data(n: usize) -> Dataset {
    let x = Array2::from_shape_fn((n, 4), |(i, j)| ((i * (j + 2) * 17) % 101) as f64 / 101.0);
    let y: Array1<f64> = x
        .rows()
        .into_iter()
        .map(|row| 8.0 * row[0] + 2.0 * row[1] + 0.5 * row[2])
        .collect();
    Dataset::from_numeric(x, &["strong", "medium", "weak", "null"], y, "target").unwrap()
}

/// Binary outcome driven by the first feature
fn binary_data(n: usize) -> Dataset {
    let x = Array2::from_shape_fn((n, 2), |(i, j)| ((i * (j + 3) * 13) % 89) as f64 / 89.0);
    let y: Array1<f64> = x
        .rows()
        .into_iter()
        .map(|row| if row[0] > 0.5 { 1.0 } else { 0.0 })
        .collect();
    Dataset::from_numeric(x, &["driver", "noise"], y, "label").unwrap()
}

/// Four classes cut from the first feature's quartiles
fn multiclass_data(n: usize) -> Dataset {
    let x = Array2::from_shape_fn((n, 3), |(i, j)| ((i * (j + 2) * 7) % 61) as f64 / 61.0);
    let y: Array1<f64> = x
        .rows()
        .into_iter()
        .map(|row| (row[0] * 4.0).floor().min(3.0))
        .collect();
    Dataset::from_numeric(x, &["a", "b", "c"], y, "grade").unwrap()
}

fn importance_table(result: &ImportanceResult) -> &mlsense::sensitivity::ImportanceTable {
    match result {
        ImportanceResult::PerObservation(table) => table,
        _ => panic!("expected a per-observation table"),
    }
}

#[test]
fn test_regression_pfi_ranks_the_strong_feature_first() {
    let analysis = Analysis::new(
        regression_data(200),
        TaskType::Regression,
        ModelSpec::Linear(LinearConfig::default()),
    )
    .with_metric(Metric::Rmse)
    .with_sensitivity_config(
        SensitivityConfig::default()
            .with_methods([SensitivityMethod::Pfi])
            .with_seed(11),
    );

    let analysis = pipeline::preprocessing(&analysis).unwrap();
    let analysis = pipeline::build_model(&analysis).unwrap();
    let out = pipeline::sensitivity_analysis(&analysis).unwrap();

    let table = importance_table(&out.sensitivity["pfi"]);
    let summary = summarize(table);
    assert_eq!(summary.entries[0].feature, "strong");
    // The inert column contributes (near) nothing
    let null_entry = summary
        .entries
        .iter()
        .find(|e| e.feature == "null")
        .unwrap();
    assert!(null_entry.mean_importance < summary.entries[0].mean_importance / 10.0);

    assert!(out.plots.contains_key("pfi_bar"));
    assert!(out.plots.contains_key("pfi_box"));
    assert!(!out.plots.contains_key("pfi_swarm"));
}

#[test]
fn test_binary_shap_attributions_and_direction() {
    let analysis = Analysis::new(
        binary_data(200),
        TaskType::Classification,
        ModelSpec::Linear(LinearConfig::default()),
    )
    .with_sensitivity_config(
        SensitivityConfig::default()
            .with_methods([SensitivityMethod::Shap])
            .with_seed(5),
    );

    let analysis = pipeline::preprocessing(&analysis).unwrap();
    let analysis = pipeline::build_model(&analysis).unwrap();
    let out = pipeline::sensitivity_analysis(&analysis).unwrap();

    // Binary outcome: a single table for the positive class
    let table = importance_table(&out.sensitivity["shap"]);
    assert_eq!(table.feature_names, vec!["driver", "noise"]);

    let summary = summarize(table);
    assert_eq!(summary.entries[0].feature, "driver");

    // High driver values raise the positive-class probability
    let plot = &out.plots["shap_directional_bar"];
    match &plot.data {
        mlsense::plots::PlotData::DirectionalBar {
            features,
            coefficients,
        } => {
            let idx = features.iter().position(|f| f == "driver").unwrap();
            assert!(coefficients[idx] > 0.0);
        }
        _ => panic!("expected a directional bar"),
    }
    assert!(out.plots.contains_key("shap_swarm"));
}

#[test]
fn test_multiclass_olden_yields_one_vector_and_plot_per_class() {
    let analysis = Analysis::new(
        multiclass_data(240),
        TaskType::Classification,
        ModelSpec::NeuralNetwork(MlpConfig {
            hidden_layers: vec![8],
            max_epochs: 80,
            ..Default::default()
        }),
    )
    .with_sensitivity_config(
        SensitivityConfig::default()
            .with_methods([SensitivityMethod::Olden])
            .with_seed(3),
    );

    let analysis = pipeline::preprocessing(&analysis).unwrap();
    let analysis = pipeline::build_model(&analysis).unwrap();
    let out = pipeline::sensitivity_analysis(&analysis).unwrap();

    match &out.sensitivity["olden"] {
        ImportanceResult::ClassWeights(map) => {
            assert_eq!(map.len(), 4);
            for class in ["0", "1", "2", "3"] {
                assert!(map.contains_key(class), "missing class {}", class);
                assert!(
                    out.plots
                        .contains_key(&format!("olden_{}_directional_bar", class)),
                    "missing plot for class {}",
                    class
                );
            }
        }
        _ => panic!("expected class-weight vectors"),
    }
}

#[test]
fn test_multiclass_pfi_and_shap_register_per_class_tables_and_plots() {
    // 3 classes cut from the first feature
    let x = Array2::from_shape_fn((240, 3), |(i, j)| ((i * (j + 2) * 7) % 61) as f64 / 61.0);
    let y: Array1<f64> = x
        .rows()
        .into_iter()
        .map(|row| (row[0] * 3.0).floor().min(2.0))
        .collect();
    let data = Dataset::from_numeric(x, &["a", "b", "c"], y, "grade").unwrap();

    let analysis = Analysis::new(
        data,
        TaskType::Classification,
        ModelSpec::Linear(LinearConfig::default()),
    )
    .with_sensitivity_config(
        SensitivityConfig::default()
            .with_methods([SensitivityMethod::Pfi, SensitivityMethod::Shap])
            .with_seed(13),
    );

    let analysis = pipeline::preprocessing(&analysis).unwrap();
    let analysis = pipeline::build_model(&analysis).unwrap();
    let out = pipeline::sensitivity_analysis(&analysis).unwrap();

    for method in ["pfi", "shap"] {
        match &out.sensitivity[method] {
            ImportanceResult::PerClass(map) => {
                assert_eq!(map.len(), 3, "{} should have one table per class", method);
                for table in map.values() {
                    assert_eq!(table.n_features(), 3);
                }
            }
            _ => panic!("expected per-class tables for {}", method),
        }
    }

    // One full plot set per class: pfi gets bar + box, shap additionally
    // swarm + directional bar.
    for class in ["0", "1", "2"] {
        for plot in ["bar", "box"] {
            assert!(
                out.plots.contains_key(&format!("pfi_{}_{}", class, plot)),
                "missing pfi_{}_{}",
                class,
                plot
            );
        }
        for plot in ["bar", "box", "swarm", "directional_bar"] {
            assert!(
                out.plots.contains_key(&format!("shap_{}_{}", class, plot)),
                "missing shap_{}_{}",
                class,
                plot
            );
        }
    }
    assert_eq!(out.plots.keys().filter(|k| k.starts_with("pfi_")).count(), 6);
    assert_eq!(
        out.plots.keys().filter(|k| k.starts_with("shap_")).count(),
        12
    );
}

#[test]
fn test_full_pipeline_with_every_method() {
    let analysis = Analysis::new(
        regression_data(250),
        TaskType::Regression,
        ModelSpec::NeuralNetwork(MlpConfig {
            hidden_layers: vec![8],
            max_epochs: 100,
            ..Default::default()
        }),
    )
    .with_tuning_grid(TuningGrid {
        hidden_layers: vec![vec![8]],
        learning_rates: vec![0.01],
        alphas: vec![1e-4],
    })
    .with_sensitivity_config(
        SensitivityConfig::default()
            .with_methods(SensitivityMethod::ALL)
            .with_seed(21),
    );

    let out = pipeline::run_pipeline(&analysis).unwrap();

    assert_eq!(out.sensitivity.len(), 5);
    assert!(out.tuning.is_some());
    assert!(out.performance.contains_key("test_rmse"));

    match &out.sensitivity["sobol_jansen"] {
        ImportanceResult::VarianceIndices(indices) => {
            // Strongest feature carries the largest share of output variance
            let strong = indices
                .feature_names
                .iter()
                .position(|f| f == "strong")
                .unwrap();
            for j in 0..indices.feature_names.len() {
                if j != strong {
                    assert!(indices.total_order[strong] >= indices.total_order[j]);
                }
            }
        }
        _ => panic!("expected variance indices"),
    }
}

#[test]
fn test_seeded_pipeline_is_reproducible() {
    let analysis = Analysis::new(
        regression_data(150),
        TaskType::Regression,
        ModelSpec::Linear(LinearConfig::default()),
    )
    .with_sensitivity_config(
        SensitivityConfig::default()
            .with_methods([SensitivityMethod::Pfi, SensitivityMethod::Shap])
            .with_seed(77),
    );

    let run = || {
        let a = pipeline::preprocessing(&analysis).unwrap();
        let a = pipeline::build_model(&a).unwrap();
        pipeline::sensitivity_analysis(&a).unwrap()
    };
    let (first, second) = (run(), run());

    for key in ["pfi", "shap"] {
        match (&first.sensitivity[key], &second.sensitivity[key]) {
            (ImportanceResult::PerObservation(a), ImportanceResult::PerObservation(b)) => {
                assert_eq!(a.values, b.values, "{} differs between runs", key);
            }
            _ => panic!("expected per-observation tables"),
        }
    }
}

#[test]
fn test_categorical_features_one_hot_flow_and_sobol_rejection() {
    // One categorical column; the recipe expands it, and Sobol refuses the
    // table because applicability is judged on the raw columns.
    let n = 120;
    let features = Array2::from_shape_fn((n, 2), |(i, j)| {
        if j == 0 {
            (i % 3) as f64
        } else {
            ((i * 7) % 31) as f64 / 31.0
        }
    });
    let y: Array1<f64> = features
        .rows()
        .into_iter()
        .map(|row| row[0] + 2.0 * row[1])
        .collect();
    let meta = vec![
        FeatureMeta::categorical("kind", vec!["x".into(), "y".into(), "z".into()]),
        FeatureMeta::numeric("amount"),
    ];
    let data = Dataset::new(features, meta, y, "total").unwrap();

    let base = Analysis::new(
        data,
        TaskType::Regression,
        ModelSpec::Linear(LinearConfig::default()),
    );
    let analysis = pipeline::preprocessing(&base).unwrap();
    let analysis = pipeline::build_model(&analysis).unwrap();

    let pfi_out = mlsense::sensitivity::run(
        &analysis,
        &SensitivityConfig::default()
            .with_methods([SensitivityMethod::Pfi])
            .with_seed(9),
    )
    .unwrap();
    let table = importance_table(&pfi_out.sensitivity["pfi"]);
    assert_eq!(
        table.feature_names,
        vec!["kind_x", "kind_y", "kind_z", "amount"]
    );

    let err = mlsense::sensitivity::run(
        &analysis,
        &SensitivityConfig::default().with_methods([SensitivityMethod::SobolJansen]),
    )
    .unwrap_err();
    assert!(matches!(err, MlSenseError::UnsupportedMethod { .. }));
}

#[test]
fn test_network_only_methods_reject_linear_models() {
    let analysis = Analysis::new(
        regression_data(120),
        TaskType::Regression,
        ModelSpec::Linear(LinearConfig::default()),
    );
    let analysis = pipeline::preprocessing(&analysis).unwrap();
    let analysis = pipeline::build_model(&analysis).unwrap();

    for method in [
        SensitivityMethod::Olden,
        SensitivityMethod::IntegratedGradients,
    ] {
        let err = mlsense::sensitivity::run(
            &analysis,
            &SensitivityConfig::default().with_methods([method]),
        )
        .unwrap_err();
        assert!(matches!(err, MlSenseError::UnsupportedMethod { .. }));
    }
}

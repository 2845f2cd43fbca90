//! End-to-end runs on the in-process stump engine.

use boosters_fit::engine::native::StumpEngine;
use boosters_fit::{
    ConfigError, EstimatorConfig, FitError, TrainingState, ValidationSet, cross_validate, fit,
};
use ndarray::{Array1, Array2};

/// y = 3 * [x0 > 0.5] + x1, on a regular grid.
fn step_data(n: usize) -> (Array2<f32>, Array1<f32>) {
    let x = Array2::from_shape_fn((n, 2), |(i, j)| {
        if j == 0 { (i % 10) as f32 / 10.0 } else { (i / 10) as f32 / 10.0 }
    });
    let y = Array1::from_shape_fn(n, |i| {
        let step = if x[(i, 0)] > 0.5 { 3.0 } else { 0.0 };
        step + x[(i, 1)]
    });
    (x, y)
}

fn loose_config() -> EstimatorConfig {
    EstimatorConfig::regression()
        .num_iterations(50)
        .learning_rate(0.3)
        .min_data_in_leaf(2)
        .min_sum_hessian_in_leaf(0.0)
        .metric(vec!["l2".into(), "l1".into()])
        .build()
        .unwrap()
}

#[test]
fn validation_loss_decreases() {
    let (x, y) = step_data(100);
    let mut engine = StumpEngine::new();

    let outcome = fit(
        &mut engine,
        &loose_config(),
        x.view(),
        y.view(),
        &[ValidationSet::new(x.view(), y.view())],
        -1,
    )
    .unwrap();

    let l2 = outcome.scores.get("test_1", "l2").unwrap();
    assert!(!l2.is_empty());
    assert!(l2.last().unwrap() < &(l2[0] * 0.1), "l2 went from {} to {:?}", l2[0], l2.last());
    assert_eq!(outcome.booster.stumps().len(), outcome.iterations);
}

#[test]
fn constant_labels_converge_on_first_iteration() {
    let (x, _) = step_data(30);
    let y = Array1::from_elem(30, 2.0f32);
    let mut engine = StumpEngine::new();

    let outcome = fit(
        &mut engine,
        &loose_config(),
        x.view(),
        y.view(),
        &[ValidationSet::new(x.view(), y.view())],
        -1,
    )
    .unwrap();

    assert_eq!(outcome.state, TrainingState::Converged);
    assert_eq!(outcome.iterations, 0);
    assert!(outcome.scores.get("test_1", "l2").is_none_or(|s| s.is_empty()));
}

#[test]
fn early_stopping_on_held_out_noise() {
    // Training labels follow the step; held-out labels are reversed, so
    // every stump makes the held-out loss worse.
    let (x, y) = step_data(60);
    let y_rev: Array1<f32> = y.iter().rev().copied().collect();
    let mut engine = StumpEngine::new();
    let config = EstimatorConfig::regression()
        .num_iterations(50)
        .learning_rate(0.5)
        .min_data_in_leaf(2)
        .min_sum_hessian_in_leaf(0.0)
        .early_stopping_round(3)
        .build()
        .unwrap();

    let outcome = fit(
        &mut engine,
        &config,
        x.view(),
        y.view(),
        &[ValidationSet::new(x.view(), y_rev.view())],
        -1,
    )
    .unwrap();

    assert_eq!(outcome.state, TrainingState::EarlyStopped);
    let best = outcome.best_iteration.unwrap();
    assert_eq!(outcome.iterations, best + 3);
    assert_eq!(outcome.scores.get("test_1", "l2").unwrap().len(), best);
}

#[test]
fn mismatched_validation_inputs_are_config_errors() {
    let (x, y) = step_data(20);
    let narrow = Array2::<f32>::zeros((5, 1));
    let short = Array1::<f32>::zeros(3);
    let mut engine = StumpEngine::new();

    let err = fit(
        &mut engine,
        &loose_config(),
        x.view(),
        y.view(),
        &[ValidationSet::new(narrow.view(), short.view())],
        -1,
    )
    .unwrap_err();
    assert_eq!(err, FitError::Config(ConfigError::FeatureMismatch { expected: 2, got: 1 }));

    let err = fit(
        &mut engine,
        &loose_config(),
        x.view(),
        y.view(),
        &[ValidationSet::new(x.view(), short.view())],
        -1,
    )
    .unwrap_err();
    assert_eq!(err, FitError::Config(ConfigError::LabelLenMismatch { rows: 20, labels: 3 }));
}

#[test]
fn unsupported_objective_surfaces_engine_error() {
    let (x, y) = step_data(20);
    let mut engine = StumpEngine::new();
    let config = EstimatorConfig::binary().build().unwrap();

    let err = fit(&mut engine, &config, x.view(), y.view(), &[], -1).unwrap_err();
    assert!(matches!(err, FitError::Engine(_)));
}

#[test]
fn cross_validation_summarizes_every_fold() {
    let (x, y) = step_data(100);
    let mut engine = StumpEngine::new();

    let cv = cross_validate(&mut engine, &loose_config(), x.view(), y.view(), 4, 11, -1).unwrap();

    assert_eq!(cv.folds.len(), 4);
    for metric in ["l1", "l2"] {
        let summary = &cv.summary[metric];
        assert_eq!(summary.fold_scores.len(), 4);
        assert!(summary.fold_scores.iter().all(|v| v.is_finite()));
        let mean = summary.fold_scores.iter().sum::<f64>() / 4.0;
        assert!((summary.mean - mean).abs() < 1e-12);
    }
}

//! Loop-level scenarios driven through `fit` with a scripted engine.

use boosters_fit::testing::{DEFAULT_TOLERANCE, ScriptedEngine, assert_scores_approx_eq};
use boosters_fit::{EstimatorConfig, FitOutcome, TrainingState, ValidationSet, fit};
use ndarray::{Array1, Array2};
use proptest::prelude::*;
use rstest::rstest;

fn run(
    engine: &mut ScriptedEngine,
    config: &EstimatorConfig,
    n_valid: usize,
) -> FitOutcome<boosters_fit::testing::ScriptedBooster> {
    let x = Array2::<f32>::zeros((6, 2));
    let y = Array1::<f32>::zeros(6);
    let valid: Vec<ValidationSet<'_>> = (0..n_valid)
        .map(|_| ValidationSet::new(x.view(), y.view()))
        .collect();
    fit(engine, config, x.view(), y.view(), &valid, -1).unwrap()
}

fn config(budget: u32, freq: u32, patience: u32) -> EstimatorConfig {
    EstimatorConfig::builder()
        .num_iterations(budget)
        .metric_freq(freq)
        .early_stopping_round(patience)
        .build()
        .unwrap()
}

#[test]
fn early_stop_reverts_to_best_iteration() {
    let mut engine = ScriptedEngine::new(&["auc"])
        .with_series(1, &[1.0, 2.0, 3.0, 2.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);

    let outcome = run(&mut engine, &config(10, 1, 3), 1);

    assert_eq!(outcome.state, TrainingState::EarlyStopped);
    assert_eq!(outcome.best_iteration, Some(3));
    assert_eq!(outcome.iterations, 6);
    assert_eq!(engine.updates(), 6);
    assert_eq!(outcome.scores.get("test_1", "auc").unwrap(), &[1.0, 2.0, 3.0]);
}

#[test]
fn training_set_tracked_every_other_iteration() {
    let mut engine = ScriptedEngine::new(&["l2"]).with_series(0, &[5.0, 4.0, 3.0, 2.0, 1.0]);
    let config = EstimatorConfig::builder()
        .num_iterations(5)
        .metric_freq(2)
        .is_training_metric(true)
        .build()
        .unwrap();

    let outcome = run(&mut engine, &config, 0);

    assert_eq!(outcome.state, TrainingState::Exhausted);
    // Recorded after iterations 1, 3 and 5.
    assert_eq!(outcome.scores.get("training", "l2").unwrap(), &[5.0, 3.0, 1.0]);
    assert_eq!(outcome.scores.dataset_names().collect::<Vec<_>>(), ["training"]);
}

#[test]
fn decreasing_loss_never_stops() {
    let losses: Vec<f64> = (0..20).map(|i| 1.0 - i as f64 * 0.01).collect();
    let mut engine = ScriptedEngine::new(&["l2"]).with_series(1, &losses);

    let outcome = run(&mut engine, &config(20, 1, 1), 1);

    assert_eq!(outcome.state, TrainingState::Exhausted);
    assert_scores_approx_eq(
        outcome.scores.get("test_1", "l2").unwrap(),
        &losses,
        DEFAULT_TOLERANCE,
        "test_1 l2",
    );
}

#[test]
fn ties_on_maximized_metric_are_not_improvements() {
    let mut engine = ScriptedEngine::new(&["ndcg@5"]).with_series(1, &[0.5, 0.5, 0.5, 0.9]);

    let outcome = run(&mut engine, &config(10, 1, 2), 1);

    assert_eq!(outcome.state, TrainingState::EarlyStopped);
    assert_eq!(outcome.iterations, 3);
    assert_eq!(outcome.best_iteration, Some(1));
    assert_eq!(outcome.scores.get("test_1", "ndcg@5").unwrap(), &[0.5]);
}

#[test]
fn first_validation_set_to_exhaust_patience_wins() {
    // Both sets peak at iteration 1 and run out of patience at iteration 3;
    // test_1 is checked first.
    let mut engine = ScriptedEngine::new(&["l2"])
        .with_series(1, &[3.0, 3.5, 3.5, 3.5, 3.5])
        .with_series(2, &[1.0, 1.5, 1.5, 1.5, 1.5]);

    let outcome = run(&mut engine, &config(10, 1, 2), 2);

    let info = outcome.early_stop.unwrap();
    assert_eq!(info.dataset, "test_1");
    assert_eq!(info.iteration, 3);
    assert_eq!(info.best_iteration, 1);
    assert_eq!(outcome.scores.get("test_1", "l2").unwrap(), &[3.0]);
    assert_eq!(outcome.scores.get("test_2", "l2").unwrap(), &[1.0]);
}

#[test]
fn later_validation_set_stops_when_earlier_one_improves() {
    let mut engine = ScriptedEngine::new(&["l2"])
        .with_series(1, &[3.0, 2.0, 2.5, 2.5, 2.5])
        .with_series(2, &[1.0, 1.5, 1.5, 1.5, 1.5]);

    let outcome = run(&mut engine, &config(10, 1, 2), 2);

    let info = outcome.early_stop.unwrap();
    assert_eq!(info.dataset, "test_2");
    assert_eq!(info.iteration, 3);
    assert_eq!(info.best_iteration, 1);
}

#[rstest]
#[case(10, 1, 4)]
#[case(10, 3, 4)]
#[case(10, 2, 1)]
#[case(7, 4, 7)]
fn convergence_truncates_to_previous_iteration(
    #[case] budget: u32,
    #[case] freq: u32,
    #[case] converge_at: usize,
) {
    let mut engine = ScriptedEngine::new(&["l2"])
        .with_series(1, &[0.5])
        .converge_at(converge_at);

    let outcome = run(&mut engine, &config(budget, freq, 0), 1);

    assert_eq!(outcome.state, TrainingState::Converged);
    assert_eq!(outcome.iterations, converge_at - 1);
    let expected = (converge_at - 1).div_ceil(freq as usize);
    let recorded = outcome.scores.get("test_1", "l2").map_or(0, <[f64]>::len);
    assert_eq!(recorded, expected);
}

proptest! {
    #[test]
    fn exhausted_runs_fill_every_round(budget in 1u32..40, freq in 1u32..8) {
        let mut engine = ScriptedEngine::new(&["l2", "l1"])
            .with_slot(1, vec![vec![1.0, 2.0]]);
        let outcome = run(&mut engine, &config(budget, freq, 0), 1);

        prop_assert_eq!(outcome.state, TrainingState::Exhausted);
        prop_assert_eq!(engine.updates(), budget as usize);
        let rounds = (budget as usize).div_ceil(freq as usize);
        for metric in ["l2", "l1"] {
            let scores = outcome.scores.get("test_1", metric).unwrap();
            prop_assert_eq!(scores.len(), rounds);
            prop_assert!(scores.iter().all(|v| !v.is_nan()));
        }
    }

    #[test]
    fn early_stop_length_matches_best_round(
        best in 1usize..15,
        patience in 1u32..5,
        freq in 1u32..5,
    ) {
        // Strictly increasing up to `best`, flat afterwards.
        let series: Vec<f64> = (1..=40).map(|it| it.min(best) as f64).collect();
        let mut engine = ScriptedEngine::new(&["auc"]).with_series(1, &series);

        let outcome = run(&mut engine, &config(40, freq, patience), 1);

        prop_assert_eq!(outcome.state, TrainingState::EarlyStopped);
        prop_assert_eq!(outcome.best_iteration, Some(best));
        prop_assert_eq!(outcome.iterations, best + patience as usize);
        let scores = outcome.scores.get("test_1", "auc").unwrap();
        prop_assert_eq!(scores.len(), best.div_ceil(freq as usize));
    }
}

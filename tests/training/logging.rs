//! Log lines emitted during a fit, captured from a `tracing` subscriber.

use std::io;
use std::sync::{Arc, Mutex};

use boosters_fit::testing::ScriptedEngine;
use boosters_fit::{EstimatorConfig, FitOutcome, ValidationSet, Verbosity, fit};
use ndarray::{Array1, Array2};

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Captured {
    fn lines(&self) -> Vec<String> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }
}

/// Run `f` with a plain-text subscriber installed and return its output lines.
fn capture<T>(f: impl FnOnce() -> T) -> (T, Vec<String>) {
    let buf = Captured::default();
    let writer = buf.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .without_time()
        .with_max_level(tracing::Level::TRACE)
        .finish();
    let out = tracing::subscriber::with_default(subscriber, f);
    (out, buf.lines())
}

fn run(
    engine: &mut ScriptedEngine,
    config: &EstimatorConfig,
    n_valid: usize,
    verbosity: Verbosity,
) -> (FitOutcome<boosters_fit::testing::ScriptedBooster>, Vec<String>) {
    let x = Array2::<f32>::zeros((6, 2));
    let y = Array1::<f32>::zeros(6);
    let valid: Vec<ValidationSet<'_>> = (0..n_valid)
        .map(|_| ValidationSet::new(x.view(), y.view()))
        .collect();
    capture(|| fit(engine, config, x.view(), y.view(), &valid, verbosity).unwrap())
}

/// Iteration numbers of the progress lines, in emission order.
fn progress_iterations(lines: &[String]) -> Vec<usize> {
    lines
        .iter()
        .filter_map(|line| {
            let rest = &line[line.find("Iteration: ")? + "Iteration: ".len()..];
            rest.split(',').next()?.trim().parse().ok()
        })
        .collect()
}

#[test]
fn progress_lines_only_on_evaluation_rounds() {
    let losses = [0.9, 0.8, 0.7, 0.6, 0.5];
    let mut engine = ScriptedEngine::new(&["l2"])
        .with_series(0, &losses)
        .with_series(1, &losses);
    // Patience keeps validation reads going off-frequency.
    let config = EstimatorConfig::builder()
        .num_iterations(5)
        .metric_freq(2)
        .early_stopping_round(10)
        .is_training_metric(true)
        .build()
        .unwrap();

    let (_, lines) = run(&mut engine, &config, 1, Verbosity::Info);

    assert_eq!(progress_iterations(&lines), [1, 1, 3, 3, 5, 5]);
    assert!(lines.iter().any(|l| l.contains("Iteration: 3, training's l2: 0.700000")));
    assert!(lines.iter().any(|l| l.contains("Iteration: 5, test_1's l2: 0.500000")));
}

#[test]
fn early_stop_line_names_best_iteration() {
    let mut engine = ScriptedEngine::new(&["auc"])
        .with_series(1, &[1.0, 2.0, 3.0, 2.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    let config = EstimatorConfig::builder()
        .num_iterations(10)
        .early_stopping_round(3)
        .build()
        .unwrap();

    let (outcome, lines) = run(&mut engine, &config, 1, Verbosity::Info);

    assert_eq!(outcome.iterations, 6);
    let stops: Vec<_> = lines
        .iter()
        .filter(|l| l.contains("Early stopping at iteration"))
        .collect();
    assert_eq!(stops.len(), 1);
    assert!(stops[0].contains("Early stopping at iteration 6, the best iteration round is 3"));
    assert_eq!(progress_iterations(&lines), [1, 2, 3, 4, 5, 6]);
}

#[test]
fn convergence_line_is_emitted() {
    let mut engine = ScriptedEngine::new(&["l2"])
        .with_series(1, &[0.5])
        .converge_at(3);
    let config = EstimatorConfig::builder().num_iterations(10).build().unwrap();

    let (_, lines) = run(&mut engine, &config, 1, Verbosity::Info);

    assert!(
        lines
            .iter()
            .any(|l| l.contains("no more leaves that meet the split requirements"))
    );
    assert_eq!(progress_iterations(&lines), [1, 2]);
}

#[test]
fn silent_emits_nothing() {
    let mut engine = ScriptedEngine::new(&["auc"])
        .with_series(0, &[0.5])
        .with_series(1, &[1.0, 2.0, 3.0, 2.0, 1.0, 0.0]);
    let config = EstimatorConfig::builder()
        .num_iterations(10)
        .early_stopping_round(3)
        .is_training_metric(true)
        .build()
        .unwrap();

    let (outcome, lines) = run(&mut engine, &config, 1, Verbosity::Silent);

    assert_eq!(outcome.best_iteration, Some(3));
    assert!(lines.is_empty(), "unexpected output: {:?}", lines);
}

#[test]
fn warning_level_skips_progress() {
    let mut engine = ScriptedEngine::new(&["l2"]).with_series(1, &[0.5]);
    let config = EstimatorConfig::builder()
        .num_iterations(3)
        .early_stopping_round(2)
        .build()
        .unwrap();

    let (_, lines) = run(&mut engine, &config, 0, Verbosity::Warning);

    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("WARN"));
    assert!(lines[0].contains("early stopping is inactive"));
}

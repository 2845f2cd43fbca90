//! Training loop.
//!
//! [`TrainingLoop`] drives one booster through its iteration budget: one
//! engine update per iteration, then one evaluation. It ends in one of three
//! terminal [`TrainingState`]s:
//!
//! - `Converged`: the engine found no further split. Scores are cut back to
//!   the previous iteration, since the current one added nothing.
//! - `EarlyStopped`: a validation metric ran out of patience. Scores were
//!   cut back to that pair's best iteration by the evaluator.
//! - `Exhausted`: the budget ran out. Scores are returned untouched.

use crate::config::EstimatorConfig;
use crate::engine::BoostingEngine;
use crate::error::FitResult;

use super::eval::{EarlyStopInfo, EvalSignal, MetricEvaluator};
use super::logger::TrainingLogger;
use super::scores::ScoreStore;

/// State of a training run. Every state but `Running` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingState {
    Running,
    /// The engine reported that no further splits are possible.
    Converged,
    /// Early stopping patience ran out.
    EarlyStopped,
    /// The iteration budget was consumed.
    Exhausted,
}

impl TrainingState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Converged => "converged",
            Self::EarlyStopped => "early_stopped",
            Self::Exhausted => "exhausted",
        }
    }
}

impl std::fmt::Display for TrainingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOutcome {
    /// Terminal state.
    pub state: TrainingState,
    /// Boosting iterations that produced a model update.
    pub iterations: usize,
    /// Set when early stopping fired.
    pub early_stop: Option<EarlyStopInfo>,
    /// Recorded scores, truncated according to `state`.
    pub scores: ScoreStore,
}

impl TrainingOutcome {
    /// Best iteration of the pair that triggered early stopping.
    pub fn best_iteration(&self) -> Option<usize> {
        self.early_stop.as_ref().map(|info| info.best_iteration)
    }
}

/// Drives a booster through its iteration budget.
///
/// Holds exclusive access to the engine and the booster for the duration of
/// the run.
pub struct TrainingLoop<'a, E: BoostingEngine> {
    engine: &'a mut E,
    booster: &'a mut E::Booster,
    config: &'a EstimatorConfig,
    n_valid: usize,
    logger: &'a TrainingLogger,
}

impl<'a, E: BoostingEngine> TrainingLoop<'a, E> {
    /// Create a loop for a booster with `n_valid` validation datasets
    /// attached.
    pub fn new(
        engine: &'a mut E,
        booster: &'a mut E::Booster,
        config: &'a EstimatorConfig,
        n_valid: usize,
        logger: &'a TrainingLogger,
    ) -> Self {
        Self {
            engine,
            booster,
            config,
            n_valid,
            logger,
        }
    }

    /// Run until a terminal state.
    ///
    /// Engine errors abort the run; no partial outcome is returned.
    pub fn run(&mut self) -> FitResult<TrainingOutcome> {
        let num_iterations = self.config.num_iterations as usize;
        let metric_names = self.engine.eval_names(&*self.booster)?;
        let mut evaluator =
            MetricEvaluator::new(self.config, metric_names, self.n_valid, self.logger);
        let mut scores = ScoreStore::for_config(self.config);

        self.logger.start_training(num_iterations, self.n_valid);

        for iteration in 1..=num_iterations {
            let converged = self.engine.update_one_iter(&mut *self.booster)?;
            if converged {
                scores.truncate(iteration - 1);
                self.logger.log_converged(iteration);
                return Ok(self.finish(TrainingState::Converged, iteration - 1, None, scores));
            }

            let signal = evaluator.evaluate(&*self.engine, &*self.booster, iteration, &mut scores)?;
            if let EvalSignal::Stop(info) = signal {
                return Ok(self.finish(TrainingState::EarlyStopped, iteration, Some(info), scores));
            }
        }

        Ok(self.finish(TrainingState::Exhausted, num_iterations, None, scores))
    }

    fn finish(
        &self,
        state: TrainingState,
        iterations: usize,
        early_stop: Option<EarlyStopInfo>,
        scores: ScoreStore,
    ) -> TrainingOutcome {
        self.logger.finish_training(state.name(), iterations);
        TrainingOutcome {
            state,
            iterations,
            early_stop,
            scores,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedEngine;
    use crate::training::Verbosity;

    fn run(engine: &mut ScriptedEngine, config: &EstimatorConfig, n_valid: usize) -> TrainingOutcome {
        let mut booster = engine.scripted_booster(n_valid);
        let logger = TrainingLogger::new(Verbosity::Silent);
        TrainingLoop::new(engine, &mut booster, config, n_valid, &logger)
            .run()
            .unwrap()
    }

    #[test]
    fn state_names() {
        assert!(!TrainingState::Running.is_terminal());
        assert!(TrainingState::Converged.is_terminal());
        assert_eq!(TrainingState::EarlyStopped.to_string(), "early_stopped");
    }

    #[test]
    fn exhausts_budget_without_signals() {
        let mut engine = ScriptedEngine::new(&["l2"])
            .with_slot(1, (0..7).map(|i| vec![1.0 / (i + 1) as f64]).collect());
        let config = EstimatorConfig::builder().num_iterations(7).build().unwrap();

        let outcome = run(&mut engine, &config, 1);

        assert_eq!(outcome.state, TrainingState::Exhausted);
        assert_eq!(outcome.iterations, 7);
        assert_eq!(engine.updates(), 7);
        assert_eq!(outcome.scores.get("test_1", "l2").unwrap().len(), 7);
        assert_eq!(outcome.best_iteration(), None);
    }

    #[test]
    fn convergence_truncates_to_previous_iteration() {
        let mut engine = ScriptedEngine::new(&["l2"])
            .with_slot(1, vec![vec![0.5]; 10])
            .converge_at(4);
        let config = EstimatorConfig::builder().num_iterations(10).build().unwrap();

        let outcome = run(&mut engine, &config, 1);

        assert_eq!(outcome.state, TrainingState::Converged);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(engine.updates(), 4);
        assert_eq!(outcome.scores.get("test_1", "l2").unwrap(), &[0.5, 0.5, 0.5]);
    }

    #[test]
    fn convergence_on_first_iteration_records_nothing() {
        let mut engine = ScriptedEngine::new(&["l2"])
            .with_slot(1, vec![vec![0.5]; 10])
            .converge_at(1);
        let config = EstimatorConfig::builder().num_iterations(10).build().unwrap();

        let outcome = run(&mut engine, &config, 1);

        assert_eq!(outcome.state, TrainingState::Converged);
        assert_eq!(outcome.iterations, 0);
        assert!(outcome.scores.is_empty());
        assert_eq!(engine.eval_calls(), 0);
    }

    #[test]
    fn early_stopping_reports_best_iteration() {
        let mut engine = ScriptedEngine::new(&["auc"]).with_slot(
            1,
            [1.0, 2.0, 3.0, 2.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]
                .iter()
                .map(|&v| vec![v])
                .collect(),
        );
        let config = EstimatorConfig::builder()
            .num_iterations(10)
            .early_stopping_round(3)
            .build()
            .unwrap();

        let outcome = run(&mut engine, &config, 1);

        assert_eq!(outcome.state, TrainingState::EarlyStopped);
        assert_eq!(outcome.iterations, 6);
        assert_eq!(outcome.best_iteration(), Some(3));
        assert_eq!(engine.updates(), 6);
        assert_eq!(outcome.scores.get("test_1", "auc").unwrap(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn engine_error_aborts_run() {
        let mut engine = ScriptedEngine::new(&["l2"])
            .with_slot(1, vec![vec![0.5]; 10])
            .fail_update_at(2);
        let config = EstimatorConfig::default();
        let mut booster = engine.scripted_booster(1);
        let logger = TrainingLogger::default();

        let err = TrainingLoop::new(&mut engine, &mut booster, &config, 1, &logger)
            .run()
            .unwrap_err();

        assert!(matches!(err, crate::FitError::Engine(_)));
    }
}

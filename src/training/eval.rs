//! Per-iteration metric evaluation.
//!
//! [`MetricEvaluator`] decides which datasets to evaluate at an iteration,
//! pulls their metric values from the engine, records them in the
//! [`ScoreStore`], logs progress, and feeds the early stopping ledger.

use crate::config::EstimatorConfig;
use crate::engine::BoostingEngine;
use crate::error::{EngineError, FitResult};

use super::callback::{EarlyStopAction, EarlyStopping};
use super::logger::TrainingLogger;
use super::metrics::MetricDirection;
use super::scores::ScoreStore;

/// Name the training set is recorded under.
pub const TRAINING_DATASET: &str = "training";

/// Name of the validation dataset in engine slot `slot` (1-based):
/// `test_1`, `test_2`, ...
pub fn validation_name(slot: usize) -> String {
    format!("test_{}", slot)
}

// =============================================================================
// EvalSignal
// =============================================================================

/// Why early stopping fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EarlyStopInfo {
    /// Iteration at which patience ran out.
    pub iteration: usize,
    /// Best iteration of the exhausted (metric, dataset) pair.
    pub best_iteration: usize,
    pub dataset: String,
    pub metric: String,
}

/// Result of evaluating one iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalSignal {
    Continue,
    Stop(EarlyStopInfo),
}

// =============================================================================
// MetricEvaluator
// =============================================================================

/// Evaluation state for one training run.
///
/// Owns the early stopping ledger. Validation datasets are addressed by
/// engine slot `1..=n_valid`; slot 0 is the training set.
#[derive(Debug)]
pub struct MetricEvaluator<'a> {
    metric_freq: usize,
    track_training: bool,
    metric_names: Vec<String>,
    directions: Vec<MetricDirection>,
    dataset_names: Vec<String>,
    ledger: EarlyStopping,
    logger: &'a TrainingLogger,
}

impl<'a> MetricEvaluator<'a> {
    /// Create an evaluator for the metrics the booster reports and `n_valid`
    /// attached validation datasets.
    pub fn new(
        config: &EstimatorConfig,
        metric_names: Vec<String>,
        n_valid: usize,
        logger: &'a TrainingLogger,
    ) -> Self {
        let directions = metric_names.iter().map(|m| MetricDirection::of(m)).collect();
        let ledger = EarlyStopping::new(
            config.early_stopping_round as usize,
            metric_names.len(),
            n_valid,
        );
        Self {
            metric_freq: config.metric_freq.max(1) as usize,
            track_training: config.is_training_metric,
            metric_names,
            directions,
            dataset_names: (1..=n_valid).map(validation_name).collect(),
            ledger,
            logger,
        }
    }

    /// Whether `iteration` (1-based) is an evaluation round.
    pub fn is_eval_iteration(&self, iteration: usize) -> bool {
        (iteration.saturating_sub(1)) % self.metric_freq == 0
    }

    pub fn metric_names(&self) -> &[String] {
        &self.metric_names
    }

    pub fn dataset_names(&self) -> &[String] {
        &self.dataset_names
    }

    pub fn ledger(&self) -> &EarlyStopping {
        &self.ledger
    }

    /// Evaluate after `iteration` completed.
    ///
    /// On-frequency iterations record and log the training set (when
    /// tracked) and every validation set. Validation sets are also read
    /// off-frequency while early stopping is enabled, to keep the ledger
    /// current. The first (dataset, metric) pair whose patience runs out
    /// truncates `scores` to its best iteration and stops the round.
    pub fn evaluate<E: BoostingEngine>(
        &mut self,
        engine: &E,
        booster: &E::Booster,
        iteration: usize,
        scores: &mut ScoreStore,
    ) -> FitResult<EvalSignal> {
        let on_frequency = self.is_eval_iteration(iteration);

        if on_frequency && self.track_training {
            let values = self.fetch(engine, booster, 0)?;
            self.record(scores, TRAINING_DATASET, iteration, &values)?;
            self.logger
                .log_evaluation(iteration, TRAINING_DATASET, &self.metric_names, &values);
        }

        if !on_frequency && !self.ledger.is_enabled() {
            return Ok(EvalSignal::Continue);
        }

        for d_idx in 0..self.dataset_names.len() {
            let values = self.fetch(engine, booster, d_idx + 1)?;
            let dataset = &self.dataset_names[d_idx];

            if on_frequency {
                self.record(scores, dataset, iteration, &values)?;
                self.logger
                    .log_evaluation(iteration, dataset, &self.metric_names, &values);
            }

            for (m_idx, &raw) in values.iter().enumerate() {
                let score = self.directions[m_idx].normalize(raw);
                if self.ledger.update(m_idx, d_idx, iteration, score) == EarlyStopAction::Stop {
                    let best_iteration = self.ledger.best_iteration(m_idx, d_idx);
                    scores.truncate(best_iteration);
                    self.logger.log_early_stopping(
                        iteration,
                        best_iteration,
                        dataset,
                        &self.metric_names[m_idx],
                    );
                    return Ok(EvalSignal::Stop(EarlyStopInfo {
                        iteration,
                        best_iteration,
                        dataset: dataset.clone(),
                        metric: self.metric_names[m_idx].clone(),
                    }));
                }
            }
        }

        Ok(EvalSignal::Continue)
    }

    fn fetch<E: BoostingEngine>(
        &self,
        engine: &E,
        booster: &E::Booster,
        slot: usize,
    ) -> FitResult<Vec<f64>> {
        let values = engine.eval(booster, slot)?;
        if values.len() != self.metric_names.len() {
            return Err(EngineError::new(
                "eval",
                format!(
                    "slot {} reported {} values for {} metrics",
                    slot,
                    values.len(),
                    self.metric_names.len()
                ),
            )
            .into());
        }
        Ok(values)
    }

    fn record(
        &self,
        scores: &mut ScoreStore,
        dataset: &str,
        iteration: usize,
        values: &[f64],
    ) -> FitResult<()> {
        for (name, &value) in self.metric_names.iter().zip(values) {
            scores.record(dataset, name, iteration, value)?;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

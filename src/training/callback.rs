//! Early stopping ledger.
//!
//! Tracks, for every (metric, validation dataset) pair, the best
//! direction-normalized score and the iteration it was observed at, and
//! decides when patience is exhausted.

use ndarray::Array2;

/// Outcome of feeding one score to [`EarlyStopping::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarlyStopAction {
    /// Strictly better than the previous best.
    Improved,
    /// Not better, patience left (or early stopping disabled).
    Continue,
    /// Not better for `patience` iterations.
    Stop,
}

/// Best-score ledger for early stopping.
///
/// Scores must be direction-normalized (higher is better, see
/// [`MetricDirection::normalize`](super::MetricDirection::normalize)).
/// Every pair starts at `-inf`, iteration 1, so the first finite score is
/// always an improvement.
///
/// # Example
///
/// ```
/// use boosters_fit::training::{EarlyStopping, EarlyStopAction};
///
/// // One metric, one validation set, patience 2
/// let mut ledger = EarlyStopping::new(2, 1, 1);
///
/// assert_eq!(ledger.update(0, 0, 1, 0.5), EarlyStopAction::Improved);
/// assert_eq!(ledger.update(0, 0, 2, 0.5), EarlyStopAction::Continue); // tie
/// assert_eq!(ledger.update(0, 0, 3, 0.4), EarlyStopAction::Stop);
/// assert_eq!(ledger.best_iteration(0, 0), 1);
/// ```
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    /// Iterations without improvement before stopping. 0 disables.
    patience: usize,
    /// Best normalized score, shape `[n_metrics, n_datasets]`.
    best_score: Array2<f64>,
    /// Iteration of the best score, shape `[n_metrics, n_datasets]`.
    best_iteration: Array2<usize>,
}

impl EarlyStopping {
    /// Create a ledger for `n_metrics` metrics on `n_datasets` validation
    /// datasets.
    pub fn new(patience: usize, n_metrics: usize, n_datasets: usize) -> Self {
        Self {
            patience,
            best_score: Array2::from_elem((n_metrics, n_datasets), f64::NEG_INFINITY),
            best_iteration: Array2::from_elem((n_metrics, n_datasets), 1),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.patience > 0
    }

    pub fn patience(&self) -> usize {
        self.patience
    }

    /// Feed the normalized `score` of `metric` on `dataset` at `iteration`.
    ///
    /// Only a strictly greater score counts as improvement; ties advance
    /// the patience counter. Returns [`EarlyStopAction::Stop`] once
    /// `iteration - best_iteration >= patience` with early stopping enabled.
    pub fn update(
        &mut self,
        metric: usize,
        dataset: usize,
        iteration: usize,
        score: f64,
    ) -> EarlyStopAction {
        let idx = (metric, dataset);
        if score > self.best_score[idx] {
            self.best_score[idx] = score;
            self.best_iteration[idx] = iteration;
            return EarlyStopAction::Improved;
        }

        if self.is_enabled() && iteration.saturating_sub(self.best_iteration[idx]) >= self.patience {
            EarlyStopAction::Stop
        } else {
            EarlyStopAction::Continue
        }
    }

    /// Best normalized score of a pair.
    pub fn best_score(&self, metric: usize, dataset: usize) -> f64 {
        self.best_score[(metric, dataset)]
    }

    /// Iteration of the best score of a pair.
    pub fn best_iteration(&self, metric: usize, dataset: usize) -> usize {
        self.best_iteration[(metric, dataset)]
    }
}

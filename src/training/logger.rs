//! Training logger with verbosity levels.
//!
//! [`TrainingLogger`] is passed by reference through the training loop and the
//! evaluator. Every message is first gated by the logger's [`Verbosity`] and
//! then emitted as a `tracing` event, so output also respects whatever
//! subscriber and filter the application installs.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// Verbosity level for training output.
///
/// Ordered, so `verbosity >= Verbosity::Info` reads as "info is enabled".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// Fatal messages only.
    #[default]
    Silent,
    /// Warnings.
    Warning,
    /// Per-round progress and stop reasons.
    Info,
    /// Internal details.
    Debug,
}

impl Verbosity {
    /// Map an integer level: negative is fatal-only, 0 adds warnings,
    /// 1 adds info, anything above adds debug.
    pub fn from_level(level: i32) -> Self {
        match level {
            i32::MIN..=-1 => Self::Silent,
            0 => Self::Warning,
            1 => Self::Info,
            _ => Self::Debug,
        }
    }

    /// Integer level as understood by engines (`verbosity=<level>`).
    pub fn level(&self) -> i32 {
        match self {
            Self::Silent => -1,
            Self::Warning => 0,
            Self::Info => 1,
            Self::Debug => 2,
        }
    }
}

impl From<i32> for Verbosity {
    fn from(level: i32) -> Self {
        Self::from_level(level)
    }
}

/// Structured logger for one training run.
#[derive(Debug, Clone, Copy)]
pub struct TrainingLogger {
    verbosity: Verbosity,
}

impl TrainingLogger {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Whether messages at `level` are emitted.
    pub fn enabled(&self, level: Verbosity) -> bool {
        level != Verbosity::Silent && self.verbosity >= level
    }

    pub fn start_training(&self, num_iterations: usize, n_valid: usize) {
        if self.enabled(Verbosity::Debug) {
            tracing::debug!(num_iterations, n_valid, "starting training");
        }
    }

    /// One progress line for a dataset:
    /// `Iteration: 3, test_1's l2: 0.250000, test_1's l1: 0.400000`.
    pub fn log_evaluation(&self, iteration: usize, dataset: &str, names: &[String], values: &[f64]) {
        if !self.enabled(Verbosity::Info) {
            return;
        }
        let mut line = format!("Iteration: {}", iteration);
        for (name, value) in names.iter().zip(values) {
            let _ = write!(line, ", {}'s {}: {:.6}", dataset, name, value);
        }
        tracing::info!(iteration, dataset, "{}", line);
    }

    pub fn log_early_stopping(
        &self,
        iteration: usize,
        best_iteration: usize,
        dataset: &str,
        metric: &str,
    ) {
        if self.enabled(Verbosity::Info) {
            tracing::info!(
                iteration,
                best_iteration,
                dataset,
                metric,
                "Early stopping at iteration {}, the best iteration round is {}",
                iteration,
                best_iteration
            );
        }
    }

    pub fn log_converged(&self, iteration: usize) {
        if self.enabled(Verbosity::Info) {
            tracing::info!(
                iteration,
                "Stopped training because there are no more leaves that meet the split requirements"
            );
        }
    }

    pub fn info(&self, message: &str) {
        if self.enabled(Verbosity::Info) {
            tracing::info!("{}", message);
        }
    }

    pub fn warn(&self, message: &str) {
        if self.enabled(Verbosity::Warning) {
            tracing::warn!("{}", message);
        }
    }

    pub fn finish_training(&self, state: &str, iterations: usize) {
        if self.enabled(Verbosity::Debug) {
            tracing::debug!(state, iterations, "training finished");
        }
    }
}

impl Default for TrainingLogger {
    fn default() -> Self {
        Self::new(Verbosity::default())
    }
}

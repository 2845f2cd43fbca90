//! Training driver.
//!
//! Everything between "the booster exists" and "training is over":
//!
//! - [`TrainingLoop`], [`TrainingState`]: one engine update per iteration
//!   until convergence, early stopping or budget exhaustion
//! - [`MetricEvaluator`]: per-iteration metric readout and recording
//! - [`EarlyStopping`]: best-score ledger per (metric, validation set)
//! - [`ScoreStore`]: per-round score history with truncation
//! - [`MetricDirection`]: which metrics are maximized
//! - [`TrainingLogger`], [`Verbosity`]: structured logging

mod callback;
mod eval;
mod logger;
mod metrics;
mod scores;
mod trainer;

pub use callback::{EarlyStopAction, EarlyStopping};
pub use eval::{EarlyStopInfo, EvalSignal, MetricEvaluator, TRAINING_DATASET, validation_name};
pub use logger::{TrainingLogger, Verbosity};
pub use metrics::{MAXIMIZE_METRICS, MetricDirection};
pub use scores::ScoreStore;
pub use trainer::{TrainingLoop, TrainingOutcome, TrainingState};

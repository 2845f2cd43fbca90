//! Error types for fitting.
//!
//! Three kinds of failure can surface from a fit call:
//!
//! - [`ConfigError`]: malformed hyperparameters or incompatible input data.
//! - [`EngineError`]: anything the boosting engine reports while building
//!   datasets, building the booster or running an iteration.
//! - [`FitError::Index`]: a score history write past its pre-sized length.
//!   This only happens if the loop is driven past the iteration budget.
//!
//! Engine convergence and early stopping are not errors; they are reported
//! through [`TrainingState`](crate::training::TrainingState).

/// Invalid configuration or input data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("num_iterations must be at least 1")]
    InvalidNumIterations,

    #[error("metric_freq must be at least 1")]
    InvalidMetricFreq,

    #[error("learning_rate must be positive, got {0}")]
    InvalidLearningRate(f64),

    #[error("{field} must be in (0, 1], got {value}")]
    InvalidFraction { field: &'static str, value: f64 },

    #[error("{field} must be non-negative, got {value}")]
    InvalidRegularization { field: &'static str, value: f64 },

    #[error("multiclass objective needs at least 2 classes, got {0}")]
    InvalidNumClass(u32),

    #[error("categorical_feature holds 1-based column numbers, got 0")]
    ZeroCategoricalColumn,

    #[error("number of labels ({labels}) does not match number of rows ({rows})")]
    LabelLenMismatch { rows: usize, labels: usize },

    #[error("dataset has {got} features but its reference dataset has {expected}")]
    FeatureMismatch { expected: usize, got: usize },

    #[error("dataset must have at least one row and one feature, got {rows}x{features}")]
    EmptyDataset { rows: usize, features: usize },

    #[error("cross-validation needs 2 <= n_folds <= n_rows, got {n_folds} folds for {n_rows} rows")]
    InvalidFolds { n_folds: usize, n_rows: usize },

    #[error("failed to parse estimator config: {0}")]
    Parse(String),
}

/// Failure reported by the boosting engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("engine call `{operation}` failed: {message}")]
pub struct EngineError {
    /// The engine operation that failed (e.g. `"update_one_iter"`).
    pub operation: &'static str,
    /// Engine-provided description.
    pub message: String,
}

impl EngineError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

/// Any failure of a fit call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("score history overrun: {dataset}/{metric} round {round} exceeds capacity {capacity}")]
    Index {
        dataset: String,
        metric: String,
        round: usize,
        capacity: usize,
    },
}

pub type FitResult<T> = std::result::Result<T, FitError>;

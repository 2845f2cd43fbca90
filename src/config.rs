//! Estimator configuration with builder pattern.
//!
//! [`EstimatorConfig`] is the bag of hyperparameters for one fit call. It is
//! read by the training loop (iteration budget, evaluation frequency,
//! patience, training-set tracking) and serialized into engine parameter
//! strings by [`crate::params`].
//!
//! # Example
//!
//! ```
//! use boosters_fit::EstimatorConfig;
//!
//! // All defaults: regression, 10 iterations
//! let config = EstimatorConfig::builder().build().unwrap();
//!
//! // Binary classification tracked with AUC, stopping after 5 stale rounds
//! let config = EstimatorConfig::binary()
//!     .num_iterations(200)
//!     .metric(vec!["auc".to_string()])
//!     .early_stopping_round(5)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.objective.name(), "binary");
//! ```

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// =============================================================================
// Objective
// =============================================================================

/// Learning task passed to the engine as `objective=<name>`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Squared-error regression.
    #[default]
    Regression,
    /// Binary log loss classification.
    Binary,
    /// Softmax multiclass classification.
    Multiclass { num_class: u32 },
    /// LambdaRank learning to rank.
    Lambdarank,
}

impl Objective {
    /// Engine name of the objective.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Regression => "regression",
            Self::Binary => "binary",
            Self::Multiclass { .. } => "multiclass",
            Self::Lambdarank => "lambdarank",
        }
    }

    /// Number of classes, for multiclass objectives only.
    pub fn num_class(&self) -> Option<u32> {
        match self {
            Self::Multiclass { num_class } => Some(*num_class),
            _ => None,
        }
    }
}

impl std::fmt::Display for Objective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// EstimatorConfig
// =============================================================================

/// Hyperparameters for a fit call.
///
/// The loop-control fields are `num_iterations`, `metric_freq`,
/// `early_stopping_round` and `is_training_metric`. Everything else is
/// forwarded to the engine.
///
/// Optional fields left unset and empty lists are omitted from the engine
/// parameter string, so the engine applies its own defaults.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(derive(Clone, Debug), finish_fn(vis = "", name = __build_internal))]
#[serde(default)]
pub struct EstimatorConfig {
    // === Task ===
    /// Learning task. Default: regression.
    #[builder(default)]
    pub objective: Objective,

    // === Boosting ===
    /// Iteration budget. Default: 10.
    #[builder(default = 10)]
    pub num_iterations: u32,

    /// Shrinkage rate. Default: 0.1.
    #[builder(default = 0.1)]
    pub learning_rate: f64,

    /// Maximum leaves per tree. Default: 127.
    #[builder(default = 127)]
    pub num_leaves: u32,

    /// Maximum tree depth, `-1` for unlimited. Default: -1.
    #[builder(default = -1)]
    pub max_depth: i32,

    /// Engine tree learner. Default: `"serial"`.
    #[builder(default = String::from("serial"), into)]
    pub tree_learner: String,

    /// Engine worker threads. Unset lets the engine decide.
    pub num_threads: Option<u32>,

    /// Histogram cache size in MB, `-1` for unlimited. Default: -1.
    #[builder(default = -1.0)]
    pub histogram_pool_size: f64,

    // === Leaf constraints and regularization ===
    /// Minimum number of rows in a leaf. Default: 100.
    #[builder(default = 100)]
    pub min_data_in_leaf: u32,

    /// Minimum hessian sum in a leaf. Default: 10.
    #[builder(default = 10.0)]
    pub min_sum_hessian_in_leaf: f64,

    /// L1 regularization. Default: 0.
    #[builder(default = 0.0)]
    pub lambda_l1: f64,

    /// L2 regularization. Default: 0.
    #[builder(default = 0.0)]
    pub lambda_l2: f64,

    /// Minimum gain to accept a split. Default: 0.
    #[builder(default = 0.0)]
    pub min_gain_to_split: f64,

    // === Sampling ===
    /// Fraction of features per tree. Default: 1.
    #[builder(default = 1.0)]
    pub feature_fraction: f64,

    #[builder(default = 2)]
    pub feature_fraction_seed: u32,

    /// Fraction of rows per bagging round. Default: 1.
    #[builder(default = 1.0)]
    pub bagging_fraction: f64,

    /// Bag every `bagging_freq` iterations, 0 disables bagging. Default: 0.
    #[builder(default = 0)]
    pub bagging_freq: u32,

    #[builder(default = 3)]
    pub bagging_seed: u32,

    // === Early stopping ===
    /// Stop when a validation metric has not improved for this many
    /// iterations. 0 disables early stopping. Default: 0.
    #[builder(default = 0)]
    pub early_stopping_round: u32,

    // === Dataset ===
    /// Maximum number of histogram bins per feature. Default: 255.
    #[builder(default = 255)]
    pub max_bin: u32,

    #[builder(default = 1)]
    pub data_random_seed: u32,

    /// Store datasets sparsely when possible. Default: true.
    #[builder(default = true)]
    pub is_sparse: bool,

    /// Categorical columns as 1-based column numbers.
    #[builder(default)]
    pub categorical_feature: Vec<u32>,

    /// Reweight classes for unbalanced binary problems. Default: false.
    #[builder(default = false)]
    pub is_unbalance: bool,

    // === Evaluation ===
    /// Metric names for the engine to report. Empty uses the objective's
    /// default metric.
    #[builder(default)]
    pub metric: Vec<String>,

    /// Evaluate every `metric_freq` iterations. Default: 1.
    #[builder(default = 1)]
    pub metric_freq: u32,

    /// Also record the training set under `"training"`. Default: false.
    #[builder(default = false)]
    pub is_training_metric: bool,

    /// Positions for NDCG/MAP evaluation.
    #[builder(default)]
    pub ndcg_at: Vec<u32>,

    // === Objective specifics ===
    /// Relevance gain per label for ranking objectives.
    #[builder(default)]
    pub label_gain: Vec<f64>,

    /// Truncation position for LambdaRank. Default: 20.
    #[builder(default = 20)]
    pub max_position: u32,

    /// Sigmoid scale for binary and ranking objectives. Default: 1.
    #[builder(default = 1.0)]
    pub sigmoid: f64,
}

impl<S: estimator_config_builder::IsComplete> EstimatorConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a loop-control or engine parameter is out
    /// of range.
    pub fn build(self) -> Result<EstimatorConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self::builder().__build_internal()
    }
}

impl EstimatorConfig {
    /// Builder preset for regression.
    pub fn regression() -> EstimatorConfigBuilder<estimator_config_builder::SetObjective> {
        Self::builder().objective(Objective::Regression)
    }

    /// Builder preset for binary classification.
    pub fn binary() -> EstimatorConfigBuilder<estimator_config_builder::SetObjective> {
        Self::builder().objective(Objective::Binary)
    }

    /// Builder preset for multiclass classification.
    pub fn multiclass(
        num_class: u32,
    ) -> EstimatorConfigBuilder<estimator_config_builder::SetObjective> {
        Self::builder().objective(Objective::Multiclass { num_class })
    }

    /// Builder preset for learning to rank.
    pub fn lambdarank() -> EstimatorConfigBuilder<estimator_config_builder::SetObjective> {
        Self::builder().objective(Objective::Lambdarank)
    }

    /// Parse and validate a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Early stopping is active when patience is non-zero.
    pub fn early_stopping_enabled(&self) -> bool {
        self.early_stopping_round > 0
    }

    /// Number of evaluation rounds the iteration budget allows:
    /// `ceil(num_iterations / metric_freq)`.
    pub fn max_rounds(&self) -> usize {
        (self.num_iterations as usize).div_ceil(self.metric_freq.max(1) as usize)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_iterations == 0 {
            return Err(ConfigError::InvalidNumIterations);
        }
        if self.metric_freq == 0 {
            return Err(ConfigError::InvalidMetricFreq);
        }
        if !(self.learning_rate > 0.0) {
            return Err(ConfigError::InvalidLearningRate(self.learning_rate));
        }

        for (field, value) in [
            ("feature_fraction", self.feature_fraction),
            ("bagging_fraction", self.bagging_fraction),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::InvalidFraction { field, value });
            }
        }

        for (field, value) in [
            ("lambda_l1", self.lambda_l1),
            ("lambda_l2", self.lambda_l2),
            ("min_gain_to_split", self.min_gain_to_split),
            ("min_sum_hessian_in_leaf", self.min_sum_hessian_in_leaf),
        ] {
            if value < 0.0 {
                return Err(ConfigError::InvalidRegularization { field, value });
            }
        }

        if let Objective::Multiclass { num_class } = self.objective
            && num_class < 2
        {
            return Err(ConfigError::InvalidNumClass(num_class));
        }

        if self.categorical_feature.contains(&0) {
            return Err(ConfigError::ZeroCategoricalColumn);
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

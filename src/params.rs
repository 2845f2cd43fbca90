//! Engine parameter serialization.
//!
//! Engines take their parameters as one flat string of space-separated
//! `name=value` pairs. [`PARAM_TABLE`] declares every parameter the
//! [`EstimatorConfig`] knows how to emit, together with an accessor and
//! whether the value is an index that must be shifted from the 1-based
//! numbering used in the config to the engine's 0-based numbering.
//!
//! # Example
//!
//! ```
//! use boosters_fit::params::{serialize_params, DATASET_PARAMS};
//! use boosters_fit::EstimatorConfig;
//!
//! let config = EstimatorConfig::builder()
//!     .max_bin(63)
//!     .categorical_feature(vec![1, 4])
//!     .build()
//!     .unwrap();
//!
//! let params = serialize_params(&config, DATASET_PARAMS);
//! assert_eq!(params, "max_bin=63 is_sparse=true data_random_seed=1 categorical_feature=0,3");
//! ```

use std::fmt;

use crate::config::EstimatorConfig;

// =============================================================================
// ParamValue
// =============================================================================

/// A single parameter value as emitted to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
    StrList(Vec<String>),
}

impl ParamValue {
    /// Empty lists carry no information and are not emitted.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::IntList(v) => v.is_empty(),
            Self::FloatList(v) => v.is_empty(),
            Self::StrList(v) => v.is_empty(),
            Self::Str(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Shift 1-based positions to 0-based ones.
    fn into_zero_based(self) -> Self {
        match self {
            Self::Int(v) => Self::Int(v - 1),
            Self::IntList(v) => Self::IntList(v.into_iter().map(|x| x - 1).collect()),
            other => other,
        }
    }
}

fn write_joined<T: fmt::Display>(f: &mut fmt::Formatter<'_>, values: &[T]) -> fmt::Result {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{}", value)?;
    }
    Ok(())
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Str(v) => f.write_str(v),
            Self::IntList(v) => write_joined(f, v),
            Self::FloatList(v) => write_joined(f, v),
            Self::StrList(v) => write_joined(f, v),
        }
    }
}

// =============================================================================
// Parameter table
// =============================================================================

/// Static description of one engine parameter.
#[derive(Clone, Copy)]
pub struct ParamSpec {
    /// Engine parameter name.
    pub name: &'static str,
    /// Reads the value from a config. `None` means "not set".
    pub accessor: fn(&EstimatorConfig) -> Option<ParamValue>,
    /// Value is a 1-based position that the engine expects 0-based.
    pub index_based: bool,
}

impl fmt::Debug for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamSpec")
            .field("name", &self.name)
            .field("index_based", &self.index_based)
            .finish()
    }
}

const fn spec(name: &'static str, accessor: fn(&EstimatorConfig) -> Option<ParamValue>) -> ParamSpec {
    ParamSpec { name, accessor, index_based: false }
}

fn ints(values: &[u32]) -> Vec<i64> {
    values.iter().map(|&v| i64::from(v)).collect()
}

/// Every parameter the estimator config can emit.
pub static PARAM_TABLE: &[ParamSpec] = &[
    // Dataset
    spec("max_bin", |c| Some(ParamValue::Int(c.max_bin.into()))),
    spec("is_sparse", |c| Some(ParamValue::Bool(c.is_sparse))),
    spec("data_random_seed", |c| Some(ParamValue::Int(c.data_random_seed.into()))),
    ParamSpec {
        name: "categorical_feature",
        accessor: |c| Some(ParamValue::IntList(ints(&c.categorical_feature))),
        index_based: true,
    },
    // Task
    spec("objective", |c| Some(ParamValue::Str(c.objective.name().to_string()))),
    spec("num_class", |c| c.objective.num_class().map(|n| ParamValue::Int(n.into()))),
    // Boosting
    spec("num_iterations", |c| Some(ParamValue::Int(c.num_iterations.into()))),
    spec("learning_rate", |c| Some(ParamValue::Float(c.learning_rate))),
    spec("num_leaves", |c| Some(ParamValue::Int(c.num_leaves.into()))),
    spec("max_depth", |c| Some(ParamValue::Int(c.max_depth.into()))),
    spec("tree_learner", |c| Some(ParamValue::Str(c.tree_learner.clone()))),
    spec("num_threads", |c| c.num_threads.map(|n| ParamValue::Int(n.into()))),
    spec("histogram_pool_size", |c| Some(ParamValue::Float(c.histogram_pool_size))),
    // Leaf constraints and regularization
    spec("min_data_in_leaf", |c| Some(ParamValue::Int(c.min_data_in_leaf.into()))),
    spec("min_sum_hessian_in_leaf", |c| Some(ParamValue::Float(c.min_sum_hessian_in_leaf))),
    spec("lambda_l1", |c| Some(ParamValue::Float(c.lambda_l1))),
    spec("lambda_l2", |c| Some(ParamValue::Float(c.lambda_l2))),
    spec("min_gain_to_split", |c| Some(ParamValue::Float(c.min_gain_to_split))),
    // Sampling
    spec("feature_fraction", |c| Some(ParamValue::Float(c.feature_fraction))),
    spec("feature_fraction_seed", |c| Some(ParamValue::Int(c.feature_fraction_seed.into()))),
    spec("bagging_fraction", |c| Some(ParamValue::Float(c.bagging_fraction))),
    spec("bagging_freq", |c| Some(ParamValue::Int(c.bagging_freq.into()))),
    spec("bagging_seed", |c| Some(ParamValue::Int(c.bagging_seed.into()))),
    spec("early_stopping_round", |c| Some(ParamValue::Int(c.early_stopping_round.into()))),
    spec("is_unbalance", |c| Some(ParamValue::Bool(c.is_unbalance))),
    // Evaluation
    spec("metric", |c| Some(ParamValue::StrList(c.metric.clone()))),
    spec("metric_freq", |c| Some(ParamValue::Int(c.metric_freq.into()))),
    spec("is_training_metric", |c| Some(ParamValue::Bool(c.is_training_metric))),
    spec("ndcg_eval_at", |c| Some(ParamValue::IntList(ints(&c.ndcg_at)))),
    // Objective specifics
    spec("label_gain", |c| Some(ParamValue::FloatList(c.label_gain.clone()))),
    spec("max_position", |c| Some(ParamValue::Int(c.max_position.into()))),
    spec("sigmoid", |c| Some(ParamValue::Float(c.sigmoid))),
];

/// Parameters consumed when building a dataset.
pub const DATASET_PARAMS: &[&str] = &["max_bin", "is_sparse", "data_random_seed", "categorical_feature"];

/// Parameters consumed when building a booster.
pub const BOOSTER_PARAMS: &[&str] = &[
    "objective",
    "num_class",
    "num_iterations",
    "learning_rate",
    "num_leaves",
    "max_depth",
    "tree_learner",
    "num_threads",
    "histogram_pool_size",
    "min_data_in_leaf",
    "min_sum_hessian_in_leaf",
    "lambda_l1",
    "lambda_l2",
    "min_gain_to_split",
    "feature_fraction",
    "feature_fraction_seed",
    "bagging_fraction",
    "bagging_freq",
    "bagging_seed",
    "early_stopping_round",
    "is_unbalance",
    "metric",
    "metric_freq",
    "is_training_metric",
    "ndcg_eval_at",
    "label_gain",
    "max_position",
    "sigmoid",
];

/// Look up a parameter in [`PARAM_TABLE`].
pub fn find_param(name: &str) -> Option<&'static ParamSpec> {
    PARAM_TABLE.iter().find(|p| p.name == name)
}

/// Serialize the named parameters of `config` into an engine parameter
/// string.
///
/// Names without an entry in [`PARAM_TABLE`] are skipped, as are unset
/// values and empty lists. Index-based parameters are shifted to 0-based.
pub fn serialize_params(config: &EstimatorConfig, names: &[&str]) -> String {
    let mut out = String::new();
    for name in names {
        let Some(spec) = find_param(name) else {
            continue;
        };
        let Some(value) = (spec.accessor)(config) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        let value = if spec.index_based { value.into_zero_based() } else { value };

        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(spec.name);
        out.push('=');
        out.push_str(&value.to_string());
    }
    out
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_param_is_declared() {
        for name in DATASET_PARAMS.iter().chain(BOOSTER_PARAMS) {
            assert!(find_param(name).is_some(), "{} missing from PARAM_TABLE", name);
        }
    }

    #[test]
    fn unknown_names_are_skipped() {
        let config = EstimatorConfig::default();
        let params = serialize_params(&config, &["bogus", "max_bin", "also_bogus"]);
        assert_eq!(params, "max_bin=255");
    }

    #[test]
    fn empty_and_unset_values_are_skipped() {
        let config = EstimatorConfig::default();
        let params =
            serialize_params(&config, &["metric", "num_threads", "num_class", "learning_rate"]);
        assert_eq!(params, "learning_rate=0.1");
    }

    #[test]
    fn lists_are_comma_joined() {
        let config = EstimatorConfig::lambdarank()
            .metric(vec!["ndcg".into(), "map".into()])
            .ndcg_at(vec![1, 3, 5])
            .label_gain(vec![0.0, 1.0, 3.5])
            .build()
            .unwrap();
        let params = serialize_params(&config, &["metric", "ndcg_eval_at", "label_gain"]);
        assert_eq!(params, "metric=ndcg,map ndcg_eval_at=1,3,5 label_gain=0,1,3.5");
    }

    #[test]
    fn index_params_are_shifted_to_zero_based() {
        let config = EstimatorConfig::builder()
            .categorical_feature(vec![1, 2, 10])
            .build()
            .unwrap();
        assert_eq!(
            serialize_params(&config, &["categorical_feature"]),
            "categorical_feature=0,1,9"
        );
    }

    #[test]
    fn order_follows_requested_names() {
        let config = EstimatorConfig::multiclass(3).num_threads(4).build().unwrap();
        let params = serialize_params(&config, &["num_threads", "num_class", "objective"]);
        assert_eq!(params, "num_threads=4 num_class=3 objective=multiclass");
    }

    #[test]
    fn no_leading_or_trailing_separator() {
        let config = EstimatorConfig::default();
        let params = serialize_params(&config, BOOSTER_PARAMS);
        assert!(!params.starts_with(' '));
        assert!(!params.ends_with(' '));
        assert!(params.starts_with("objective=regression num_iterations=10"));
        assert!(!params.contains("  "));
    }

    #[test]
    fn empty_name_list_gives_empty_string() {
        assert_eq!(serialize_params(&EstimatorConfig::default(), &[]), "");
    }
}

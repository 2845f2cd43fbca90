//! Fit entry point.
//!
//! [`fit`] wires a [`BoostingEngine`] up for one training run: it builds the
//! training dataset, creates the booster, attaches every validation set in
//! the order given and hands control to the [`TrainingLoop`].
//!
//! # Example
//!
//! ```
//! use boosters_fit::engine::native::StumpEngine;
//! use boosters_fit::{EstimatorConfig, TrainingState, ValidationSet, Verbosity, fit};
//! use ndarray::array;
//!
//! let x = array![[0.0f32], [1.0], [2.0], [3.0]];
//! let y = array![0.0f32, 0.0, 10.0, 10.0];
//! let x_val = array![[0.5f32], [2.5]];
//! let y_val = array![0.0f32, 10.0];
//!
//! let config = EstimatorConfig::regression()
//!     .num_iterations(20)
//!     .learning_rate(0.5)
//!     .min_data_in_leaf(1)
//!     .min_sum_hessian_in_leaf(0.0)
//!     .build()
//!     .unwrap();
//!
//! let mut engine = StumpEngine::new();
//! let outcome = fit(
//!     &mut engine,
//!     &config,
//!     x.view(),
//!     y.view(),
//!     &[ValidationSet::new(x_val.view(), y_val.view())],
//!     Verbosity::Silent,
//! )
//! .unwrap();
//!
//! assert_eq!(outcome.state, TrainingState::Exhausted);
//! assert_eq!(outcome.scores.get("test_1", "l2").unwrap().len(), 20);
//! ```

use ndarray::{ArrayView1, ArrayView2};

use crate::config::EstimatorConfig;
use crate::engine::{BoostingEngine, DatasetField, MatrixLayout};
use crate::error::FitResult;
use crate::params::{BOOSTER_PARAMS, DATASET_PARAMS, serialize_params};
use crate::training::{
    EarlyStopInfo, ScoreStore, TrainingLogger, TrainingLoop, TrainingState, Verbosity,
};

/// A validation (features, labels) pair.
#[derive(Debug, Clone, Copy)]
pub struct ValidationSet<'a> {
    pub features: ArrayView2<'a, f32>,
    pub labels: ArrayView1<'a, f32>,
}

impl<'a> ValidationSet<'a> {
    pub fn new(features: ArrayView2<'a, f32>, labels: ArrayView1<'a, f32>) -> Self {
        Self { features, labels }
    }
}

impl<'a> From<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> for ValidationSet<'a> {
    fn from((features, labels): (ArrayView2<'a, f32>, ArrayView1<'a, f32>)) -> Self {
        Self::new(features, labels)
    }
}

/// Result of a successful fit.
#[derive(Debug, Clone)]
pub struct FitOutcome<B> {
    /// The trained booster.
    pub booster: B,
    /// Recorded scores: dataset name, then metric name, then one value per
    /// evaluation round.
    pub scores: ScoreStore,
    /// How training ended.
    pub state: TrainingState,
    /// Boosting iterations that produced a model update.
    pub iterations: usize,
    /// Best iteration of the pair that triggered early stopping.
    pub best_iteration: Option<usize>,
    /// Details of the early stop, if any.
    pub early_stop: Option<EarlyStopInfo>,
}

/// Engine parameter string for the booster: the booster parameters of
/// `config` followed by `verbosity=<level>`.
pub fn booster_params(config: &EstimatorConfig, verbosity: Verbosity) -> String {
    let params = serialize_params(config, BOOSTER_PARAMS);
    if params.is_empty() {
        format!("verbosity={}", verbosity.level())
    } else {
        format!("{} verbosity={}", params, verbosity.level())
    }
}

/// Train a booster on `features`/`labels`.
///
/// Validation sets are attached in slice order; the `i`-th one is recorded
/// as `test_{i+1}` and is the only kind of dataset early stopping watches.
/// `verbosity` accepts a [`Verbosity`] or an integer level (negative is
/// fatal-only, 0 adds warnings, 1 adds info, above that adds debug).
///
/// # Errors
///
/// - [`ConfigError`](crate::ConfigError) for an invalid `config`, or a
///   validation set whose feature count or label length does not fit.
/// - [`EngineError`](crate::EngineError) for any engine failure.
///
/// Convergence and early stopping are successful outcomes, reported through
/// [`FitOutcome::state`].
pub fn fit<E: BoostingEngine>(
    engine: &mut E,
    config: &EstimatorConfig,
    features: ArrayView2<'_, f32>,
    labels: ArrayView1<'_, f32>,
    validation_sets: &[ValidationSet<'_>],
    verbosity: impl Into<Verbosity>,
) -> FitResult<FitOutcome<E::Booster>> {
    config.validate()?;
    let logger = TrainingLogger::new(verbosity.into());

    let dataset_params = serialize_params(config, DATASET_PARAMS);
    let mut train = engine.create_dataset(
        features,
        &dataset_params,
        None,
        MatrixLayout::of(&features),
    )?;
    engine.set_field(&mut train, DatasetField::Label, labels)?;

    let mut booster = engine.create_booster(&train, &booster_params(config, logger.verbosity()))?;

    for set in validation_sets {
        let mut valid = engine.create_dataset(
            set.features,
            &dataset_params,
            Some(&train),
            MatrixLayout::of(&set.features),
        )?;
        engine.set_field(&mut valid, DatasetField::Label, set.labels)?;
        engine.add_valid_data(&mut booster, &valid)?;
    }

    if config.early_stopping_enabled() && validation_sets.is_empty() {
        logger.warn("early_stopping_round is set but no validation set was given; early stopping is inactive");
    }

    let outcome =
        TrainingLoop::new(engine, &mut booster, config, validation_sets.len(), &logger).run()?;

    let best_iteration = outcome.best_iteration();
    Ok(FitOutcome {
        booster,
        scores: outcome.scores,
        state: outcome.state,
        iterations: outcome.iterations,
        best_iteration,
        early_stop: outcome.early_stop,
    })
}

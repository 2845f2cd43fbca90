//! boosters-fit: a training driver for gradient boosting engines.
//!
//! The engine does the boosting; this crate runs it. A fit call builds the
//! engine's datasets and booster from an [`EstimatorConfig`], steps the
//! booster one iteration at a time, records metric scores per evaluation
//! round and stops on engine convergence, early stopping or budget
//! exhaustion.
//!
//! # Key Types
//!
//! - [`EstimatorConfig`] - Hyperparameters, with builder presets and JSON I/O
//! - [`BoostingEngine`] - The engine interface the driver talks to
//! - [`fit`] / [`FitOutcome`] - One training run
//! - [`ScoreStore`] - Recorded scores per dataset and metric
//! - [`cv::cross_validate`] - K-fold cross-validation on top of [`fit`]
//!
//! # Engines
//!
//! [`engine::native::StumpEngine`] is a small in-process engine.
//! [`testing::ScriptedEngine`] replays scripted metric values and is meant
//! for tests.
//!
//! # Example
//!
//! ```
//! use boosters_fit::testing::ScriptedEngine;
//! use boosters_fit::{EstimatorConfig, TrainingState, ValidationSet, fit};
//! use ndarray::{Array1, Array2};
//!
//! // A maximized metric that peaks at iteration 3.
//! let mut engine = ScriptedEngine::new(&["auc"])
//!     .with_series(1, &[0.6, 0.7, 0.8, 0.75, 0.7, 0.65]);
//!
//! let config = EstimatorConfig::binary()
//!     .num_iterations(10)
//!     .early_stopping_round(3)
//!     .build()
//!     .unwrap();
//!
//! let x = Array2::<f32>::zeros((8, 3));
//! let y = Array1::<f32>::zeros(8);
//! let outcome = fit(
//!     &mut engine,
//!     &config,
//!     x.view(),
//!     y.view(),
//!     &[ValidationSet::new(x.view(), y.view())],
//!     -1,
//! )
//! .unwrap();
//!
//! assert_eq!(outcome.state, TrainingState::EarlyStopped);
//! assert_eq!(outcome.best_iteration, Some(3));
//! assert_eq!(outcome.scores.get("test_1", "auc").unwrap(), &[0.6, 0.7, 0.8]);
//! ```

// Re-export approx traits for users comparing recorded scores
pub use approx;

pub mod config;
pub mod cv;
pub mod engine;
pub mod error;
pub mod fit;
pub mod params;
pub mod testing;
pub mod training;

// =============================================================================
// Convenience Re-exports
// =============================================================================

// Configuration
pub use config::{EstimatorConfig, Objective};

// Errors
pub use error::{ConfigError, EngineError, FitError, FitResult};

// Entry points
pub use cv::{CvOutcome, cross_validate};
pub use fit::{FitOutcome, ValidationSet, fit};

// Engine interface
pub use engine::{BoostingEngine, DatasetField, MatrixLayout};

// Training driver
pub use training::{ScoreStore, TrainingState, Verbosity};

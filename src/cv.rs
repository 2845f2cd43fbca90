//! K-fold cross-validation.
//!
//! [`cross_validate`] shuffles the rows once, cuts them into `n_folds`
//! contiguous folds and runs one [`fit`] per fold with the held-out fold
//! attached as the only validation set (`test_1`). Early stopping, when
//! configured, therefore watches the held-out fold.

use std::collections::BTreeMap;

use ndarray::{ArrayView1, ArrayView2, Axis};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::config::EstimatorConfig;
use crate::engine::BoostingEngine;
use crate::error::{ConfigError, FitResult};
use crate::fit::{FitOutcome, ValidationSet, fit};
use crate::training::{TrainingLogger, Verbosity, validation_name};

// =============================================================================
// Fold assignment
// =============================================================================

/// Row indices of one fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldSplit {
    pub fold: usize,
    pub train_rows: Vec<usize>,
    pub test_rows: Vec<usize>,
}

/// Shuffled K-fold splitter.
///
/// The first `n_rows % n_folds` folds get one extra row.
///
/// ```
/// use boosters_fit::cv::KFold;
///
/// let splits = KFold::new(3, 42).split(10).unwrap();
/// let sizes: Vec<usize> = splits.iter().map(|s| s.test_rows.len()).collect();
/// assert_eq!(sizes, [4, 3, 3]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KFold {
    n_folds: usize,
    seed: u64,
}

impl KFold {
    pub fn new(n_folds: usize, seed: u64) -> Self {
        Self { n_folds, seed }
    }

    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    /// Split `n_rows` rows.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidFolds`] unless `2 <= n_folds <= n_rows`.
    pub fn split(&self, n_rows: usize) -> Result<Vec<FoldSplit>, ConfigError> {
        if self.n_folds < 2 || self.n_folds > n_rows {
            return Err(ConfigError::InvalidFolds {
                n_folds: self.n_folds,
                n_rows,
            });
        }

        let mut rows: Vec<usize> = (0..n_rows).collect();
        rows.shuffle(&mut Xoshiro256PlusPlus::seed_from_u64(self.seed));

        let base = n_rows / self.n_folds;
        let remainder = n_rows % self.n_folds;

        let mut splits = Vec::with_capacity(self.n_folds);
        let mut start = 0;
        for fold in 0..self.n_folds {
            let size = base + usize::from(fold < remainder);
            let end = start + size;
            let test_rows = rows[start..end].to_vec();
            let train_rows = rows[..start].iter().chain(&rows[end..]).copied().collect();
            splits.push(FoldSplit {
                fold,
                train_rows,
                test_rows,
            });
            start = end;
        }
        Ok(splits)
    }
}

// =============================================================================
// Cross-validation
// =============================================================================

/// Final held-out scores of one metric across folds.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSummary {
    /// Last recorded held-out score per fold, NaN for folds that recorded
    /// nothing.
    pub fold_scores: Vec<f64>,
    /// Mean over the folds with a recorded score, NaN if there are none.
    pub mean: f64,
}

impl MetricSummary {
    fn from_scores(fold_scores: Vec<f64>) -> Self {
        let recorded: Vec<f64> = fold_scores.iter().copied().filter(|v| !v.is_nan()).collect();
        let mean = if recorded.is_empty() {
            f64::NAN
        } else {
            recorded.iter().sum::<f64>() / recorded.len() as f64
        };
        Self { fold_scores, mean }
    }
}

/// One fold: its split and its fit outcome.
#[derive(Debug, Clone)]
pub struct CvFold<B> {
    pub split: FoldSplit,
    pub outcome: FitOutcome<B>,
}

/// Result of [`cross_validate`].
#[derive(Debug, Clone)]
pub struct CvOutcome<B> {
    pub folds: Vec<CvFold<B>>,
    /// Held-out score summary, keyed by metric name.
    pub summary: BTreeMap<String, MetricSummary>,
}

/// Run shuffled K-fold cross-validation.
///
/// Every fold gets a fresh booster from `engine`. Row order within the
/// training and held-out parts follows the shuffled order.
///
/// # Errors
///
/// - [`ConfigError::InvalidFolds`] unless `2 <= n_folds <= n_rows`.
/// - [`ConfigError::LabelLenMismatch`] if `labels` does not match `features`.
/// - Anything [`fit`] returns for a fold.
pub fn cross_validate<E: BoostingEngine>(
    engine: &mut E,
    config: &EstimatorConfig,
    features: ArrayView2<'_, f32>,
    labels: ArrayView1<'_, f32>,
    n_folds: usize,
    seed: u64,
    verbosity: impl Into<Verbosity>,
) -> FitResult<CvOutcome<E::Booster>> {
    let n_rows = features.nrows();
    if labels.len() != n_rows {
        return Err(ConfigError::LabelLenMismatch {
            rows: n_rows,
            labels: labels.len(),
        }
        .into());
    }
    config.validate()?;

    let verbosity = verbosity.into();
    let logger = TrainingLogger::new(verbosity);
    let held_out = validation_name(1);

    let mut folds = Vec::with_capacity(n_folds);
    let mut per_metric: BTreeMap<String, Vec<f64>> = BTreeMap::new();

    let splits = KFold::new(n_folds, seed).split(n_rows)?;
    for split in splits {
        let x_train = features.select(Axis(0), &split.train_rows);
        let y_train = labels.select(Axis(0), &split.train_rows);
        let x_test = features.select(Axis(0), &split.test_rows);
        let y_test = labels.select(Axis(0), &split.test_rows);

        let outcome = fit(
            engine,
            config,
            x_train.view(),
            y_train.view(),
            &[ValidationSet::new(x_test.view(), y_test.view())],
            verbosity,
        )?;

        for (metric, values) in outcome.scores.metrics(&held_out) {
            let last = values.last().copied().unwrap_or(f64::NAN);
            per_metric
                .entry(metric.to_string())
                .or_insert_with(|| vec![f64::NAN; split.fold])
                .push(last);
        }
        logger.info(&format!(
            "Fold {}/{}: {} after {} iterations",
            split.fold + 1,
            n_folds,
            outcome.state,
            outcome.iterations
        ));

        folds.push(CvFold { split, outcome });
    }

    let summary = per_metric
        .into_iter()
        .map(|(metric, mut scores)| {
            scores.resize(n_folds, f64::NAN);
            (metric, MetricSummary::from_scores(scores))
        })
        .collect();

    Ok(CvOutcome { folds, summary })
}

//! Testing utilities for boosters-fit.
//!
//! Provides [`ScriptedEngine`], a deterministic [`BoostingEngine`] that
//! replays scripted metric values, plus float assertion helpers. Usable from
//! unit tests, integration tests and benchmarks.
//!
//! ```
//! use boosters_fit::testing::ScriptedEngine;
//!
//! // One metric; the first validation set (slot 1) improves then degrades.
//! let engine = ScriptedEngine::new(&["auc"])
//!     .with_series(1, &[0.6, 0.7, 0.65, 0.64])
//!     .converge_at(5);
//! ```

use std::cell::Cell;
use std::collections::BTreeMap;

use approx::AbsDiffEq;
use ndarray::{ArrayView1, ArrayView2};

use crate::engine::{BoostingEngine, DatasetField, MatrixLayout};
use crate::error::{ConfigError, EngineError, FitResult};

// =============================================================================
// Constants
// =============================================================================

/// Default tolerance for score comparisons.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

// =============================================================================
// Floating Point Assertions
// =============================================================================

/// Assert that two score sequences are approximately equal element-wise.
///
/// NaN matches NaN, so unwritten score slots can be compared too.
///
/// # Panics
///
/// Panics if lengths differ or any element differs by more than tolerance.
pub fn assert_scores_approx_eq(actual: &[f64], expected: &[f64], tolerance: f64, context: &str) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "{context}: length mismatch - got {}, expected {}",
        actual.len(),
        expected.len()
    );

    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        if a.is_nan() && e.is_nan() {
            continue;
        }
        assert!(
            a.abs_diff_eq(e, tolerance),
            "{context}[{i}]: {a} ≠ {e} (diff={}, tolerance={tolerance})",
            (a - e).abs()
        );
    }
}

// =============================================================================
// ScriptedEngine
// =============================================================================

/// Dataset handle of the [`ScriptedEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedDataset {
    pub n_rows: usize,
    pub n_features: usize,
    pub layout: MatrixLayout,
    pub has_reference: bool,
    pub fields: BTreeMap<&'static str, Vec<f32>>,
}

/// Booster handle of the [`ScriptedEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedBooster {
    iteration: usize,
    n_valid: usize,
    params: String,
}

impl ScriptedBooster {
    /// Completed (non-converged) iterations.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn set_iteration(&mut self, iteration: usize) {
        self.iteration = iteration;
    }

    pub fn n_valid(&self) -> usize {
        self.n_valid
    }

    pub fn params(&self) -> &str {
        &self.params
    }
}

/// Deterministic engine replaying scripted metric values.
///
/// Each dataset slot gets one row of metric values per iteration. After `k`
/// completed iterations, [`eval`](BoostingEngine::eval) on a slot returns row
/// `k - 1` (row 0 before the first iteration, the last row once the script
/// runs out).
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    metric_names: Vec<String>,
    scripts: BTreeMap<usize, Vec<Vec<f64>>>,
    converge_at: Option<usize>,
    fail_update_at: Option<usize>,
    updates: usize,
    eval_calls: Cell<usize>,
    dataset_params: Vec<String>,
    booster_params: Vec<String>,
}

impl ScriptedEngine {
    /// Engine reporting `metric_names`, with no scripts yet.
    pub fn new(metric_names: &[&str]) -> Self {
        Self {
            metric_names: metric_names.iter().map(|m| m.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Script a slot: one row of metric values per iteration.
    pub fn with_slot(mut self, slot: usize, rows: Vec<Vec<f64>>) -> Self {
        self.scripts.insert(slot, rows);
        self
    }

    /// Script a slot of a single-metric engine.
    pub fn with_series(self, slot: usize, values: &[f64]) -> Self {
        self.with_slot(slot, values.iter().map(|&v| vec![v]).collect())
    }

    /// Report "no further splits" on the `iteration`-th update.
    pub fn converge_at(mut self, iteration: usize) -> Self {
        self.converge_at = Some(iteration);
        self
    }

    /// Fail the `iteration`-th update with an engine error.
    pub fn fail_update_at(mut self, iteration: usize) -> Self {
        self.fail_update_at = Some(iteration);
        self
    }

    /// Booster with `n_valid` validation slots, bypassing dataset setup.
    pub fn scripted_booster(&self, n_valid: usize) -> ScriptedBooster {
        ScriptedBooster {
            iteration: 0,
            n_valid,
            params: String::new(),
        }
    }

    /// Calls to `update_one_iter`, including the converging one.
    pub fn updates(&self) -> usize {
        self.updates
    }

    /// Calls to `eval`.
    pub fn eval_calls(&self) -> usize {
        self.eval_calls.get()
    }

    /// Parameter strings passed to `create_dataset`, in call order.
    pub fn dataset_params(&self) -> &[String] {
        &self.dataset_params
    }

    /// Parameter strings passed to `create_booster`, in call order.
    pub fn booster_params(&self) -> &[String] {
        &self.booster_params
    }
}

impl BoostingEngine for ScriptedEngine {
    type Dataset = ScriptedDataset;
    type Booster = ScriptedBooster;

    fn create_dataset(
        &mut self,
        features: ArrayView2<'_, f32>,
        params: &str,
        reference: Option<&Self::Dataset>,
        layout: MatrixLayout,
    ) -> FitResult<Self::Dataset> {
        let (n_rows, n_features) = features.dim();
        if n_rows == 0 || n_features == 0 {
            return Err(ConfigError::EmptyDataset { rows: n_rows, features: n_features }.into());
        }
        if let Some(reference) = reference
            && reference.n_features != n_features
        {
            return Err(ConfigError::FeatureMismatch {
                expected: reference.n_features,
                got: n_features,
            }
            .into());
        }

        self.dataset_params.push(params.to_string());
        Ok(ScriptedDataset {
            n_rows,
            n_features,
            layout,
            has_reference: reference.is_some(),
            fields: BTreeMap::new(),
        })
    }

    fn set_field(
        &mut self,
        dataset: &mut Self::Dataset,
        field: DatasetField,
        values: ArrayView1<'_, f32>,
    ) -> FitResult<()> {
        if values.len() != dataset.n_rows {
            return Err(ConfigError::LabelLenMismatch {
                rows: dataset.n_rows,
                labels: values.len(),
            }
            .into());
        }
        dataset.fields.insert(field.name(), values.to_vec());
        Ok(())
    }

    fn create_booster(&mut self, train: &Self::Dataset, params: &str) -> FitResult<Self::Booster> {
        if !train.fields.contains_key(DatasetField::Label.name()) {
            return Err(EngineError::new("create_booster", "training dataset has no label").into());
        }
        self.booster_params.push(params.to_string());
        Ok(ScriptedBooster {
            iteration: 0,
            n_valid: 0,
            params: params.to_string(),
        })
    }

    fn add_valid_data(
        &mut self,
        booster: &mut Self::Booster,
        dataset: &Self::Dataset,
    ) -> FitResult<()> {
        if !dataset.fields.contains_key(DatasetField::Label.name()) {
            return Err(EngineError::new("add_valid_data", "validation dataset has no label").into());
        }
        booster.n_valid += 1;
        Ok(())
    }

    fn update_one_iter(&mut self, booster: &mut Self::Booster) -> FitResult<bool> {
        let next = booster.iteration + 1;
        self.updates += 1;

        if self.fail_update_at == Some(next) {
            return Err(EngineError::new("update_one_iter", format!("scripted failure at {}", next)).into());
        }
        if self.converge_at == Some(next) {
            return Ok(true);
        }
        booster.iteration = next;
        Ok(false)
    }

    fn eval_names(&self, _booster: &Self::Booster) -> FitResult<Vec<String>> {
        Ok(self.metric_names.clone())
    }

    fn eval(&self, booster: &Self::Booster, slot: usize) -> FitResult<Vec<f64>> {
        self.eval_calls.set(self.eval_calls.get() + 1);

        if slot > booster.n_valid {
            return Err(EngineError::new(
                "eval",
                format!("slot {} out of range, booster has {} validation sets", slot, booster.n_valid),
            )
            .into());
        }
        let rows = self
            .scripts
            .get(&slot)
            .filter(|rows| !rows.is_empty())
            .ok_or_else(|| EngineError::new("eval", format!("no script for slot {}", slot)))?;

        let row = booster.iteration.saturating_sub(1).min(rows.len() - 1);
        Ok(rows[row].clone())
    }
}

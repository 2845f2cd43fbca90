//! Boosting engine interface.
//!
//! The training driver never builds trees itself. It talks to a
//! [`BoostingEngine`], which owns datasets and the booster and exposes one
//! boosting iteration at a time plus metric readouts per dataset slot.
//!
//! Dataset slots follow attachment order: slot 0 is the training dataset,
//! slot `i` is the `i`-th validation dataset passed to
//! [`BoostingEngine::add_valid_data`].
//!
//! [`native::StumpEngine`] is a small in-process engine; tests use
//! [`crate::testing::ScriptedEngine`].

pub mod native;

use ndarray::{ArrayView1, ArrayView2};

use crate::error::FitResult;

/// Memory order of a feature matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixLayout {
    /// Rows are contiguous.
    RowMajor,
    /// Columns are contiguous.
    ColMajor,
}

impl MatrixLayout {
    /// Layout of an ndarray view. Non-contiguous views are reported as
    /// column-major since engines copy them anyway.
    pub fn of(features: &ArrayView2<'_, f32>) -> Self {
        if features.is_standard_layout() {
            Self::RowMajor
        } else {
            Self::ColMajor
        }
    }
}

/// Per-row dataset fields an engine accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetField {
    Label,
    Weight,
    InitScore,
}

impl DatasetField {
    /// Engine name of the field.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::Weight => "weight",
            Self::InitScore => "init_score",
        }
    }
}

impl std::fmt::Display for DatasetField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A gradient boosting engine driven one iteration at a time.
///
/// Handles are owned by the caller of the engine methods. A booster is used
/// by exactly one fit call, so all mutation goes through `&mut`.
pub trait BoostingEngine {
    /// Built dataset (binned features plus fields).
    type Dataset;
    /// Model in training.
    type Booster;

    /// Build a dataset from a feature matrix.
    ///
    /// With a `reference`, the new dataset shares the reference's binning
    /// and feature schema. A feature count mismatch is a
    /// [`ConfigError::FeatureMismatch`](crate::error::ConfigError::FeatureMismatch).
    fn create_dataset(
        &mut self,
        features: ArrayView2<'_, f32>,
        params: &str,
        reference: Option<&Self::Dataset>,
        layout: MatrixLayout,
    ) -> FitResult<Self::Dataset>;

    /// Attach a per-row field (labels, weights, initial scores).
    fn set_field(
        &mut self,
        dataset: &mut Self::Dataset,
        field: DatasetField,
        values: ArrayView1<'_, f32>,
    ) -> FitResult<()>;

    /// Create a booster bound to the training dataset.
    fn create_booster(&mut self, train: &Self::Dataset, params: &str) -> FitResult<Self::Booster>;

    /// Register a validation dataset. It takes the next free slot.
    fn add_valid_data(&mut self, booster: &mut Self::Booster, dataset: &Self::Dataset)
    -> FitResult<()>;

    /// Run one boosting iteration.
    ///
    /// Returns `true` when no further splits are possible; in that case the
    /// iteration added nothing to the model.
    fn update_one_iter(&mut self, booster: &mut Self::Booster) -> FitResult<bool>;

    /// Names of the metrics the booster reports, in report order.
    fn eval_names(&self, booster: &Self::Booster) -> FitResult<Vec<String>>;

    /// Current metric values for a dataset slot, aligned with
    /// [`eval_names`](Self::eval_names).
    fn eval(&self, booster: &Self::Booster, slot: usize) -> FitResult<Vec<f64>>;
}

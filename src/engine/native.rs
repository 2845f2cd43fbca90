//! In-process reference engine.
//!
//! [`StumpEngine`] boosts depth-1 trees (stumps) under squared loss on
//! quantile-binned features. It is small enough to reason about in tests yet
//! behaves like a real engine: it bins once per training dataset, shares the
//! bin boundaries with validation datasets, keeps running predictions for
//! every attached slot and reports convergence when no split is admissible.
//!
//! Supported parameters (everything else in the parameter string is
//! accepted and ignored):
//!
//! | Scope   | Parameter                 | Default |
//! |---------|---------------------------|---------|
//! | dataset | `max_bin`                 | 255     |
//! | booster | `objective`               | `regression` |
//! | booster | `learning_rate`           | 0.1     |
//! | booster | `min_data_in_leaf`        | 20      |
//! | booster | `min_sum_hessian_in_leaf` | 1e-3    |
//! | booster | `lambda_l1`               | 0       |
//! | booster | `lambda_l2`               | 0       |
//! | booster | `min_gain_to_split`       | 0       |
//! | booster | `metric`                  | `l2`    |
//!
//! Categorical columns are binned like numerical ones. Missing values fall
//! into the first bin.

use std::collections::BTreeMap;
use std::str::FromStr;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use super::{BoostingEngine, DatasetField, MatrixLayout};
use crate::error::{ConfigError, EngineError, FitResult};

// =============================================================================
// Parameter parsing
// =============================================================================

/// Parsed `key=value` parameter string.
#[derive(Debug, Clone, Default)]
struct ParamMap<'a> {
    entries: BTreeMap<&'a str, &'a str>,
}

impl<'a> ParamMap<'a> {
    fn parse(operation: &'static str, params: &'a str) -> FitResult<Self> {
        let mut entries = BTreeMap::new();
        for token in params.split_whitespace() {
            let (key, value) = token.split_once('=').ok_or_else(|| {
                EngineError::new(operation, format!("malformed parameter `{}`", token))
            })?;
            entries.insert(key, value);
        }
        Ok(Self { entries })
    }

    fn get_or<T: FromStr>(&self, operation: &'static str, key: &str, default: T) -> FitResult<T> {
        match self.entries.get(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| {
                EngineError::new(operation, format!("invalid value `{}` for `{}`", raw, key)).into()
            }),
        }
    }

    fn get(&self, key: &str) -> Option<&'a str> {
        self.entries.get(key).copied()
    }
}

// =============================================================================
// Binning
// =============================================================================

/// Upper bin boundaries of one feature. The last boundary is `+inf`.
#[derive(Debug, Clone, PartialEq)]
pub struct BinMapper {
    upper_bounds: Vec<f64>,
}

impl BinMapper {
    /// Quantile boundaries over the non-missing values of a column, at most
    /// `max_bin` bins.
    pub fn from_column(column: ArrayView1<'_, f32>, max_bin: usize) -> Self {
        let mut values: Vec<f64> = column
            .iter()
            .filter(|v| !v.is_nan())
            .map(|&v| v as f64)
            .collect();
        values.sort_by(f64::total_cmp);

        let mut distinct = values.clone();
        distinct.dedup();

        let max_bin = max_bin.max(1);
        let mut upper_bounds: Vec<f64> = if distinct.len() <= max_bin {
            distinct.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect()
        } else {
            let n = values.len();
            (1..max_bin).map(|k| values[k * n / max_bin]).collect()
        };
        upper_bounds.dedup();
        upper_bounds.push(f64::INFINITY);

        Self { upper_bounds }
    }

    pub fn n_bins(&self) -> usize {
        self.upper_bounds.len()
    }

    /// Bin of a raw feature value.
    #[inline]
    pub fn value_to_bin(&self, value: f32) -> u32 {
        if value.is_nan() {
            return 0;
        }
        self.upper_bounds.partition_point(|&bound| bound < value as f64) as u32
    }
}

fn bin_matrix(features: ArrayView2<'_, f32>, mappers: &[BinMapper]) -> Array2<u32> {
    let mut bins = Array2::zeros(features.dim());
    for (j, mapper) in mappers.iter().enumerate() {
        for (dst, &value) in bins.column_mut(j).iter_mut().zip(features.column(j)) {
            *dst = mapper.value_to_bin(value);
        }
    }
    bins
}

// =============================================================================
// Metrics
// =============================================================================

/// Metric reported by the stump engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StumpMetric {
    L2,
    L1,
    Rmse,
}

impl StumpMetric {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "l2" | "mse" | "mean_squared_error" | "regression" | "regression_l2" => Some(Self::L2),
            "l1" | "mae" | "mean_absolute_error" | "regression_l1" => Some(Self::L1),
            "rmse" | "root_mean_squared_error" | "l2_root" => Some(Self::Rmse),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::L2 => "l2",
            Self::L1 => "l1",
            Self::Rmse => "rmse",
        }
    }

    /// Weighted metric of `predictions` against `labels`.
    fn compute(&self, slot: &SlotState) -> f64 {
        let mut loss = 0.0;
        let mut total_weight = 0.0;
        for (i, (&pred, &label)) in slot.predictions.iter().zip(&slot.labels).enumerate() {
            let w = slot.weight(i);
            let diff = pred - label;
            loss += w * match self {
                Self::L1 => diff.abs(),
                Self::L2 | Self::Rmse => diff * diff,
            };
            total_weight += w;
        }
        let mean = if total_weight > 0.0 { loss / total_weight } else { 0.0 };
        match self {
            Self::Rmse => mean.sqrt(),
            Self::L1 | Self::L2 => mean,
        }
    }
}

// =============================================================================
// Dataset
// =============================================================================

/// Binned dataset of the [`StumpEngine`].
#[derive(Debug, Clone)]
pub struct StumpDataset {
    bins: Array2<u32>,
    mappers: Vec<BinMapper>,
    layout: MatrixLayout,
    labels: Option<Array1<f64>>,
    weights: Option<Array1<f64>>,
    init_score: Option<Array1<f64>>,
}

impl StumpDataset {
    pub fn n_rows(&self) -> usize {
        self.bins.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.bins.ncols()
    }

    /// Layout of the matrix the dataset was built from.
    pub fn layout(&self) -> MatrixLayout {
        self.layout
    }

    pub fn mappers(&self) -> &[BinMapper] {
        &self.mappers
    }
}

// =============================================================================
// Booster
// =============================================================================

/// Split constraints and regularization of the booster.
#[derive(Debug, Clone, PartialEq)]
struct StumpParams {
    learning_rate: f64,
    min_data_in_leaf: usize,
    min_sum_hessian_in_leaf: f64,
    lambda_l1: f64,
    lambda_l2: f64,
    min_gain_to_split: f64,
}

impl StumpParams {
    fn from_map(map: &ParamMap<'_>) -> FitResult<Self> {
        const OP: &str = "create_booster";
        Ok(Self {
            learning_rate: map.get_or(OP, "learning_rate", 0.1)?,
            min_data_in_leaf: map.get_or(OP, "min_data_in_leaf", 20)?,
            min_sum_hessian_in_leaf: map.get_or(OP, "min_sum_hessian_in_leaf", 1e-3)?,
            lambda_l1: map.get_or(OP, "lambda_l1", 0.0)?,
            lambda_l2: map.get_or(OP, "lambda_l2", 0.0)?,
            min_gain_to_split: map.get_or(OP, "min_gain_to_split", 0.0)?,
        })
    }

    /// Gain of splitting a node into (left, right).
    ///
    /// ```text
    /// gain = G_L²/(H_L + λ) + G_R²/(H_R + λ) - G_P²/(H_P + λ)
    /// ```
    #[inline]
    fn split_gain(&self, left: &BinStats, right: &BinStats) -> f64 {
        let parent = BinStats {
            grad: left.grad + right.grad,
            hess: left.hess + right.hess,
            count: left.count + right.count,
        };
        self.leaf_score(left) + self.leaf_score(right) - self.leaf_score(&parent)
    }

    #[inline]
    fn leaf_score(&self, stats: &BinStats) -> f64 {
        let g = self.threshold_l1(stats.grad);
        g * g / (stats.hess + self.lambda_l2)
    }

    #[inline]
    fn is_valid_child(&self, stats: &BinStats) -> bool {
        stats.count >= self.min_data_in_leaf && stats.hess >= self.min_sum_hessian_in_leaf
    }

    /// Shrunk leaf output with L1 soft thresholding.
    #[inline]
    fn leaf_value(&self, stats: &BinStats) -> f64 {
        -self.threshold_l1(stats.grad) / (stats.hess + self.lambda_l2) * self.learning_rate
    }

    #[inline]
    fn threshold_l1(&self, grad: f64) -> f64 {
        grad.signum() * (grad.abs() - self.lambda_l1).max(0.0)
    }
}

/// Gradient statistics of one histogram bin.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct BinStats {
    grad: f64,
    hess: f64,
    count: usize,
}

impl std::ops::AddAssign for BinStats {
    fn add_assign(&mut self, other: Self) {
        self.grad += other.grad;
        self.hess += other.hess;
        self.count += other.count;
    }
}

impl std::ops::Sub for BinStats {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            grad: self.grad - other.grad,
            hess: self.hess - other.hess,
            count: self.count - other.count,
        }
    }
}

/// A depth-1 tree: rows with `bin <= threshold` go left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stump {
    pub feature: usize,
    pub threshold: u32,
    pub left_value: f64,
    pub right_value: f64,
    pub gain: f64,
}

impl Stump {
    #[inline]
    fn predict_bin(&self, bin: u32) -> f64 {
        if bin <= self.threshold {
            self.left_value
        } else {
            self.right_value
        }
    }
}

/// Rows, labels and running predictions of one dataset slot.
#[derive(Debug, Clone)]
struct SlotState {
    bins: Array2<u32>,
    labels: Array1<f64>,
    weights: Option<Array1<f64>>,
    predictions: Array1<f64>,
}

impl SlotState {
    fn new(dataset: &StumpDataset, base_score: f64, operation: &'static str) -> FitResult<Self> {
        let labels = dataset
            .labels
            .clone()
            .ok_or_else(|| EngineError::new(operation, "dataset has no label"))?;
        let predictions = match &dataset.init_score {
            Some(init) => init.clone(),
            None => Array1::from_elem(dataset.n_rows(), base_score),
        };
        Ok(Self {
            bins: dataset.bins.clone(),
            labels,
            weights: dataset.weights.clone(),
            predictions,
        })
    }

    #[inline]
    fn weight(&self, row: usize) -> f64 {
        self.weights.as_ref().map_or(1.0, |w| w[row])
    }

    fn apply(&mut self, stump: &Stump) {
        let column = self.bins.column(stump.feature);
        for (pred, &bin) in self.predictions.iter_mut().zip(column) {
            *pred += stump.predict_bin(bin);
        }
    }
}

/// Model in training on the [`StumpEngine`].
#[derive(Debug, Clone)]
pub struct StumpBooster {
    params: StumpParams,
    metrics: Vec<StumpMetric>,
    mappers: Vec<BinMapper>,
    base_score: f64,
    stumps: Vec<Stump>,
    train: SlotState,
    valid: Vec<SlotState>,
}

impl StumpBooster {
    /// Fitted stumps, in boosting order.
    pub fn stumps(&self) -> &[Stump] {
        &self.stumps
    }

    /// Constant the model starts from: the weighted label mean.
    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    /// Predict raw features with the current model.
    pub fn predict(&self, features: ArrayView2<'_, f32>) -> FitResult<Array1<f64>> {
        if features.ncols() != self.mappers.len() {
            return Err(ConfigError::FeatureMismatch {
                expected: self.mappers.len(),
                got: features.ncols(),
            }
            .into());
        }
        let bins = bin_matrix(features, &self.mappers);
        let mut out = Array1::from_elem(features.nrows(), self.base_score);
        for stump in &self.stumps {
            for (pred, &bin) in out.iter_mut().zip(bins.column(stump.feature)) {
                *pred += stump.predict_bin(bin);
            }
        }
        Ok(out)
    }

    /// Best admissible stump for the current gradients, if any.
    fn find_split(&self) -> Option<Stump> {
        let train = &self.train;
        let n_rows = train.labels.len();
        let mut grads = Vec::with_capacity(n_rows);
        for i in 0..n_rows {
            let w = train.weight(i);
            grads.push((w * (train.predictions[i] - train.labels[i]), w));
        }

        let mut best: Option<Stump> = None;
        for (feature, mapper) in self.mappers.iter().enumerate() {
            let mut hist = vec![BinStats::default(); mapper.n_bins()];
            for (&bin, &(grad, hess)) in train.bins.column(feature).iter().zip(&grads) {
                hist[bin as usize] += BinStats { grad, hess, count: 1 };
            }
            let mut total = BinStats::default();
            hist.iter().for_each(|&s| total += s);

            let mut left = BinStats::default();
            for (threshold, &stats) in hist.iter().enumerate().take(hist.len().saturating_sub(1)) {
                left += stats;
                let right = total - left;
                if !self.params.is_valid_child(&left) || !self.params.is_valid_child(&right) {
                    continue;
                }
                let gain = self.params.split_gain(&left, &right);
                if gain <= self.params.min_gain_to_split || gain <= 0.0 {
                    continue;
                }
                if best.is_none_or(|b| gain > b.gain) {
                    best = Some(Stump {
                        feature,
                        threshold: threshold as u32,
                        left_value: self.params.leaf_value(&left),
                        right_value: self.params.leaf_value(&right),
                        gain,
                    });
                }
            }
        }
        best
    }

    fn slot(&self, slot: usize) -> Option<&SlotState> {
        match slot {
            0 => Some(&self.train),
            i => self.valid.get(i - 1),
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// In-process squared-error stump booster.
#[derive(Debug, Clone, Copy, Default)]
pub struct StumpEngine;

impl StumpEngine {
    pub fn new() -> Self {
        Self
    }
}

impl BoostingEngine for StumpEngine {
    type Dataset = StumpDataset;
    type Booster = StumpBooster;

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

        let mappers = match reference {
            Some(reference) => {
                if reference.n_features() != n_features {
                    return Err(ConfigError::FeatureMismatch {
                        expected: reference.n_features(),
                        got: n_features,
                    }
                    .into());
                }
                reference.mappers.clone()
            }
            None => {
                let map = ParamMap::parse("create_dataset", params)?;
                let max_bin: usize = map.get_or("create_dataset", "max_bin", 255)?;
                features
                    .axis_iter(Axis(1))
                    .map(|column| BinMapper::from_column(column, max_bin))
                    .collect()
            }
        };

        Ok(StumpDataset {
            bins: bin_matrix(features, &mappers),
            mappers,
            layout,
            labels: None,
            weights: None,
            init_score: None,
        })
    }

    fn set_field(
        &mut self,
        dataset: &mut Self::Dataset,
        field: DatasetField,
        values: ArrayView1<'_, f32>,
    ) -> FitResult<()> {
        if values.len() != dataset.n_rows() {
            return Err(ConfigError::LabelLenMismatch {
                rows: dataset.n_rows(),
                labels: values.len(),
            }
            .into());
        }
        let values = values.mapv(f64::from);
        match field {
            DatasetField::Label => dataset.labels = Some(values),
            DatasetField::Weight => dataset.weights = Some(values),
            DatasetField::InitScore => dataset.init_score = Some(values),
        }
        Ok(())
    }

    fn create_booster(&mut self, train: &Self::Dataset, params: &str) -> FitResult<Self::Booster> {
        const OP: &str = "create_booster";
        let map = ParamMap::parse(OP, params)?;

        let objective = map.get("objective").unwrap_or("regression");
        if !matches!(objective, "regression" | "regression_l2" | "l2" | "mse") {
            return Err(EngineError::new(OP, format!("unsupported objective `{}`", objective)).into());
        }

        let metrics = match map.get("metric").filter(|m| !m.is_empty()) {
            None => vec![StumpMetric::L2],
            Some(list) => list
                .split(',')
                .map(|name| {
                    StumpMetric::parse(name)
                        .ok_or_else(|| EngineError::new(OP, format!("unsupported metric `{}`", name)))
                })
                .collect::<Result<Vec<_>, _>>()?,
        };

        let labels = train
            .labels
            .as_ref()
            .ok_or_else(|| EngineError::new(OP, "training dataset has no label"))?;
        let (weighted_sum, total_weight) = labels.iter().enumerate().fold((0.0, 0.0), |(s, t), (i, &y)| {
            let w = train.weights.as_ref().map_or(1.0, |w| w[i]);
            (s + w * y, t + w)
        });
        let base_score = if total_weight > 0.0 { weighted_sum / total_weight } else { 0.0 };

        let booster = StumpBooster {
            params: StumpParams::from_map(&map)?,
            metrics,
            mappers: train.mappers.clone(),
            base_score,
            stumps: Vec::new(),
            train: SlotState::new(train, base_score, OP)?,
            valid: Vec::new(),
        };
        tracing::debug!(
            base_score,
            n_rows = train.n_rows(),
            n_features = train.n_features(),
            "created stump booster"
        );
        Ok(booster)
    }

    fn add_valid_data(
        &mut self,
        booster: &mut Self::Booster,
        dataset: &Self::Dataset,
    ) -> FitResult<()> {
        if dataset.mappers != booster.mappers {
            return Err(EngineError::new(
                "add_valid_data",
                "validation dataset was not built against the training dataset",
            )
            .into());
        }
        let mut slot = SlotState::new(dataset, booster.base_score, "add_valid_data")?;
        for stump in &booster.stumps {
            slot.apply(stump);
        }
        booster.valid.push(slot);
        Ok(())
    }

    fn update_one_iter(&mut self, booster: &mut Self::Booster) -> FitResult<bool> {
        let Some(stump) = booster.find_split() else {
            return Ok(true);
        };
        booster.train.apply(&stump);
        for slot in &mut booster.valid {
            slot.apply(&stump);
        }
        booster.stumps.push(stump);
        Ok(false)
    }

    fn eval_names(&self, booster: &Self::Booster) -> FitResult<Vec<String>> {
        Ok(booster.metrics.iter().map(|m| m.name().to_string()).collect())
    }

    fn eval(&self, booster: &Self::Booster, slot: usize) -> FitResult<Vec<f64>> {
        let state = booster.slot(slot).ok_or_else(|| {
            EngineError::new(
                "eval",
                format!("slot {} out of range, booster has {} validation sets", slot, booster.valid.len()),
            )
        })?;
        Ok(booster.metrics.iter().map(|m| m.compute(state)).collect())
    }
}

// =============================================================================
// Tests
// =============================================================================

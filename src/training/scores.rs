//! Score history.
//!
//! [`ScoreStore`] maps dataset name → metric name → one score per evaluation
//! round. Rounds are 1-based and derived from the iteration:
//! `round = ceil(iteration / metric_freq)`. With `metric_freq = 2`,
//! iterations 1, 3, 5 land in rounds 1, 2, 3.
//!
//! A sequence is created on its first write, already sized to the number of
//! rounds the iteration budget allows. Unwritten slots hold NaN. Truncation
//! cuts every sequence back to the rounds observed up to a given iteration,
//! which is how early stopping and engine convergence hide slots that were
//! reserved but never represent a kept model.

use std::collections::BTreeMap;

use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use crate::config::EstimatorConfig;
use crate::error::{FitError, FitResult};

/// Scores of one metric on one dataset.
#[derive(Debug, Clone, PartialEq)]
struct MetricHistory {
    metric: String,
    scores: Vec<f64>,
}

/// All metric histories of one dataset, in first-write order.
#[derive(Debug, Clone, PartialEq)]
struct DatasetHistory {
    name: String,
    metrics: Vec<MetricHistory>,
}

/// Per-dataset, per-metric score sequences indexed by evaluation round.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreStore {
    metric_freq: usize,
    capacity: usize,
    datasets: Vec<DatasetHistory>,
}

impl ScoreStore {
    /// Create an empty store for an iteration budget and evaluation
    /// frequency. A zero frequency is treated as 1.
    pub fn new(num_iterations: usize, metric_freq: usize) -> Self {
        let metric_freq = metric_freq.max(1);
        Self {
            metric_freq,
            capacity: num_iterations.div_ceil(metric_freq),
            datasets: Vec::new(),
        }
    }

    /// Create an empty store sized for a config.
    pub fn for_config(config: &EstimatorConfig) -> Self {
        Self::new(config.num_iterations as usize, config.metric_freq as usize)
    }

    /// Length every sequence gets at creation.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn metric_freq(&self) -> usize {
        self.metric_freq
    }

    /// Round an iteration maps to: `ceil(iteration / metric_freq)`.
    pub fn round_of(&self, iteration: usize) -> usize {
        iteration.div_ceil(self.metric_freq)
    }

    /// Record `value` for `metric` on `dataset` at the round of `iteration`.
    ///
    /// # Errors
    ///
    /// [`FitError::Index`] if the round lies outside `1..=capacity`.
    pub fn record(
        &mut self,
        dataset: &str,
        metric: &str,
        iteration: usize,
        value: f64,
    ) -> FitResult<()> {
        let round = self.round_of(iteration);
        let capacity = self.capacity;
        if round == 0 || round > capacity {
            return Err(FitError::Index {
                dataset: dataset.to_string(),
                metric: metric.to_string(),
                round,
                capacity,
            });
        }

        let scores = self.entry(dataset, metric);
        // Truncated sequences reject further writes.
        if scores.len() < round {
            return Err(FitError::Index {
                dataset: dataset.to_string(),
                metric: metric.to_string(),
                round,
                capacity: scores.len(),
            });
        }
        scores[round - 1] = value;
        Ok(())
    }

    /// Cut every sequence to the rounds observed up to `upto_iteration`.
    pub fn truncate(&mut self, upto_iteration: usize) {
        let keep = self.round_of(upto_iteration);
        for dataset in &mut self.datasets {
            for metric in &mut dataset.metrics {
                metric.scores.truncate(keep);
            }
        }
    }

    fn entry(&mut self, dataset: &str, metric: &str) -> &mut Vec<f64> {
        let capacity = self.capacity;

        let d_idx = match self.datasets.iter().position(|d| d.name == dataset) {
            Some(idx) => idx,
            None => {
                self.datasets.push(DatasetHistory {
                    name: dataset.to_string(),
                    metrics: Vec::new(),
                });
                self.datasets.len() - 1
            }
        };
        let metrics = &mut self.datasets[d_idx].metrics;

        let m_idx = match metrics.iter().position(|m| m.metric == metric) {
            Some(idx) => idx,
            None => {
                metrics.push(MetricHistory {
                    metric: metric.to_string(),
                    scores: vec![f64::NAN; capacity],
                });
                metrics.len() - 1
            }
        };
        &mut metrics[m_idx].scores
    }

    /// Scores of `metric` on `dataset`.
    pub fn get(&self, dataset: &str, metric: &str) -> Option<&[f64]> {
        self.datasets
            .iter()
            .find(|d| d.name == dataset)?
            .metrics
            .iter()
            .find(|m| m.metric == metric)
            .map(|m| m.scores.as_slice())
    }

    /// Dataset names in first-write order.
    pub fn dataset_names(&self) -> impl Iterator<Item = &str> {
        self.datasets.iter().map(|d| d.name.as_str())
    }

    /// `(metric, scores)` pairs of a dataset in first-write order.
    pub fn metrics(&self, dataset: &str) -> impl Iterator<Item = (&str, &[f64])> {
        self.datasets
            .iter()
            .filter(move |d| d.name == dataset)
            .flat_map(|d| d.metrics.iter())
            .map(|m| (m.metric.as_str(), m.scores.as_slice()))
    }

    /// No sequence has been created.
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Copy into nested maps: dataset → metric → scores.
    pub fn to_map(&self) -> BTreeMap<String, BTreeMap<String, Vec<f64>>> {
        self.datasets
            .iter()
            .map(|d| {
                let metrics = d
                    .metrics
                    .iter()
                    .map(|m| (m.metric.clone(), m.scores.clone()))
                    .collect();
                (d.name.clone(), metrics)
            })
            .collect()
    }
}

struct MetricsOf<'a>(&'a DatasetHistory);

impl Serialize for MetricsOf<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.metrics.len()))?;
        for m in &self.0.metrics {
            map.serialize_entry(&m.metric, &m.scores)?;
        }
        map.end()
    }
}

impl Serialize for ScoreStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.datasets.len()))?;
        for d in &self.datasets {
            map.serialize_entry(&d.name, &MetricsOf(d))?;
        }
        map.end()
    }
}

// =============================================================================
// Tests
// =============================================================================
